mod register_case1;
