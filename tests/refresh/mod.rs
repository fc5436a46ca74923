mod finalize_reparent_case1;
