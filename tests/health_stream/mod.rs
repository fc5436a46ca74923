mod broadcast_order_case1;
mod slow_subscriber_case2;
