pub mod plan_status;
