pub mod display_name;
pub mod subscriber_record;
pub mod subscriber_status;
pub mod user_id;
