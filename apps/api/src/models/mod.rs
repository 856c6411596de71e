pub mod node;
pub mod request_log;
