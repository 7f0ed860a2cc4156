pub mod account;
pub mod error;
pub mod location_log;
pub mod notification;
pub mod position;
