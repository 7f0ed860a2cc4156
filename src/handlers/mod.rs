pub mod api;
pub mod auth;
pub mod device;
pub mod profile;
pub mod reporter;
pub mod storage;
pub mod task;
