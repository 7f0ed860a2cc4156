pub mod config;
pub mod handlers;
pub mod models;

pub use config::Config;
pub use handlers::api::{AccountApi, BackendClient, LocationSink};
pub use handlers::reporter::LocationReporter;
pub use models::error::{CompanionError, Result};
