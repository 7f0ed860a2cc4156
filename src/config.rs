use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::{info, warn};

pub const API_URL_VAR: &str = "WALKGUARD_API_URL";
pub const INGEST_URL_VAR: &str = "WALKGUARD_INGEST_URL";
pub const STORE_VAR: &str = "WALKGUARD_STORE";
pub const TRACK_INTERVAL_VAR: &str = "WALKGUARD_TRACK_INTERVAL_MS";
pub const HTTP_TIMEOUT_VAR: &str = "WALKGUARD_HTTP_TIMEOUT_SECS";

const DEFAULT_API_URL: &str = "http://192.168.39.154:5000";
const DEFAULT_INGEST_URL: &str = "https://naturally-evident-peacock.ngrok-free.app";
const DEFAULT_STORE: &str = "walkguard-store.json";
const DEFAULT_TRACK_INTERVAL_MS: u64 = 1000;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Host serving `/login`, `/register` and the user lookups.
    pub api_url: String,
    /// Host serving `/user/api/location`.
    pub ingest_url: String,
    pub store_path: PathBuf,
    pub track_interval: Duration,
    pub http_timeout: Duration,
}

impl Config {
    pub fn init() -> Config {
        Config {
            api_url: load_or(API_URL_VAR, DEFAULT_API_URL.to_string()),
            ingest_url: load_or(INGEST_URL_VAR, DEFAULT_INGEST_URL.to_string()),
            store_path: PathBuf::from(load_or(STORE_VAR, DEFAULT_STORE.to_string())),
            track_interval: Duration::from_millis(load_or(
                TRACK_INTERVAL_VAR,
                DEFAULT_TRACK_INTERVAL_MS,
            )),
            http_timeout: Duration::from_secs(load_or(HTTP_TIMEOUT_VAR, DEFAULT_HTTP_TIMEOUT_SECS)),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_url: DEFAULT_API_URL.to_string(),
            ingest_url: DEFAULT_INGEST_URL.to_string(),
            store_path: PathBuf::from(DEFAULT_STORE),
            track_interval: Duration::from_millis(DEFAULT_TRACK_INTERVAL_MS),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

fn load_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value '{raw}': {e}, using default: {default}");
            default
        }),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_or_falls_back_on_garbage() {
        env::set_var("WALKGUARD_TEST_GARBAGE", "not-a-number");
        assert_eq!(load_or("WALKGUARD_TEST_GARBAGE", 7u64), 7);
        env::remove_var("WALKGUARD_TEST_GARBAGE");
    }

    #[test]
    fn load_or_reads_the_variable() {
        env::set_var("WALKGUARD_TEST_INTERVAL", "250");
        assert_eq!(load_or("WALKGUARD_TEST_INTERVAL", 1000u64), 250);
        env::remove_var("WALKGUARD_TEST_INTERVAL");
    }

    #[test]
    fn defaults_match_the_app() {
        let config = Config::default();
        assert_eq!(config.track_interval, Duration::from_secs(1));
        assert_eq!(config.store_path, PathBuf::from("walkguard-store.json"));
    }
}
