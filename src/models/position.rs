use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub captured_at: DateTime<Utc>,
}

impl Position {
    pub fn now(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude, captured_at: Utc::now() }
    }
}

/// Options handed to the position provider on every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    pub max_cached_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(15),
            max_cached_age: Duration::from_secs(10),
        }
    }
}

/// What the track screen shows: the latest fix and the latest failure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackStatus {
    pub last_position: Option<Position>,
    pub last_error: Option<String>,
}
