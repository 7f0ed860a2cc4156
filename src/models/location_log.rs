use serde::{Deserialize, Serialize};

use crate::models::position::Position;

/// Body of `POST /user/api/location`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationReport {
    pub latitude: f64,
    pub longitude: f64,
    pub email: String,
}

impl LocationReport {
    pub fn new(position: &Position, email: impl Into<String>) -> Self {
        Self {
            latitude: position.latitude,
            longitude: position.longitude,
            email: email.into(),
        }
    }
}
