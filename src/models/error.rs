use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CompanionError>;

#[derive(Error, Debug)]
pub enum CompanionError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Email not found. Cannot start tracking.")]
    MissingAccount,

    #[error("Location request timed out after {0:?}")]
    LocationTimeout(Duration),

    #[error("Position unavailable: {0}")]
    PositionUnavailable(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("{0}")]
    ValidationError(String),

    #[error("Server responded with {status}: {}", .message.as_deref().unwrap_or("no message"))]
    ServerError { status: u16, message: Option<String> },

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CompanionError {
    pub fn validation(message: impl Into<String>) -> Self {
        CompanionError::ValidationError(message.into())
    }

    /// Message carried by a server error body, if the backend sent one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            CompanionError::ServerError { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            CompanionError::ServerError { status, .. } => Some(*status),
            _ => None,
        }
    }
}
