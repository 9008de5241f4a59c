//! Error types for the schedule engine.

use thiserror::Error;

/// Main error type for engine operations.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("unauthorized access")]
    Unauthorized,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("preset {0} not found")]
    PresetNotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ScheduleError {
    fn from(e: serde_json::Error) -> Self {
        ScheduleError::Serialization(e.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, ScheduleError>;
