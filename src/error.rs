use thiserror::Error as ThisError;

/// Reasons a raw sample cannot become a [`SensorReading`](crate::telemetry::SensorReading).
#[derive(ThisError, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("primary field missing or not numeric: {0}")]
    MissingPrimaryField(&'static str),

    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("invalid sample timestamp: {0}")]
    InvalidTimestamp(String),
}

#[derive(ThisError, Debug)]
pub enum AlertError {
    #[error("Telemetry fetch timed out")]
    FetchTimeout,

    #[error("Telemetry fetch failed: {0}")]
    FetchFailure(String),

    #[error("Sample validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Risk classifier failed: {0}")]
    ClassifierFailure(String),

    #[error("Notification permission denied")]
    PermissionDenied,

    #[error("Notification presentation failed: {0}")]
    PresentationFailure(String),

    #[error("Audio playback error: {0}")]
    Audio(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

impl AlertError {
    /// Short stable label used in logs and engine events.
    pub fn kind(&self) -> &'static str {
        match self {
            AlertError::FetchTimeout => "fetch_timeout",
            AlertError::FetchFailure(_) => "fetch_failure",
            AlertError::Validation(_) => "validation",
            AlertError::ClassifierFailure(_) => "classifier_failure",
            AlertError::PermissionDenied => "permission_denied",
            AlertError::PresentationFailure(_) => "presentation_failure",
            AlertError::Audio(_) => "audio",
            AlertError::Config(_) => "config",
            AlertError::IoError(_) => "io",
            AlertError::SerdeJsonError(_) => "serde_json",
        }
    }
}

pub type Result<T> = std::result::Result<T, AlertError>;
