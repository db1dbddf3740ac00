//! Error types for the classification service

use thiserror::Error;

/// Result type alias for classifier operations
pub type Result<T> = std::result::Result<T, ClassifierError>;

/// Main error type for the classification service
#[derive(Error, Debug)]
pub enum ClassifierError {
    /// Upload is not an image or cannot be decoded. Caller-correctable.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The model artifact is missing or failed to load. Fatal for serving.
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Preprocessing or model invocation failed unexpectedly.
    #[error("Inference error: {0}")]
    InferenceError(String),

    /// Tracking-store append or artifact persistence failed.
    #[error("Logging failure: {0}")]
    LoggingFailure(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },
}

impl From<serde_json::Error> for ClassifierError {
    fn from(err: serde_json::Error) -> Self {
        ClassifierError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ClassifierError {
    fn from(err: ndarray::ShapeError) -> Self {
        ClassifierError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
