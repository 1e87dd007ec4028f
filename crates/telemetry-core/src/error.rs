//! Core error types for the telemetry pipeline.

use thiserror::Error;

/// Core error type for pipeline-level operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration error (fatal at initialization)
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
