//! Dispatch error types.

use thiserror::Error;

/// Delivery-path error type.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Send rejected by the collector
    #[error("Send failed: {0}")]
    Send(String),

    /// Retry budget exhausted for a provider
    #[error("Max retries exceeded for provider {0}")]
    MaxRetriesExceeded(String),

    /// Durable store error
    #[error("Store error: {0}")]
    Store(#[from] telemetry_store::StoreError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using DispatchError.
pub type DispatchResult<T> = Result<T, DispatchError>;
