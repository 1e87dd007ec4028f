//! Sync worker error types.

use thiserror::Error;

/// Background delivery error type.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Durable store error
    #[error("Store error: {0}")]
    Store(#[from] telemetry_store::StoreError),

    /// Delivery error
    #[error("Delivery error: {0}")]
    Dispatch(#[from] telemetry_dispatch::DispatchError),
}

/// Result type alias using SyncError.
pub type SyncResult<T> = Result<T, SyncError>;
