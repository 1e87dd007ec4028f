//! Batched delivery for the telemetry pipeline.
//!
//! This crate provides:
//! - `BoundedQueue`: in-memory staging buffer with oldest-first eviction
//! - `RetryPolicy`: exponential backoff with jitter, reused by every
//!   delivery path
//! - `Provider` / `HttpProvider`: the network boundary
//! - `Dispatcher`: drains batches from the queue and reconciles delivery
//!   against the durable store

mod dispatcher;
mod error;
mod provider;
mod queue;
mod retry;

pub use dispatcher::Dispatcher;
pub use error::{DispatchError, DispatchResult};
pub use provider::{HttpProvider, Provider, ProviderHandle};
pub use queue::BoundedQueue;
pub use retry::RetryPolicy;
