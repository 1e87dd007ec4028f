//! Background delivery path for the telemetry pipeline.
//!
//! This crate provides:
//! - `SyncWorker`: reads pending records straight from the durable store and
//!   delivers them through the same retry-wrapped provider path the
//!   dispatcher uses
//! - `SyncScheduler`: immediate one-shot and periodic scheduling with
//!   replace/keep semantics, constraint gating, and exponential job-level
//!   backoff
//!
//! The worker is independent of the in-memory queue: it is the durability
//! backstop for anything the in-process dispatcher could not deliver before
//! process death or after retry exhaustion.

mod error;
mod scheduler;
mod worker;

pub use error::{SyncError, SyncResult};
pub use scheduler::{
    AlwaysReady, SyncScheduler, SystemProbe, DEFAULT_PERIODIC_INTERVAL_MINUTES, MIN_BACKOFF_MS,
};
pub use worker::SyncWorker;
