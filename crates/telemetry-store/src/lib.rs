//! SQLite durable store for the telemetry pipeline.
//!
//! This crate provides:
//! - `EventStore`: the durable-store contract the delivery paths consume
//! - `Database`: SQLite implementation with WAL mode and migrations
//! - `StoreError`/`StoreResult` error types
//!
//! The store is the only persisted artifact of the pipeline and the only
//! mutable resource shared between the in-process dispatcher and the
//! background sync worker. Every call is atomic; `remove_by_ids` is
//! idempotent so racing consumers cannot double-remove or crash.

mod db;
mod error;
mod migrations;
mod store;

pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use migrations::run_migrations;
pub use store::{EventStore, StoreHandle};
