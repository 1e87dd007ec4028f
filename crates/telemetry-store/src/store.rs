//! The durable-store contract consumed by the delivery paths.

use crate::{Database, StoreResult};
use std::sync::Arc;
use telemetry_core::Event;

/// Durable record store with pending/sent bookkeeping.
///
/// Both delivery paths (in-process dispatcher and background sync worker)
/// consume this contract without any shared lock between them; correctness
/// under interleaving rests on `remove_by_ids` being idempotent.
pub trait EventStore: Send + Sync {
    /// Idempotent append; records start unsent.
    fn persist(&self, events: &[Event]) -> StoreResult<usize>;

    /// All unsent records, oldest first.
    fn pending(&self) -> StoreResult<Vec<Event>>;

    /// Delete matching records regardless of sent state. Missing ids are
    /// skipped without error; returns the number actually deleted.
    fn remove_by_ids(&self, ids: &[String]) -> StoreResult<usize>;

    /// Mark records sent. State only moves forward; no record is resurrected.
    fn mark_sent(&self, ids: &[String]) -> StoreResult<usize>;

    /// Total record count, sent and unsent.
    fn count(&self) -> StoreResult<u64>;

    /// Delete the n oldest records by timestamp, irrespective of sent state.
    fn evict_oldest(&self, n: u64) -> StoreResult<u64>;
}

/// Thread-safe handle for sharing a store across the pipeline.
pub type StoreHandle = Arc<dyn EventStore>;

impl EventStore for Database {
    fn persist(&self, events: &[Event]) -> StoreResult<usize> {
        self.insert_events(events)
    }

    fn pending(&self) -> StoreResult<Vec<Event>> {
        self.pending_events()
    }

    fn remove_by_ids(&self, ids: &[String]) -> StoreResult<usize> {
        self.delete_events_by_ids(ids)
    }

    fn mark_sent(&self, ids: &[String]) -> StoreResult<usize> {
        self.mark_events_sent(ids)
    }

    fn count(&self) -> StoreResult<u64> {
        self.count_events()
    }

    fn evict_oldest(&self, n: u64) -> StoreResult<u64> {
        self.evict_oldest_events(n)
    }
}
