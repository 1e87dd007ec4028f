//! Pipeline counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters maintained by the pipeline.
///
/// All counters are process-lifetime; none are persisted.
#[derive(Default)]
pub struct PipelineStats {
    pub(crate) enqueued: AtomicU64,
    pub(crate) dropped_by_privacy: AtomicU64,
    pub(crate) store_evictions: AtomicU64,
    pub(crate) persist_failures: AtomicU64,
    pub(crate) delivered: AtomicU64,
    pub(crate) delivery_failures: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }
}

/// Point-in-time view of the pipeline's counters and queue depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Events accepted into the pipeline.
    pub enqueued: u64,
    /// Events rejected by the privacy filter or blocklist.
    pub dropped_by_privacy: u64,
    /// Events dropped from the in-memory queue by capacity eviction.
    pub queue_evictions: u64,
    /// Events deleted from the durable store by capacity eviction.
    pub store_evictions: u64,
    /// Events that failed to persist and rely on the queue alone.
    pub persist_failures: u64,
    /// Events confirmed delivered through the foreground path.
    pub delivered: u64,
    /// Foreground flushes that exhausted their retry budget.
    pub delivery_failures: u64,
    /// Events currently staged in the in-memory queue.
    pub queue_depth: usize,
}

impl PipelineStats {
    pub(crate) fn snapshot(&self, queue_evictions: u64, queue_depth: usize) -> StatsSnapshot {
        StatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped_by_privacy: self.dropped_by_privacy.load(Ordering::Relaxed),
            queue_evictions,
            store_evictions: self.store_evictions.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            queue_depth,
        }
    }
}
