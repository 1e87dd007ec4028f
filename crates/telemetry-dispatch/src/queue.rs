//! Bounded in-memory staging queue.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use telemetry_core::Event;
use tracing::debug;

/// Fixed-capacity staging buffer with oldest-first eviction.
///
/// Absorbs producer bursts before durable write and batch send. Eviction is
/// silent by policy; callers needing loss visibility read `evicted_count`.
pub struct BoundedQueue {
    capacity: usize,
    inner: Mutex<VecDeque<Event>>,
    evicted: AtomicU64,
}

impl BoundedQueue {
    /// Create a queue holding at most `capacity` events. A zero capacity is
    /// clamped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            evicted: AtomicU64::new(0),
        }
    }

    /// Insert at the tail, evicting the single oldest resident when full.
    pub fn push(&self, event: Event) {
        let mut queue = self.inner.lock();
        if queue.len() >= self.capacity {
            if let Some(dropped) = queue.pop_front() {
                self.evicted.fetch_add(1, Ordering::Relaxed);
                debug!(id = %dropped.id, name = %dropped.name, "Queue full, dropped oldest event");
            }
        }
        queue.push_back(event);
    }

    /// Atomically remove and return up to `max` oldest events.
    ///
    /// Drain is exclusive per item: the lock is held for the whole removal,
    /// so two concurrent drains can never see the same event.
    pub fn drain(&self, max: usize) -> Vec<Event> {
        let mut queue = self.inner.lock();
        let take = max.min(queue.len());
        queue.drain(..take).collect()
    }

    /// Current number of staged events.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// True when nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Monotonic count of events dropped by capacity eviction.
    pub fn evicted_count(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn event(name: &str) -> Event {
        Event::new(name, None)
    }

    #[test]
    fn test_push_and_drain_fifo() {
        let queue = BoundedQueue::new(10);
        queue.push(event("a"));
        queue.push(event("b"));
        queue.push(event("c"));

        let drained = queue.drain(2);
        let names: Vec<_> = drained.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_size_never_exceeds_capacity() {
        let capacity = 5;
        let queue = BoundedQueue::new(capacity);

        for i in 0..50 {
            queue.push(event(&format!("e{i}")));
            assert!(queue.len() <= capacity);
        }
    }

    #[test]
    fn test_eviction_drops_oldest_first() {
        let capacity = 3;
        let queue = BoundedQueue::new(capacity);

        // capacity + k pushes with no drains
        for i in 1..=5 {
            queue.push(event(&format!("e{i}")));
        }

        // Resident set is the last `capacity` pushed; oldest k dropped
        let names: Vec<_> = queue.drain(10).into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["e3", "e4", "e5"]);
        assert_eq!(queue.evicted_count(), 2);
    }

    #[test]
    fn test_zero_capacity_clamps_to_one() {
        let queue = BoundedQueue::new(0);
        queue.push(event("a"));
        queue.push(event("b"));

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.evicted_count(), 1);
        assert_eq!(queue.drain(10)[0].name, "b");
    }

    #[test]
    fn test_drain_more_than_staged() {
        let queue = BoundedQueue::new(10);
        queue.push(event("only"));
        assert_eq!(queue.drain(100).len(), 1);
        assert!(queue.is_empty());
        assert_eq!(queue.drain(100).len(), 0);
    }

    #[test]
    fn test_concurrent_producers_hold_invariant() {
        let capacity = 100;
        let queue = Arc::new(BoundedQueue::new(capacity));
        let mut handles = Vec::new();

        for t in 0..8 {
            let queue = queue.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..500 {
                    queue.push(Event::new(&format!("t{t}-{i}"), None));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(queue.len(), capacity);
        assert_eq!(queue.evicted_count(), (8 * 500 - capacity) as u64);
    }

    #[test]
    fn test_concurrent_drains_are_exclusive_per_item() {
        let queue = Arc::new(BoundedQueue::new(1000));
        for i in 0..1000 {
            queue.push(Event::new(&format!("e{i}"), None));
        }

        let mut handles = Vec::new();
        for _ in 0..4 {
            let queue = queue.clone();
            handles.push(std::thread::spawn(move || {
                let mut ids = Vec::new();
                while !queue.is_empty() {
                    ids.extend(queue.drain(50).into_iter().map(|e| e.id));
                }
                ids
            }));
        }

        let mut all_ids: Vec<String> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let total = all_ids.len();
        all_ids.sort();
        all_ids.dedup();

        // No event handed to two drains
        assert_eq!(all_ids.len(), total);
        assert_eq!(total, 1000);
    }
}
