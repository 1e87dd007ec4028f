//! Batch dispatcher: queue → providers → durable reconciliation.

use crate::{BoundedQueue, DispatchError, DispatchResult, ProviderHandle, RetryPolicy};
use std::sync::Arc;
use telemetry_store::StoreHandle;
use tracing::{debug, info, warn};

/// Turns staged events into confirmed or deferred deliveries.
///
/// A flush that fails after exhausting retries leaves the batch's durable
/// records unsent; the background sync worker is the backstop for those.
/// Failure is batch-wide: if one provider accepts the batch and another
/// exhausts its retries, the whole batch stays pending and may be delivered
/// to the first provider again later. Receivers must tolerate duplicates.
pub struct Dispatcher {
    queue: Arc<BoundedQueue>,
    store: StoreHandle,
    providers: Vec<ProviderHandle>,
    retry: RetryPolicy,
    batch_size: usize,
}

impl Dispatcher {
    /// Create a dispatcher over the given queue, store, and providers.
    pub fn new(
        queue: Arc<BoundedQueue>,
        store: StoreHandle,
        providers: Vec<ProviderHandle>,
        retry: RetryPolicy,
        batch_size: usize,
    ) -> Self {
        Self {
            queue,
            store,
            providers,
            retry,
            batch_size,
        }
    }

    /// Drain up to one batch and attempt delivery.
    ///
    /// Returns the number of events confirmed delivered (0 when the queue
    /// was empty). Once draining starts the flush runs to completion; there
    /// is no mid-batch cancellation.
    pub async fn flush(&self) -> DispatchResult<usize> {
        let batch = self.queue.drain(self.batch_size);
        if batch.is_empty() {
            return Ok(0);
        }

        debug!(events = batch.len(), "Flushing batch");

        for provider in &self.providers {
            let result = self
                .retry
                .execute(|| provider.send_events(&batch))
                .await;

            if let Err(e) = result {
                warn!(
                    provider = %provider.name(),
                    events = batch.len(),
                    error = %e,
                    "Provider failed after retries, leaving batch for background sync"
                );
                return Err(DispatchError::MaxRetriesExceeded(
                    provider.name().to_string(),
                ));
            }
        }

        let ids: Vec<String> = batch.iter().map(|e| e.id.clone()).collect();
        let removed = self.store.remove_by_ids(&ids)?;

        info!(
            events = batch.len(),
            removed,
            "Batch delivered and reconciled"
        );
        Ok(batch.len())
    }
}
