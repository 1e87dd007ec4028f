//! Background sync worker.

use crate::SyncResult;
use telemetry_dispatch::{ProviderHandle, RetryPolicy};
use telemetry_store::StoreHandle;
use tracing::{debug, info, warn};

/// Delivers pending durable records, independent of the in-memory queue.
///
/// One invocation reads everything currently pending and sends it in
/// batch-sized chunks through every provider. Chunks that fail after
/// exhausting retries stay pending for the next invocation.
pub struct SyncWorker {
    store: StoreHandle,
    providers: Vec<ProviderHandle>,
    retry: RetryPolicy,
    batch_size: usize,
}

impl SyncWorker {
    /// Create a worker over the given store and providers.
    pub fn new(
        store: StoreHandle,
        providers: Vec<ProviderHandle>,
        retry: RetryPolicy,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            providers,
            retry,
            batch_size: batch_size.max(1),
        }
    }

    /// One delivery pass. Returns the number of events confirmed delivered.
    ///
    /// Empty pending set succeeds trivially. A chunk failure stops the pass;
    /// the caller (scheduler) decides whether to back off and rerun.
    pub async fn run_once(&self) -> SyncResult<usize> {
        let pending = self.store.pending()?;
        if pending.is_empty() {
            debug!("No pending events to sync");
            return Ok(0);
        }

        info!(pending = pending.len(), "Background sync started");

        let mut delivered = 0;
        for chunk in pending.chunks(self.batch_size) {
            for provider in &self.providers {
                if let Err(e) = self.retry.execute(|| provider.send_events(chunk)).await {
                    warn!(
                        provider = %provider.name(),
                        events = chunk.len(),
                        delivered,
                        error = %e,
                        "Background sync chunk failed, stopping pass"
                    );
                    return Err(e.into());
                }
            }

            let ids: Vec<String> = chunk.iter().map(|e| e.id.clone()).collect();
            self.store.remove_by_ids(&ids)?;
            delivered += chunk.len();
        }

        info!(delivered, "Background sync complete");
        Ok(delivered)
    }
}
