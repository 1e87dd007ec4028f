//! The pipeline orchestrator.

use crate::enrich::{MetadataEnricher, SessionManager};
use crate::privacy::PrivacyFilter;
use crate::stats::{PipelineStats, StatsSnapshot};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use telemetry_core::{CoreError, CoreResult, EventParams, PipelineConfig, PrivacySettings};
use telemetry_dispatch::{BoundedQueue, Dispatcher, ProviderHandle, RetryPolicy};
use telemetry_store::StoreHandle;
use telemetry_sync_worker::{
    SyncScheduler, SyncWorker, SystemProbe, DEFAULT_PERIODIC_INTERVAL_MINUTES,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Entry point for event ingestion and delivery.
///
/// `enqueue` is cheap and non-blocking: filtering and enrichment happen
/// inline, persistence and delivery are handed to spawned tasks. One
/// instance is expected to live for the whole process.
pub struct Pipeline {
    config: PipelineConfig,
    filter: PrivacyFilter,
    session: Arc<SessionManager>,
    enricher: Arc<MetadataEnricher>,
    queue: Arc<BoundedQueue>,
    store: StoreHandle,
    dispatcher: Arc<Dispatcher>,
    scheduler: Arc<SyncScheduler>,
    stats: Arc<PipelineStats>,
    runtime: tokio::runtime::Handle,
    flush_timer: Mutex<Option<JoinHandle<()>>>,
}

impl Pipeline {
    /// Build a pipeline with the default always-ready system probe.
    pub fn new(
        config: PipelineConfig,
        privacy: PrivacySettings,
        store: StoreHandle,
        providers: Vec<ProviderHandle>,
    ) -> CoreResult<Self> {
        Self::with_probe(
            config,
            privacy,
            store,
            providers,
            Arc::new(telemetry_sync_worker::AlwaysReady),
        )
    }

    /// Build a pipeline with a custom constraint probe for background sync.
    ///
    /// Fails on invalid configuration, an empty provider list, or when
    /// called outside a tokio runtime.
    pub fn with_probe(
        config: PipelineConfig,
        privacy: PrivacySettings,
        store: StoreHandle,
        providers: Vec<ProviderHandle>,
        probe: Arc<dyn SystemProbe>,
    ) -> CoreResult<Self> {
        config.validate()?;
        if providers.is_empty() {
            return Err(CoreError::Config(
                "at least one provider is required".to_string(),
            ));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            CoreError::Config("pipeline must be created inside a tokio runtime".to_string())
        })?;

        let session = Arc::new(SessionManager::new());
        let enricher = Arc::new(MetadataEnricher::new(session.clone()));
        let queue = Arc::new(BoundedQueue::new(config.max_queue_size));
        let retry = RetryPolicy::new(config.max_retry_attempts);

        let dispatcher = Arc::new(Dispatcher::new(
            queue.clone(),
            store.clone(),
            providers.clone(),
            retry.clone(),
            config.batch_size,
        ));
        let worker = Arc::new(SyncWorker::new(
            store.clone(),
            providers,
            retry,
            config.batch_size,
        ));
        let scheduler = Arc::new(SyncScheduler::with_probe(worker, probe));

        info!(
            batch_size = config.batch_size,
            max_queue_size = config.max_queue_size,
            max_database_size = config.max_database_size,
            "Pipeline created"
        );

        Ok(Self {
            config,
            filter: PrivacyFilter::new(privacy),
            session,
            enricher,
            queue,
            store,
            dispatcher,
            scheduler,
            stats: Arc::new(PipelineStats::new()),
            runtime,
            flush_timer: Mutex::new(None),
        })
    }

    /// Start the periodic flush timer and the background sync jobs.
    ///
    /// Idempotent: a second call keeps the existing timer and periodic job.
    pub fn start(&self) {
        let mut slot = self.flush_timer.lock();
        if slot.as_ref().map(|h| !h.is_finished()).unwrap_or(false) {
            debug!("Pipeline already started");
            return;
        }

        let dispatcher = self.dispatcher.clone();
        let stats = self.stats.clone();
        let period = Duration::from_millis(self.config.batch_time_interval_ms);

        *slot = Some(self.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                flush_and_record(&dispatcher, &stats).await;
            }
        }));
        drop(slot);

        // Drain anything left over from a previous process, then keep the
        // backstop running.
        self.scheduler.schedule_immediate();
        self.scheduler
            .schedule_periodic(DEFAULT_PERIODIC_INTERVAL_MINUTES);

        info!(
            interval_ms = self.config.batch_time_interval_ms,
            "Pipeline started"
        );
    }

    /// Submit an event. Never blocks on I/O; returns before the event is
    /// persisted or delivered.
    ///
    /// Events with an empty name are dropped. Blocked or untrackable events
    /// are counted and dropped before enrichment.
    pub fn enqueue(&self, name: &str, params: Option<EventParams>) {
        if name.trim().is_empty() {
            warn!("Dropping event with empty name");
            return;
        }
        if !self.filter.can_track(name) {
            PipelineStats::incr(&self.stats.dropped_by_privacy);
            debug!(event = name, "Event dropped by privacy settings");
            return;
        }

        let event = self.enricher.enrich(name, params);
        let Some(event) = self.filter.apply(event) else {
            PipelineStats::incr(&self.stats.dropped_by_privacy);
            return;
        };

        PipelineStats::incr(&self.stats.enqueued);
        self.queue.push(event.clone());

        let store = self.store.clone();
        let stats = self.stats.clone();
        let max_database_size = self.config.max_database_size;
        self.runtime.spawn(async move {
            match store.persist(std::slice::from_ref(&event)) {
                Ok(_) => {
                    if let Err(e) = enforce_store_capacity(&store, &stats, max_database_size) {
                        warn!(error = %e, "Store capacity check failed");
                    }
                }
                Err(e) => {
                    PipelineStats::incr(&stats.persist_failures);
                    warn!(event_id = %event.id, error = %e, "Failed to persist event");
                }
            }
        });

        if self.queue.len() >= self.config.batch_size {
            let dispatcher = self.dispatcher.clone();
            let stats = self.stats.clone();
            self.runtime.spawn(async move {
                flush_and_record(&dispatcher, &stats).await;
            });
        }
    }

    /// Flush one batch now, bypassing the timer and size threshold.
    pub async fn flush(&self) {
        flush_and_record(&self.dispatcher, &self.stats).await;
    }

    /// Request an immediate background sync of everything pending.
    pub fn sync_now(&self) {
        self.scheduler.schedule_immediate();
    }

    /// Set or clear the user id attached to subsequent events.
    pub fn set_user_id(&self, user_id: Option<String>) {
        self.enricher.set_user_id(user_id);
    }

    /// Begin a new session; subsequent events carry the returned id.
    pub fn start_session(&self) -> String {
        self.session.start_session()
    }

    /// End the active session.
    pub fn end_session(&self) {
        self.session.end_session();
    }

    /// Current counters and queue depth.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats
            .snapshot(self.queue.evicted_count(), self.queue.len())
    }

    /// Stop the flush timer and cancel background sync jobs.
    ///
    /// Staged events stay in the durable store and are delivered on the
    /// next start.
    pub fn shutdown(&self) {
        if let Some(handle) = self.flush_timer.lock().take() {
            handle.abort();
        }
        self.scheduler.cancel_all();
        info!("Pipeline shut down");
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn flush_and_record(dispatcher: &Dispatcher, stats: &PipelineStats) {
    match dispatcher.flush().await {
        Ok(delivered) => {
            if delivered > 0 {
                PipelineStats::add(&stats.delivered, delivered as u64);
            }
        }
        Err(e) => {
            PipelineStats::incr(&stats.delivery_failures);
            warn!(error = %e, "Flush failed, background sync will retry");
        }
    }
}

fn enforce_store_capacity(
    store: &StoreHandle,
    stats: &PipelineStats,
    max: u64,
) -> telemetry_store::StoreResult<()> {
    let count = store.count()?;
    if count > max {
        let evicted = store.evict_oldest(count - max)?;
        PipelineStats::add(&stats.store_evictions, evicted);
        warn!(evicted, max, "Durable store over capacity, evicted oldest");
    }
    Ok(())
}
