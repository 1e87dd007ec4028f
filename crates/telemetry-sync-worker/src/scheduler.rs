//! Scheduling for the background delivery path.

use crate::SyncWorker;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Minimum initial backoff between failed job runs.
pub const MIN_BACKOFF_MS: u64 = 10_000;

/// Cap on job-level backoff growth.
const MAX_BACKOFF_MS: u64 = 300_000;

/// Attempt budget for the immediate one-shot job. The periodic job has no
/// budget; it is the unbounded backstop.
const IMMEDIATE_MAX_ATTEMPTS: u32 = 5;

/// Default periodic sync interval.
pub const DEFAULT_PERIODIC_INTERVAL_MINUTES: u64 = 15;

/// How often a queued job re-checks its constraints.
const CONSTRAINT_POLL_MS: u64 = 1_000;

/// Execution constraints for background jobs.
///
/// The immediate job requires network connectivity; the periodic job also
/// requires a non-critical battery. The default probe reports an
/// always-ready host; embedders with real platform signals supply their own.
pub trait SystemProbe: Send + Sync {
    fn network_connected(&self) -> bool;
    fn battery_low(&self) -> bool;
}

/// Probe for hosts without connectivity or battery signals.
pub struct AlwaysReady;

impl SystemProbe for AlwaysReady {
    fn network_connected(&self) -> bool {
        true
    }

    fn battery_low(&self) -> bool {
        false
    }
}

struct ScheduledJob {
    handle: JoinHandle<()>,
    started: Arc<AtomicBool>,
}

/// Schedules the background sync worker.
///
/// Two entry points: an immediate one-shot job (deduped: a new request
/// replaces a queued-but-not-started one; a job that already began runs to
/// completion) and a periodic job (keep semantics: rescheduling while one
/// is active is a no-op). Jobs spawn through the runtime handle captured at
/// construction, so scheduling works from any thread.
pub struct SyncScheduler {
    worker: Arc<SyncWorker>,
    probe: Arc<dyn SystemProbe>,
    runtime: tokio::runtime::Handle,
    immediate: Mutex<Option<ScheduledJob>>,
    periodic: Mutex<Option<JoinHandle<()>>>,
}

impl SyncScheduler {
    /// Create a scheduler with the default always-ready probe.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn new(worker: Arc<SyncWorker>) -> Self {
        Self::with_probe(worker, Arc::new(AlwaysReady))
    }

    /// Create a scheduler with a custom constraint probe.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn with_probe(worker: Arc<SyncWorker>, probe: Arc<dyn SystemProbe>) -> Self {
        Self {
            worker,
            probe,
            runtime: tokio::runtime::Handle::current(),
            immediate: Mutex::new(None),
            periodic: Mutex::new(None),
        }
    }

    /// Queue a one-shot sync to run as soon as the network is up.
    ///
    /// Replaces a previously queued job that has not started; a started job
    /// is left to finish.
    pub fn schedule_immediate(&self) {
        let mut slot = self.immediate.lock();

        if let Some(job) = slot.take() {
            if !job.started.load(Ordering::SeqCst) && !job.handle.is_finished() {
                debug!("Replacing queued immediate sync");
                job.handle.abort();
            }
        }

        let worker = self.worker.clone();
        let probe = self.probe.clone();
        let started = Arc::new(AtomicBool::new(false));
        let started_flag = started.clone();

        let handle = self.runtime.spawn(async move {
            wait_for_network(probe.as_ref()).await;
            started_flag.store(true, Ordering::SeqCst);

            let mut backoff = MIN_BACKOFF_MS;
            for attempt in 0..IMMEDIATE_MAX_ATTEMPTS {
                match worker.run_once().await {
                    Ok(delivered) => {
                        debug!(delivered, "Immediate sync finished");
                        return;
                    }
                    Err(e) => {
                        if attempt + 1 == IMMEDIATE_MAX_ATTEMPTS {
                            error!(error = %e, "Immediate sync gave up, periodic job will retry");
                            return;
                        }
                        warn!(attempt, backoff_ms = backoff, error = %e, "Immediate sync failed, backing off");
                        tokio::time::sleep(Duration::from_millis(backoff)).await;
                        backoff = (backoff * 2).min(MAX_BACKOFF_MS);
                    }
                }
            }
        });

        *slot = Some(ScheduledJob { handle, started });
        info!("Immediate sync scheduled");
    }

    /// Schedule the periodic backstop job.
    ///
    /// Keep semantics: returns false without rescheduling when a periodic
    /// job is already active. A failed run retries with exponential backoff
    /// from the 10s minimum until it succeeds, then the normal interval
    /// resumes.
    pub fn schedule_periodic(&self, interval_minutes: u64) -> bool {
        let mut slot = self.periodic.lock();

        if let Some(handle) = slot.as_ref() {
            if !handle.is_finished() {
                debug!("Periodic sync already scheduled, keeping existing job");
                return false;
            }
        }

        let worker = self.worker.clone();
        let probe = self.probe.clone();
        let period = Duration::from_secs(interval_minutes.max(1) * 60);

        let handle = self.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; the job waits a full
            // period before its first run.
            ticker.tick().await;

            loop {
                ticker.tick().await;

                if !constraints_met(probe.as_ref()) {
                    debug!("Constraints not met, skipping periodic sync");
                    continue;
                }

                if let Err(e) = worker.run_once().await {
                    warn!(error = %e, "Periodic sync failed, backing off");

                    let mut backoff = MIN_BACKOFF_MS;
                    loop {
                        tokio::time::sleep(Duration::from_millis(backoff)).await;
                        wait_for_constraints(probe.as_ref()).await;

                        match worker.run_once().await {
                            Ok(delivered) => {
                                debug!(delivered, "Periodic sync recovered");
                                break;
                            }
                            Err(e) => {
                                warn!(backoff_ms = backoff, error = %e, "Periodic sync retry failed");
                                backoff = (backoff * 2).min(MAX_BACKOFF_MS);
                            }
                        }
                    }
                }
            }
        });

        *slot = Some(handle);
        info!(interval_minutes, "Periodic sync scheduled");
        true
    }

    /// Cancel queued and scheduled jobs.
    pub fn cancel_all(&self) {
        if let Some(job) = self.immediate.lock().take() {
            job.handle.abort();
        }
        if let Some(handle) = self.periodic.lock().take() {
            handle.abort();
        }
        info!("All sync jobs cancelled");
    }
}

fn constraints_met(probe: &dyn SystemProbe) -> bool {
    probe.network_connected() && !probe.battery_low()
}

async fn wait_for_network(probe: &dyn SystemProbe) {
    while !probe.network_connected() {
        tokio::time::sleep(Duration::from_millis(CONSTRAINT_POLL_MS)).await;
    }
}

async fn wait_for_constraints(probe: &dyn SystemProbe) {
    while !constraints_met(probe) {
        tokio::time::sleep(Duration::from_millis(CONSTRAINT_POLL_MS)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;
    use telemetry_core::Event;
    use telemetry_dispatch::{DispatchError, DispatchResult, Provider, RetryPolicy};
    use telemetry_store::{Database, StoreHandle};

    struct CountingProvider {
        calls: AtomicU32,
        failures: AtomicU32,
    }

    impl CountingProvider {
        fn new(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                failures: AtomicU32::new(failures),
            })
        }
    }

    #[async_trait]
    impl Provider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        async fn send_events(&self, _events: &[Event]) -> DispatchResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(DispatchError::Send("simulated outage".to_string()));
            }
            Ok(())
        }
    }

    struct TogglingProbe {
        network: AtomicBool,
        battery_low: AtomicBool,
    }

    impl TogglingProbe {
        fn new(network: bool) -> Arc<Self> {
            Arc::new(Self {
                network: AtomicBool::new(network),
                battery_low: AtomicBool::new(false),
            })
        }
    }

    impl SystemProbe for TogglingProbe {
        fn network_connected(&self) -> bool {
            self.network.load(Ordering::SeqCst)
        }

        fn battery_low(&self) -> bool {
            self.battery_low.load(Ordering::SeqCst)
        }
    }

    fn setup_failing(
        events: usize,
        failures: u32,
    ) -> (StoreHandle, Arc<CountingProvider>, Arc<SyncWorker>) {
        let store: StoreHandle = Arc::new(Database::open_in_memory().unwrap());
        for i in 0..events {
            store
                .persist(&[Event::new(&format!("e{i}"), None)])
                .unwrap();
        }
        let provider = CountingProvider::new(failures);
        let worker = Arc::new(SyncWorker::new(
            store.clone(),
            vec![provider.clone()],
            RetryPolicy::with_delays(2, 1, 5),
            50,
        ));
        (store, provider, worker)
    }

    fn setup(events: usize) -> (StoreHandle, Arc<CountingProvider>, Arc<SyncWorker>) {
        setup_failing(events, 0)
    }

    async fn wait_until<F: Fn() -> bool>(cond: F) {
        // Paused-clock runtime: sleeps auto-advance, so long virtual waits
        // are cheap.
        for _ in 0..600 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_delivers_pending() {
        let (store, _provider, worker) = setup(3);
        let scheduler = SyncScheduler::new(worker);

        scheduler.schedule_immediate();
        let store_clone = store.clone();
        wait_until(move || store_clone.pending().unwrap().is_empty()).await;
    }

    #[tokio::test]
    async fn test_schedule_immediate_from_plain_thread() {
        let (store, _provider, worker) = setup(2);
        let scheduler = Arc::new(SyncScheduler::new(worker));

        let s = scheduler.clone();
        std::thread::spawn(move || s.schedule_immediate())
            .join()
            .unwrap();

        for _ in 0..200 {
            if store.pending().unwrap().is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("immediate sync never ran");
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_requests_are_deduped_while_queued() {
        let (store, provider, worker) = setup(2);
        let probe = TogglingProbe::new(false);
        let scheduler = SyncScheduler::with_probe(worker, probe.clone());

        // Both requests queue while the network is down; the second
        // replaces the first.
        scheduler.schedule_immediate();
        scheduler.schedule_immediate();

        probe.network.store(true, Ordering::SeqCst);
        let store_clone = store.clone();
        wait_until(move || store_clone.pending().unwrap().is_empty()).await;

        // Exactly one pass ran: one provider call for the single chunk.
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_runs_on_low_battery() {
        let (store, _provider, worker) = setup(2);
        let probe = TogglingProbe::new(true);
        probe.battery_low.store(true, Ordering::SeqCst);
        let scheduler = SyncScheduler::with_probe(worker, probe);

        // Battery state only gates the periodic job.
        scheduler.schedule_immediate();
        let store_clone = store.clone();
        wait_until(move || store_clone.pending().unwrap().is_empty()).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_keep_semantics() {
        let (_store, _provider, worker) = setup(0);
        let scheduler = SyncScheduler::new(worker);

        assert!(scheduler.schedule_periodic(15));
        assert!(!scheduler.schedule_periodic(15));

        scheduler.cancel_all();
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_runs_after_interval() {
        let (store, _provider, worker) = setup(4);
        let scheduler = SyncScheduler::new(worker);

        scheduler.schedule_periodic(1);
        let store_clone = store.clone();
        wait_until(move || store_clone.pending().unwrap().is_empty()).await;

        scheduler.cancel_all();
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_failure_retries_with_backoff() {
        // Two failures exhaust the worker's retry budget on the first run;
        // the backoff retry 10s later succeeds, well before the next tick.
        let (store, _provider, worker) = setup_failing(5, 2);
        let scheduler = SyncScheduler::new(worker);

        scheduler.schedule_periodic(15);

        tokio::time::sleep(Duration::from_secs(905)).await;
        assert_eq!(store.pending().unwrap().len(), 5);

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(store.pending().unwrap().is_empty());

        scheduler.cancel_all();
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_skips_when_constraints_not_met() {
        let (store, provider, worker) = setup(2);
        let probe = TogglingProbe::new(false);
        let scheduler = SyncScheduler::with_probe(worker, probe.clone());

        scheduler.schedule_periodic(1);

        // Let several periods elapse with the network down.
        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.pending().unwrap().len(), 2);

        // Next tick after reconnection delivers.
        probe.network.store(true, Ordering::SeqCst);
        let store_clone = store.clone();
        wait_until(move || store_clone.pending().unwrap().is_empty()).await;

        scheduler.cancel_all();
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_skips_on_low_battery() {
        let (store, provider, worker) = setup(2);
        let probe = TogglingProbe::new(true);
        probe.battery_low.store(true, Ordering::SeqCst);
        let scheduler = SyncScheduler::with_probe(worker, probe.clone());

        scheduler.schedule_periodic(1);

        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);

        probe.battery_low.store(false, Ordering::SeqCst);
        let store_clone = store.clone();
        wait_until(move || store_clone.pending().unwrap().is_empty()).await;

        scheduler.cancel_all();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_aborts_jobs() {
        let (store, _provider, worker) = setup(1);
        let probe = TogglingProbe::new(false);
        let scheduler = SyncScheduler::with_probe(worker, probe.clone());

        scheduler.schedule_immediate();
        scheduler.schedule_periodic(1);
        scheduler.cancel_all();

        // Unblocking after cancellation delivers nothing.
        probe.network.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(store.pending().unwrap().len(), 1);
    }
}
