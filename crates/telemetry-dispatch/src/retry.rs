//! Retry combinator with exponential backoff and jitter.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Default base delay before the first retry.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;

/// Default cap on any single backoff delay.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// Exponential-backoff retry policy.
///
/// `delay(attempt) = min(base * 2^attempt + jitter, max)` with jitter drawn
/// uniformly from `[0, base * 2^attempt / 4)`. Generic combinator shared by
/// the dispatcher and the background sync worker.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl RetryPolicy {
    /// Create a policy with the default delay bounds.
    pub fn new(max_attempts: u32) -> Self {
        Self::with_delays(max_attempts, DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_DELAY_MS)
    }

    /// Create a policy with explicit delay bounds.
    pub fn with_delays(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Number of attempts before giving up.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff delay for a zero-based attempt index.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_delay_ms
            .saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX));
        let jitter_bound = exponential / 4;
        let jitter = if jitter_bound > 0 {
            rand::thread_rng().gen_range(0..jitter_bound)
        } else {
            0
        };
        Duration::from_millis(exponential.saturating_add(jitter).min(self.max_delay_ms))
    }

    /// Run `operation`, sleeping between failures until either it succeeds
    /// or the attempt budget is exhausted, in which case the last error is
    /// returned.
    ///
    /// Sleeps are tokio sleeps: other pipeline work keeps running.
    pub async fn execute<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if attempt + 1 >= self.max_attempts {
                        return Err(e);
                    }

                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Operation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
