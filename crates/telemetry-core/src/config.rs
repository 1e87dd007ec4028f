//! Pipeline configuration and privacy settings.

use crate::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Default maximum events per delivery batch.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Default interval between periodic in-process flushes.
pub const DEFAULT_BATCH_TIME_INTERVAL_MS: u64 = 30_000;

/// Default capacity of the in-memory staging queue.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 1_000;

/// Default retry attempts per delivery.
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 3;

/// Default cap on durable store size (records).
pub const DEFAULT_MAX_DATABASE_SIZE: u64 = 10_000;

/// Main pipeline configuration.
///
/// Unknown fields in a config file are ignored; missing fields fall back to
/// the defaults above.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum events drained per flush.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Interval between periodic in-process flushes, in milliseconds.
    #[serde(default = "default_batch_time_interval_ms")]
    pub batch_time_interval_ms: u64,
    /// Capacity of the in-memory staging queue.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    /// Retry attempts per delivery before deferring to the background path.
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    /// Cap on durable store size; oldest records are evicted past this.
    #[serde(default = "default_max_database_size")]
    pub max_database_size: u64,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_batch_time_interval_ms() -> u64 {
    DEFAULT_BATCH_TIME_INTERVAL_MS
}

fn default_max_queue_size() -> usize {
    DEFAULT_MAX_QUEUE_SIZE
}

fn default_max_retry_attempts() -> u32 {
    DEFAULT_MAX_RETRY_ATTEMPTS
}

fn default_max_database_size() -> u64 {
    DEFAULT_MAX_DATABASE_SIZE
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_time_interval_ms: DEFAULT_BATCH_TIME_INTERVAL_MS,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            max_database_size: DEFAULT_MAX_DATABASE_SIZE,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON string, ignoring unrecognized fields.
    pub fn from_json(content: &str) -> CoreResult<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration. Invalid values are fatal: the pipeline
    /// refuses to start rather than running with a zero batch or capacity.
    pub fn validate(&self) -> CoreResult<()> {
        if self.batch_size == 0 {
            return Err(CoreError::Config("batch_size must be > 0".to_string()));
        }
        if self.batch_time_interval_ms == 0 {
            return Err(CoreError::Config(
                "batch_time_interval_ms must be > 0".to_string(),
            ));
        }
        if self.max_queue_size == 0 {
            return Err(CoreError::Config("max_queue_size must be > 0".to_string()));
        }
        if self.max_retry_attempts == 0 {
            return Err(CoreError::Config(
                "max_retry_attempts must be > 0".to_string(),
            ));
        }
        if self.max_database_size == 0 {
            return Err(CoreError::Config(
                "max_database_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for an HTTP delivery target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpProviderConfig {
    /// Base URL of the collector.
    pub endpoint: String,
    /// API key sent as a bearer token.
    pub api_key: String,
    /// TCP connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Whole-request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

/// Privacy settings applied before events enter the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivacySettings {
    /// Master switch; disabled means every event is dropped.
    #[serde(default = "default_true")]
    pub tracking_enabled: bool,
    /// Whether the device snapshot may be attached to events.
    #[serde(default = "default_true")]
    pub collect_device_info: bool,
    /// Event names that are never tracked.
    #[serde(default)]
    pub blocked_events: HashSet<String>,
    /// Lowercase param keys redacted from every event.
    #[serde(default = "default_sensitive_params")]
    pub sensitive_params: HashSet<String>,
}

fn default_true() -> bool {
    true
}

fn default_sensitive_params() -> HashSet<String> {
    ["email", "phone", "password", "ssn"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for PrivacySettings {
    fn default() -> Self {
        Self {
            tracking_enabled: true,
            collect_device_info: true,
            blocked_events: HashSet::new(),
            sensitive_params: default_sensitive_params(),
        }
    }
}
