//! Core types, configuration, and utilities for the telemetry pipeline.

mod config;
mod error;
mod event;
mod logging;

pub use config::{
    HttpProviderConfig, PipelineConfig, PrivacySettings, DEFAULT_BATCH_SIZE,
    DEFAULT_BATCH_TIME_INTERVAL_MS, DEFAULT_MAX_DATABASE_SIZE, DEFAULT_MAX_QUEUE_SIZE,
    DEFAULT_MAX_RETRY_ATTEMPTS,
};
pub use error::{CoreError, CoreResult};
pub use event::{DeviceInfo, Event, EventParams};
pub use logging::init_logging;
