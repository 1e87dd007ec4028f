//! Telemetry pipeline: ingestion, privacy, enrichment, and orchestration.
//!
//! The `Pipeline` is the single entry point applications hold for the
//! process lifetime. `enqueue()` is fire-and-forget: events pass through the
//! privacy filter and metadata enricher, stage in a bounded in-memory queue,
//! persist asynchronously to the durable store, and leave through two
//! independent delivery paths (the in-process dispatcher and the background
//! sync worker).
//!
//! ```ignore
//! let store = Arc::new(Database::open(&path)?);
//! let provider = Arc::new(HttpProvider::new("primary", &provider_config)?);
//! let pipeline = Pipeline::new(config, privacy, store, vec![provider])?;
//! pipeline.start();
//!
//! pipeline.enqueue("screen_view", Some(params));
//! ```

mod enrich;
mod pipeline;
mod privacy;
mod stats;

pub use enrich::{MetadataEnricher, SessionManager};
pub use pipeline::Pipeline;
pub use privacy::PrivacyFilter;
pub use stats::{PipelineStats, StatsSnapshot};

pub use telemetry_core::{
    init_logging, CoreError, CoreResult, DeviceInfo, Event, EventParams, HttpProviderConfig,
    PipelineConfig, PrivacySettings,
};
pub use telemetry_dispatch::{HttpProvider, Provider, ProviderHandle};
pub use telemetry_store::{Database, EventStore, StoreHandle};
pub use telemetry_sync_worker::{SyncScheduler, SystemProbe};
