//! Event model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form event parameters, keyed by name.
pub type EventParams = Map<String, Value>;

/// A single telemetry event.
///
/// Events are immutable once created: the pipeline never edits content, it
/// only drops whole events (queue/store eviction) or removes them after
/// confirmed delivery. The `id` is the sole key for removal and dedup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub params: Option<EventParams>,
    pub timestamp: DateTime<Utc>,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub device_info: Option<DeviceInfo>,
}

impl Event {
    /// Create an event with a fresh unique id and the current timestamp.
    pub fn new(name: &str, params: Option<EventParams>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            params,
            timestamp: Utc::now(),
            session_id: None,
            user_id: None,
            device_info: None,
        }
    }
}

/// Device snapshot attached to events, captured once per process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceInfo {
    pub os_version: Option<String>,
    pub model: Option<String>,
    pub manufacturer: Option<String>,
    pub sdk_level: Option<String>,
}

impl DeviceInfo {
    /// Capture a snapshot of the current host.
    pub fn capture() -> Self {
        Self {
            os_version: Some(std::env::consts::OS.to_string()),
            model: Some(std::env::consts::ARCH.to_string()),
            manufacturer: None,
            sdk_level: Some(env!("CARGO_PKG_VERSION").to_string()),
        }
    }
}
