//! Metadata enrichment: ids, timestamps, session, user, device.

use chrono::Utc;
use parking_lot::RwLock;
use std::sync::Arc;
use telemetry_core::{DeviceInfo, Event, EventParams};
use tracing::debug;

/// Session lifecycle tracking.
///
/// A session id is a uuid minted at `start_session` and cleared at
/// `end_session`; events enqueued outside a session carry no session id.
pub struct SessionManager {
    current: RwLock<Option<String>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    /// Begin a new session, replacing any active one.
    pub fn start_session(&self) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        *self.current.write() = Some(id.clone());
        debug!(session_id = %id, "Session started");
        id
    }

    /// End the active session, if any.
    pub fn end_session(&self) {
        *self.current.write() = None;
    }

    /// The active session id, if a session is open.
    pub fn current_session_id(&self) -> Option<String> {
        self.current.read().clone()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Attaches identity and context to raw `(name, params)` pairs.
///
/// Side-effect-free aside from id/timestamp generation. The device snapshot
/// is captured once at construction and reused for every event.
pub struct MetadataEnricher {
    session: Arc<SessionManager>,
    user_id: RwLock<Option<String>>,
    device_info: DeviceInfo,
}

impl MetadataEnricher {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self::with_device_info(session, DeviceInfo::capture())
    }

    pub fn with_device_info(session: Arc<SessionManager>, device_info: DeviceInfo) -> Self {
        Self {
            session,
            user_id: RwLock::new(None),
            device_info,
        }
    }

    /// Set or clear the user id attached to subsequent events.
    pub fn set_user_id(&self, user_id: Option<String>) {
        *self.user_id.write() = user_id;
    }

    /// Produce a full event from a raw pair: fresh unique id, current
    /// timestamp, current session/user ids, cached device snapshot.
    pub fn enrich(&self, name: &str, params: Option<EventParams>) -> Event {
        Event {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            params,
            timestamp: Utc::now(),
            session_id: self.session.current_session_id(),
            user_id: self.user_id.read().clone(),
            device_info: Some(self.device_info.clone()),
        }
    }
}
