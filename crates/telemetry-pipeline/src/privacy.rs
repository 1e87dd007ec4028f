//! Privacy filtering before events enter the pipeline.

use telemetry_core::{Event, PrivacySettings};

/// Decides whether an event may be tracked and strips sensitive fields.
///
/// Pure: no side effects, no I/O.
pub struct PrivacyFilter {
    settings: PrivacySettings,
}

impl PrivacyFilter {
    pub fn new(settings: PrivacySettings) -> Self {
        Self { settings }
    }

    /// True when tracking is on and the event name is not blocked.
    pub fn can_track(&self, event_name: &str) -> bool {
        self.settings.tracking_enabled && !self.settings.blocked_events.contains(event_name)
    }

    /// Apply redaction. Returns `None` when tracking is disabled; otherwise
    /// a copy with sensitive params removed (matched case-insensitively)
    /// and device info cleared unless collection is allowed.
    pub fn apply(&self, event: Event) -> Option<Event> {
        if !self.settings.tracking_enabled {
            return None;
        }

        let params = event.params.map(|params| {
            params
                .into_iter()
                .filter(|(key, _)| !self.settings.sensitive_params.contains(&key.to_lowercase()))
                .collect()
        });

        let device_info = if self.settings.collect_device_info {
            event.device_info
        } else {
            None
        };

        Some(Event {
            params,
            device_info,
            ..event
        })
    }
}
