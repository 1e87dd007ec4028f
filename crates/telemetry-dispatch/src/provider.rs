//! Delivery providers: the network boundary.

use crate::{DispatchError, DispatchResult};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use telemetry_core::{Event, HttpProviderConfig};
use tracing::debug;

/// A delivery target implementing the `send_events` contract.
///
/// Providers must be idempotent-safe on the receiving end: the at-least-once
/// delivery guarantee means duplicates are possible under races between the
/// dispatcher and the background sync worker.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name, used in logs and errors.
    fn name(&self) -> &str;

    /// Deliver one batch. An error here is transient from the pipeline's
    /// point of view; the caller decides whether to retry.
    async fn send_events(&self, events: &[Event]) -> DispatchResult<()>;
}

/// Shared handle to a provider.
pub type ProviderHandle = Arc<dyn Provider>;

/// Request payload for one batch.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventsBatchRequest<'a> {
    batch_id: String,
    sent_at: String,
    sdk_version: &'static str,
    events: &'a [Event],
}

/// Response from the collector.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsBatchResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP provider posting batches to a collector endpoint.
pub struct HttpProvider {
    name: String,
    endpoint: String,
    api_key: String,
    client: Client,
}

impl HttpProvider {
    /// Create a provider from config.
    ///
    /// Connect and request timeouts are explicit and independent of the
    /// retry policy, which only governs attempt count and spacing.
    pub fn new(name: &str, config: &HttpProviderConfig) -> DispatchResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self {
            name: name.to_string(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
        })
    }
}

#[async_trait]
impl Provider for HttpProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_events(&self, events: &[Event]) -> DispatchResult<()> {
        let url = format!("{}/events", self.endpoint);
        let request = EventsBatchRequest {
            batch_id: uuid::Uuid::new_v4().to_string(),
            sent_at: Utc::now().to_rfc3339(),
            sdk_version: env!("CARGO_PKG_VERSION"),
            events,
        };

        debug!(
            provider = %self.name,
            url = %url,
            batch_id = %request.batch_id,
            events = events.len(),
            "Sending batch"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Send(format!("HTTP {status}: {body}")));
        }

        let result: EventsBatchResponse = response.json().await?;
        if result.success {
            Ok(())
        } else {
            Err(DispatchError::Send(
                result.error.unwrap_or_else(|| "Unknown error".to_string()),
            ))
        }
    }
}
