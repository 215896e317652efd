//! Producer-side webhook client.
//!
//! Lets a producer (or the `relay notify` command) post processing and
//! answer notifications to a running relay server.

use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{RelayError, RelayResult};
use crate::ingest::WebhookPayload;

/// Default relay server URL.
pub const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:3000";

/// Acknowledgment returned by the ingestion endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookAck {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Posts notifications to the relay's webhook endpoint.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    base_url: String,
}

impl WebhookNotifier {
    /// Create a notifier with default settings.
    ///
    /// Uses the `RELAY_URL` environment variable if set,
    /// otherwise defaults to `http://127.0.0.1:3000`.
    pub fn new() -> Self {
        let base_url =
            std::env::var("RELAY_URL").unwrap_or_else(|_| DEFAULT_RELAY_URL.to_string());
        Self::with_url(&base_url)
    }

    /// Create a notifier with a custom base URL.
    pub fn with_url(base_url: &str) -> Self {
        debug!(base_url = %base_url, "WebhookNotifier initialized");
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(2))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn webhook_url(&self) -> String {
        format!("{}/api/webhook", self.base_url)
    }

    /// Announce that a new answer is being produced.
    pub async fn notify_processing(&self) -> RelayResult<WebhookAck> {
        self.post(&WebhookPayload {
            kind: Some("processing".to_string()),
            ..Default::default()
        })
        .await
    }

    /// Deliver a completed answer.
    pub async fn notify_answer(
        &self,
        answer: &str,
        model: Option<&str>,
    ) -> RelayResult<WebhookAck> {
        self.post(&WebhookPayload {
            kind: Some("answer".to_string()),
            answer: Some(answer.to_string()),
            model: model.map(str::to_string),
            ..Default::default()
        })
        .await
    }

    async fn post(&self, payload: &WebhookPayload) -> RelayResult<WebhookAck> {
        let url = self.webhook_url();
        debug!(url = %url, kind = ?payload.kind, "Sending webhook notification");

        let response = self.client.post(&url).json(payload).send().await?;
        let status = response.status();
        let ack: WebhookAck = response.json().await?;

        if ack.success {
            debug!(status_code = %status, "Webhook notification accepted");
            Ok(ack)
        } else {
            let reason = ack.error.unwrap_or_else(|| status.to_string());
            warn!(status_code = %status, reason = %reason, "Webhook notification rejected");
            Err(RelayError::Rejected(reason))
        }
    }
}

impl Default for WebhookNotifier {
    fn default() -> Self {
        Self::new()
    }
}
