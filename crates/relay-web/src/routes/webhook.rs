//! Producer webhook.

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use relay_core::{ingest::WebhookPayload, EventKind, RelayError};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WebhookResponse {
    fn ok(message: &str) -> Self {
        Self {
            success: true,
            message: Some(message.to_string()),
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }
}

/// POST /api/webhook - Receive a processing notice or an answer and
/// broadcast it to every connected client.
///
/// The body is read raw so that unparseable input gets the same JSON
/// response shape as every other outcome.
pub async fn receive(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, Json<WebhookResponse>) {
    let payload = match WebhookPayload::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            error!(error = %e, "Error processing webhook request");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(WebhookResponse::failed("Internal server error")),
            );
        }
    };

    info!(?payload, "Received webhook data");

    match payload.into_event() {
        Ok(event) => {
            let message = match event.kind() {
                EventKind::Processing => "Processing status broadcasted",
                EventKind::Answer => "Answer received and broadcasted",
            };
            state.broadcaster.emit(event);
            (StatusCode::OK, Json(WebhookResponse::ok(message)))
        }
        Err(RelayError::Validation(msg)) => {
            warn!(reason = %msg, "Rejected webhook payload");
            (StatusCode::BAD_REQUEST, Json(WebhookResponse::failed(msg)))
        }
        Err(e) => {
            error!(error = %e, "Error processing webhook request");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(WebhookResponse::failed("Internal server error")),
            )
        }
    }
}
