//! Polling fallback for clients whose push channel is unreliable.

use axum::{extract::State, Json};
use relay_core::Event;
use serde::Serialize;
use tracing::debug;

use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestResponse {
    pub success: bool,
    pub is_processing: bool,
    pub last_message_id: Option<String>,
    pub listener_count: usize,
    pub answer: Option<Event>,
}

/// GET /api/latest - Current answer and processing state.
///
/// Carries `lastMessageId` so clients can deduplicate against frames
/// already received over the push channel.
pub async fn latest(State(state): State<AppState>) -> Json<LatestResponse> {
    let snapshot = state.broadcaster.snapshot();

    debug!(
        is_processing = snapshot.is_processing,
        message_id = ?snapshot.last_message_id,
        listener_count = snapshot.listener_count,
        "Latest state requested"
    );

    Json(LatestResponse {
        success: true,
        is_processing: snapshot.is_processing,
        last_message_id: snapshot.last_message_id,
        listener_count: snapshot.listener_count,
        answer: snapshot.latest_answer.map(Event::Answer),
    })
}
