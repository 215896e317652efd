//! Server-Sent Events push channel.

use axum::{
    extract::State,
    http::header,
    response::{
        sse::{Event as SseEvent, Sse},
        IntoResponse,
    },
};
use futures::stream::{self, Stream};
use std::convert::Infallible;
use tracing::debug;

use crate::session::PushSession;
use crate::state::AppState;

/// GET /api/stream - Open a live event stream.
///
/// The session lives inside the response stream, so it is torn down as
/// soon as the server drops the body after the client disconnects. The
/// stream ends on server shutdown.
pub async fn stream_handler(State(state): State<AppState>) -> impl IntoResponse {
    let (session, frames) = PushSession::open(state.broadcaster.clone(), state.heartbeat_interval);

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(session_stream(session, frames, state)),
    )
}

fn session_stream(
    session: PushSession,
    frames: tokio::sync::mpsc::UnboundedReceiver<String>,
    state: AppState,
) -> impl Stream<Item = Result<SseEvent, Infallible>> {
    stream::unfold(
        (session, frames, state),
        |(mut session, mut frames, state)| async move {
            let frame = tokio::select! {
                biased;
                _ = state.shutdown_signal() => {
                    debug!("Server shutting down, ending event stream");
                    session.close();
                    None
                }
                frame = frames.recv() => frame,
            }?;
            Some((Ok(SseEvent::default().data(frame)), (session, frames, state)))
        },
    )
}
