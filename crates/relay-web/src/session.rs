//! Push channel sessions.
//!
//! A [`PushSession`] owns one consumer connection's share of the broadcast
//! state: its listener registration and its heartbeat task. Frames are
//! written to an unbounded channel that the transport (SSE or WebSocket)
//! drains. Teardown happens on [`PushSession::close`] or on drop, whichever
//! comes first.

use relay_core::event::now_timestamp;
use relay_core::{Broadcaster, Event, Listener, ListenerId, RelayError, RelayResult, Snapshot};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Plaintext frame sent as soon as a consumer connects.
pub const CONFIRMATION: &str = "Connected to live answer feed";

/// Default heartbeat period.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Shortest heartbeat period; shorter (including zero) periods are raised
/// to this.
pub const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(10);

/// Keep-alive frame carrying the id of the latest event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Heartbeat {
    kind: &'static str,
    pub timestamp: String,
    pub last_message_id: Option<String>,
}

impl Heartbeat {
    pub fn new(last_message_id: Option<String>) -> Self {
        Self {
            kind: "heartbeat",
            timestamp: now_timestamp(),
            last_message_id,
        }
    }
}

/// Lifecycle of a push connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// One consumer connection.
pub struct PushSession {
    state: ConnectionState,
    broadcaster: Arc<Broadcaster>,
    listener: Option<ListenerId>,
    heartbeat: Option<JoinHandle<()>>,
}

impl PushSession {
    /// Open a session: queue the confirmation and the initial sync frames,
    /// register for live events and start the heartbeat.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(
        broadcaster: Arc<Broadcaster>,
        heartbeat_interval: Duration,
    ) -> (Self, UnboundedReceiver<String>) {
        let (sink, frames) = mpsc::unbounded_channel();
        let mut session = Self {
            state: ConnectionState::Connecting,
            broadcaster,
            listener: None,
            heartbeat: None,
        };

        session.state = ConnectionState::Open;
        write_frame(&sink, CONFIRMATION.to_string());

        let sync_sink = sink.clone();
        let id = session
            .broadcaster
            .subscribe_with_snapshot(relay_listener(sink.clone()), |snapshot| {
                send_initial_state(&sync_sink, snapshot)
            });
        session.listener = Some(id);
        session.heartbeat = Some(spawn_heartbeat(
            session.broadcaster.clone(),
            sink,
            heartbeat_interval,
        ));

        info!(listener = %id, "Push client connected");
        (session, frames)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Cancel the heartbeat and deregister the listener. Safe to call more
    /// than once.
    pub fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.state = ConnectionState::Closed;

        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.abort();
        }
        if let Some(id) = self.listener.take() {
            self.broadcaster.unsubscribe(id);
            info!(listener = %id, "Push client disconnected");
        }
    }
}

impl Drop for PushSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Write one encoded frame. Failures mean the peer is gone and are only
/// logged.
fn write_frame(sink: &UnboundedSender<String>, frame: String) -> bool {
    if sink.send(frame).is_err() {
        debug!("Push sink closed, frame dropped");
        return false;
    }
    true
}

fn send_initial_state(sink: &UnboundedSender<String>, snapshot: &Snapshot) {
    let event = if snapshot.is_processing {
        debug!("Sending current processing state");
        let event = Event::processing(None);
        match &snapshot.last_message_id {
            Some(id) => event.with_message_id(id.clone()),
            None => event,
        }
    } else if let Some(answer) = &snapshot.latest_answer {
        debug!(message_id = ?answer.message_id, "Sending latest answer");
        Event::Answer(answer.clone())
    } else {
        return;
    };

    match serde_json::to_string(&event) {
        Ok(json) => {
            write_frame(sink, json);
        }
        Err(e) => error!(error = %e, "Failed to encode initial state"),
    }
}

/// Listener that relays every emitted event to `sink` as JSON.
fn relay_listener(sink: UnboundedSender<String>) -> Listener {
    Arc::new(move |event: &Event| -> RelayResult<()> {
        let json = serde_json::to_string(event).map_err(|e| RelayError::listener(e.to_string()))?;
        debug!(
            kind = %event.kind(),
            message_id = event.message_id().unwrap_or_default(),
            "Pushing event to client: {}",
            event.preview()
        );
        write_frame(&sink, json);
        Ok(())
    })
}

fn spawn_heartbeat(
    broadcaster: Arc<Broadcaster>,
    sink: UnboundedSender<String>,
    period: Duration,
) -> JoinHandle<()> {
    let period = period.max(MIN_HEARTBEAT_INTERVAL);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            ticker.tick().await;
            let heartbeat = Heartbeat::new(broadcaster.last_message_id());
            let json = match serde_json::to_string(&heartbeat) {
                Ok(json) => json,
                Err(e) => {
                    error!(error = %e, "Failed to encode heartbeat");
                    break;
                }
            };
            if !write_frame(&sink, json) {
                debug!("Heartbeat write failed, stopping heartbeat");
                break;
            }
        }
    })
}
