//! Process-wide broadcast state.
//!
//! A [`Broadcaster`] caches the latest answer, the processing flag and the
//! id of the last emitted event, and fans every emitted event out to the
//! registered listeners. One instance is created per process and shared by
//! `Arc` with every handler.
//!
//! All operations run inside a single mutex section, including listener
//! invocation during [`Broadcaster::emit`]. Listeners must therefore be
//! cheap and must never call back into the broadcaster.

use serde::Serialize;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::error::RelayResult;
use crate::event::{new_message_id, AnswerEvent, Event};

/// Callback invoked with every emitted event.
pub type Listener = Arc<dyn Fn(&Event) -> RelayResult<()> + Send + Sync>;

/// Handle returned by [`Broadcaster::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Point-in-time read of the broadcast state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub latest_answer: Option<AnswerEvent>,
    pub is_processing: bool,
    pub last_message_id: Option<String>,
    pub listener_count: usize,
}

#[derive(Default)]
struct Inner {
    latest_answer: Option<AnswerEvent>,
    is_processing: bool,
    last_message_id: Option<String>,
    listeners: Vec<(ListenerId, Listener)>,
    next_id: u64,
}

impl Inner {
    fn snapshot(&self) -> Snapshot {
        Snapshot {
            latest_answer: self.latest_answer.clone(),
            is_processing: self.is_processing,
            last_message_id: self.last_message_id.clone(),
            listener_count: self.listeners.len(),
        }
    }

    fn register(&mut self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }
}

/// Holder of the latest state and the listener registry.
#[derive(Default)]
pub struct Broadcaster {
    inner: Mutex<Inner>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Listener panics are caught inside the section, so a poisoned lock
        // still guards consistent state.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `event` and notify every listener in registration order.
    ///
    /// A message id is assigned when the event has none. A listener that
    /// fails or panics is logged and skipped; it never affects the other
    /// listeners or the caller.
    pub fn emit(&self, event: Event) {
        let event = match event.message_id() {
            Some(_) => event,
            None => event.with_message_id(new_message_id()),
        };

        let mut inner = self.lock();
        inner.last_message_id = event.message_id().map(str::to_owned);
        match &event {
            Event::Processing(_) => inner.is_processing = true,
            Event::Answer(answer) => {
                inner.latest_answer = Some(answer.clone());
                inner.is_processing = false;
            }
        }

        info!(
            kind = %event.kind(),
            message_id = event.message_id().unwrap_or_default(),
            listener_count = inner.listeners.len(),
            "Event emitted: {}",
            event.preview()
        );

        for (id, listener) in &inner.listeners {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(listener = %id, error = %e, "Error notifying listener"),
                Err(_) => warn!(listener = %id, "Listener panicked during notification"),
            }
        }
    }

    /// Register a listener. Past state is not replayed.
    pub fn subscribe(&self, listener: Listener) -> ListenerId {
        let mut inner = self.lock();
        let id = inner.register(listener);
        info!(listener = %id, listener_count = inner.listeners.len(), "New listener added");
        id
    }

    /// Hand the current state to `sync`, then register `listener`, all in
    /// one critical section. No event can be emitted between the read and
    /// the registration, so the caller neither misses nor duplicates one.
    pub fn subscribe_with_snapshot<F>(&self, listener: Listener, sync: F) -> ListenerId
    where
        F: FnOnce(&Snapshot),
    {
        let mut inner = self.lock();
        sync(&inner.snapshot());
        let id = inner.register(listener);
        info!(listener = %id, listener_count = inner.listeners.len(), "New listener added");
        id
    }

    /// Remove the registration for `id`. Returns `false` if it was not
    /// registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut inner = self.lock();
        match inner.listeners.iter().position(|(lid, _)| *lid == id) {
            Some(index) => {
                inner.listeners.remove(index);
                info!(listener = %id, listener_count = inner.listeners.len(), "Listener removed");
                true
            }
            None => {
                debug!(listener = %id, "Listener already removed");
                false
            }
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.lock().snapshot()
    }

    pub fn last_message_id(&self) -> Option<String> {
        self.lock().last_message_id.clone()
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }
}
