//! Relay Core Library
//!
//! Event model and the process-wide broadcast state shared by the
//! ingestion, push and snapshot handlers.

pub mod broadcast;
pub mod error;
pub mod event;
pub mod ingest;
pub mod notifier;

pub use broadcast::{Broadcaster, Listener, ListenerId, Snapshot};
pub use error::{RelayError, RelayResult};
pub use event::{AnswerEvent, Event, EventKind, ProcessingEvent};
