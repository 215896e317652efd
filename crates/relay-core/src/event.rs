//! Event model.
//!
//! Events are the units of state change relayed from the producer to every
//! connected consumer. On the wire they are JSON objects discriminated by a
//! `kind` field.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A processing-started notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingEvent {
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// A completed answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEvent {
    pub answer: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// Event broadcast to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Event {
    Processing(ProcessingEvent),
    Answer(AnswerEvent),
}

/// Event discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Processing,
    Answer,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Answer => "answer",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Event {
    /// Create a processing event, stamped with the current time when
    /// `timestamp` is absent.
    pub fn processing(timestamp: Option<String>) -> Self {
        Self::Processing(ProcessingEvent {
            timestamp: timestamp.unwrap_or_else(now_timestamp),
            message_id: None,
        })
    }

    /// Create an answer event, stamped with the current time when
    /// `timestamp` is absent.
    pub fn answer(
        answer: impl Into<String>,
        model: Option<String>,
        timestamp: Option<String>,
    ) -> Self {
        Self::Answer(AnswerEvent {
            answer: answer.into(),
            timestamp: timestamp.unwrap_or_else(now_timestamp),
            model,
            message_id: None,
        })
    }

    /// Set the message id.
    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        let id = Some(id.into());
        match &mut self {
            Self::Processing(e) => e.message_id = id,
            Self::Answer(e) => e.message_id = id,
        }
        self
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Processing(_) => EventKind::Processing,
            Self::Answer(_) => EventKind::Answer,
        }
    }

    pub fn message_id(&self) -> Option<&str> {
        match self {
            Self::Processing(e) => e.message_id.as_deref(),
            Self::Answer(e) => e.message_id.as_deref(),
        }
    }

    pub fn timestamp(&self) -> &str {
        match self {
            Self::Processing(e) => &e.timestamp,
            Self::Answer(e) => &e.timestamp,
        }
    }

    /// Short human-readable preview used in log lines.
    pub fn preview(&self) -> String {
        match self {
            Self::Processing(_) => "processing started".to_string(),
            Self::Answer(e) => e.answer.chars().take(50).collect(),
        }
    }
}

/// Current time as an RFC 3339 string.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339()
}

/// Generate a message id: unix millis plus a short random suffix.
///
/// Practically unique, not strictly ordered.
pub fn new_message_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().timestamp_millis(), &suffix[..9])
}
