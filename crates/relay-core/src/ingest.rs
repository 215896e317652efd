//! Producer payload normalization.

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, RelayResult};
use crate::event::Event;

/// Loosely-typed body posted by the producer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    #[serde(default, alias = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

impl WebhookPayload {
    /// Parse a raw request body.
    pub fn from_slice(body: &[u8]) -> RelayResult<Self> {
        Ok(serde_json::from_slice(body)?)
    }

    pub fn is_processing(&self) -> bool {
        self.kind.as_deref() == Some("processing")
    }

    /// Turn the payload into an event ready for emission.
    ///
    /// Anything that is not a processing notice is treated as an answer and
    /// must carry non-empty answer text.
    pub fn into_event(self) -> RelayResult<Event> {
        let event = if self.is_processing() {
            Event::processing(self.timestamp)
        } else {
            let answer = self
                .answer
                .filter(|a| !a.is_empty())
                .ok_or_else(|| RelayError::validation("Missing required field: answer"))?;
            Event::answer(answer, self.model, self.timestamp)
        };

        Ok(match self.message_id {
            Some(id) if !id.is_empty() => event.with_message_id(id),
            _ => event,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    fn parse(json: &str) -> RelayResult<Event> {
        WebhookPayload::from_slice(json.as_bytes())?.into_event()
    }

    #[test]
    fn test_default_kind_is_answer() {
        let event = parse(r#"{"answer":"B=2","model":"gpt"}"#).unwrap();
        let Event::Answer(answer) = event else {
            panic!("expected answer event");
        };
        assert_eq!(answer.answer, "B=2");
        assert_eq!(answer.model.as_deref(), Some("gpt"));
        assert!(answer.message_id.is_none());
    }

    #[test]
    fn test_processing_needs_no_answer() {
        let event = parse(r#"{"kind":"processing","timestamp":"t0"}"#).unwrap();
        assert_eq!(event.kind(), EventKind::Processing);
        assert_eq!(event.timestamp(), "t0");
    }

    #[test]
    fn test_type_alias_accepted() {
        let event = parse(r#"{"type":"processing"}"#).unwrap();
        assert_eq!(event.kind(), EventKind::Processing);
    }

    #[test]
    fn test_missing_answer_rejected() {
        let err = parse(r#"{}"#).unwrap_err();
        assert!(matches!(err, RelayError::Validation(_)));
        assert_eq!(err.to_string(), "Validation error: Missing required field: answer");
    }

    #[test]
    fn test_empty_answer_rejected_whitespace_kept() {
        assert!(matches!(
            parse(r#"{"kind":"answer","answer":""}"#),
            Err(RelayError::Validation(_))
        ));
        let event = parse(r#"{"answer":"   "}"#).unwrap();
        let Event::Answer(answer) = event else {
            panic!("expected answer event");
        };
        assert_eq!(answer.answer, "   ");
    }

    #[test]
    fn test_unknown_kind_treated_as_answer() {
        assert!(matches!(
            parse(r#"{"kind":"other"}"#),
            Err(RelayError::Validation(_))
        ));
        let event = parse(r#"{"kind":"other","answer":"x"}"#).unwrap();
        assert_eq!(event.kind(), EventKind::Answer);
    }

    #[test]
    fn test_producer_message_id_kept() {
        let event = parse(r#"{"answer":"x","messageId":"abc"}"#).unwrap();
        assert_eq!(event.message_id(), Some("abc"));
    }

    #[test]
    fn test_malformed_body() {
        assert!(matches!(
            parse("not json"),
            Err(RelayError::MalformedPayload(_))
        ));
    }
}
