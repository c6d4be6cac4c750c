//! WebSocket message types for the relay push channel.
//!
//! - Client → Server: Query, Ping
//! - Server → Client: Connected, Start, Stream, Citation, Done, Error, Pong

use serde::{Deserialize, Serialize};

use super::dto::ResponseView;
use crate::domain::foundation::{Timestamp, ValidationError};
use crate::domain::relay::{Citation, Mode, Query};

// ════════════════════════════════════════════════════════════════════════════════
// Client → Server Messages
// ════════════════════════════════════════════════════════════════════════════════

/// All message types that can be received from the client.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushClientMessage {
    /// Start a new session, superseding any in-flight one.
    Query(PushQuery),
    /// Heartbeat ping.
    Ping,
}

/// Query sent over the push channel.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushQuery {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Client submission time, epoch milliseconds.
    #[serde(default)]
    pub timestamp: Option<f64>,
}

impl PushQuery {
    /// Validates the query and resolves its mode.
    pub fn into_query(self, default_mode: Mode) -> Result<Query, ValidationError> {
        let mode = Mode::resolve(self.model.as_deref(), default_mode);
        let query = Query::new(self.prompt.unwrap_or_default(), mode)?;
        let submitted_at = self
            .timestamp
            .filter(|ms| ms.is_finite())
            .and_then(|ms| Timestamp::from_unix_millis(ms as i64))
            // Clock skew can put the client ahead of us.
            .filter(|submitted| submitted <= &Timestamp::now());
        Ok(match submitted_at {
            Some(submitted_at) => query.with_submitted_at(submitted_at),
            None => query,
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Server → Client Messages
// ════════════════════════════════════════════════════════════════════════════════

/// All message types that can be sent to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushServerMessage {
    /// Channel is ready.
    Connected,
    /// A session has started for this prompt.
    Start { prompt: String, mode: Mode },
    /// Incremental response text.
    Stream { delta: String },
    /// A source, forwarded as soon as it arrives.
    Citation(Citation),
    /// Session completed.
    Done(ResponseView),
    /// Session failed, or the client sent something invalid.
    Error { message: String },
    /// Heartbeat response.
    Pong { timestamp: String },
}

impl PushServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_query_with_all_fields() {
        let msg: PushClientMessage = serde_json::from_str(
            r#"{"type":"query","prompt":"hi","model":"concise","timestamp":1700000000000}"#,
        )
        .unwrap();
        match msg {
            PushClientMessage::Query(q) => {
                assert_eq!(q.prompt.as_deref(), Some("hi"));
                assert_eq!(q.model.as_deref(), Some("concise"));
                assert_eq!(q.timestamp, Some(1_700_000_000_000.0));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn parses_ping() {
        let msg: PushClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(msg, PushClientMessage::Ping));
    }

    #[test]
    fn rejects_unknown_type() {
        assert!(serde_json::from_str::<PushClientMessage>(r#"{"type":"cancel"}"#).is_err());
    }

    #[test]
    fn into_query_requires_prompt() {
        assert!(PushQuery::default().into_query(Mode::Auto).is_err());
        let blank = PushQuery {
            prompt: Some("   ".to_string()),
            ..PushQuery::default()
        };
        assert!(blank.into_query(Mode::Auto).is_err());
    }

    #[test]
    fn into_query_resolves_mode_and_timestamp() {
        let push = PushQuery {
            prompt: Some("hi".to_string()),
            model: Some("research".to_string()),
            timestamp: Some(1_700_000_000_000.0),
        };
        let query = push.into_query(Mode::Auto).unwrap();
        assert_eq!(query.mode(), Mode::Research);
        assert_eq!(
            query.submitted_at(),
            &Timestamp::from_unix_millis(1_700_000_000_000).unwrap()
        );
    }

    #[test]
    fn into_query_ignores_future_timestamp() {
        let future = (chrono::Utc::now().timestamp_millis() + 60_000) as f64;
        let push = PushQuery {
            prompt: Some("hi".to_string()),
            model: Some("nonsense".to_string()),
            timestamp: Some(future),
        };
        let query = push.into_query(Mode::Concise).unwrap();
        assert_eq!(query.mode(), Mode::Concise);
        assert!(query.submitted_at() <= &Timestamp::now());
    }

    #[test]
    fn server_messages_serialize_with_type_tag() {
        assert_eq!(
            serde_json::to_value(PushServerMessage::Connected).unwrap(),
            json!({ "type": "connected" })
        );
        assert_eq!(
            serde_json::to_value(PushServerMessage::Start {
                prompt: "hi".to_string(),
                mode: Mode::Auto
            })
            .unwrap(),
            json!({ "type": "start", "prompt": "hi", "mode": "auto" })
        );
        assert_eq!(
            serde_json::to_value(PushServerMessage::Citation(Citation::new("X", "http://x")))
                .unwrap(),
            json!({ "type": "citation", "title": "X", "url": "http://x" })
        );
        assert_eq!(
            serde_json::to_value(PushServerMessage::error("boom")).unwrap(),
            json!({ "type": "error", "message": "boom" })
        );
    }
}
