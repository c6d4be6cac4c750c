//! Normalized events produced from the upstream stream.

use serde::{Deserialize, Serialize};

/// A source reference attached to a response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub url: String,
}

impl Citation {
    /// Creates a new citation.
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

/// Closed set of events a session can produce.
///
/// Exactly one terminal event (`Completed` or `Failed`) ends every session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental response text.
    TextDelta(String),
    /// A citation record, in upstream order.
    Citation(Citation),
    /// The response finished; carries everything accumulated.
    Completed {
        full_text: String,
        citations: Vec<Citation>,
    },
    /// The session failed; carries a caller-facing message.
    Failed(String),
}

impl StreamEvent {
    /// Returns true for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Completed { .. } | StreamEvent::Failed(_))
    }
}
