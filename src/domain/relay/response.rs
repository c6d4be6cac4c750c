//! Terminal artifact returned to the caller of a session.

use super::{Citation, Mode, Query};
use crate::domain::foundation::Timestamp;

/// Descriptive data attached to a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMetadata {
    /// Display label of the upstream model.
    pub model_label: String,
    pub mode: Mode,
    /// Time from query submission to completion.
    pub latency_ms: u64,
    /// Completion time.
    pub timestamp: Timestamp,
    pub citation_count: usize,
}

/// Completed answer to a query. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    prompt: String,
    response_text: String,
    citations: Vec<Citation>,
    metadata: ResponseMetadata,
}

impl Response {
    /// Builds the response for `query`, completed at `completed_at`.
    pub fn new(
        query: &Query,
        response_text: impl Into<String>,
        citations: Vec<Citation>,
        model_label: impl Into<String>,
        completed_at: Timestamp,
    ) -> Self {
        let metadata = ResponseMetadata {
            model_label: model_label.into(),
            mode: query.mode(),
            latency_ms: completed_at.millis_since(query.submitted_at()),
            timestamp: completed_at,
            citation_count: citations.len(),
        };
        Self {
            prompt: query.prompt().to_string(),
            response_text: response_text.into(),
            citations,
            metadata,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn response_text(&self) -> &str {
        &self.response_text
    }

    pub fn citations(&self) -> &[Citation] {
        &self.citations
    }

    pub fn metadata(&self) -> &ResponseMetadata {
        &self.metadata
    }
}
