//! Data transfer objects for the relay HTTP endpoint.

use serde::{Deserialize, Serialize};

use crate::domain::relay::{Citation, Mode, Response};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Body of `POST /api/ai`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    /// Requested mode name. Unknown names fall back to the default mode.
    #[serde(default)]
    pub model: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Response metadata as exposed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataView {
    pub model: String,
    pub mode: Mode,
    pub latency_ms: u64,
    /// RFC 3339 completion time.
    pub timestamp: String,
    pub citations_count: usize,
}

/// A completed response as exposed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseView {
    pub prompt: String,
    pub response: String,
    pub citations: Vec<Citation>,
    pub metadata: MetadataView,
}

impl From<&Response> for ResponseView {
    fn from(response: &Response) -> Self {
        let metadata = response.metadata();
        Self {
            prompt: response.prompt().to_string(),
            response: response.response_text().to_string(),
            citations: response.citations().to_vec(),
            metadata: MetadataView {
                model: metadata.model_label.clone(),
                mode: metadata.mode,
                latency_ms: metadata.latency_ms,
                timestamp: metadata.timestamp.to_rfc3339(),
                citations_count: metadata.citation_count,
            },
        }
    }
}

/// Success body of `POST /api/ai`.
#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub success: bool,
    #[serde(flatten)]
    pub response: ResponseView,
}

impl From<&Response> for AskResponse {
    fn from(response: &Response) -> Self {
        Self {
            success: true,
            response: ResponseView::from(response),
        }
    }
}

/// Error body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
