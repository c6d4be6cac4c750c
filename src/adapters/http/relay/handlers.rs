//! HTTP handlers for the blocking relay endpoint.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use super::dto::{AskRequest, AskResponse, ErrorResponse};
use crate::application::relay::{RelayError, SessionOrchestrator};
use crate::domain::relay::{Mode, Query};

/// Error message for a query without a usable prompt.
pub const PROMPT_REQUIRED: &str = "prompt required";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for the relay endpoints.
#[derive(Clone)]
pub struct RelayAppState {
    pub orchestrator: Arc<SessionOrchestrator>,
    /// Mode used when a query names none or an unknown one.
    pub default_mode: Mode,
}

impl RelayAppState {
    pub fn new(orchestrator: Arc<SessionOrchestrator>, default_mode: Mode) -> Self {
        Self {
            orchestrator,
            default_mode,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/ai - Run a query and return the complete response.
pub async fn ask(
    State(state): State<RelayAppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<impl IntoResponse, RelayApiError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Rejected relay request body");
        RelayApiError::BadRequest(PROMPT_REQUIRED.to_string())
    })?;

    let mode = Mode::resolve(request.model.as_deref(), state.default_mode);
    let query = Query::new(request.prompt.unwrap_or_default(), mode)
        .map_err(|_| RelayApiError::BadRequest(PROMPT_REQUIRED.to_string()))?;

    let response = state.orchestrator.ask(query).await?;

    Ok((StatusCode::OK, Json(AskResponse::from(&response))))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type for relay endpoints.
#[derive(Debug)]
pub enum RelayApiError {
    BadRequest(String),
    /// Session failed; the message is passed through to the client.
    Upstream(String),
    Internal(String),
}

impl From<RelayError> for RelayApiError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::Protocol(msg) | RelayError::Transport(msg) => RelayApiError::Upstream(msg),
            other => RelayApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for RelayApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            RelayApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse::new(msg)),
            RelayApiError::Upstream(msg) => {
                tracing::warn!("Relay session failed: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::new(msg))
            }
            RelayApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::new(msg))
            }
        };

        (status, Json(error)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::http::relay::relay_router;
    use crate::adapters::upstream::{MockStream, MockUpstreamClient};
    use crate::application::relay::SessionTimeouts;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    fn state_with(client: &MockUpstreamClient) -> RelayAppState {
        let orchestrator = SessionOrchestrator::new(
            Arc::new(client.clone()),
            SessionTimeouts::new(Duration::from_millis(200), Duration::from_secs(2)),
        );
        RelayAppState::new(Arc::new(orchestrator), Mode::Auto)
    }

    async fn post_json(state: RelayAppState, body: &str) -> (StatusCode, Value) {
        let response = relay_router()
            .with_state(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/ai")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn missing_prompt_is_rejected_without_upstream_call() {
        let client = MockUpstreamClient::new();

        let (status, body) = post_json(state_with(&client), "{}").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "prompt required" }));
        assert_eq!(client.total_calls(), 0);
    }

    #[tokio::test]
    async fn blank_prompt_is_rejected() {
        let client = MockUpstreamClient::new();

        let (status, _) = post_json(state_with(&client), r#"{"prompt":"  "}"#).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(client.total_calls(), 0);
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let client = MockUpstreamClient::new();

        let (status, body) = post_json(state_with(&client), "not json").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], PROMPT_REQUIRED);
        assert_eq!(client.total_calls(), 0);
    }

    #[tokio::test]
    async fn successful_query_returns_full_response() {
        let client = MockUpstreamClient::new().with_model_label("Test AI").with_stream(
            MockStream::new()
                .text("Hal")
                .text("o!")
                .citation("X", "http://x")
                .done(),
        );

        let (status, body) =
            post_json(state_with(&client), r#"{"prompt":"Halo AI","model":"concise"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["prompt"], "Halo AI");
        assert_eq!(body["response"], "Halo!");
        assert_eq!(body["citations"], json!([{ "title": "X", "url": "http://x" }]));
        assert_eq!(body["metadata"]["model"], "Test AI");
        assert_eq!(body["metadata"]["mode"], "concise");
        assert_eq!(body["metadata"]["citations_count"], 1);
        assert_eq!(client.stream_requests()[0].mode, "concise");
    }

    #[tokio::test]
    async fn upstream_error_returns_500_with_message() {
        let client = MockUpstreamClient::new()
            .with_stream(MockStream::new().error("quota exceeded"));

        let (status, body) = post_json(state_with(&client), r#"{"prompt":"hi"}"#).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "quota exceeded" }));
    }

    #[test]
    fn relay_errors_map_to_api_errors() {
        assert!(matches!(
            RelayApiError::from(RelayError::Transport("lost".to_string())),
            RelayApiError::Upstream(msg) if msg == "lost"
        ));
        assert!(matches!(
            RelayApiError::from(RelayError::Cancelled),
            RelayApiError::Internal(_)
        ));
    }
}
