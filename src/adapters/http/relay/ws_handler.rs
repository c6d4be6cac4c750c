//! WebSocket handler for the relay push channel.
//!
//! # Connection Flow
//! 1. Client upgrades `GET /api/ai`; server sends `connected`
//! 2. Client sends `query`; server cancels any in-flight session, sends
//!    `start`, then streams `stream` and `citation` messages
//! 3. Exactly one `done` or `error` ends each session
//! 4. On disconnect the active session is cancelled
//!
//! A single task owns the socket writer and selects over inbound client
//! messages and the active session's events.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};

use super::dto::ResponseView;
use super::handlers::{RelayAppState, PROMPT_REQUIRED};
use super::streaming::{PushClientMessage, PushServerMessage};
use crate::application::relay::ActiveSession;
use crate::domain::foundation::Timestamp;
use crate::domain::relay::StreamEvent;

const INVALID_MESSAGE: &str = "invalid message";

// ════════════════════════════════════════════════════════════════════════════════
// WebSocket Upgrade Handler
// ════════════════════════════════════════════════════════════════════════════════

/// Handle WebSocket upgrade for the push channel.
///
/// Route: `GET /api/ai`
pub async fn relay_ws_handler(ws: WebSocketUpgrade, State(state): State<RelayAppState>) -> Response {
    ws.on_upgrade(move |socket| handle_relay_socket(socket, state))
}

// ════════════════════════════════════════════════════════════════════════════════
// WebSocket Connection Handler
// ════════════════════════════════════════════════════════════════════════════════

async fn handle_relay_socket(socket: WebSocket, state: RelayAppState) {
    let (mut sender, mut receiver) = socket.split();
    tracing::info!("Push channel connected");

    if send_server_message(&mut sender, &PushServerMessage::Connected)
        .await
        .is_err()
    {
        return;
    }

    let mut active: Option<ActiveSession> = None;

    loop {
        tokio::select! {
            inbound = receiver.next() => {
                let keep_open = match inbound {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_text(&mut sender, &text, &state, &mut active).await
                    }
                    Some(Ok(Message::Ping(data))) => sender.send(Message::Pong(data)).await.is_ok(),
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!("Client closed push channel");
                        false
                    }
                    Some(Ok(_)) => true,
                    Some(Err(e)) => {
                        tracing::debug!("WebSocket error: {}", e);
                        false
                    }
                };
                if !keep_open {
                    break;
                }
            }
            event = next_session_event(&mut active) => {
                if forward_session_event(&mut sender, event, &mut active).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(session) = active.take() {
        tracing::debug!("Cancelling in-flight session on disconnect");
        session.cancel();
    }
    tracing::info!("Push channel closed");
}

// ════════════════════════════════════════════════════════════════════════════════
// Message Handling
// ════════════════════════════════════════════════════════════════════════════════

/// Handles one text message from the client. Returns false when the socket
/// can no longer be written.
async fn handle_client_text<S>(
    sender: &mut S,
    text: &str,
    state: &RelayAppState,
    active: &mut Option<ActiveSession>,
) -> bool
where
    S: SinkExt<Message> + Unpin,
{
    let message = match serde_json::from_str::<PushClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!("Failed to parse client message: {}", e);
            return send_server_message(sender, &PushServerMessage::error(INVALID_MESSAGE))
                .await
                .is_ok();
        }
    };

    match message {
        PushClientMessage::Ping => {
            let pong = PushServerMessage::Pong {
                timestamp: Timestamp::now().to_rfc3339(),
            };
            send_server_message(sender, &pong).await.is_ok()
        }
        PushClientMessage::Query(push) => {
            let query = match push.into_query(state.default_mode) {
                Ok(query) => query,
                Err(_) => {
                    return send_server_message(sender, &PushServerMessage::error(PROMPT_REQUIRED))
                        .await
                        .is_ok();
                }
            };

            if let Some(previous) = active.take() {
                tracing::debug!("Superseding in-flight session");
                previous.cancel();
            }

            let start = PushServerMessage::Start {
                prompt: query.prompt().to_string(),
                mode: query.mode(),
            };
            if send_server_message(sender, &start).await.is_err() {
                return false;
            }

            *active = Some(state.orchestrator.spawn(query));
            true
        }
    }
}

/// Next event of the active session; pending forever when there is none.
async fn next_session_event(active: &mut Option<ActiveSession>) -> Option<StreamEvent> {
    match active {
        Some(session) => session.next_event().await,
        None => std::future::pending().await,
    }
}

/// Relays one session event. Terminal events (or a vanished session) end
/// the session and produce `done` or `error`.
async fn forward_session_event<S>(
    sender: &mut S,
    event: Option<StreamEvent>,
    active: &mut Option<ActiveSession>,
) -> Result<(), S::Error>
where
    S: SinkExt<Message> + Unpin,
{
    let message = match event {
        Some(StreamEvent::TextDelta(delta)) => PushServerMessage::Stream { delta },
        Some(StreamEvent::Citation(citation)) => PushServerMessage::Citation(citation),
        Some(StreamEvent::Completed { .. }) | Some(StreamEvent::Failed(_)) | None => {
            let Some(session) = active.take() else {
                return Ok(());
            };
            match session.finish().await {
                Ok(response) => PushServerMessage::Done(ResponseView::from(&response)),
                Err(e) => PushServerMessage::error(e.to_string()),
            }
        }
    };
    send_server_message(sender, &message).await
}

/// Send a server message over the WebSocket.
async fn send_server_message<S>(sender: &mut S, msg: &PushServerMessage) -> Result<(), S::Error>
where
    S: SinkExt<Message> + Unpin,
{
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json)).await,
        Err(e) => {
            tracing::error!("Failed to serialize server message: {}", e);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::upstream::{MockStream, MockUpstreamClient};
    use crate::application::relay::{SessionOrchestrator, SessionTimeouts};
    use crate::domain::relay::Mode;
    use futures::channel::mpsc as sink_channel;
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;

    fn state_with(client: &MockUpstreamClient) -> RelayAppState {
        let orchestrator = SessionOrchestrator::new(
            Arc::new(client.clone()),
            SessionTimeouts::new(Duration::from_millis(200), Duration::from_secs(2)),
        );
        RelayAppState::new(Arc::new(orchestrator), Mode::Auto)
    }

    fn drain_json(rx: &mut sink_channel::UnboundedReceiver<Message>) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(Some(Message::Text(text))) = rx.try_next() {
            out.push(serde_json::from_str(&text).unwrap());
        }
        out
    }

    #[tokio::test]
    async fn ping_gets_pong() {
        let client = MockUpstreamClient::new();
        let (mut tx, mut rx) = sink_channel::unbounded::<Message>();
        let mut active = None;

        let open =
            handle_client_text(&mut tx, r#"{"type":"ping"}"#, &state_with(&client), &mut active)
                .await;

        assert!(open);
        let sent = drain_json(&mut rx);
        assert_eq!(sent[0]["type"], "pong");
        assert!(sent[0]["timestamp"].is_string());
    }

    #[tokio::test]
    async fn invalid_json_reports_error_and_keeps_channel_open() {
        let client = MockUpstreamClient::new();
        let (mut tx, mut rx) = sink_channel::unbounded::<Message>();
        let mut active = None;

        let open = handle_client_text(&mut tx, "{nope", &state_with(&client), &mut active).await;

        assert!(open);
        assert_eq!(drain_json(&mut rx)[0]["type"], "error");
        assert!(active.is_none());
    }

    #[tokio::test]
    async fn missing_prompt_reports_error_without_session() {
        let client = MockUpstreamClient::new();
        let (mut tx, mut rx) = sink_channel::unbounded::<Message>();
        let mut active = None;

        handle_client_text(&mut tx, r#"{"type":"query"}"#, &state_with(&client), &mut active)
            .await;

        let sent = drain_json(&mut rx);
        assert_eq!(sent[0]["type"], "error");
        assert_eq!(sent[0]["message"], PROMPT_REQUIRED);
        assert!(active.is_none());
        assert_eq!(client.total_calls(), 0);
    }

    #[tokio::test]
    async fn query_sends_start_and_streams_to_done() {
        let client = MockUpstreamClient::new()
            .with_stream(MockStream::new().text("Hal").text("o!").done());
        let state = state_with(&client);
        let (mut tx, mut rx) = sink_channel::unbounded::<Message>();
        let mut active = None;

        handle_client_text(
            &mut tx,
            r#"{"type":"query","prompt":"Halo AI"}"#,
            &state,
            &mut active,
        )
        .await;
        while active.is_some() {
            let event = next_session_event(&mut active).await;
            forward_session_event(&mut tx, event, &mut active).await.unwrap();
        }

        let sent = drain_json(&mut rx);
        let types: Vec<&str> = sent.iter().map(|m| m["type"].as_str().unwrap()).collect();
        assert_eq!(types, vec!["start", "stream", "stream", "done"]);
        assert_eq!(sent[0]["prompt"], "Halo AI");
        assert_eq!(sent[0]["mode"], "auto");
        assert_eq!(sent[3]["response"], "Halo!");
    }

    #[tokio::test]
    async fn failed_session_sends_error() {
        let client = MockUpstreamClient::new().with_stream(MockStream::new().error("nope"));
        let state = state_with(&client);
        let (mut tx, mut rx) = sink_channel::unbounded::<Message>();
        let mut active = None;

        handle_client_text(&mut tx, r#"{"type":"query","prompt":"hi"}"#, &state, &mut active)
            .await;
        while active.is_some() {
            let event = next_session_event(&mut active).await;
            forward_session_event(&mut tx, event, &mut active).await.unwrap();
        }

        let sent = drain_json(&mut rx);
        let last = sent.last().unwrap();
        assert_eq!(last["type"], "error");
        assert_eq!(last["message"], "nope");
    }
}
