//! WebSocket upstream client - production implementation of `UpstreamClient`.
//!
//! Conversation creation is a plain JSON POST; the answer is streamed back over
//! a WebSocket opened against the configured stream URL.
//!
//! # Handshake
//!
//! After the socket opens, exactly two control frames are sent:
//!
//! 1. an options frame announcing client capabilities
//! 2. a send frame carrying the conversation id, the prompt and the mode
//!
//! Every frame received afterwards is handed to the caller untouched; parsing
//! belongs to the event normalizer.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::USER_AGENT;
use tokio_tungstenite::tungstenite::http::HeaderValue as WsHeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::config::UpstreamConfig;
use crate::domain::foundation::ConversationId;
use crate::ports::{RawFrame, StreamRequest, UpstreamClient, UpstreamConnection, UpstreamError};

/// Capabilities announced in the options frame.
const CLIENT_CAPABILITIES: &[&str] = &["text", "citations"];

/// Longest error body kept from a failed upstream response, in characters.
const MAX_ERROR_BODY_CHARS: usize = 512;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upstream client speaking HTTP for conversation creation and WebSocket for
/// streaming.
pub struct WebSocketUpstreamClient {
    config: UpstreamConfig,
    http: Client,
}

impl WebSocketUpstreamClient {
    /// Creates a client from upstream configuration.
    pub fn new(config: UpstreamConfig) -> Result<Self, UpstreamError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .connect_timeout(config.connect_timeout())
            .timeout(config.connect_timeout())
            .build()
            .map_err(|e| UpstreamError::connection(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, http })
    }

    /// Builds the streaming URL for a conversation.
    fn stream_url(&self, conversation_id: &ConversationId) -> Result<Url, UpstreamError> {
        let mut url = Url::parse(&self.config.stream_url)
            .map_err(|e| UpstreamError::protocol(format!("Invalid stream URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("conversation_id", conversation_id.as_str());
        Ok(url)
    }

    fn map_http_error(&self, e: reqwest::Error) -> UpstreamError {
        if e.is_timeout() {
            UpstreamError::Timeout {
                timeout_secs: self.config.connect_timeout_secs,
            }
        } else if e.is_connect() {
            UpstreamError::connection(format!("Connection failed: {}", e))
        } else {
            UpstreamError::connection(e.to_string())
        }
    }

    async fn connect(&self, url: &Url) -> Result<WsStream, UpstreamError> {
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| UpstreamError::protocol(format!("Invalid stream request: {}", e)))?;
        let user_agent = WsHeaderValue::from_str(&self.config.user_agent)
            .map_err(|e| UpstreamError::protocol(format!("Invalid user agent: {}", e)))?;
        request.headers_mut().insert(USER_AGENT, user_agent);

        let (ws, _response) = timeout(self.config.connect_timeout(), connect_async(request))
            .await
            .map_err(|_| UpstreamError::Timeout {
                timeout_secs: self.config.connect_timeout_secs,
            })?
            .map_err(|e| UpstreamError::connection(format!("WebSocket handshake failed: {}", e)))?;

        Ok(ws)
    }
}

#[async_trait]
impl UpstreamClient for WebSocketUpstreamClient {
    async fn establish(&self) -> Result<ConversationId, UpstreamError> {
        let response = self
            .http
            .post(self.config.conversations_url())
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| self.map_http_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: truncate_body(body),
            });
        }

        let created: CreatedConversation = response
            .json()
            .await
            .map_err(|e| UpstreamError::protocol(format!("Failed to parse response: {}", e)))?;

        ConversationId::new(created.conversation_id)
            .map_err(|e| UpstreamError::protocol(e.to_string()))
    }

    async fn open_stream(
        &self,
        request: StreamRequest,
    ) -> Result<Box<dyn UpstreamConnection>, UpstreamError> {
        let url = self.stream_url(&request.conversation_id)?;
        let mut ws = self.connect(&url).await?;

        let frames = [
            options_frame(&self.config.user_agent),
            send_frame(&request),
        ];
        for frame in frames {
            let frame = frame.map_err(|e| UpstreamError::protocol(e.to_string()))?;
            if let Err(e) = ws.send(Message::Text(frame)).await {
                let _ = ws.close(None).await;
                return Err(UpstreamError::connection(format!(
                    "Failed to send control frame: {}",
                    e
                )));
            }
        }

        tracing::debug!(
            conversation_id = %request.conversation_id,
            mode = %request.mode,
            "Upstream stream opened"
        );

        Ok(Box::new(WebSocketConnection { ws, closed: false }))
    }

    fn model_label(&self) -> String {
        self.config.model_label.clone()
    }
}

/// Live upstream WebSocket.
struct WebSocketConnection {
    ws: WsStream,
    closed: bool,
}

#[async_trait]
impl UpstreamConnection for WebSocketConnection {
    async fn next_frame(&mut self) -> Option<Result<RawFrame, UpstreamError>> {
        if self.closed {
            return None;
        }

        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => return Some(Ok(RawFrame::from(text))),
                Some(Ok(Message::Binary(bytes))) => {
                    return Some(Ok(RawFrame::from(
                        String::from_utf8_lossy(&bytes).into_owned(),
                    )))
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(?frame, "Upstream closed the stream");
                    self.closed = true;
                    return None;
                }
                // Ping/pong are answered by tungstenite
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    self.closed = true;
                    return Some(Err(UpstreamError::connection(e.to_string())));
                }
                None => {
                    self.closed = true;
                    return None;
                }
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.ws.close(None).await {
            tracing::trace!(error = %e, "Upstream close handshake failed");
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Wire types
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct CreatedConversation {
    #[serde(alias = "id")]
    conversation_id: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ControlFrame<'a> {
    Options {
        capabilities: &'a [&'a str],
        client: &'a str,
    },
    Send {
        conversation_id: &'a str,
        message: &'a str,
        mode: &'a str,
    },
}

fn truncate_body(body: String) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body,
    }
}

fn options_frame(client: &str) -> Result<String, serde_json::Error> {
    serde_json::to_string(&ControlFrame::Options {
        capabilities: CLIENT_CAPABILITIES,
        client,
    })
}

fn send_frame(request: &StreamRequest) -> Result<String, serde_json::Error> {
    serde_json::to_string(&ControlFrame::Send {
        conversation_id: request.conversation_id.as_str(),
        message: &request.message,
        mode: &request.mode,
    })
}
