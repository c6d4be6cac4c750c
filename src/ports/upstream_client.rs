//! Upstream Client Port - Interface for the conversational AI backend.
//!
//! The relay talks to its backend in two steps:
//!
//! 1. [`UpstreamClient::establish`] creates a remote conversation and returns
//!    its identifier.
//! 2. [`UpstreamClient::open_stream`] opens a streaming connection, sends the
//!    options frame followed by the send frame, and hands back an
//!    [`UpstreamConnection`] from which raw frames are pulled one at a time.
//!
//! Frames are not interpreted here; see
//! [`EventNormalizer`](crate::domain::relay::EventNormalizer).

use async_trait::async_trait;

use crate::domain::foundation::ConversationId;

/// Port for the upstream conversational AI backend.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Creates a remote conversation. Single attempt, no retries.
    async fn establish(&self) -> Result<ConversationId, UpstreamError>;

    /// Opens one streaming connection for `request`.
    ///
    /// The returned connection has already sent its two control frames.
    async fn open_stream(
        &self,
        request: StreamRequest,
    ) -> Result<Box<dyn UpstreamConnection>, UpstreamError>;

    /// Display label of the upstream model.
    fn model_label(&self) -> String;
}

/// An open streaming connection.
///
/// Dropping the connection must release the underlying socket, so that
/// aborting the owning task tears it down.
#[async_trait]
pub trait UpstreamConnection: Send {
    /// Waits for the next raw frame.
    ///
    /// Returns `None` once the upstream closed the connection.
    async fn next_frame(&mut self) -> Option<Result<RawFrame, UpstreamError>>;

    /// Closes the connection. Safe to call more than once.
    async fn close(&mut self);
}

/// Parameters of the send frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub conversation_id: ConversationId,
    pub message: String,
    /// Protocol-level mode string.
    pub mode: String,
}

impl StreamRequest {
    pub fn new(
        conversation_id: ConversationId,
        message: impl Into<String>,
        mode: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id,
            message: message.into(),
            mode: mode.into(),
        }
    }
}

/// One frame as received from the upstream connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame(String);

impl RawFrame {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RawFrame {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for RawFrame {
    fn from(text: String) -> Self {
        Self(text)
    }
}

/// Upstream client errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    /// Could not reach the upstream or the connection broke.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Upstream answered with a non-success HTTP status.
    #[error("upstream returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// Upstream answered with something we could not interpret.
    #[error("unexpected upstream response: {0}")]
    Protocol(String),

    /// Operation exceeded its time bound.
    #[error("timed out after {timeout_secs}s")]
    Timeout {
        /// Configured bound.
        timeout_secs: u64,
    },
}

impl UpstreamError {
    /// Creates a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}
