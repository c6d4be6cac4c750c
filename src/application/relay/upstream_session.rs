//! Drives one exchange with the upstream backend.
//!
//! Lifecycle: establish a conversation (falling back to a placeholder id),
//! open the stream, pump frames through the [`EventNormalizer`] until a
//! terminal event or the watchdog, then close the connection. Every event is
//! forwarded to the caller's channel in upstream order and exactly one
//! terminal event is sent last.
//!
//! The watchdog deadline starts with conversation creation and bounds the
//! whole session, including time spent waiting on a slow consumer.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, timeout_at, Instant, Sleep};

use super::RelayError;
use crate::config::UpstreamConfig;
use crate::domain::foundation::{ConversationId, ValidationError};
use crate::domain::relay::{Citation, EventNormalizer, Mode, Session, SessionState, StreamEvent};
use crate::ports::{StreamRequest, UpstreamClient};

/// Message reported when the stream could not be opened.
const OPEN_FAILED_MESSAGE: &str = "Could not connect to the AI backend";

/// Time bounds applied to every session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimeouts {
    /// Bound on conversation creation and stream opening.
    pub connect: Duration,
    /// Overall bound on a session, from conversation creation to the
    /// terminal event.
    pub watchdog: Duration,
}

impl SessionTimeouts {
    pub fn new(connect: Duration, watchdog: Duration) -> Self {
        Self { connect, watchdog }
    }
}

impl From<&UpstreamConfig> for SessionTimeouts {
    fn from(config: &UpstreamConfig) -> Self {
        Self::new(config.connect_timeout(), config.watchdog())
    }
}

/// Successful end of a streaming phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub full_text: String,
    pub citations: Vec<Citation>,
    /// True when the watchdog ended the stream.
    pub timed_out: bool,
}

/// How the streaming loop ended.
enum Ending {
    Done,
    UpstreamError,
    ConnectionLost,
    TimedOut,
}

/// Result of forwarding one batch of normalized events.
enum Forwarded {
    Pending,
    Terminal(StreamEvent),
    ReceiverGone,
}

/// One session against the upstream backend.
pub struct UpstreamSession {
    client: Arc<dyn UpstreamClient>,
    timeouts: SessionTimeouts,
    session: Session,
    deadline: Option<Instant>,
}

impl UpstreamSession {
    pub fn new(client: Arc<dyn UpstreamClient>, timeouts: SessionTimeouts, mode: Mode) -> Self {
        Self {
            client,
            timeouts,
            session: Session::new(mode),
            deadline: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Creates the upstream conversation.
    ///
    /// A single attempt bounded by the connect timeout. On failure a
    /// placeholder id is used and the session continues. Starts the
    /// watchdog.
    pub async fn establish(&mut self) -> Result<ConversationId, RelayError> {
        let deadline = Instant::now() + self.timeouts.watchdog;
        self.deadline = Some(deadline);

        let bound = self.connect_bound(deadline);
        let conversation_id = match timeout_at(bound, self.client.establish()).await {
            Ok(Ok(id)) => id,
            Ok(Err(e)) => {
                tracing::warn!(
                    session_id = %self.session.id(),
                    error = %e,
                    "Conversation creation failed, continuing with placeholder id"
                );
                ConversationId::placeholder()
            }
            Err(_) => {
                tracing::warn!(
                    session_id = %self.session.id(),
                    timeout_ms = self.timeouts.connect.as_millis() as u64,
                    "Conversation creation timed out, continuing with placeholder id"
                );
                ConversationId::placeholder()
            }
        };

        self.session.establish(conversation_id.clone())?;
        tracing::debug!(
            session_id = %self.session.id(),
            conversation_id = %conversation_id,
            "Conversation established"
        );
        Ok(conversation_id)
    }

    /// Streams the answer to `message`, forwarding events to `events`.
    ///
    /// Must be called after [`establish`](Self::establish).
    pub async fn stream(
        &mut self,
        message: &str,
        events: &mpsc::Sender<StreamEvent>,
    ) -> Result<Completion, RelayError> {
        let conversation_id = self
            .session
            .conversation_id()
            .cloned()
            .ok_or_else(|| ValidationError::empty_field("conversation_id"))?;
        let request = StreamRequest::new(conversation_id, message, self.session.protocol_mode());
        let deadline = self
            .deadline
            .unwrap_or_else(|| Instant::now() + self.timeouts.watchdog);

        let bound = self.connect_bound(deadline);
        let mut connection = match timeout_at(bound, self.client.open_stream(request)).await {
            Ok(Ok(connection)) => connection,
            Ok(Err(e)) => {
                tracing::error!(session_id = %self.session.id(), error = %e, "Failed to open upstream stream");
                return self.fail_before_streaming(events).await;
            }
            Err(_) => {
                tracing::error!(session_id = %self.session.id(), "Timed out opening upstream stream");
                return self.fail_before_streaming(events).await;
            }
        };

        self.session.begin_streaming()?;

        let mut normalizer = EventNormalizer::new();
        let watchdog = sleep_until(deadline);
        tokio::pin!(watchdog);

        let (terminal, ending) = loop {
            let frame = tokio::select! {
                frame = connection.next_frame() => frame,
                _ = &mut watchdog => break self.watchdog_fired(&mut normalizer),
            };

            let (batch, lost) = match frame {
                Some(Ok(frame)) => (normalizer.ingest(frame.as_str()), false),
                Some(Err(e)) => {
                    tracing::warn!(session_id = %self.session.id(), error = %e, "Upstream stream failed");
                    (vec![normalizer.connection_lost()], true)
                }
                None => (vec![normalizer.connection_lost()], true),
            };

            // A consumer that stops draining must not hold off the watchdog.
            let forwarded = tokio::select! {
                biased;
                forwarded = forward(batch, events) => forwarded,
                _ = &mut watchdog => break self.watchdog_fired(&mut normalizer),
            };

            match forwarded {
                Forwarded::Pending => continue,
                Forwarded::Terminal(event) => {
                    let ending = match (&event, lost) {
                        (_, true) => Ending::ConnectionLost,
                        (StreamEvent::Completed { .. }, false) => Ending::Done,
                        _ => Ending::UpstreamError,
                    };
                    break (event, ending);
                }
                Forwarded::ReceiverGone => {
                    connection.close().await;
                    self.session.finish(SessionState::Failed)?;
                    tracing::info!(session_id = %self.session.id(), "Session cancelled by consumer");
                    return Err(RelayError::Cancelled);
                }
            }
        };

        connection.close().await;

        let state = match ending {
            Ending::Done => SessionState::Completed,
            Ending::TimedOut => SessionState::TimedOut,
            Ending::UpstreamError | Ending::ConnectionLost => SessionState::Failed,
        };
        self.session.finish(state)?;

        // Receiver may already be gone; the outcome is still returned.
        deliver_terminal(events, terminal.clone(), watchdog.as_mut()).await;

        match (terminal, ending) {
            (StreamEvent::Failed(message), Ending::ConnectionLost) => {
                Err(RelayError::Transport(message))
            }
            (StreamEvent::Failed(message), _) => Err(RelayError::Protocol(message)),
            (
                StreamEvent::Completed {
                    full_text,
                    citations,
                },
                ending,
            ) => Ok(Completion {
                full_text,
                citations,
                timed_out: matches!(ending, Ending::TimedOut),
            }),
            (event, _) => Err(RelayError::Transport(format!(
                "stream ended on a non-terminal event: {:?}",
                event
            ))),
        }
    }

    /// Connect attempts never run past the watchdog deadline.
    fn connect_bound(&self, deadline: Instant) -> Instant {
        (Instant::now() + self.timeouts.connect).min(deadline)
    }

    fn watchdog_fired(&self, normalizer: &mut EventNormalizer) -> (StreamEvent, Ending) {
        tracing::warn!(
            session_id = %self.session.id(),
            watchdog_ms = self.timeouts.watchdog.as_millis() as u64,
            partial_len = normalizer.partial_text().len(),
            terminal_undelivered = normalizer.is_finished(),
            "Watchdog fired before the upstream finished"
        );
        (normalizer.time_out(), Ending::TimedOut)
    }

    async fn fail_before_streaming(
        &mut self,
        events: &mpsc::Sender<StreamEvent>,
    ) -> Result<Completion, RelayError> {
        self.session.finish(SessionState::Failed)?;
        let _ = events
            .send(StreamEvent::Failed(OPEN_FAILED_MESSAGE.to_string()))
            .await;
        Err(RelayError::Transport(OPEN_FAILED_MESSAGE.to_string()))
    }
}

/// Sends non-terminal events and hands back the terminal one, if any.
async fn forward(batch: Vec<StreamEvent>, events: &mpsc::Sender<StreamEvent>) -> Forwarded {
    for event in batch {
        if event.is_terminal() {
            return Forwarded::Terminal(event);
        }
        if events.send(event).await.is_err() {
            return Forwarded::ReceiverGone;
        }
    }
    Forwarded::Pending
}

/// Sends the terminal event, waiting no longer than the watchdog. A consumer
/// that is not draining misses it and sees the channel close instead.
async fn deliver_terminal(
    events: &mpsc::Sender<StreamEvent>,
    terminal: StreamEvent,
    watchdog: Pin<&mut Sleep>,
) {
    if watchdog.is_elapsed() {
        let _ = events.try_send(terminal);
        return;
    }
    tokio::select! {
        biased;
        _ = events.send(terminal) => {}
        _ = watchdog => {}
    }
}
