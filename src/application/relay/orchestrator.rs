//! Session orchestrator - the entry point transports use to run a query.
//!
//! Three flavours over the same session logic:
//!
//! - [`run`](SessionOrchestrator::run) forwards events to a caller channel
//! - [`ask`](SessionOrchestrator::ask) drains events and returns the response
//! - [`spawn`](SessionOrchestrator::spawn) runs on its own task and can be
//!   cancelled, for the push channel

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::{RelayError, SessionTimeouts, UpstreamSession};
use crate::domain::foundation::Timestamp;
use crate::domain::relay::{Query, Response, StreamEvent};
use crate::ports::UpstreamClient;

/// Capacity of a session's event channel.
pub const EVENT_BUFFER: usize = 64;

/// Runs relay sessions against one upstream client.
pub struct SessionOrchestrator {
    client: Arc<dyn UpstreamClient>,
    timeouts: SessionTimeouts,
}

impl SessionOrchestrator {
    pub fn new(client: Arc<dyn UpstreamClient>, timeouts: SessionTimeouts) -> Self {
        Self { client, timeouts }
    }

    /// Drives one session, forwarding every event (terminal included) to
    /// `events` in upstream order.
    pub async fn run(
        &self,
        query: Query,
        events: mpsc::Sender<StreamEvent>,
    ) -> Result<Response, RelayError> {
        let mut upstream = UpstreamSession::new(Arc::clone(&self.client), self.timeouts, query.mode());
        let span = tracing::info_span!(
            "relay_session",
            session_id = %upstream.session().id(),
            mode = %query.mode(),
        );

        async move {
            tracing::info!(prompt_len = query.prompt().len(), "Session started");

            let conversation_id = upstream.establish().await?;
            let result = upstream.stream(query.prompt(), &events).await;

            let completion = match result {
                Ok(completion) => completion,
                Err(e) => {
                    tracing::warn!(
                        conversation_id = %conversation_id,
                        state = ?upstream.session().state(),
                        error = %e,
                        "Session ended without a response"
                    );
                    return Err(e);
                }
            };

            let response = Response::new(
                &query,
                completion.full_text,
                completion.citations,
                self.client.model_label(),
                Timestamp::now(),
            );
            tracing::info!(
                conversation_id = %conversation_id,
                latency_ms = response.metadata().latency_ms,
                citations = response.metadata().citation_count,
                timed_out = completion.timed_out,
                degraded = upstream.session().is_degraded(),
                "Session completed"
            );
            Ok(response)
        }
        .instrument(span)
        .await
    }

    /// Runs a session to completion and returns its response.
    pub async fn ask(&self, query: Query) -> Result<Response, RelayError> {
        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
        let drain = async move { while rx.recv().await.is_some() {} };
        let (result, ()) = tokio::join!(self.run(query, tx), drain);
        result
    }

    /// Runs a session on its own task.
    pub fn spawn(self: &Arc<Self>, query: Query) -> ActiveSession {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let orchestrator = Arc::clone(self);
        let handle = tokio::spawn(async move { orchestrator.run(query, tx).await });
        ActiveSession { events: rx, handle }
    }
}

/// Handle to a session running on its own task.
pub struct ActiveSession {
    events: mpsc::Receiver<StreamEvent>,
    handle: JoinHandle<Result<Response, RelayError>>,
}

impl ActiveSession {
    /// Next event, or `None` once the session task has gone.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Aborts the session. Its connection is dropped with the task and
    /// no further events can be received.
    pub fn cancel(self) {
        self.handle.abort();
    }

    /// Waits for the session's outcome.
    pub async fn finish(self) -> Result<Response, RelayError> {
        drop(self.events);
        match self.handle.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(RelayError::Cancelled),
            Err(e) => {
                tracing::error!(error = %e, "Session task failed");
                Err(RelayError::Transport(e.to_string()))
            }
        }
    }
}
