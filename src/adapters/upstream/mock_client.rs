//! Mock upstream client for testing.
//!
//! Provides a scripted implementation of the [`UpstreamClient`] port so the
//! orchestrator and transports can be exercised without a real backend.
//!
//! # Features
//!
//! - Scripted frame sequences (consumed one per `open_stream` call)
//! - Simulated delays, hangs and mid-stream disconnects
//! - Failure injection for conversation creation and stream opening
//! - Call and connection-close tracking for verification
//!
//! # Example
//!
//! ```ignore
//! let client = MockUpstreamClient::new().with_stream(
//!     MockStream::new()
//!         .text("Hal")
//!         .text("o!")
//!         .citation("X", "http://x")
//!         .done(),
//! );
//! ```

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::domain::foundation::ConversationId;
use crate::ports::{RawFrame, StreamRequest, UpstreamClient, UpstreamConnection, UpstreamError};

/// One scripted step of a mock stream.
#[derive(Debug, Clone)]
enum MockStep {
    Frame(String),
    Delay(Duration),
    Error(UpstreamError),
    Hang,
}

/// Scripted frame sequence returned by one `open_stream` call.
///
/// When the script runs out the connection reports a close.
#[derive(Debug, Clone, Default)]
pub struct MockStream {
    steps: Vec<MockStep>,
}

impl MockStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends a raw frame verbatim.
    pub fn raw(mut self, frame: impl Into<String>) -> Self {
        self.steps.push(MockStep::Frame(frame.into()));
        self
    }

    /// Sends a text delta record.
    pub fn text(self, text: &str) -> Self {
        self.record(json!({ "type": "text", "text": text }))
    }

    /// Sends a citation record.
    pub fn citation(self, title: &str, url: &str) -> Self {
        self.record(json!({ "type": "citation", "title": title, "url": url }))
    }

    /// Sends the completion record followed by the end-of-stream sentinel.
    pub fn done(self) -> Self {
        self.record(json!({ "type": "done" })).raw("data: [DONE]\n")
    }

    /// Sends an error record.
    pub fn error(self, message: &str) -> Self {
        self.record(json!({ "type": "error", "message": message }))
    }

    /// Pauses before the next step.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.steps.push(MockStep::Delay(delay));
        self
    }

    /// Fails the connection with a transport error.
    pub fn disconnect_with(mut self, error: UpstreamError) -> Self {
        self.steps.push(MockStep::Error(error));
        self
    }

    /// Never produces another frame.
    pub fn hang(mut self) -> Self {
        self.steps.push(MockStep::Hang);
        self
    }

    fn record(self, payload: serde_json::Value) -> Self {
        self.raw(format!("data: {}\n", payload))
    }
}

#[derive(Debug, Clone)]
enum MockOpen {
    Stream(MockStream),
    Error(UpstreamError),
}

/// Mock upstream client for testing.
#[derive(Debug, Clone)]
pub struct MockUpstreamClient {
    establish_results: Arc<Mutex<VecDeque<Result<ConversationId, UpstreamError>>>>,
    establish_delay: Duration,
    opens: Arc<Mutex<VecDeque<MockOpen>>>,
    establish_calls: Arc<AtomicUsize>,
    stream_requests: Arc<Mutex<Vec<StreamRequest>>>,
    closed_connections: Arc<AtomicUsize>,
    model_label: String,
}

impl Default for MockUpstreamClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockUpstreamClient {
    /// Creates a mock whose conversations always establish and whose
    /// unscripted streams complete immediately with no text.
    pub fn new() -> Self {
        Self {
            establish_results: Arc::new(Mutex::new(VecDeque::new())),
            establish_delay: Duration::ZERO,
            opens: Arc::new(Mutex::new(VecDeque::new())),
            establish_calls: Arc::new(AtomicUsize::new(0)),
            stream_requests: Arc::new(Mutex::new(Vec::new())),
            closed_connections: Arc::new(AtomicUsize::new(0)),
            model_label: "Mock AI".to_string(),
        }
    }

    /// Queues a scripted stream for the next `open_stream` call.
    pub fn with_stream(self, stream: MockStream) -> Self {
        self.opens.lock().unwrap().push_back(MockOpen::Stream(stream));
        self
    }

    /// Makes the next `open_stream` call fail.
    pub fn with_open_error(self, error: UpstreamError) -> Self {
        self.opens.lock().unwrap().push_back(MockOpen::Error(error));
        self
    }

    /// Makes the next `establish` call fail.
    pub fn with_establish_error(self, error: UpstreamError) -> Self {
        self.establish_results.lock().unwrap().push_back(Err(error));
        self
    }

    /// Makes every `establish` call take at least `delay`.
    pub fn with_establish_delay(mut self, delay: Duration) -> Self {
        self.establish_delay = delay;
        self
    }

    /// Sets the model label reported in metadata.
    pub fn with_model_label(mut self, label: impl Into<String>) -> Self {
        self.model_label = label.into();
        self
    }

    /// Number of `establish` calls made.
    pub fn establish_calls(&self) -> usize {
        self.establish_calls.load(Ordering::SeqCst)
    }

    /// Number of `open_stream` calls made.
    pub fn stream_calls(&self) -> usize {
        self.stream_requests.lock().unwrap().len()
    }

    /// Total upstream calls of any kind.
    pub fn total_calls(&self) -> usize {
        self.establish_calls() + self.stream_calls()
    }

    /// Requests passed to `open_stream`, in call order.
    pub fn stream_requests(&self) -> Vec<StreamRequest> {
        self.stream_requests.lock().unwrap().clone()
    }

    /// Connections released so far, by explicit close or by drop.
    pub fn closed_connections(&self) -> usize {
        self.closed_connections.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamClient for MockUpstreamClient {
    async fn establish(&self) -> Result<ConversationId, UpstreamError> {
        let n = self.establish_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.establish_delay.is_zero() {
            sleep(self.establish_delay).await;
        }

        let queued = self.establish_results.lock().unwrap().pop_front();
        match queued {
            Some(result) => result,
            None => ConversationId::new(format!("mock-conv-{}", n))
                .map_err(|e| UpstreamError::protocol(e.to_string())),
        }
    }

    async fn open_stream(
        &self,
        request: StreamRequest,
    ) -> Result<Box<dyn UpstreamConnection>, UpstreamError> {
        self.stream_requests.lock().unwrap().push(request);

        let next = self.opens.lock().unwrap().pop_front();
        let stream = match next {
            Some(MockOpen::Stream(stream)) => stream,
            Some(MockOpen::Error(error)) => return Err(error),
            None => MockStream::new().done(),
        };

        Ok(Box::new(MockConnection {
            steps: stream.steps.into(),
            released: false,
            closed_connections: Arc::clone(&self.closed_connections),
        }))
    }

    fn model_label(&self) -> String {
        self.model_label.clone()
    }
}

struct MockConnection {
    steps: VecDeque<MockStep>,
    released: bool,
    closed_connections: Arc<AtomicUsize>,
}

impl MockConnection {
    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.closed_connections.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl UpstreamConnection for MockConnection {
    async fn next_frame(&mut self) -> Option<Result<RawFrame, UpstreamError>> {
        if self.released {
            return None;
        }
        loop {
            match self.steps.pop_front()? {
                MockStep::Frame(frame) => return Some(Ok(RawFrame::new(frame))),
                MockStep::Delay(delay) => sleep(delay).await,
                MockStep::Error(error) => return Some(Err(error)),
                MockStep::Hang => futures::future::pending::<()>().await,
            }
        }
    }

    async fn close(&mut self) {
        self.release();
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.release();
    }
}
