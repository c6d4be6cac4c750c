//! Upstream adapters - implementations of the [`UpstreamClient`] port.
//!
//! - `WebSocketUpstreamClient` - production backend (HTTP + WebSocket)
//! - `MockUpstreamClient` - scripted test double
//!
//! [`UpstreamClient`]: crate::ports::UpstreamClient

mod mock_client;
mod websocket_client;

pub use mock_client::{MockStream, MockUpstreamClient};
pub use websocket_client::WebSocketUpstreamClient;
