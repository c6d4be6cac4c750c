//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the application to external systems:
//! - `http` - REST and WebSocket endpoints (axum)
//! - `upstream` - Upstream AI backend clients (real and mock)

pub mod http;
pub mod upstream;

pub use http::{build_router, RelayAppState};
pub use upstream::{MockStream, MockUpstreamClient, WebSocketUpstreamClient};
