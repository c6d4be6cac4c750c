//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Upstream Ports
//!
//! - `UpstreamClient` - Creates conversations and opens answer streams
//! - `UpstreamConnection` - One open answer stream, pulled frame by frame

mod upstream_client;

pub use upstream_client::{
    RawFrame, StreamRequest, UpstreamClient, UpstreamConnection, UpstreamError,
};
