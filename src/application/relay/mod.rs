//! Relay application services.
//!
//! [`UpstreamSession`] drives a single exchange with the upstream backend;
//! [`SessionOrchestrator`] is what transports call to run one.

mod error;
mod orchestrator;
mod upstream_session;

pub use error::RelayError;
pub use orchestrator::{ActiveSession, SessionOrchestrator, EVENT_BUFFER};
pub use upstream_session::{Completion, SessionTimeouts, UpstreamSession};
