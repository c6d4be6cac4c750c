//! Application layer - orchestrates domain operations over ports.

pub mod relay;

pub use relay::{ActiveSession, RelayError, SessionOrchestrator, SessionTimeouts};
