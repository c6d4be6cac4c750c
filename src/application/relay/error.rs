//! Errors surfaced to the caller of a relay session.

use thiserror::Error;

use crate::domain::foundation::ValidationError;

/// Why a session did not produce a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// The upstream sent an explicit error record. Message is verbatim.
    #[error("{0}")]
    Protocol(String),

    /// The upstream connection failed or ended without a terminal record.
    #[error("{0}")]
    Transport(String),

    /// The session's consumer went away before the session finished.
    #[error("session cancelled")]
    Cancelled,

    /// A session lifecycle rule was broken.
    #[error("invalid session state: {0}")]
    InvalidState(#[from] ValidationError),
}
