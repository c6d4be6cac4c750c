//! Relay domain - queries, sessions and the normalized upstream event stream.
//!
//! A [`Query`] enters through a transport, a [`Session`] tracks one exchange
//! with the upstream backend, the [`EventNormalizer`] turns raw upstream
//! frames into [`StreamEvent`]s, and a [`Response`] is the terminal artifact
//! handed back to the caller.

mod event;
mod normalizer;
mod query;
mod response;
mod session;

pub use event::{Citation, StreamEvent};
pub use normalizer::{
    EventNormalizer, CONNECTION_LOST_MESSAGE, DATA_PREFIX, END_OF_STREAM_SENTINEL,
    TIMEOUT_PLACEHOLDER_TEXT,
};
pub use query::{Mode, Query};
pub use response::{Response, ResponseMetadata};
pub use session::{Session, SessionState};
