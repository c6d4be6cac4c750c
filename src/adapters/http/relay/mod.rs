//! HTTP adapter for the relay endpoints.
//!
//! - `POST /api/ai` - blocking query, one JSON response
//! - `GET /api/ai` - WebSocket push channel streaming session events

pub mod dto;
pub mod handlers;
pub mod routes;
pub mod streaming;
pub mod ws_handler;

pub use dto::{AskRequest, AskResponse, ErrorResponse, MetadataView, ResponseView};
pub use handlers::{ask, RelayApiError, RelayAppState, PROMPT_REQUIRED};
pub use routes::{relay_router, relay_routes};
pub use streaming::{PushClientMessage, PushQuery, PushServerMessage};
pub use ws_handler::relay_ws_handler;
