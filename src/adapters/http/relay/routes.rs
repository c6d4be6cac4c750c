//! Axum routes for the relay endpoints.

use axum::routing::get;
use axum::Router;

use super::handlers::{ask, RelayAppState};
use super::ws_handler::relay_ws_handler;

/// Creates routes for the relay endpoints.
///
/// - POST /api/ai - blocking query
/// - WS /api/ai - push channel
pub fn relay_routes() -> Router<RelayAppState> {
    Router::new().route("/ai", get(relay_ws_handler).post(ask))
}

/// Combined router with all relay routes under /api.
pub fn relay_router() -> Router<RelayAppState> {
    Router::new().nest("/api", relay_routes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_routes_creates_valid_router() {
        let _routes = relay_routes();
    }

    #[test]
    fn relay_router_creates_combined_router() {
        let _router = relay_router();
    }
}
