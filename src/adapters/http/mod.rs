//! HTTP adapters - REST and WebSocket endpoints.
//!
//! [`build_router`] assembles the full application: relay routes, optional
//! static UI, CORS and request tracing.

pub mod relay;

use axum::Router;
use http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::{CorsPolicy, ServerConfig};

// Re-export key types for convenience
pub use relay::relay_router;
pub use relay::RelayAppState;

/// Builds the application router.
pub fn build_router(state: RelayAppState, server: &ServerConfig) -> Router {
    let mut router = relay_router().with_state(state);

    if let Some(dir) = server.static_root() {
        tracing::info!(dir = %dir.display(), "Serving static assets");
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(cors_layer(&server.cors_policy()))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(policy: &CorsPolicy) -> CorsLayer {
    let allow_origin = match policy {
        CorsPolicy::AnyOrigin => AllowOrigin::from(Any),
        CorsPolicy::Origins(origins) => AllowOrigin::list(origins.iter().filter_map(|origin| {
            match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            }
        })),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}
