use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use ai_relay::adapters::{build_router, RelayAppState, WebSocketUpstreamClient};
use ai_relay::application::{SessionOrchestrator, SessionTimeouts};
use ai_relay::config::{AppConfig, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    let client = WebSocketUpstreamClient::new(config.upstream.clone())?;
    let orchestrator = SessionOrchestrator::new(
        Arc::new(client),
        SessionTimeouts::from(&config.upstream),
    );
    let state = RelayAppState::new(Arc::new(orchestrator), config.upstream.default_mode);
    let app = build_router(state, &config.server);

    let addr = config.server.bind_address()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        production = config.is_production(),
        upstream = %config.upstream.api_base_url,
        "AI relay listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down");
    Ok(())
}

/// RUST_LOG wins over the configured filter. Production logs are JSON.
fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&server.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if server.json_logs() {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
