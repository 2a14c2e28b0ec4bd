use std::net::SocketAddr;

use evhop_api::{app, AppState};
use evhop_store::app_config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "evhop_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().expect("Failed to load config");
    tracing::info!(
        backend = %config.backend.base_url,
        hotels = config.hotels.len(),
        routes = config.routes.len(),
        "Starting EVHop partner API on port {}",
        config.server.port
    );

    let app_state = AppState::from_config(&config).expect("Failed to build application state");
    tracing::info!(
        desk = app_state.desk.is_enabled(),
        session_store = if config.session.redis_url.is_some() { "redis" } else { "memory" },
        "Desk session ready"
    );
    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.expect("Failed to bind listener");
    axum::serve(listener, app).await.expect("Server error");
}
