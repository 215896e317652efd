//! Relay Web Server
//!
//! Axum-based server exposing the producer webhook, the live push channels
//! and the polling snapshot.

pub mod routes;
pub mod session;
pub mod state;
pub mod stream;
pub mod websocket;

use axum::{
    routing::{get, post},
    Router,
};
use relay_core::Broadcaster;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use state::AppState;

/// Server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub heartbeat_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            heartbeat_interval: session::DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/webhook", post(routes::webhook::receive))
        .route("/stream", get(stream::stream_handler))
        .route("/latest", get(routes::latest::latest))
        .with_state(state.clone());

    Router::new()
        .nest("/api", api_routes)
        .route("/ws", get(websocket::ws_handler))
        .route("/health", get(routes::health::health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the relay on an already-bound listener until shutdown is
/// requested through `state`.
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> anyhow::Result<()> {
    let shutdown = state.shutdown_signal();
    let app = create_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Run the web server until Ctrl+C.
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    // One broadcaster for the whole process; every handler shares it.
    let broadcaster = Arc::new(Broadcaster::new());
    let state = AppState::new(broadcaster, config.heartbeat_interval, shutdown_rx);

    let listener = tokio::net::TcpListener::bind(config.addr()).await?;
    tracing::info!(
        heartbeat_secs = config.heartbeat_interval.as_secs(),
        "Relay server listening on http://{}",
        config.addr()
    );

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown signal received, closing push channels");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
        }
    });

    serve(listener, state).await
}
