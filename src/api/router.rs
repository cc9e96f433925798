//! API router configuration.

use axum::{
    routing::{any, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    api_info, command_status, drain_output, get_session, health, run_command, start_session,
    status_log, stop_session, AppState,
};
use super::websocket::ws_handler;
use crate::error::PipeShellError;

/// Create the API router around a fresh, unstarted session.
pub fn create_router() -> Router {
    create_router_with_state(AppState::default())
}

/// Create the API router with custom state.
pub fn create_router_with_state(state: AppState) -> Router {
    let session_routes = Router::new()
        .route("/", get(get_session))
        .route("/start", post(start_session))
        .route("/stop", post(stop_session))
        .route("/commands", post(run_command))
        .route("/commands/{handle}", get(command_status))
        .route("/output", get(drain_output))
        .route("/log", get(status_log))
        .route("/ws", any(ws_handler));

    let api_v1 = Router::new()
        .route("/", get(api_info))
        .nest("/session", session_routes);

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_v1)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Start the API server around a fresh session.
pub async fn serve(config: ServerConfig) -> crate::Result<()> {
    serve_with_state(config, AppState::default()).await
}

/// Start the API server with custom state.
///
/// Runs until Ctrl-C, then stops the session before returning.
pub async fn serve_with_state(config: ServerConfig, state: AppState) -> crate::Result<()> {
    let addr = config.bind_address();
    let router = create_router_with_state(state.clone());

    tracing::info!("Starting pipe-shell API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(PipeShellError::Io)?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| PipeShellError::Io(std::io::Error::other(e.to_string())))?;

    tracing::info!("API server stopped, shutting down shell session");
    state.blocking(|s| s.stop()).await.map_err(|(_, body)| {
        PipeShellError::Io(std::io::Error::other(body.0.message))
    })?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
