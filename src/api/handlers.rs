//! REST API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::types::{
    CommandStatusResponse, ErrorResponse, OutputResponse, RunCommandRequest, RunCommandResponse,
    SessionStatusResponse, StatusLogResponse,
};
use crate::error::PipeShellError;
use crate::session::{CommandHandle, ShellSession};

/// Error half of every handler result.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<ShellSession>,
}

impl AppState {
    pub fn new(session: Arc<ShellSession>) -> Self {
        Self { session }
    }

    /// Run a blocking session call off the async runtime.
    pub async fn blocking<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&ShellSession) -> crate::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let session = Arc::clone(&self.session);
        tokio::task::spawn_blocking(move || f(&session))
            .await
            .map_err(|e| {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse::internal_error(e.to_string())),
                )
            })?
            .map_err(api_error)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Arc::new(ShellSession::new()))
    }
}

/// Map a session error to its HTTP response.
pub fn api_error(err: PipeShellError) -> ApiError {
    let status = match &err {
        PipeShellError::ProcessNotRunning => StatusCode::CONFLICT,
        PipeShellError::InvalidHandle(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse::from_error(&err)))
}

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}

/// API information endpoint.
pub async fn api_info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "pipe-shell",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

/// Get session status.
pub async fn get_session(
    State(state): State<AppState>,
) -> Result<Json<SessionStatusResponse>, ApiError> {
    let status = state
        .blocking(|s| Ok(SessionStatusResponse::from_session(s)))
        .await?;
    Ok(Json(status))
}

/// Start the shell process.
pub async fn start_session(
    State(state): State<AppState>,
) -> Result<Json<SessionStatusResponse>, ApiError> {
    let status = state
        .blocking(|s| {
            s.start()?;
            Ok(SessionStatusResponse::from_session(s))
        })
        .await?;
    Ok(Json(status))
}

/// Stop the shell process.
pub async fn stop_session(
    State(state): State<AppState>,
) -> Result<Json<SessionStatusResponse>, ApiError> {
    let status = state
        .blocking(|s| {
            s.stop()?;
            Ok(SessionStatusResponse::from_session(s))
        })
        .await?;
    Ok(Json(status))
}

/// Submit a command.
pub async fn run_command(
    State(state): State<AppState>,
    Json(req): Json<RunCommandRequest>,
) -> Result<(StatusCode, Json<RunCommandResponse>), ApiError> {
    let handle = state.blocking(move |s| s.run(&req.command)).await?;
    Ok((StatusCode::CREATED, Json(RunCommandResponse { handle })))
}

/// Check whether a command is still running.
pub async fn command_status(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> Result<Json<CommandStatusResponse>, ApiError> {
    let handle: CommandHandle = handle.parse().map_err(api_error)?;
    let busy = state.session.is_command_busy(&handle);
    Ok(Json(CommandStatusResponse { handle, busy }))
}

/// Drain pending output.
pub async fn drain_output(State(state): State<AppState>) -> Json<OutputResponse> {
    Json(OutputResponse::new(state.session.drain_output()))
}

/// Status log lines.
pub async fn status_log(State(state): State<AppState>) -> Json<StatusLogResponse> {
    let lines = state.session.status_log().entries();
    Json(StatusLogResponse {
        count: lines.len(),
        lines,
    })
}
