//! HTTP and WebSocket API around one persistent shell session.
//!
//! ## Endpoints
//!
//! ### Health & Info
//! - `GET /health` - Health check
//! - `GET /api/v1/` - API information
//!
//! ### Session
//! - `GET /api/v1/session` - Session status
//! - `POST /api/v1/session/start` - Start the shell process
//! - `POST /api/v1/session/stop` - Stop the shell process
//! - `POST /api/v1/session/commands` - Submit a command
//! - `GET /api/v1/session/commands/{handle}` - Whether a command is still running
//! - `GET /api/v1/session/output` - Drain pending output
//! - `GET /api/v1/session/log` - Status log
//! - `WS /api/v1/session/ws` - Submit commands and stream output
//!
//! ## Example
//!
//! ```no_run
//! use pipe_shell::api::{serve, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> pipe_shell::Result<()> {
//!     let config = ServerConfig::new("127.0.0.1", 3000);
//!     serve(config).await
//! }
//! ```

pub mod handlers;
pub mod router;
pub mod types;
pub mod websocket;

pub use handlers::{ApiError, AppState};
pub use router::{create_router, create_router_with_state, serve, serve_with_state, ServerConfig};
pub use types::{
    CommandStatusResponse, ErrorResponse, OutputResponse, RunCommandRequest, RunCommandResponse,
    SessionStatusResponse, StatusLogResponse, WsMessage,
};
