//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::error::PipeShellError;
use crate::session::{CommandHandle, ShellOutputRecord, ShellSession};

/// Response for the session status query.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatusResponse {
    /// Lifecycle state (`stopped`, `starting`, `running`, `stopping`).
    pub state: String,
    /// Interpreter process id while one is attached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Whether the interpreter is alive.
    pub alive: bool,
    /// Whether any command is still running.
    pub busy: bool,
    /// Number of commands still running.
    pub busy_commands: usize,
}

impl SessionStatusResponse {
    pub fn from_session(session: &ShellSession) -> Self {
        let busy_commands = session.busy_commands().len();
        Self {
            state: session.state().to_string(),
            pid: session.pid(),
            alive: session.is_alive(),
            busy: busy_commands > 0,
            busy_commands,
        }
    }
}

/// Request to run a command in the session.
#[derive(Debug, Clone, Deserialize)]
pub struct RunCommandRequest {
    /// The command line, passed to the shell verbatim.
    pub command: String,
}

/// Response for an accepted command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCommandResponse {
    pub handle: CommandHandle,
}

/// Response for a command status query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandStatusResponse {
    pub handle: CommandHandle,
    pub busy: bool,
}

/// Drained output records.
#[derive(Debug, Clone, Serialize)]
pub struct OutputResponse {
    pub count: usize,
    pub records: Vec<ShellOutputRecord>,
}

impl OutputResponse {
    pub fn new(records: Vec<ShellOutputRecord>) -> Self {
        Self {
            count: records.len(),
            records,
        }
    }
}

/// Status log lines.
#[derive(Debug, Clone, Serialize)]
pub struct StatusLogResponse {
    pub count: usize,
    pub lines: Vec<String>,
}

/// Generic API error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "PROCESS_NOT_RUNNING").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Map a session error to its stable error code.
    pub fn from_error(err: &PipeShellError) -> Self {
        let code = match err {
            PipeShellError::ProcessNotRunning => "PROCESS_NOT_RUNNING",
            PipeShellError::BrokenPipe(_) => "BROKEN_PIPE",
            PipeShellError::ProcessSpawn { .. } => "SPAWN_FAILED",
            PipeShellError::CommandDispatch(_) => "DISPATCH_FAILED",
            PipeShellError::InvalidHandle(_) => "INVALID_HANDLE",
            PipeShellError::InvalidStateTransition { .. } => "INVALID_STATE",
            PipeShellError::Filesystem { .. } => "FILESYSTEM_ERROR",
            _ => "INTERNAL_ERROR",
        };
        Self::new(code, err.to_string())
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

/// WebSocket message types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// Client submits a command.
    Run { command: String },
    /// Server pushes drained output.
    Output { records: Vec<ShellOutputRecord> },
    /// Server acknowledges a submitted command.
    Accepted { handle: CommandHandle },
    /// Server reports a command as finished.
    Completed { handle: CommandHandle },
    /// Error message.
    Error { code: String, message: String },
    /// Ping/pong for connection health.
    Ping,
    Pong,
}

impl WsMessage {
    pub fn error(err: &PipeShellError) -> Self {
        let response = ErrorResponse::from_error(err);
        WsMessage::Error {
            code: response.code,
            message: response.message,
        }
    }
}
