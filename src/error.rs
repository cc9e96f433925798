//! Error types for pipe-shell.

use thiserror::Error;

/// Main error type for pipe-shell operations.
#[derive(Error, Debug)]
pub enum PipeShellError {
    /// The interpreter process could not be launched.
    #[error("failed to spawn shell process '{program}': {source}")]
    ProcessSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A command was issued while no live process is attached.
    #[error("shell process not running or has terminated; call start() first")]
    ProcessNotRunning,

    /// The process input pipe was severed mid-write.
    #[error("stdin pipe is broken; the shell process may have terminated: {0}")]
    BrokenPipe(#[source] std::io::Error),

    /// Writing a command to the process failed for another reason.
    #[error("failed to dispatch command: {0}")]
    CommandDispatch(#[source] std::io::Error),

    /// A reader thread could not be started.
    #[error("failed to spawn stream reader: {0}")]
    ReaderSpawn(#[source] std::io::Error),

    /// Invalid state transition attempted.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        from: crate::session::SessionState,
        to: crate::session::SessionState,
    },

    /// Text that does not have the shape of a command handle.
    #[error("invalid command handle: {0}")]
    InvalidHandle(String),

    /// A filesystem helper failed on `path`.
    #[error("failed to {action} {}: {source}", .path.display())]
    Filesystem {
        action: &'static str,
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,
}

impl PipeShellError {
    /// Whether the caller can recover by calling `start()` again.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipeShellError::ProcessNotRunning | PipeShellError::BrokenPipe(_)
        )
    }
}

/// Convenience Result type for pipe-shell operations.
pub type Result<T> = std::result::Result<T, PipeShellError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_spawn_error_keeps_cause() {
        let err = PipeShellError::ProcessSpawn {
            program: "/no/such/shell".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.to_string().contains("/no/such/shell"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_not_running_display() {
        let err = PipeShellError::ProcessNotRunning;
        assert!(err.to_string().contains("not running"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_broken_pipe_is_recoverable() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err = PipeShellError::BrokenPipe(io_err);
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_dispatch_error_wraps_cause() {
        let io_err = std::io::Error::other("disk on fire");
        let err = PipeShellError::CommandDispatch(io_err);
        assert!(!err.is_recoverable());
        assert_eq!(err.source().unwrap().to_string(), "disk on fire");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PipeShellError = io_err.into();
        assert!(matches!(err, PipeShellError::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }
}
