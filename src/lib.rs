//! # pipe-shell
//!
//! Persistent shell sessions over plain pipes.
//!
//! A [`ShellSession`] launches one long-lived interpreter (`/bin/sh` on
//! Unix, `cmd.exe` on Windows) and feeds it successive commands. The
//! interpreter never reports when a command is done, so every command is
//! followed by an `echo` of a unique marker and the output streams are
//! watched for it. Output is buffered as classified records until the
//! caller drains it.
//!
//! ## Features
//!
//! - **Persistent process**: one interpreter for many commands, with state
//!   (working directory, variables) carried between them
//! - **Completion detection**: per-command markers matched line by line
//! - **Bounded shutdown**: exit command, then terminate, then kill
//! - **API server**: optional HTTP/WebSocket front end built on axum
//! - **Filesystem helpers**: small wrappers in [`fs`], including
//!   [`fs::create_project`] for laying out a tree from JSON
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use pipe_shell::ShellSession;
//!
//! fn main() -> pipe_shell::Result<()> {
//!     pipe_shell::logging::try_init().ok();
//!
//!     let session = ShellSession::new();
//!     session.start()?;
//!
//!     let handle = session.run("echo hello")?;
//!     session.wait_idle(Some(&handle), Duration::from_secs(5));
//!
//!     for record in session.drain_output() {
//!         println!("{}", record);
//!     }
//!
//!     session.stop()
//! }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod fs;
pub mod logging;
pub mod marker;
pub mod process;
pub mod session;

// Re-export commonly used types
pub use error::{PipeShellError, Result};
pub use logging::StatusLog;
pub use marker::{LineClass, MarkerProtocol};
pub use process::{NativeSpawner, ProcessSpawner, ShellCommand, ShellProcess};
pub use session::{
    CommandHandle, OutputKind, SessionConfig, SessionState, ShellOutputRecord, ShellSession,
};
