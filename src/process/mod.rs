//! Shell process abstraction layer.
//!
//! The session controller never touches `std::process` directly. It drives
//! a [`ShellProcess`] obtained from a [`ProcessSpawner`], which lets the
//! shutdown escalation and the controller be exercised against fake
//! processes in tests.

mod escalation;
#[cfg(test)]
pub(crate) mod fake;
mod native;

pub use escalation::{Escalation, EscalationTimeouts, ShutdownStage};
pub use native::{
    default_shell, default_shell_args, default_shell_env, NativeSpawner, PipedProcess,
};

use std::collections::HashMap;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, TryLockError};
use std::time::Duration;

/// A live interpreter process with piped standard streams.
pub trait ShellProcess: Send {
    /// Operating system process id, if known.
    fn id(&self) -> Option<u32>;

    /// Non-blocking check whether the process has exited.
    fn has_exited(&mut self) -> io::Result<bool>;

    /// Write one line (terminator included by the caller) and flush.
    fn write_line(&mut self, line: &str) -> io::Result<()>;

    /// Close the process input so it observes end-of-file.
    fn close_stdin(&mut self);

    /// Ask the process to terminate gracefully.
    fn terminate(&mut self) -> io::Result<()>;

    /// Forcibly kill the process.
    fn kill(&mut self) -> io::Result<()>;

    /// Wait up to `timeout` for the process to exit. Returns `true` if it did.
    fn wait_timeout(&mut self, timeout: Duration) -> io::Result<bool>;

    /// Wait for the process to exit.
    fn wait(&mut self) -> io::Result<()>;
}

/// What to launch as the interpreter.
#[derive(Debug, Clone)]
pub struct ShellCommand {
    /// Program to execute.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Working directory (inherited if `None`).
    pub working_dir: Option<PathBuf>,
    /// Extra environment variables.
    pub env: HashMap<String, String>,
}

impl ShellCommand {
    /// Create a command for the given program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: HashMap::new(),
        }
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set the working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

impl Default for ShellCommand {
    /// The platform shell with its default arguments and environment.
    fn default() -> Self {
        let mut command = Self::new(default_shell());
        command.args = default_shell_args();
        command.env = default_shell_env();
        command
    }
}

/// A freshly spawned process together with its output streams.
pub struct SpawnedProcess {
    /// The process handle (owns stdin).
    pub process: Box<dyn ShellProcess>,
    /// Standard output stream.
    pub stdout: Box<dyn Read + Send>,
    /// Standard error stream.
    pub stderr: Box<dyn Read + Send>,
}

/// Factory for shell processes.
pub trait ProcessSpawner: Send + Sync {
    /// Launch `command` with all three standard streams piped.
    fn spawn(&self, command: &ShellCommand) -> io::Result<SpawnedProcess>;
}

/// Slot holding the controller's process, shared read-only with readers.
pub(crate) type ProcessSlot = Arc<Mutex<Option<Box<dyn ShellProcess>>>>;

/// Read-only, non-blocking liveness check handed to the stream readers.
#[derive(Clone)]
pub struct LivenessProbe {
    slot: ProcessSlot,
}

impl LivenessProbe {
    pub(crate) fn new(slot: ProcessSlot) -> Self {
        Self { slot }
    }

    /// Whether the process is still alive.
    ///
    /// Never blocks: while the controller holds the process (for example
    /// during shutdown) the process is reported alive.
    pub fn is_alive(&self) -> bool {
        match self.slot.try_lock() {
            Ok(mut guard) => match guard.as_mut() {
                Some(process) => !process.has_exited().unwrap_or(true),
                None => false,
            },
            Err(TryLockError::WouldBlock) => true,
            Err(TryLockError::Poisoned(_)) => false,
        }
    }
}

impl std::fmt::Debug for LivenessProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LivenessProbe").finish_non_exhaustive()
    }
}
