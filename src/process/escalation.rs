//! Shutdown escalation: exit command, then terminate, then kill.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::ShellProcess;
use crate::logging::StatusLog;
use crate::marker::LINE_TERMINATOR;

/// One step of the shutdown sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownStage {
    /// Ask the interpreter to exit on its own.
    GracefulExit,
    /// Send a termination request.
    Terminate,
    /// Force kill.
    Kill,
    /// The process is gone.
    Exited,
}

/// How long each stage waits before escalating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationTimeouts {
    pub exit: Duration,
    pub terminate: Duration,
}

impl Default for EscalationTimeouts {
    fn default() -> Self {
        Self {
            exit: Duration::from_secs(5),
            terminate: Duration::from_secs(5),
        }
    }
}

/// Drives a process from a polite exit request to a confirmed exit.
///
/// Stage failures are logged and fall through to the next stage; the
/// machine always ends in [`ShutdownStage::Exited`].
#[derive(Debug, Clone)]
pub struct Escalation {
    exit_command: String,
    timeouts: EscalationTimeouts,
    status_log: Option<Arc<StatusLog>>,
}

impl Escalation {
    pub fn new(exit_command: impl Into<String>, timeouts: EscalationTimeouts) -> Self {
        Self {
            exit_command: exit_command.into(),
            timeouts,
            status_log: None,
        }
    }

    /// Mirror escalation warnings into a session status log.
    pub fn with_status_log(mut self, log: Arc<StatusLog>) -> Self {
        self.status_log = Some(log);
        self
    }

    pub fn timeouts(&self) -> EscalationTimeouts {
        self.timeouts
    }

    /// Run the whole sequence, returning every stage visited.
    pub fn run(&self, process: &mut dyn ShellProcess) -> Vec<ShutdownStage> {
        let mut stage = ShutdownStage::GracefulExit;
        let mut visited = vec![stage];
        while stage != ShutdownStage::Exited {
            stage = self.step(process, stage);
            visited.push(stage);
        }
        visited
    }

    /// Perform exactly one transition.
    pub fn step(&self, process: &mut dyn ShellProcess, stage: ShutdownStage) -> ShutdownStage {
        match stage {
            ShutdownStage::GracefulExit => {
                let line = format!("{}{}", self.exit_command, LINE_TERMINATOR);
                if let Err(e) = process.write_line(&line) {
                    debug!(error = %e, "Could not send exit command");
                }
                process.close_stdin();

                if self.wait(process, self.timeouts.exit) {
                    ShutdownStage::Exited
                } else {
                    self.warn("warning: shell did not exit gracefully, trying terminate");
                    ShutdownStage::Terminate
                }
            }
            ShutdownStage::Terminate => {
                if let Err(e) = process.terminate() {
                    self.warn(format!("warning: terminate failed: {}", e));
                    return ShutdownStage::Kill;
                }
                if self.wait(process, self.timeouts.terminate) {
                    ShutdownStage::Exited
                } else {
                    self.warn("warning: shell still alive, forcing kill");
                    ShutdownStage::Kill
                }
            }
            ShutdownStage::Kill => {
                match process.kill() {
                    Ok(()) => {
                        if let Err(e) = process.wait() {
                            self.warn(format!("warning: wait after kill failed: {}", e));
                        }
                    }
                    Err(e) => self.warn(format!("warning: kill failed: {}", e)),
                }
                ShutdownStage::Exited
            }
            ShutdownStage::Exited => ShutdownStage::Exited,
        }
    }

    fn wait(&self, process: &mut dyn ShellProcess, timeout: Duration) -> bool {
        match process.wait_timeout(timeout) {
            Ok(exited) => exited,
            Err(e) => {
                warn!(error = %e, "Waiting for shell process failed");
                false
            }
        }
    }

    fn warn(&self, line: impl Into<String>) {
        let line = line.into();
        match &self.status_log {
            Some(log) => log.warn(line),
            None => warn!("{}", line),
        }
    }
}

impl Default for Escalation {
    fn default() -> Self {
        Self::new("exit", EscalationTimeouts::default())
    }
}
