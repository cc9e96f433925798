//! The persistent shell session controller.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::queue::{OutputQueue, ShellOutputRecord};
use super::reader::{ReaderExit, ReaderShared, StreamKind, StreamReader};
use super::table::CommandTable;
use super::{CommandHandle, SessionState};
use crate::error::PipeShellError;
use crate::logging::StatusLog;
use crate::marker::{MarkerProtocol, LINE_TERMINATOR};
use crate::process::{
    default_shell, default_shell_args, default_shell_env, Escalation, EscalationTimeouts,
    LivenessProbe, NativeSpawner, ProcessSlot, ProcessSpawner, ShellCommand, ShellProcess,
};
use crate::Result;

const IDLE_POLL: Duration = Duration::from_millis(10);

/// Configuration for a shell session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Interpreter program.
    pub shell: String,
    /// Arguments passed to the interpreter.
    pub args: Vec<String>,
    /// Working directory (inherited if `None`).
    pub working_dir: Option<PathBuf>,
    /// Extra environment variables.
    pub env: HashMap<String, String>,
    /// Line that asks the interpreter to exit.
    pub exit_command: String,
    /// Time given to the shell to print its banner after start.
    pub warmup: Duration,
    /// Wait after the exit command before terminating.
    pub exit_timeout: Duration,
    /// Wait after terminating before killing.
    pub terminate_timeout: Duration,
    /// Wait for each reader thread to finish on stop.
    pub join_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            shell: default_shell().to_string(),
            args: default_shell_args(),
            working_dir: None,
            env: default_shell_env(),
            exit_command: "exit".to_string(),
            warmup: Duration::from_millis(100),
            exit_timeout: Duration::from_secs(5),
            terminate_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(2),
        }
    }
}

impl SessionConfig {
    /// The process launch description for this configuration.
    pub fn to_command(&self) -> ShellCommand {
        let mut command = ShellCommand::new(&self.shell);
        command.args = self.args.clone();
        command.working_dir = self.working_dir.clone();
        command.env = self.env.clone();
        command
    }

    fn escalation_timeouts(&self) -> EscalationTimeouts {
        EscalationTimeouts {
            exit: self.exit_timeout,
            terminate: self.terminate_timeout,
        }
    }
}

struct Lifecycle {
    state: SessionState,
    cancel: Arc<AtomicBool>,
    readers: Vec<(StreamKind, JoinHandle<ReaderExit>)>,
}

/// A long-lived interpreter process accepting successive commands.
///
/// Completion of each command is detected by watching the output streams
/// for the command's marker (see [`crate::marker`]). All methods take
/// `&self`, so a session can be shared through an `Arc`.
pub struct ShellSession {
    config: SessionConfig,
    spawner: Arc<dyn ProcessSpawner>,
    protocol: Arc<MarkerProtocol>,
    table: Arc<CommandTable>,
    queue: OutputQueue,
    status: Arc<StatusLog>,
    process: ProcessSlot,
    lifecycle: Mutex<Lifecycle>,
}

impl ShellSession {
    /// Create a session for the platform's default shell.
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    /// Create a session with the given configuration.
    pub fn with_config(config: SessionConfig) -> Self {
        Self::with_spawner(config, Arc::new(NativeSpawner::new()))
    }

    /// Create a session that obtains its process from `spawner`.
    pub fn with_spawner(config: SessionConfig, spawner: Arc<dyn ProcessSpawner>) -> Self {
        Self {
            config,
            spawner,
            protocol: Arc::new(MarkerProtocol::new()),
            table: Arc::new(CommandTable::new()),
            queue: OutputQueue::new(),
            status: Arc::new(StatusLog::new()),
            process: Arc::new(Mutex::new(None)),
            lifecycle: Mutex::new(Lifecycle {
                state: SessionState::Stopped,
                cancel: Arc::new(AtomicBool::new(true)),
                readers: Vec::new(),
            }),
        }
    }

    /// Launch the interpreter and its stream readers.
    ///
    /// Does nothing if the session is already running.
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.lock_lifecycle()?;

        match lifecycle.state {
            SessionState::Running if self.process_alive() => {
                self.status.info("persistent shell is already running");
                return Ok(());
            }
            SessionState::Running => {
                self.status
                    .warn("warning: shell process exited unexpectedly, restarting");
                lifecycle.state.transition_to(SessionState::Stopping)?;
                self.teardown(&mut lifecycle)?;
            }
            SessionState::Stopping => self.teardown(&mut lifecycle)?,
            SessionState::Starting | SessionState::Stopped => {}
        }

        lifecycle.state.transition_to(SessionState::Starting)?;

        let command = self.config.to_command();
        let spawned = match self.spawner.spawn(&command) {
            Ok(spawned) => spawned,
            Err(source) => {
                lifecycle.state.transition_to(SessionState::Stopped)?;
                warn!(program = %command.program, error = %source, "Failed to spawn shell");
                return Err(PipeShellError::ProcessSpawn {
                    program: command.program,
                    source,
                });
            }
        };

        let pid = spawned.process.id();
        *self.lock_process()? = Some(spawned.process);

        let cancel = Arc::new(AtomicBool::new(false));
        lifecycle.cancel = Arc::clone(&cancel);
        let shared = ReaderShared {
            protocol: Arc::clone(&self.protocol),
            table: Arc::clone(&self.table),
            output: self.queue.sender(),
            cancel,
            liveness: LivenessProbe::new(Arc::clone(&self.process)),
        };

        let readers = [
            (StreamKind::Stdout, spawned.stdout),
            (StreamKind::Stderr, spawned.stderr),
        ];
        for (kind, stream) in readers {
            match StreamReader::new(stream, kind, shared.clone()).spawn() {
                Ok(handle) => lifecycle.readers.push((kind, handle)),
                Err(e) => {
                    self.abort_start(&mut lifecycle);
                    return Err(PipeShellError::ReaderSpawn(e));
                }
            }
        }

        lifecycle.state.transition_to(SessionState::Running)?;

        // Let the interpreter print its banner, then throw it away.
        if !self.config.warmup.is_zero() {
            thread::sleep(self.config.warmup);
        }
        let discarded = self.queue.clear();
        debug!(discarded, "Discarded start-up output");

        let pid_text = pid.map_or_else(|| "unknown".to_string(), |p| p.to_string());
        self.status
            .info(format!("persistent shell started (pid {})", pid_text));
        Ok(())
    }

    /// Submit a command and return the handle tracking its completion.
    pub fn run(&self, command: &str) -> Result<CommandHandle> {
        let mut lifecycle = self.lock_lifecycle()?;
        if !lifecycle.state.can_execute() {
            return Err(PipeShellError::ProcessNotRunning);
        }

        let mut slot = self.lock_process()?;
        let process = slot.as_mut().ok_or(PipeShellError::ProcessNotRunning)?;
        if process.has_exited().unwrap_or(true) {
            return Err(PipeShellError::ProcessNotRunning);
        }

        let handle = self.protocol.mint();
        let line = format!(
            "{}{}",
            self.protocol.rewrite(command, &handle),
            LINE_TERMINATOR
        );

        // Registered before the write so the marker never beats the entry.
        self.table.mark_busy(handle.clone(), command);
        self.queue.push(ShellOutputRecord::input(command));

        match process.write_line(&line) {
            Ok(()) => {
                debug!(%handle, "Command dispatched");
                Ok(handle)
            }
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                drop(slot);
                self.table.retire(&handle);
                lifecycle.state.transition_to(SessionState::Stopping)?;
                self.status
                    .warn("warning: stdin pipe is broken, shell process may have terminated");
                Err(PipeShellError::BrokenPipe(e))
            }
            Err(e) => {
                self.table.retire(&handle);
                warn!(%handle, error = %e, "Failed to dispatch command");
                Err(PipeShellError::CommandDispatch(e))
            }
        }
    }

    /// Remove and return every pending output record.
    pub fn drain_output(&self) -> Vec<ShellOutputRecord> {
        self.queue.drain()
    }

    /// Whether `handle` (or, with `None`, any command) is still running.
    pub fn is_busy(&self, handle: Option<&CommandHandle>) -> bool {
        match handle {
            Some(handle) => self.table.contains(handle),
            None => !self.table.is_empty(),
        }
    }

    pub fn is_command_busy(&self, handle: &CommandHandle) -> bool {
        self.is_busy(Some(handle))
    }

    /// Handles of all busy commands, oldest first.
    pub fn busy_commands(&self) -> Vec<CommandHandle> {
        self.table.handles()
    }

    /// Block until [`is_busy`](Self::is_busy) turns false or `timeout`
    /// passes. Returns `true` when idle.
    pub fn wait_idle(&self, handle: Option<&CommandHandle>, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.is_busy(handle) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(IDLE_POLL);
        }
    }

    pub fn state(&self) -> SessionState {
        self.lifecycle
            .lock()
            .map(|l| l.state)
            .unwrap_or_else(|e| e.into_inner().state)
    }

    /// Process id of the attached interpreter.
    pub fn pid(&self) -> Option<u32> {
        self.process
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().and_then(|p| p.id()))
    }

    /// Whether an interpreter is attached and has not exited.
    pub fn is_alive(&self) -> bool {
        self.process_alive()
    }

    /// The random base shared by every marker of this session.
    pub fn marker_base(&self) -> &str {
        self.protocol.base()
    }

    pub fn status_log(&self) -> &StatusLog {
        &self.status
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Shut the interpreter down and join the readers.
    ///
    /// Escalates from the exit command to terminate and kill; the process
    /// is gone when this returns.
    pub fn stop(&self) -> Result<()> {
        let mut lifecycle = self.lock_lifecycle()?;
        match lifecycle.state {
            SessionState::Stopped => {
                self.status.info("persistent shell is not running");
                Ok(())
            }
            SessionState::Running => {
                lifecycle.state.transition_to(SessionState::Stopping)?;
                self.teardown(&mut lifecycle)
            }
            SessionState::Stopping => self.teardown(&mut lifecycle),
            SessionState::Starting => Err(PipeShellError::InvalidStateTransition {
                from: SessionState::Starting,
                to: SessionState::Stopping,
            }),
        }
    }

    /// Finish a teardown from the `Stopping` state.
    fn teardown(&self, lifecycle: &mut Lifecycle) -> Result<()> {
        self.status.info("stopping persistent shell");
        lifecycle.cancel.store(true, Ordering::SeqCst);

        let process = self.lock_process()?.take();
        if let Some(process) = process {
            self.shutdown_process(process);
        }

        for (kind, handle) in lifecycle.readers.drain(..) {
            if !join_with_timeout(handle, self.config.join_timeout) {
                self.status.warn(format!(
                    "warning: {} reader did not terminate in time",
                    kind.label()
                ));
            }
        }

        let dropped = self.table.clear();
        if dropped > 0 {
            debug!(dropped, "Dropped busy commands on stop");
        }

        lifecycle.state.transition_to(SessionState::Stopped)?;
        self.status.info("persistent shell stopped");
        info!("Shell session stopped");
        Ok(())
    }

    fn shutdown_process(&self, mut process: Box<dyn ShellProcess>) {
        if process.has_exited().unwrap_or(false) {
            // Reap.
            let _ = process.wait();
            return;
        }
        let stages = Escalation::new(&self.config.exit_command, self.config.escalation_timeouts())
            .with_status_log(Arc::clone(&self.status))
            .run(process.as_mut());
        debug!(?stages, "Shell process shut down");
    }

    /// Undo a half-finished start. Leaves the session `Stopped`.
    fn abort_start(&self, lifecycle: &mut Lifecycle) {
        lifecycle.cancel.store(true, Ordering::SeqCst);
        if let Ok(mut slot) = self.process.lock() {
            if let Some(mut process) = slot.take() {
                let _ = process.kill();
                let _ = process.wait();
            }
        }
        for (_, handle) in lifecycle.readers.drain(..) {
            join_with_timeout(handle, self.config.join_timeout);
        }
        self.table.clear();
        lifecycle.state = SessionState::Stopped;
    }

    fn process_alive(&self) -> bool {
        self.process
            .lock()
            .ok()
            .and_then(|mut slot| slot.as_mut().map(|p| !p.has_exited().unwrap_or(true)))
            .unwrap_or(false)
    }

    fn lock_lifecycle(&self) -> Result<MutexGuard<'_, Lifecycle>> {
        self.lifecycle
            .lock()
            .map_err(|_| PipeShellError::LockPoisoned)
    }

    fn lock_process(&self) -> Result<MutexGuard<'_, Option<Box<dyn ShellProcess>>>> {
        self.process.lock().map_err(|_| PipeShellError::LockPoisoned)
    }
}

impl Default for ShellSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ShellSession {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "Failed to stop shell session on drop");
        }
    }
}

impl std::fmt::Debug for ShellSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellSession")
            .field("state", &self.state())
            .field("marker_base", &self.protocol.base())
            .field("busy", &self.table.len())
            .finish_non_exhaustive()
    }
}

/// Join a reader thread, giving up after `timeout`.
fn join_with_timeout(handle: JoinHandle<ReaderExit>, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(IDLE_POLL);
    }
    match handle.join() {
        Ok(exit) => debug!(?exit, "Reader joined"),
        Err(_) => warn!("Reader thread panicked"),
    }
    true
}
