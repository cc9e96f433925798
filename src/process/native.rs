//! Native shell processes on top of `std::process` pipes.

use std::collections::HashMap;
use std::io::{self, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use super::{ProcessSpawner, ShellCommand, ShellProcess, SpawnedProcess};

const WAIT_POLL: Duration = Duration::from_millis(20);

/// Get the default interpreter for the current platform.
pub fn default_shell() -> &'static str {
    #[cfg(unix)]
    {
        "/bin/sh"
    }
    #[cfg(windows)]
    {
        "cmd.exe"
    }
}

/// Default arguments for [`default_shell`].
///
/// On Unix the shell runs interactively so a syntax error does not end
/// it, with job control off so it never reaches for a terminal.
pub fn default_shell_args() -> Vec<String> {
    #[cfg(unix)]
    {
        vec!["-i".to_string(), "+m".to_string()]
    }
    #[cfg(windows)]
    {
        Vec::new()
    }
}

/// Default environment for [`default_shell`]: empty prompts, so an
/// interactive shell prints nothing of its own on stderr.
pub fn default_shell_env() -> HashMap<String, String> {
    let mut env = HashMap::new();
    #[cfg(unix)]
    {
        env.insert("PS1".to_string(), String::new());
        env.insert("PS2".to_string(), String::new());
    }
    env
}

/// A child process whose standard streams are pipes.
pub struct PipedProcess {
    child: Child,
    stdin: Option<ChildStdin>,
}

impl PipedProcess {
    fn new(mut child: Child) -> Self {
        let stdin = child.stdin.take();
        Self { child, stdin }
    }

    #[cfg(unix)]
    fn signal(&self, signal: i32) -> io::Result<()> {
        let pid = self.child.id() as libc::pid_t;
        // SAFETY: kill(2) has no memory-safety preconditions.
        let result = unsafe { libc::kill(pid, signal) };
        if result == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        // Already gone.
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Ok(());
        }
        Err(err)
    }
}

impl ShellProcess for PipedProcess {
    fn id(&self) -> Option<u32> {
        Some(self.child.id())
    }

    fn has_exited(&mut self) -> io::Result<bool> {
        Ok(self.child.try_wait()?.is_some())
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "stdin is closed"))?;
        stdin.write_all(line.as_bytes())?;
        stdin.flush()
    }

    fn close_stdin(&mut self) {
        self.stdin.take();
    }

    fn terminate(&mut self) -> io::Result<()> {
        // Once reaped, the pid may belong to another process.
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }
        // Interactive shells ignore SIGTERM but exit on SIGHUP.
        #[cfg(unix)]
        {
            self.signal(libc::SIGHUP)
        }
        #[cfg(not(unix))]
        {
            self.child.kill()
        }
    }

    fn kill(&mut self) -> io::Result<()> {
        match self.child.kill() {
            // Already reaped.
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            other => other,
        }
    }

    fn wait_timeout(&mut self, timeout: Duration) -> io::Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.child.try_wait()?.is_some() {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            thread::sleep(WAIT_POLL);
        }
    }

    fn wait(&mut self) -> io::Result<()> {
        self.child.wait().map(|_| ())
    }
}

/// Spawns real interpreter processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeSpawner;

impl NativeSpawner {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessSpawner for NativeSpawner {
    fn spawn(&self, command: &ShellCommand) -> io::Result<SpawnedProcess> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(&command.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        let mut child = cmd.spawn()?;
        debug!(program = %command.program, pid = child.id(), "Spawned shell process");

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("stdout was not piped"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("stderr was not piped"))?;

        Ok(SpawnedProcess {
            process: Box::new(PipedProcess::new(child)),
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
        })
    }
}
