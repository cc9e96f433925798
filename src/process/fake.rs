//! Scriptable in-memory shell process for unit tests.

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use super::{ProcessSpawner, ShellCommand, ShellProcess, SpawnedProcess};
use crate::marker::SEPARATOR;

type Chunk = io::Result<Vec<u8>>;

/// Blocking reader fed through a channel; end-of-file once the sender drops.
pub struct ChannelReader {
    rx: mpsc::Receiver<Chunk>,
    pending: Vec<u8>,
    pos: usize,
}

impl ChannelReader {
    fn new(rx: mpsc::Receiver<Chunk>) -> Self {
        Self {
            rx,
            pending: Vec::new(),
            pos: 0,
        }
    }
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.pending.len() {
            match self.rx.recv() {
                Ok(Ok(bytes)) => {
                    self.pending = bytes;
                    self.pos = 0;
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len() - self.pos);
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// How a fake process reacts to input and shutdown requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct FakeBehavior {
    /// Interpret `echo` segments of written lines like a shell would.
    pub echo_commands: bool,
    pub ignores_exit: bool,
    pub ignores_terminate: bool,
    pub terminate_fails: bool,
    pub stdin_broken: bool,
    pub stdin_fails: bool,
}

impl FakeBehavior {
    /// A cooperative process that runs `echo` and honours `exit`.
    pub fn shell_like() -> Self {
        Self {
            echo_commands: true,
            ..Self::default()
        }
    }
}

/// Shared, inspectable state of a [`FakeProcess`].
#[derive(Debug, Default)]
pub struct FakeState {
    exited: AtomicBool,
    pub stdin_closed: AtomicBool,
    pub written: Mutex<Vec<String>>,
    pub terminate_calls: AtomicU32,
    pub kill_calls: AtomicU32,
    stdout_tx: Mutex<Option<mpsc::Sender<Chunk>>>,
    stderr_tx: Mutex<Option<mpsc::Sender<Chunk>>>,
}

impl FakeState {
    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    /// Mark the process dead and close both output streams.
    pub fn mark_exited(&self) {
        self.exited.store(true, Ordering::SeqCst);
        self.stdout_tx.lock().unwrap().take();
        self.stderr_tx.lock().unwrap().take();
    }

    pub fn emit_stdout(&self, line: &str) {
        send(&self.stdout_tx, Ok(format!("{}\n", line).into_bytes()));
    }

    pub fn emit_stderr(&self, line: &str) {
        send(&self.stderr_tx, Ok(format!("{}\n", line).into_bytes()));
    }

    /// Close stderr while the process keeps running.
    pub fn close_stderr(&self) {
        self.stderr_tx.lock().unwrap().take();
    }

    /// Make the next stdout read fail.
    pub fn fail_stdout(&self, message: &str) {
        send(&self.stdout_tx, Err(io::Error::other(message.to_string())));
    }

    pub fn written(&self) -> Vec<String> {
        self.written.lock().unwrap().clone()
    }
}

fn send(tx: &Mutex<Option<mpsc::Sender<Chunk>>>, chunk: Chunk) {
    if let Some(tx) = tx.lock().unwrap().as_ref() {
        let _ = tx.send(chunk);
    }
}

pub struct FakeProcess {
    pub state: Arc<FakeState>,
    pub behavior: FakeBehavior,
    pub exit_command: String,
}

impl FakeProcess {
    pub fn new(behavior: FakeBehavior) -> Self {
        Self {
            state: Arc::new(FakeState::default()),
            behavior,
            exit_command: "exit".to_string(),
        }
    }

    /// Create a process along with readers for its two output streams.
    pub fn with_streams(behavior: FakeBehavior) -> (Self, ChannelReader, ChannelReader) {
        let process = Self::new(behavior);
        let (out_tx, out_rx) = mpsc::channel();
        let (err_tx, err_rx) = mpsc::channel();
        *process.state.stdout_tx.lock().unwrap() = Some(out_tx);
        *process.state.stderr_tx.lock().unwrap() = Some(err_tx);
        (process, ChannelReader::new(out_rx), ChannelReader::new(err_rx))
    }

    fn interpret(&self, line: &str) {
        let separator = format!(" {} ", SEPARATOR);
        for segment in line.split(separator.as_str()) {
            let segment = segment.trim();
            if let Some(text) = segment.strip_prefix("echo ") {
                self.state.emit_stdout(text);
            } else if segment == "fail" {
                self.state.emit_stderr("fail: command not found");
            }
        }
    }
}

impl ShellProcess for FakeProcess {
    fn id(&self) -> Option<u32> {
        Some(4242)
    }

    fn has_exited(&mut self) -> io::Result<bool> {
        Ok(self.state.has_exited())
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        if self.behavior.stdin_broken {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
        }
        if self.behavior.stdin_fails {
            return Err(io::Error::other("device busy"));
        }
        self.state.written.lock().unwrap().push(line.to_string());

        let line = line.trim_end();
        if line == self.exit_command {
            if !self.behavior.ignores_exit {
                self.state.mark_exited();
            }
        } else if self.behavior.echo_commands {
            self.interpret(line);
        }
        Ok(())
    }

    fn close_stdin(&mut self) {
        self.state.stdin_closed.store(true, Ordering::SeqCst);
    }

    fn terminate(&mut self) -> io::Result<()> {
        self.state.terminate_calls.fetch_add(1, Ordering::SeqCst);
        if self.behavior.terminate_fails {
            return Err(io::Error::other("terminate refused"));
        }
        if !self.behavior.ignores_terminate {
            self.state.mark_exited();
        }
        Ok(())
    }

    fn kill(&mut self) -> io::Result<()> {
        self.state.kill_calls.fetch_add(1, Ordering::SeqCst);
        self.state.mark_exited();
        Ok(())
    }

    fn wait_timeout(&mut self, _timeout: Duration) -> io::Result<bool> {
        Ok(self.state.has_exited())
    }

    fn wait(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Spawner handing out fake processes and remembering their state.
#[derive(Default)]
pub struct FakeSpawner {
    pub behavior: FakeBehavior,
    pub fail: bool,
    spawned: Mutex<Vec<Arc<FakeState>>>,
}

impl FakeSpawner {
    pub fn new(behavior: FakeBehavior) -> Self {
        Self {
            behavior,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn spawn_count(&self) -> usize {
        self.spawned.lock().unwrap().len()
    }

    /// State of the most recently spawned process.
    pub fn last(&self) -> Arc<FakeState> {
        Arc::clone(self.spawned.lock().unwrap().last().expect("nothing spawned"))
    }
}

impl ProcessSpawner for FakeSpawner {
    fn spawn(&self, command: &ShellCommand) -> io::Result<SpawnedProcess> {
        if self.fail {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: not found", command.program),
            ));
        }
        let (process, stdout, stderr) = FakeProcess::with_streams(self.behavior);
        self.spawned
            .lock()
            .unwrap()
            .push(Arc::clone(&process.state));
        Ok(SpawnedProcess {
            process: Box::new(process),
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
        })
    }
}
