//! Stream readers.
//!
//! Each output stream of the shell is drained by a dedicated OS thread.
//! Reads are blocking; a reader only wakes up when a line arrives or the
//! pipe closes, so there is no polling interval.

use std::io::{self, BufRead, BufReader, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, trace, warn};

use super::queue::{OutputKind, OutputSender, ShellOutputRecord};
use super::table::CommandTable;
use crate::marker::{LineClass, MarkerProtocol};
use crate::process::LivenessProbe;

/// Which output stream a reader drains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn label(&self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }

    fn output_kind(&self) -> OutputKind {
        match self {
            StreamKind::Stdout => OutputKind::StandardOutput,
            StreamKind::Stderr => OutputKind::StandardError,
        }
    }
}

/// State shared between the controller and both readers.
#[derive(Debug, Clone)]
pub struct ReaderShared {
    pub protocol: Arc<MarkerProtocol>,
    pub table: Arc<CommandTable>,
    pub output: OutputSender,
    pub cancel: Arc<AtomicBool>,
    pub liveness: LivenessProbe,
}

/// Why a reader loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderExit {
    Cancelled,
    EndOfStream,
    ReadError,
}

/// Line reader for one stream of the shell process.
pub struct StreamReader<R: Read + Send + 'static> {
    reader: R,
    kind: StreamKind,
    shared: ReaderShared,
}

impl<R: Read + Send + 'static> StreamReader<R> {
    pub fn new(reader: R, kind: StreamKind, shared: ReaderShared) -> Self {
        Self {
            reader,
            kind,
            shared,
        }
    }

    /// Run the loop on a named thread.
    pub fn spawn(self) -> io::Result<JoinHandle<ReaderExit>> {
        thread::Builder::new()
            .name(format!("pipe-shell-{}", self.kind.label()))
            .spawn(move || self.run())
    }

    /// Read lines until cancelled, end of stream, or a read error.
    pub fn run(self) -> ReaderExit {
        let kind = self.kind;
        let shared = self.shared;
        let mut reader = BufReader::new(self.reader);
        let mut buf = Vec::new();

        let exit = loop {
            if shared.cancel.load(Ordering::SeqCst) {
                break ReaderExit::Cancelled;
            }

            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => {
                    if shared.liveness.is_alive() {
                        debug!(stream = kind.label(), "Stream closed while shell is alive");
                    } else {
                        debug!(stream = kind.label(), "Shell process exited");
                    }
                    break ReaderExit::EndOfStream;
                }
                Ok(_) => {
                    // Output of a torn-down process is dropped.
                    if shared.cancel.load(Ordering::SeqCst) {
                        break ReaderExit::Cancelled;
                    }
                    let line = decode_line(&buf);
                    handle_line(kind, &shared, &line);
                }
                Err(e) => {
                    warn!(stream = kind.label(), error = %e, "Stream reader failed");
                    shared.output.push(ShellOutputRecord::error(format!(
                        "reader error ({}): {}",
                        kind.label(),
                        e
                    )));
                    break ReaderExit::ReadError;
                }
            }
        };

        // The table outlives this process; after cancellation the controller
        // owns clearing it. Otherwise, once stdout is closed or the process
        // is gone, no marker can retire the remaining commands.
        let cancelled = shared.cancel.load(Ordering::SeqCst);
        if !cancelled && (kind == StreamKind::Stdout || !shared.liveness.is_alive()) {
            let dropped = shared.table.clear();
            if dropped > 0 {
                debug!(stream = kind.label(), dropped, "Cleared busy commands");
            }
        }
        debug!(stream = kind.label(), ?exit, "Stream reader stopped");
        exit
    }
}

fn decode_line(buf: &[u8]) -> String {
    let mut line = String::from_utf8_lossy(buf).into_owned();
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    line
}

fn handle_line(kind: StreamKind, shared: &ReaderShared, line: &str) {
    let busy = shared.table.handles();
    match shared.protocol.classify(line, &busy) {
        LineClass::Completion { handle, output } => {
            // Output sharing the marker's line is queued before the retire.
            if let Some(output) = output {
                push(kind, shared, output);
            }
            let retired = shared.table.retire_through(&handle);
            if retired > 0 {
                debug!(stream = kind.label(), %handle, retired, "Command completed");
            }
        }
        LineClass::Stale { output } => {
            trace!(stream = kind.label(), "Dropped stale marker");
            if let Some(output) = output {
                push(kind, shared, output);
            }
        }
        LineClass::EchoArtifact => {
            trace!(stream = kind.label(), "Suppressed echo artifact");
        }
        LineClass::Output => push(kind, shared, line),
    }
}

fn push(kind: StreamKind, shared: &ReaderShared, data: impl Into<String>) {
    shared
        .output
        .push(ShellOutputRecord::new(kind.output_kind(), data));
}
