//! Output records and the queue they are buffered in.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Source of an output record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputKind {
    /// Line read from the shell's standard output.
    #[serde(rename = "stdout")]
    StandardOutput,
    /// Line read from the shell's standard error.
    #[serde(rename = "stderr")]
    StandardError,
    /// Command text as written to the shell's input.
    #[serde(rename = "stdin")]
    InputEcho,
    /// Failure inside a stream reader.
    #[serde(rename = "error")]
    Error,
}

impl OutputKind {
    /// Short label used when printing records.
    pub fn label(&self) -> &'static str {
        match self {
            OutputKind::StandardOutput => "stdout",
            OutputKind::StandardError => "stderr",
            OutputKind::InputEcho => "stdin",
            OutputKind::Error => "error",
        }
    }
}

/// One classified line of session output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellOutputRecord {
    /// Where the line came from.
    pub kind: OutputKind,
    /// Line text without its terminator.
    pub data: String,
}

impl ShellOutputRecord {
    /// Create a new record.
    pub fn new(kind: OutputKind, data: impl Into<String>) -> Self {
        Self {
            kind,
            data: data.into(),
        }
    }

    /// Create a stdout record.
    pub fn stdout(data: impl Into<String>) -> Self {
        Self::new(OutputKind::StandardOutput, data)
    }

    /// Create a stderr record.
    pub fn stderr(data: impl Into<String>) -> Self {
        Self::new(OutputKind::StandardError, data)
    }

    /// Create an input echo record.
    pub fn input(data: impl Into<String>) -> Self {
        Self::new(OutputKind::InputEcho, data)
    }

    /// Create an error record.
    pub fn error(data: impl Into<String>) -> Self {
        Self::new(OutputKind::Error, data)
    }
}

impl std::fmt::Display for ShellOutputRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind.label(), self.data)
    }
}

/// Ordered multi-producer, single-consumer buffer of output records.
///
/// Producers (the controller and both readers) hold cloned senders and
/// never block. The consumer drains everything pending in one call.
#[derive(Debug)]
pub struct OutputQueue {
    tx: mpsc::UnboundedSender<ShellOutputRecord>,
    rx: Mutex<mpsc::UnboundedReceiver<ShellOutputRecord>>,
}

impl OutputQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// A producer handle for a reader thread.
    pub fn sender(&self) -> OutputSender {
        OutputSender {
            tx: self.tx.clone(),
        }
    }

    /// Append a record.
    pub fn push(&self, record: ShellOutputRecord) {
        // The receiver lives as long as the queue, so this cannot fail.
        let _ = self.tx.send(record);
    }

    /// Remove and return every pending record, in queue order.
    pub fn drain(&self) -> Vec<ShellOutputRecord> {
        let mut rx = self.rx.lock().unwrap_or_else(|e| e.into_inner());
        let mut records = Vec::new();
        while let Ok(record) = rx.try_recv() {
            records.push(record);
        }
        records
    }

    /// Discard every pending record, returning how many were dropped.
    pub fn clear(&self) -> usize {
        self.drain().len()
    }
}

impl Default for OutputQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable producer side of an [`OutputQueue`].
#[derive(Debug, Clone)]
pub struct OutputSender {
    tx: mpsc::UnboundedSender<ShellOutputRecord>,
}

impl OutputSender {
    /// Append a record. Returns `false` if the queue has been dropped.
    pub fn push(&self, record: ShellOutputRecord) -> bool {
        self.tx.send(record).is_ok()
    }
}
