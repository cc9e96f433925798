//! Command table: the set of commands still waiting for their marker.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use super::CommandHandle;

/// Bookkeeping for one busy command.
#[derive(Debug, Clone)]
pub struct PendingCommand {
    /// The command text as submitted (before rewriting).
    pub command: String,
    /// Time the command was written to the shell.
    pub issued_at: Instant,
}

impl PendingCommand {
    fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            issued_at: Instant::now(),
        }
    }

    /// Time spent waiting for the completion marker so far.
    pub fn elapsed(&self) -> Duration {
        self.issued_at.elapsed()
    }
}

/// Thread-safe mapping of busy command handles.
///
/// Presence in the table means the command is busy. The controller inserts
/// on issuance; the stream readers retire entries when they observe the
/// completion marker. Callers never take a lock themselves.
#[derive(Debug, Default)]
pub struct CommandTable {
    commands: RwLock<HashMap<CommandHandle, PendingCommand>>,
}

impl CommandTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a command as busy.
    pub fn mark_busy(&self, handle: CommandHandle, command: impl Into<String>) {
        let mut commands = self.commands.write().unwrap_or_else(|e| e.into_inner());
        commands.insert(handle, PendingCommand::new(command));
    }

    /// Retire a command.
    ///
    /// Returns `true` only for the call that actually removed the entry,
    /// so concurrent readers observing the same marker retire it once.
    pub fn retire(&self, handle: &CommandHandle) -> bool {
        let mut commands = self.commands.write().unwrap_or_else(|e| e.into_inner());
        commands.remove(handle).is_some()
    }

    /// Retire `handle` together with every busy command issued before it.
    ///
    /// The shell runs commands in order, so one marker also proves the
    /// earlier commands are finished, including any whose own marker never
    /// printed (a line the shell rejected as a syntax error, for example).
    /// Returns the number of entries removed; zero if `handle` was not busy.
    pub fn retire_through(&self, handle: &CommandHandle) -> usize {
        let mut commands = self.commands.write().unwrap_or_else(|e| e.into_inner());
        if !commands.contains_key(handle) {
            return 0;
        }
        let before = commands.len();
        let last = handle.sequence();
        commands.retain(|h, _| h.sequence() > last);
        before - commands.len()
    }

    /// Check if a specific command is busy.
    pub fn contains(&self, handle: &CommandHandle) -> bool {
        self.commands
            .read()
            .map(|c| c.contains_key(handle))
            .unwrap_or(false)
    }

    /// Get the bookkeeping entry of a busy command.
    pub fn get(&self, handle: &CommandHandle) -> Option<PendingCommand> {
        self.commands
            .read()
            .ok()
            .and_then(|c| c.get(handle).cloned())
    }

    /// Number of busy commands.
    pub fn len(&self) -> usize {
        self.commands.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Whether no command is busy.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the busy handles, oldest first.
    pub fn handles(&self) -> Vec<CommandHandle> {
        let Ok(commands) = self.commands.read() else {
            return Vec::new();
        };
        let mut entries: Vec<_> = commands.iter().collect();
        entries.sort_by_key(|(handle, _)| handle.sequence());
        entries.into_iter().map(|(h, _)| h.clone()).collect()
    }

    /// Remove every entry, returning how many were dropped.
    pub fn clear(&self) -> usize {
        let mut commands = self.commands.write().unwrap_or_else(|e| e.into_inner());
        let count = commands.len();
        commands.clear();
        count
    }
}
