//! Completion marker protocol.
//!
//! The shell gives no structured signal when a command finishes. Every
//! command is therefore rewritten to echo a unique token once it is done:
//!
//! ```text
//! <command> ; echo __PIPE_SHELL_DONE_<base>_<seq>__
//! ```
//!
//! The stream readers watch for a line ending in that token. Output a
//! command prints without a final newline precedes the token on the same
//! line and is kept; a token anywhere else in a line is plain output.
//!
//! # Example
//!
//! ```
//! use pipe_shell::marker::{LineClass, MarkerProtocol};
//!
//! let protocol = MarkerProtocol::new();
//! let handle = protocol.mint();
//! let line = protocol.rewrite("echo hello", &handle);
//! assert!(line.starts_with("echo hello"));
//!
//! let busy = [handle.clone()];
//! assert_eq!(
//!     protocol.classify(handle.as_str(), &busy),
//!     LineClass::Completion { handle: handle.clone(), output: None }
//! );
//! assert_eq!(protocol.classify("hello", &busy), LineClass::Output);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use crate::session::handle::TOKEN_PREFIX;
use crate::session::CommandHandle;

/// Operator chaining the completion echo after the command.
#[cfg(unix)]
pub const SEPARATOR: &str = ";";

/// Operator chaining the completion echo after the command.
#[cfg(windows)]
pub const SEPARATOR: &str = "&";

/// Terminator appended to every line written to the shell.
#[cfg(unix)]
pub const LINE_TERMINATOR: &str = "\n";

/// Terminator appended to every line written to the shell.
#[cfg(windows)]
pub const LINE_TERMINATOR: &str = "\r\n";

/// How a reader should treat one line of output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineClass {
    /// The line ends with the completion token of a busy command.
    ///
    /// `output` holds whatever the command printed without a final
    /// newline, which the echoed token lands behind.
    Completion {
        handle: CommandHandle,
        output: Option<String>,
    },
    /// The line ends with a token of this session that is no longer busy.
    Stale { output: Option<String> },
    /// The line is the shell echoing the injected command back.
    EchoArtifact,
    /// Ordinary command output.
    Output,
}

/// Session-scoped token generator and line classifier.
#[derive(Debug)]
pub struct MarkerProtocol {
    base: String,
    echo_fragment: String,
    next_seq: AtomicU64,
}

impl MarkerProtocol {
    /// Create a protocol with a fresh random marker base.
    pub fn new() -> Self {
        Self::with_base(Uuid::new_v4().simple().to_string())
    }

    /// Create a protocol with a fixed marker base.
    ///
    /// The base must be non-empty ASCII alphanumeric text.
    pub fn with_base(base: impl Into<String>) -> Self {
        let base = base.into();
        let echo_fragment = format!("echo {TOKEN_PREFIX}{base}_");
        Self {
            base,
            echo_fragment,
            next_seq: AtomicU64::new(1),
        }
    }

    /// The session's marker base.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Number of handles minted so far.
    pub fn issued(&self) -> u64 {
        self.next_seq.load(Ordering::Relaxed) - 1
    }

    /// Mint the handle for a newly issued command.
    pub fn mint(&self) -> CommandHandle {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        CommandHandle::new(&self.base, seq)
    }

    /// Rewrite a command so the shell echoes `handle` after running it.
    ///
    /// The line terminator is not included.
    pub fn rewrite(&self, command: &str, handle: &CommandHandle) -> String {
        let command = command.trim_end();
        if needs_separator(command) {
            format!("{} {} echo {}", command, SEPARATOR, handle)
        } else if command.is_empty() {
            format!("echo {}", handle)
        } else {
            format!("{} echo {}", command, handle)
        }
    }

    /// Whether `line` is a completion token minted by this session.
    pub fn is_session_token(&self, line: &str) -> bool {
        line.trim()
            .parse::<CommandHandle>()
            .map(|h| h.marker_base() == self.base)
            .unwrap_or(false)
    }

    /// Whether `line` contains the injected echo fragment.
    pub fn is_echo_artifact(&self, line: &str) -> bool {
        line.contains(&self.echo_fragment)
    }

    /// Classify one output line against the currently busy handles.
    ///
    /// A token only counts at the end of a line; one in the middle of a
    /// line is command output.
    pub fn classify<'a, I>(&self, line: &str, busy: I) -> LineClass
    where
        I: IntoIterator<Item = &'a CommandHandle>,
    {
        if self.is_echo_artifact(line) {
            return LineClass::EchoArtifact;
        }
        let Some((prefix, token)) = self.trailing_token(line.trim_end()) else {
            return LineClass::Output;
        };

        let output = (!prefix.trim().is_empty()).then(|| prefix.to_string());
        match busy.into_iter().find(|h| **h == token) {
            Some(handle) => LineClass::Completion {
                handle: handle.clone(),
                output,
            },
            None => LineClass::Stale { output },
        }
    }

    /// Split a session token off the end of `line`.
    fn trailing_token<'l>(&self, line: &'l str) -> Option<(&'l str, CommandHandle)> {
        let start = line.rfind(TOKEN_PREFIX)?;
        let (prefix, token) = line.split_at(start);
        let handle: CommandHandle = token.parse().ok()?;
        (handle.marker_base() == self.base).then_some((prefix, handle))
    }
}

impl Default for MarkerProtocol {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether the echo must be joined to `command` with [`SEPARATOR`].
///
/// An empty command, or one already ending in a POSIX list terminator,
/// takes the echo directly.
fn needs_separator(command: &str) -> bool {
    if command.is_empty() {
        return false;
    }
    #[cfg(unix)]
    {
        let ends_with_terminator =
            command.ends_with(';') || (command.ends_with('&') && !command.ends_with("&&"));
        !ends_with_terminator
    }
    #[cfg(not(unix))]
    {
        true
    }
}
