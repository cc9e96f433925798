//! Persistent shell sessions.
//!
//! A [`ShellSession`] owns one interpreter process, the two threads that
//! drain its output, the table of commands still waiting for their
//! completion marker, and the queue that output is buffered in.

mod controller;
pub mod handle;
pub mod queue;
pub mod reader;
mod state;
pub mod table;

pub use controller::{SessionConfig, ShellSession};
pub use handle::CommandHandle;
pub use queue::{OutputKind, OutputQueue, ShellOutputRecord};
pub use state::SessionState;
pub use table::{CommandTable, PendingCommand};
