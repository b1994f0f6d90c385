//! Transaction modes and lifecycle states

use std::fmt;

/// How a transaction may touch the store set it declared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Reads only; completion needs no commit barrier
    ReadOnly,
    /// Reads and writes within the declared scope
    ReadWrite,
    /// Structural changes to stores and indexes; at most one at a time
    SchemaChange,
}

impl Mode {
    /// Whether the mode permits writes
    pub fn is_write(&self) -> bool {
        !matches!(self, Mode::ReadOnly)
    }

    /// Returns the mode name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::ReadOnly => "read-only",
            Mode::ReadWrite => "read-write",
            Mode::SchemaChange => "schema-change",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse lifecycle of a transaction, for observability.
///
/// Deliberately separate from the `active` placement window: a
/// transaction in `Running` may have `active` lowered between request
/// callbacks, and a handler running during event dispatch sees `active`
/// raised again without the lifecycle moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Created; the queue has not started draining yet
    Active,
    /// The queue is draining against an open session
    Running,
    /// Every queued request has settled; completion is in flight
    RequestsFinished,
    /// A failure was recorded; rollback is in flight
    Errored,
    /// Terminal: committed
    Completed,
    /// Terminal: rolled back
    Aborted,
}
