// Layer 1: Standard library imports
use std::fmt;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
// (none)

/// Where a cell is in its life.
///
/// `InitPending → Running → Draining → Terminated`; any state moves to
/// `Draining` when the cell's token is cancelled or its mailbox closes, and
/// `Draining` becomes `Terminated` once the in-flight handler (if any) has
/// returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    /// Zero-state initializer has not finished yet.
    InitPending,
    /// Pulling and dispatching messages.
    Running,
    /// Shutdown requested; finishing the current handler.
    Draining,
    /// Supervisor task has exited.
    Terminated,
}

impl fmt::Display for CellState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitPending => write!(f, "init-pending"),
            Self::Running => write!(f, "running"),
            Self::Draining => write!(f, "draining"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}
