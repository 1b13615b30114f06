// Layer 1: Standard library imports
use std::fmt;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
// (none)

/// Which message gives way when a bounded buffer is at capacity.
///
/// The buffer stays within its configured capacity in all three cases; the
/// policy only decides *which* message is sacrificed.
///
/// # Example
/// ```rust
/// use stage_rt::mailbox::DropPolicy;
///
/// assert_eq!(DropPolicy::default(), DropPolicy::Oldest);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DropPolicy {
    /// Evict the head (oldest buffered message) to make room.
    ///
    /// Favours fresh data; the default for mailboxes and relay buffers.
    #[default]
    Oldest,

    /// Evict the most recently buffered message to make room.
    Newest,

    /// Reject the incoming message silently and keep the buffer intact.
    Incoming,
}

impl fmt::Display for DropPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Oldest => write!(f, "oldest"),
            Self::Newest => write!(f, "newest"),
            Self::Incoming => write!(f, "incoming"),
        }
    }
}
