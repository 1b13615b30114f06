// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
// (none)

/// Terminal mailbox conditions seen by the consumer side.
///
/// Producers never observe an error: a push to a closed mailbox is silently
/// dropped so that shutdown races in senders resolve without ceremony.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxError {
    /// The mailbox was closed; no further messages will arrive.
    #[error("closed mailbox")]
    Closed,
}
