// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use stage_rt::Message;

/// One request frame.
///
/// The stage-id travels out of band from the operation itself: the relay
/// trusts it as an opaque routing key and rejects calls without one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    /// Session identity of the calling stage.
    pub stage_id: String,
    /// The requested operation.
    pub op: Op,
}

/// The three relay operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    /// Bind each pid to the caller's stage-id (last-writer-wins).
    RegisterPids { pids: Vec<String> },
    /// Enqueue messages into their destination stages' buffers.
    Proxy { messages: Vec<Message> },
    /// Drain up to `max_size` messages from the caller's buffer
    /// (0 means "server maximum").
    Fetch { max_size: u32 },
}

/// One response frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    /// Registration applied.
    Registered,
    /// `total` messages were accepted into destination buffers.
    Proxied { total: u32 },
    /// Messages drained for the calling stage.
    Batch { messages: Vec<Message> },
    /// The call failed; the message is human-readable.
    Error { message: String },
}
