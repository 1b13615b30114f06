// Layer 1: Standard library imports
use std::fmt::Display;

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
// (none)

/// Failures raised while resolving or running one handler invocation.
///
/// Dispatch errors never escape the cell: they are logged, the offending
/// message is dropped, and the cell moves on to the next message.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The destination actor exposes no operation under this name.
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// The message carried an empty method name.
    #[error("message carries an empty method name")]
    InvalidMethod,

    /// The payload could not be decoded into the operation's request type.
    #[error("payload decoding failed: {0}")]
    Decode(#[from] serde_json::Error),

    /// The handler itself reported a failure.
    #[error("{0}")]
    Handler(String),
}

impl DispatchError {
    /// Wrap an application-level failure.
    pub fn handler(cause: impl Display) -> Self {
        Self::Handler(cause.to_string())
    }
}
