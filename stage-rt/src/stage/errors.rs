//! Stage-level error types.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::actor::error::DispatchError;
use crate::upstream::traits::UpstreamError;
use crate::util::Identity;

/// Errors surfaced by the stage's public operations.
#[derive(Error, Debug)]
pub enum StageError {
    /// A zero identity was passed where a pid was required.
    #[error("a non-empty destination identity is required")]
    EmptyIdentity,

    /// The destination is not local and no upstream is configured.
    #[error("no mailbox for {0} and no upstream configured")]
    NoSuchMailbox(Identity),

    /// The stage is closing or closed.
    #[error("stage is shut down")]
    StageShutdown,

    /// A request's time-to-live elapsed before a reply arrived.
    #[error("request deadline exceeded")]
    DeadlineExceeded,

    /// The outgoing payload could not be encoded.
    #[error("payload encoding failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The reply payload could not be decoded into the requested type.
    #[error("reply decoding failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The actor's zero-state initializer failed during spawn.
    #[error("actor failed to initialize: {0}")]
    SpawnFailed(#[source] DispatchError),

    /// The upstream session failed.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl StageError {
    /// True for errors that mean the stage will accept no further work.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::StageShutdown)
    }
}

// Lets handlers propagate send failures with `?`.
impl From<StageError> for DispatchError {
    fn from(err: StageError) -> Self {
        DispatchError::Handler(err.to_string())
    }
}
