//! Upstream client contract.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use thiserror::Error;

// Layer 3: Internal module imports
use crate::message::Message;
use crate::util::Identity;

/// Client session against one upstream relay.
///
/// A stage configured with an upstream adopts the session's stage-id for its
/// generated pids and drives two pumps over it: an outbound flusher calling
/// [`proxy`](Upstream::proxy) and an inbound poller calling
/// [`fetch`](Upstream::fetch). The relay trusts the stage-id as an opaque
/// routing key.
///
/// Implementations: the TCP client in `stage-upstream`, and in-memory fakes
/// for tests.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Stage-id this session routes as.
    fn id(&self) -> &str;

    /// Bind each pid to this session's stage-id on the relay.
    ///
    /// Re-registration by another stage overwrites (last-writer-wins).
    async fn register_pids(&self, pids: &[Identity]) -> Result<(), UpstreamError>;

    /// Submit outbound messages; returns how many the relay accepted.
    ///
    /// Messages whose destination pid is unmapped are dropped by the relay
    /// and excluded from the count. Enqueue order matches call order.
    async fn proxy(&self, messages: Vec<Message>) -> Result<u32, UpstreamError>;

    /// Drain up to `max` messages destined for this stage (0 = server max).
    async fn fetch(&self, max: u32) -> Result<Vec<Message>, UpstreamError>;

    /// Tear the session down. Idempotent.
    async fn close(&self) -> Result<(), UpstreamError>;
}

/// Failures of the upstream session.
///
/// All variants are treated as transient by the stage's pumps, which back
/// off and retry until cancelled.
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// The RPC could not be completed (transport or relay failure).
    #[error("upstream rpc failed: {0}")]
    Rpc(String),

    /// The session is closed and will not recover.
    #[error("upstream session closed")]
    Closed,

    /// The call reached the relay without a stage-id.
    #[error("call is missing a stage id")]
    MissingStageId,
}
