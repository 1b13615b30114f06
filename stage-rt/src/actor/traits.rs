//! The Actor trait every stage inhabitant implements.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use async_trait::async_trait;

// Layer 3: Internal module imports
use super::error::DispatchError;
use super::media::Media;
use crate::message::Message;

/// A long-lived, independently addressable process hosted by a stage.
///
/// The cell owns the instance exclusively: no two handler invocations of the
/// same actor ever overlap, so `&mut self` is safe without further locking.
/// Actors are boxed so a cell can swap its instance at runtime (the *become*
/// directive on [`Media`]).
///
/// # Lifecycle
///
/// - [`zero`](Actor::zero): optional zero-state initializer, run once before
///   the first message. Failure is fatal to the cell and surfaces to spawn.
/// - [`dispatch`](Actor::dispatch): required message entry point, usually a
///   one-liner delegating to a [`MethodTable`](super::MethodTable).
/// - [`hibernate`](Actor::hibernate): optional snapshot on shutdown. The
///   core does not persist it; the hook exists so embedders can.
///
/// # Example
///
/// ```ignore
/// struct Counter { count: u64 }
///
/// #[async_trait]
/// impl Actor for Counter {
///     async fn dispatch(&mut self, msg: &Message, media: &Media) -> Result<(), DispatchError> {
///         COUNTER_ROUTES.dispatch(self, msg, media).await
///     }
/// }
/// ```
#[async_trait]
pub trait Actor: Send + 'static {
    /// Initialize zero state before the first message arrives.
    async fn zero(&mut self) -> Result<(), DispatchError> {
        Ok(())
    }

    /// Handle one message. Invoked serially per cell.
    async fn dispatch(&mut self, msg: &Message, media: &Media) -> Result<(), DispatchError>;

    /// Produce a state snapshot as the cell shuts down (hook only).
    fn hibernate(&self) -> Option<Vec<u8>> {
        None
    }
}

/// Owned, swappable actor instance as held by a cell.
pub type BoxActor = Box<dyn Actor>;
