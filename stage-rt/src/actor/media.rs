//! The media handle: an actor's only outbound channel.

// Layer 1: Standard library imports
use std::sync::{Arc, Weak};

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use serde::Serialize;

// Layer 3: Internal module imports
use super::traits::{Actor, BoxActor};
use crate::message::Message;
use crate::stage::core::StageInner;
use crate::stage::errors::StageError;
use crate::util::Identity;

/// Slot inspected by the cell after every handler returns; a handler that
/// wants to *become* a different actor parks the replacement here.
pub(crate) type BecomeSlot = Arc<Mutex<Option<BoxActor>>>;

/// Capability handle letting a handler send messages as its cell.
///
/// Every handler invocation receives a media handle scoped to the cell: its
/// sends carry the cell's pid as the sender, and its lifetime is bounded by
/// the cell's. The handle holds only a weak reference back to the stage, so
/// a cell outliving its stage degrades to failed sends instead of keeping
/// the dispatch plane alive.
pub struct Media {
    id: Identity,
    stage: Weak<StageInner>,
    swap: BecomeSlot,
}

impl Media {
    pub(crate) fn new(id: Identity, stage: Weak<StageInner>, swap: BecomeSlot) -> Self {
        Self { id, stage, swap }
    }

    /// Identity this handle sends as.
    pub fn identity(&self) -> &Identity {
        &self.id
    }

    /// Encode `data` as JSON and send it to `to` under `method`.
    ///
    /// Encoding failures surface to the caller; routing follows the stage's
    /// dispatch algorithm (local mailbox first, upstream otherwise).
    pub async fn send<T: Serialize + ?Sized>(
        &self,
        to: &Identity,
        method: &str,
        data: &T,
    ) -> Result<(), StageError> {
        let content = serde_json::to_vec(data).map_err(StageError::Encode)?;
        self.send_message(Message::new(
            self.id.clone(),
            to.clone(),
            method,
            content,
        ))
        .await
    }

    /// Send a pre-assembled message; the sender is forced to this handle's
    /// identity.
    pub async fn send_message(&self, mut msg: Message) -> Result<(), StageError> {
        msg.from = self.id.clone();
        let stage = self.stage.upgrade().ok_or(StageError::StageShutdown)?;
        stage.deliver(msg).await
    }

    /// Replace this cell's actor instance before the next message.
    ///
    /// The swap happens after the current handler returns, so the running
    /// invocation completes on the old instance.
    pub fn become_next(&self, next: impl Actor) {
        *self.swap.lock() = Some(Box::new(next));
    }

    pub(crate) fn take_replacement(&self) -> Option<BoxActor> {
        self.swap.lock().take()
    }

    /// Handle wired to nothing; sends fail with stage-shutdown.
    #[cfg(test)]
    pub(crate) fn detached(id: Identity) -> Self {
        Self {
            id,
            stage: Weak::new(),
            swap: Arc::new(Mutex::new(None)),
        }
    }
}
