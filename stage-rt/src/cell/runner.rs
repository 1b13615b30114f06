//! The supervised loop driving one actor.

// Layer 1: Standard library imports
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};

// Layer 2: Third-party crate imports
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

// Layer 3: Internal module imports
use super::lifecycle::CellState;
use crate::actor::error::DispatchError;
use crate::actor::media::{BecomeSlot, Media};
use crate::actor::traits::BoxActor;
use crate::mailbox::Mailbox;
use crate::stage::core::StageInner;
use crate::util::Identity;

/// Stage-side grip on a running cell.
pub(crate) struct CellHandle {
    pub(crate) cancel: CancellationToken,
    pub(crate) join: JoinHandle<()>,
    pub(crate) state: Arc<Mutex<CellState>>,
}

/// Start the supervisor task for one cell.
///
/// The task runs the zero-state initializer, reports readiness through
/// `ready`, then pulls messages until its token is cancelled or the mailbox
/// closes. At most one handler is on the stack at any time; a panicking
/// handler is contained, logged, and costs only the message that caused it.
pub(crate) fn spawn_cell(
    pid: Identity,
    actor: BoxActor,
    mailbox: Mailbox,
    stage: Weak<StageInner>,
    cancel: CancellationToken,
    ready: oneshot::Sender<Result<(), DispatchError>>,
) -> CellHandle {
    let state = Arc::new(Mutex::new(CellState::InitPending));
    let join = tokio::spawn(run_cell(
        pid,
        actor,
        mailbox,
        stage,
        cancel.clone(),
        ready,
        Arc::clone(&state),
    ));
    CellHandle {
        cancel,
        join,
        state,
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_cell(
    pid: Identity,
    mut actor: BoxActor,
    mut mailbox: Mailbox,
    stage: Weak<StageInner>,
    cancel: CancellationToken,
    ready: oneshot::Sender<Result<(), DispatchError>>,
    state: Arc<Mutex<CellState>>,
) {
    if let Err(err) = actor.zero().await {
        *state.lock() = CellState::Terminated;
        mailbox.close();
        let _ = ready.send(Err(err));
        return;
    }
    *state.lock() = CellState::Running;
    let _ = ready.send(Ok(()));
    trace!(pid = %pid, "cell running");

    let swap: BecomeSlot = Arc::new(Mutex::new(None));
    let media = Media::new(pid.clone(), Weak::clone(&stage), Arc::clone(&swap));

    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => break,
            next = mailbox.next() => match next {
                Ok(msg) => msg,
                Err(_) => break,
            },
        };

        // Panic barrier: a crashing handler costs exactly this message.
        let invocation = AssertUnwindSafe(actor.dispatch(&msg, &media)).catch_unwind();
        match invocation.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                debug!(pid = %pid, method = %msg.method, error = %err,
                    "dispatch failed; message dropped");
            }
            Err(panic) => {
                error!(pid = %pid, method = %msg.method, panic = %panic_text(panic.as_ref()),
                    "handler panicked; message dropped");
            }
        }

        if let Some(next_actor) = media.take_replacement() {
            trace!(pid = %pid, "cell became a new actor instance");
            actor = next_actor;
        }
    }

    *state.lock() = CellState::Draining;
    mailbox.close();
    if let Some(snapshot) = actor.hibernate() {
        trace!(pid = %pid, bytes = snapshot.len(), "hibernate snapshot discarded");
    }
    if let Some(inner) = stage.upgrade() {
        inner.forget(&pid);
    }
    *state.lock() = CellState::Terminated;
    trace!(pid = %pid, "cell terminated");
}

fn panic_text(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "opaque panic payload".to_string()
    }
}
