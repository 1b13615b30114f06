//! The stage itself: dispatch table, cell supervision, public operations.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use uuid::Uuid;

// Layer 3: Internal module imports
use super::config::StageConfig;
use super::errors::StageError;
use super::remote::RemoteLink;
use crate::actor::error::DispatchError;
use crate::actor::traits::{Actor, BoxActor};
use crate::cell::{spawn_cell, CellHandle, CellState};
use crate::mailbox::{Mailbox, MailboxSender};
use crate::message::Message;
use crate::upstream::traits::Upstream;
use crate::util::{Identity, PidKind};

/// Stage lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StageState {
    Open,
    Closing,
    Closed,
}

/// Where a pid resolves inside this stage.
#[derive(Clone)]
enum Route {
    /// A full actor cell.
    Cell(MailboxSender),
    /// A one-shot reply slot installed by a pending request.
    Reply(mpsc::Sender<Message>),
}

struct CellEntry {
    route: Route,
    handle: Option<CellHandle>,
}

/// One instance of the runtime: hosts cells and routes messages.
///
/// The stage is cheap to clone (shared internals) and is driven entirely
/// through four operations: [`spawn`](Stage::spawn),
/// [`inject`](Stage::inject), [`request`](Stage::request) and
/// [`close`](Stage::close). A stage built with
/// [`with_upstream`](Stage::with_upstream) additionally federates with other
/// stages through a relay; pids not found in the local dispatch table are
/// proxied outward, and inbound traffic is polled and delivered locally.
///
/// Constructors must run inside a Tokio runtime: mailbox pumps and cell
/// supervisors are spawned as tasks.
///
/// # Example
///
/// ```ignore
/// let stage = Stage::new(StageConfig::default());
/// let counter = stage.spawn(Counter::default()).await?;
/// stage.inject(&counter, "Inc", &()).await?;
/// let total: u64 = stage
///     .request(Duration::from_secs(1), &counter, "Get", &())
///     .await?;
/// stage.close().await?;
/// ```
#[derive(Clone)]
pub struct Stage {
    inner: Arc<StageInner>,
}

pub(crate) struct StageInner {
    stage_id: String,
    discard: Identity,
    config: StageConfig,
    next_pid: AtomicU64,
    state: parking_lot::Mutex<StageState>,
    cells: parking_lot::Mutex<HashMap<Identity, CellEntry>>,
    cancel: CancellationToken,
    remote: Option<RemoteLink>,
}

impl Stage {
    /// Open a stand-alone stage (no upstream).
    pub fn new(config: StageConfig) -> Self {
        Self::build(config, None)
    }

    /// Open a stage federated through `upstream`.
    ///
    /// The stage adopts the upstream session's stage-id for its generated
    /// pids so that the relay's routing and the pid prefixes agree.
    pub fn with_upstream(config: StageConfig, upstream: Arc<dyn Upstream>) -> Self {
        Self::build(config, Some(upstream))
    }

    fn build(config: StageConfig, upstream: Option<Arc<dyn Upstream>>) -> Self {
        let stage_id = match (&upstream, &config.stage_id) {
            (Some(up), _) => up.id().to_string(),
            (None, Some(id)) => id.clone(),
            (None, None) => generated_stage_id(),
        };
        let cancel = CancellationToken::new();
        let remote = upstream.map(|up| RemoteLink::new(up, &config));
        let inner = Arc::new(StageInner {
            discard: Identity::discard(&stage_id),
            stage_id,
            config,
            next_pid: AtomicU64::new(0),
            state: parking_lot::Mutex::new(StageState::Open),
            cells: parking_lot::Mutex::new(HashMap::new()),
            cancel,
            remote,
        });
        if let Some(remote) = &inner.remote {
            remote.start_pumps(
                Arc::downgrade(&inner),
                &inner.config,
                inner.cancel.child_token(),
            );
        }
        Stage { inner }
    }

    /// This stage's identifier (the pid prefix).
    pub fn id(&self) -> &str {
        &self.inner.stage_id
    }

    /// The configuration the stage was opened with.
    pub fn config(&self) -> &StageConfig {
        &self.inner.config
    }

    /// The identity that swallows every message sent to it.
    pub fn discard(&self) -> Identity {
        self.inner.discard.clone()
    }

    /// Spawn an actor and return its freshly allocated pid.
    ///
    /// Returns once the actor's zero-state initializer has signalled ready;
    /// initializer failure surfaces as [`StageError::SpawnFailed`]. When an
    /// upstream is configured the pid is registered with it *after* the
    /// local table insert, so a local cell always wins over a stale remote
    /// mapping; a failed registration tears the fresh cell down again.
    pub async fn spawn(&self, actor: impl Actor) -> Result<Identity, StageError> {
        self.spawn_boxed(Box::new(actor)).await
    }

    /// Spawn an already boxed actor.
    pub async fn spawn_boxed(&self, actor: BoxActor) -> Result<Identity, StageError> {
        self.inner.ensure_open()?;
        let pid = self.inner.alloc_pid(PidKind::Actor);
        let (mailbox, sender) = Mailbox::open(
            self.inner.config.mailbox_capacity,
            self.inner.config.drop_policy,
        );
        let (ready_tx, ready_rx) = oneshot::channel();
        let handle = spawn_cell(
            pid.clone(),
            actor,
            mailbox,
            Arc::downgrade(&self.inner),
            self.inner.cancel.child_token(),
            ready_tx,
        );
        self.inner.cells.lock().insert(
            pid.clone(),
            CellEntry {
                route: Route::Cell(sender),
                handle: Some(handle),
            },
        );

        match ready_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                self.inner.forget(&pid);
                return Err(StageError::SpawnFailed(err));
            }
            Err(_) => {
                self.inner.forget(&pid);
                return Err(StageError::SpawnFailed(DispatchError::handler(
                    "cell exited before signalling ready",
                )));
            }
        }

        if let Some(remote) = &self.inner.remote {
            if let Err(err) = remote
                .upstream()
                .register_pids(std::slice::from_ref(&pid))
                .await
            {
                warn!(pid = %pid, error = %err, "upstream registration failed; tearing cell down");
                self.inner.teardown_cell(&pid);
                return Err(err.into());
            }
        }
        trace!(pid = %pid, "actor spawned");
        Ok(pid)
    }

    /// Fire-and-forget send from the discard identity.
    ///
    /// Encoding failures and a zero destination surface to the caller; any
    /// downstream send failure is logged and swallowed; the caller holds no
    /// reply channel to report it to.
    pub async fn inject<T: Serialize + ?Sized>(
        &self,
        to: &Identity,
        method: &str,
        data: &T,
    ) -> Result<(), StageError> {
        self.inner.ensure_open()?;
        if to.is_zero() {
            return Err(StageError::EmptyIdentity);
        }
        let content = serde_json::to_vec(data).map_err(StageError::Encode)?;
        let msg = Message::new(self.inner.discard.clone(), to.clone(), method, content);
        if let Err(err) = self.inner.deliver(msg).await {
            debug!(to = %to, method, error = %err, "inject dropped");
        }
        Ok(())
    }

    /// Send and wait up to `ttl` for a single reply, decoded as `Out`.
    ///
    /// A one-shot reply pid is allocated and routed through the normal
    /// dispatch plane; exactly one reply is consumed and late arrivals are
    /// dropped. A zero `ttl` fails immediately with
    /// [`StageError::DeadlineExceeded`].
    pub async fn request<Out, T>(
        &self,
        ttl: Duration,
        to: &Identity,
        method: &str,
        data: &T,
    ) -> Result<Out, StageError>
    where
        Out: DeserializeOwned,
        T: Serialize + ?Sized,
    {
        self.inner.ensure_open()?;
        if to.is_zero() {
            return Err(StageError::EmptyIdentity);
        }
        if ttl.is_zero() {
            return Err(StageError::DeadlineExceeded);
        }
        let content = serde_json::to_vec(data).map_err(StageError::Encode)?;

        let reply_pid = self.inner.alloc_pid(PidKind::Reply);
        let (tx, mut rx) = mpsc::channel(1);
        self.inner.cells.lock().insert(
            reply_pid.clone(),
            CellEntry {
                route: Route::Reply(tx),
                handle: None,
            },
        );

        let outcome = self
            .exchange(ttl, to, method, content, &reply_pid, &mut rx)
            .await;
        self.inner.forget(&reply_pid);
        outcome
    }

    async fn exchange<Out: DeserializeOwned>(
        &self,
        ttl: Duration,
        to: &Identity,
        method: &str,
        content: Vec<u8>,
        reply_pid: &Identity,
        rx: &mut mpsc::Receiver<Message>,
    ) -> Result<Out, StageError> {
        if let Some(remote) = &self.inner.remote {
            // Cross-stage replies route through the relay like any other
            // message, so the reply pid must be registered too.
            remote
                .upstream()
                .register_pids(std::slice::from_ref(reply_pid))
                .await?;
        }
        self.inner
            .deliver(Message::new(
                reply_pid.clone(),
                to.clone(),
                method,
                content,
            ))
            .await?;
        match timeout(ttl, rx.recv()).await {
            Err(_) => Err(StageError::DeadlineExceeded),
            Ok(None) => Err(StageError::StageShutdown),
            Ok(Some(reply)) => serde_json::from_slice(&reply.content).map_err(StageError::Decode),
        }
    }

    /// Close the stage: cancel every cell, drain them in parallel, close the
    /// upstream session. Idempotent.
    pub async fn close(&self) -> Result<(), StageError> {
        {
            let mut state = self.inner.state.lock();
            if *state != StageState::Open {
                return Ok(());
            }
            *state = StageState::Closing;
        }
        trace!(stage = %self.inner.stage_id, "stage closing");
        self.inner.cancel.cancel();

        let entries: Vec<CellEntry> = {
            let mut cells = self.inner.cells.lock();
            cells.drain().map(|(_, entry)| entry).collect()
        };
        let mut joins = Vec::new();
        let mut states = Vec::new();
        for entry in entries {
            if let Route::Cell(sender) = &entry.route {
                sender.close();
            }
            if let Some(handle) = entry.handle {
                handle.cancel.cancel();
                states.push(Arc::clone(&handle.state));
                joins.push(handle.join);
            }
        }
        for joined in join_all(joins).await {
            if joined.is_err() {
                warn!("cell supervisor ended abnormally");
            }
        }
        let stuck = states
            .iter()
            .filter(|state| *state.lock() != CellState::Terminated)
            .count();
        if stuck > 0 {
            warn!(stuck, "cells exited without reaching the terminated state");
        }

        if let Some(remote) = &self.inner.remote {
            if let Err(err) = remote.upstream().close().await {
                warn!(error = %err, "upstream close failed");
            }
        }
        *self.inner.state.lock() = StageState::Closed;
        trace!(stage = %self.inner.stage_id, "stage closed");
        Ok(())
    }
}

impl StageInner {
    fn ensure_open(&self) -> Result<(), StageError> {
        if *self.state.lock() == StageState::Open {
            Ok(())
        } else {
            Err(StageError::StageShutdown)
        }
    }

    fn alloc_pid(&self, kind: PidKind) -> Identity {
        let counter = self.next_pid.fetch_add(1, Ordering::Relaxed) + 1;
        Identity::scoped(&self.stage_id, kind, counter)
    }

    /// Drop a pid from the dispatch table without joining its task.
    pub(crate) fn forget(&self, pid: &Identity) {
        self.cells.lock().remove(pid);
    }

    fn teardown_cell(&self, pid: &Identity) {
        if let Some(entry) = self.cells.lock().remove(pid) {
            if let Route::Cell(sender) = &entry.route {
                sender.close();
            }
            if let Some(handle) = entry.handle {
                handle.cancel.cancel();
            }
        }
    }

    fn local_route(&self, to: &Identity) -> Option<Route> {
        self.cells.lock().get(to).map(|entry| entry.route.clone())
    }

    /// Full dispatch algorithm: discard, local table, upstream, error.
    pub(crate) async fn deliver(&self, msg: Message) -> Result<(), StageError> {
        if msg.to.is_zero() {
            return Err(StageError::EmptyIdentity);
        }
        if msg.to == self.discard {
            trace!(method = %msg.method, "message discarded");
            return Ok(());
        }
        match self.local_route(&msg.to) {
            Some(Route::Cell(sender)) => {
                sender.push(msg).await;
                Ok(())
            }
            Some(Route::Reply(tx)) => {
                // Capacity one: the first reply is consumed, the rest drop.
                let _ = tx.try_send(msg);
                Ok(())
            }
            None => match &self.remote {
                Some(remote) => remote.enqueue(msg).await,
                None => Err(StageError::NoSuchMailbox(msg.to.clone())),
            },
        }
    }

    /// Dispatch for inbound upstream traffic: never routes outward again.
    pub(crate) async fn deliver_local(&self, msg: Message) {
        if msg.to.is_zero() || msg.to == self.discard {
            return;
        }
        match self.local_route(&msg.to) {
            Some(Route::Cell(sender)) => sender.push(msg).await,
            Some(Route::Reply(tx)) => {
                let _ = tx.try_send(msg);
            }
            None => debug!(to = %msg.to, "inbound message for unknown pid dropped"),
        }
    }
}

impl Drop for StageInner {
    fn drop(&mut self) {
        // Last handle gone without close(): stop pumps and cells anyway.
        self.cancel.cancel();
    }
}

fn generated_stage_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}
