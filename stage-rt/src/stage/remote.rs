//! Pumps driving the upstream session: outbound flushing, inbound polling.

// Layer 1: Standard library imports
use std::sync::{Arc, Weak};
use std::time::Duration;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

// Layer 3: Internal module imports
use super::config::StageConfig;
use super::core::StageInner;
use super::errors::StageError;
use crate::message::Message;
use crate::upstream::traits::Upstream;

/// The stage's grip on its upstream session.
///
/// Outbound messages queue through `enqueue`; a flusher task folds them into
/// proxy batches (order preserved within a batch) and a poller task fetches
/// inbound traffic, both backing off on failures and retrying until the
/// stage closes.
pub(crate) struct RemoteLink {
    upstream: Arc<dyn Upstream>,
    outbound: mpsc::Sender<Message>,
    // Receiver parked here between construction and pump start.
    pending: Mutex<Option<mpsc::Receiver<Message>>>,
}

impl RemoteLink {
    pub(crate) fn new(upstream: Arc<dyn Upstream>, config: &StageConfig) -> Self {
        let (outbound, rx) = mpsc::channel(config.outbound_capacity);
        Self {
            upstream,
            outbound,
            pending: Mutex::new(Some(rx)),
        }
    }

    /// Start both pumps. Called once, after the stage internals exist.
    pub(crate) fn start_pumps(
        &self,
        stage: Weak<StageInner>,
        config: &StageConfig,
        cancel: CancellationToken,
    ) {
        if let Some(rx) = self.pending.lock().take() {
            tokio::spawn(flush_outbound(
                Arc::clone(&self.upstream),
                rx,
                cancel.clone(),
                config.proxy_batch,
                config.fetch_backoff,
            ));
            tokio::spawn(poll_inbound(
                stage,
                Arc::clone(&self.upstream),
                cancel,
                config.fetch_batch,
                config.fetch_backoff,
            ));
        }
    }

    pub(crate) fn upstream(&self) -> &Arc<dyn Upstream> {
        &self.upstream
    }

    /// Queue one message for the next proxy batch.
    pub(crate) async fn enqueue(&self, msg: Message) -> Result<(), StageError> {
        self.outbound
            .send(msg)
            .await
            .map_err(|_| StageError::StageShutdown)
    }
}

async fn flush_outbound(
    upstream: Arc<dyn Upstream>,
    mut rx: mpsc::Receiver<Message>,
    cancel: CancellationToken,
    batch_max: usize,
    backoff: Duration,
) {
    loop {
        let first = tokio::select! {
            _ = cancel.cancelled() => return,
            maybe = rx.recv() => match maybe {
                Some(msg) => msg,
                None => return,
            },
        };
        let mut batch = vec![first];
        while batch.len() < batch_max {
            match rx.try_recv() {
                Ok(msg) => batch.push(msg),
                Err(_) => break,
            }
        }

        // The batch is not given up on: transient upstream failures back
        // off and retry until the stage closes.
        loop {
            match upstream.proxy(batch.clone()).await {
                Ok(accepted) => {
                    if (accepted as usize) < batch.len() {
                        debug!(
                            submitted = batch.len(),
                            accepted, "relay dropped unroutable messages"
                        );
                    }
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "proxy failed; backing off");
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = sleep(backoff) => {}
                    }
                }
            }
        }
    }
}

async fn poll_inbound(
    stage: Weak<StageInner>,
    upstream: Arc<dyn Upstream>,
    cancel: CancellationToken,
    fetch_max: u32,
    backoff: Duration,
) {
    loop {
        let fetched = tokio::select! {
            _ = cancel.cancelled() => return,
            result = upstream.fetch(fetch_max) => result,
        };
        match fetched {
            Ok(batch) if batch.is_empty() => {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = sleep(backoff) => {}
                }
            }
            Ok(batch) => {
                let Some(inner) = stage.upgrade() else { return };
                for msg in batch {
                    inner.deliver_local(msg).await;
                }
            }
            Err(err) => {
                warn!(error = %err, "fetch failed; backing off");
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = sleep(backoff) => {}
                }
            }
        }
    }
}
