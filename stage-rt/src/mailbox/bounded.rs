// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

// Layer 3: Internal module imports
use super::buffer::LeakyBuffer;
use super::errors::MailboxError;
use super::metrics::MailboxMetrics;
use super::policy::DropPolicy;
use crate::message::Message;

/// Consumer half of a bounded mailbox.
///
/// Exactly one cell owns a `Mailbox`; [`MailboxSender`] clones are handed to
/// anyone who may deliver to it. A dedicated pump task owns the backing
/// buffer: producers submit through a handoff channel of roughly CPU-count
/// capacity, and the pump offers the head message to a one-slot output
/// channel only while the buffer is non-empty. Producers are therefore never
/// blocked beyond the handoff slot, and the buffer itself never exceeds the
/// configured capacity; overflow is resolved by the [`DropPolicy`].
pub struct Mailbox {
    output: mpsc::Receiver<Message>,
    stop: CancellationToken,
    metrics: Arc<MailboxMetrics>,
}

/// Producer half of a bounded mailbox. Cheap to clone.
#[derive(Clone)]
pub struct MailboxSender {
    input: mpsc::Sender<Message>,
    stop: CancellationToken,
    metrics: Arc<MailboxMetrics>,
}

struct Pump {
    input: mpsc::Receiver<Message>,
    output: mpsc::Sender<Message>,
    buffer: LeakyBuffer<Message>,
    stop: CancellationToken,
    metrics: Arc<MailboxMetrics>,
}

impl Mailbox {
    /// Open a mailbox and start its pump task.
    ///
    /// Must be called within a Tokio runtime. `capacity` bounds the backing
    /// buffer; the handoff channel in front of it holds roughly one message
    /// per CPU to smooth bursts.
    pub fn open(capacity: usize, policy: DropPolicy) -> (Mailbox, MailboxSender) {
        let handoff = num_cpus::get().max(1);
        let (input_tx, input_rx) = mpsc::channel(handoff);
        let (output_tx, output_rx) = mpsc::channel(1);
        let stop = CancellationToken::new();
        let metrics = Arc::new(MailboxMetrics::new());

        let pump = Pump {
            input: input_rx,
            output: output_tx,
            buffer: LeakyBuffer::new(capacity, policy),
            stop: stop.clone(),
            metrics: Arc::clone(&metrics),
        };
        tokio::spawn(pump.run());

        let mailbox = Mailbox {
            output: output_rx,
            stop: stop.clone(),
            metrics: Arc::clone(&metrics),
        };
        let sender = MailboxSender {
            input: input_tx,
            stop,
            metrics,
        };
        (mailbox, sender)
    }

    /// Wait for the head message.
    ///
    /// Returns [`MailboxError::Closed`] once the mailbox is closed; callers
    /// cancel by dropping the future.
    pub async fn next(&mut self) -> Result<Message, MailboxError> {
        tokio::select! {
            _ = self.stop.cancelled() => Err(MailboxError::Closed),
            maybe = self.output.recv() => match maybe {
                Some(msg) => {
                    self.metrics.record_delivered();
                    Ok(msg)
                }
                None => Err(MailboxError::Closed),
            },
        }
    }

    /// Close the mailbox, waking any waiter. Idempotent.
    pub fn close(&self) {
        self.stop.cancel();
    }

    /// Counters for this mailbox.
    pub fn metrics(&self) -> &Arc<MailboxMetrics> {
        &self.metrics
    }
}

impl MailboxSender {
    /// Submit a message.
    ///
    /// Always succeeds from the producer's point of view: overflow is
    /// resolved by the drop policy inside the pump, and a push to a closed
    /// mailbox is silently dropped so senders racing shutdown need no
    /// special casing.
    pub async fn push(&self, msg: Message) {
        if self.stop.is_cancelled() {
            return;
        }
        self.metrics.record_pushed();
        // A send error means the pump is already gone: shutdown race, drop
        // silently.
        let _ = self.input.send(msg).await;
    }

    /// Close the mailbox from the producer side. Idempotent.
    pub fn close(&self) {
        self.stop.cancel();
    }

    /// True once the mailbox has been closed.
    pub fn is_closed(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Counters for this mailbox.
    pub fn metrics(&self) -> &Arc<MailboxMetrics> {
        &self.metrics
    }
}

impl Pump {
    async fn run(mut self) {
        let mut input_open = true;
        loop {
            if !input_open && self.buffer.is_empty() {
                break;
            }
            tokio::select! {
                _ = self.stop.cancelled() => break,
                permit = self.output.reserve(), if !self.buffer.is_empty() => match permit {
                    Ok(permit) => {
                        if let Some(msg) = self.buffer.pop() {
                            permit.send(msg);
                        }
                    }
                    // Consumer dropped without closing; nothing left to do.
                    Err(_) => break,
                },
                maybe = self.input.recv(), if input_open => match maybe {
                    Some(msg) => {
                        if self.buffer.push(msg).is_some() {
                            self.metrics.record_dropped();
                            trace!(policy = "overflow", "mailbox dropped a message");
                        }
                    }
                    None => input_open = false,
                },
            }
        }
    }
}
