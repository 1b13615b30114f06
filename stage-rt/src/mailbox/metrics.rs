// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU64, Ordering};

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

// Layer 3: Internal module imports
// (none)

/// Lock-free counters describing one mailbox (or relay buffer).
///
/// Counters are monotonic; `last_message` records the wall-clock time of the
/// most recent delivery for idle detection and diagnostics.
#[derive(Debug, Default)]
pub struct MailboxMetrics {
    pushed: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    last_message: RwLock<Option<DateTime<Utc>>>,
}

impl MailboxMetrics {
    /// Fresh zeroed metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// A producer submitted a message.
    pub fn record_pushed(&self) {
        self.pushed.fetch_add(1, Ordering::Relaxed);
    }

    /// The consumer received a message.
    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        *self.last_message.write() = Some(Utc::now());
    }

    /// The drop policy sacrificed a message.
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Total messages submitted by producers.
    pub fn pushed(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }

    /// Total messages handed to the consumer.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Total messages sacrificed by the drop policy.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Wall-clock time of the most recent delivery, if any.
    pub fn last_message(&self) -> Option<DateTime<Utc>> {
        *self.last_message.read()
    }
}
