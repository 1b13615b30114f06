//! Bounded mailboxes with overflow drop policies.
//!
//! A mailbox is the only queue between the rest of the world and one actor
//! cell. It is bounded: when the backing buffer is full the configured
//! [`DropPolicy`] decides which message gives way, and `push` still reports
//! success. A single internal pump task owns the buffer; producers hand off
//! through a small channel and are never blocked beyond that slot.
//!
//! # Components
//!
//! - [`DropPolicy`] - which message gives way on overflow
//! - [`LeakyBuffer`] - the bounded FIFO applying the policy
//! - [`Mailbox`] / [`MailboxSender`] - consumer and producer handles
//! - [`MailboxMetrics`] - drop and throughput counters
//!
//! # Example
//!
//! ```ignore
//! use stage_rt::mailbox::{DropPolicy, Mailbox};
//!
//! let (mut mailbox, sender) = Mailbox::open(1000, DropPolicy::Oldest);
//! sender.push(msg).await;
//! let head = mailbox.next().await?;
//! ```

pub mod bounded;
pub mod buffer;
pub mod errors;
pub mod metrics;
pub mod policy;

pub use bounded::{Mailbox, MailboxSender};
pub use buffer::LeakyBuffer;
pub use errors::MailboxError;
pub use metrics::MailboxMetrics;
pub use policy::DropPolicy;
