//! # stage-rt - Actor Stage Runtime
//!
//! A *stage* hosts long-lived, independently addressable actors that
//! communicate exclusively by asynchronous message passing. Every actor runs
//! inside a supervised cell with its own bounded mailbox; a dispatch table
//! routes by opaque pid to the local cell or, when the stage is federated
//! through an upstream relay, proxies the message outward.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use stage_rt::{
//!     Actor, DispatchError, HandlerFuture, Identity, Media, Message, MethodTable, Stage,
//!     StageConfig, StageError,
//! };
//! use std::sync::LazyLock;
//! use std::time::Duration;
//!
//! #[derive(Default)]
//! struct Counter {
//!     count: u64,
//! }
//!
//! fn inc<'a>(c: &'a mut Counter, _from: Identity, _req: (), _media: &'a Media) -> HandlerFuture<'a> {
//!     Box::pin(async move {
//!         c.count += 1;
//!         Ok(())
//!     })
//! }
//!
//! fn get<'a>(c: &'a mut Counter, from: Identity, _req: (), media: &'a Media) -> HandlerFuture<'a> {
//!     Box::pin(async move {
//!         media.send(&from, "Reply", &c.count).await?;
//!         Ok(())
//!     })
//! }
//!
//! static ROUTES: LazyLock<MethodTable<Counter>> =
//!     LazyLock::new(|| MethodTable::new().operation("Inc", inc).operation("Get", get));
//!
//! #[async_trait::async_trait]
//! impl Actor for Counter {
//!     async fn dispatch(&mut self, msg: &Message, media: &Media) -> Result<(), DispatchError> {
//!         ROUTES.dispatch(self, msg, media).await
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), StageError> {
//!     let stage = Stage::new(StageConfig::default());
//!     let counter = stage.spawn(Counter::default()).await?;
//!
//!     stage.inject(&counter, "Inc", &()).await?;
//!     let total: u64 = stage
//!         .request(Duration::from_secs(1), &counter, "Get", &())
//!         .await?;
//!     assert_eq!(total, 1);
//!
//!     stage.close().await
//! }
//! ```
//!
//! # Guarantees
//!
//! - Messages from one sender to one pid are processed in submission order.
//! - A cell runs at most one handler at a time; actors need no locking.
//! - Mailboxes are bounded; overflow follows the configured [`DropPolicy`]
//!   and never blocks a producer beyond a small handoff slot.
//! - A panicking handler costs exactly the message that caused it.
//! - Delivery is at-most-once; pair it with idempotent handlers.
//!
//! # Module Organization
//!
//! - [`util`] - identities and the pid grammar
//! - [`message`] - the message value
//! - [`mailbox`] - bounded mailboxes with drop policies
//! - [`actor`] - the Actor trait, method tables, and the media handle
//! - [`cell`] - supervised cells binding actors to mailboxes
//! - [`stage`] - the public surface (spawn, inject, request, close)
//! - [`upstream`] - the client contract towards an upstream relay

pub mod actor;
pub mod cell;
pub mod mailbox;
pub mod message;
pub mod stage;
pub mod upstream;
pub mod util;

// Re-export commonly used types
pub use actor::{Actor, BoxActor, DispatchError, HandlerFuture, Media, MethodTable};
pub use cell::CellState;
pub use mailbox::{DropPolicy, LeakyBuffer, Mailbox, MailboxError, MailboxMetrics, MailboxSender};
pub use message::Message;
pub use stage::{Stage, StageConfig, StageConfigBuilder, StageError};
pub use upstream::{Upstream, UpstreamError};
pub use util::{Identity, PidKind};
