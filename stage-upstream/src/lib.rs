//! # stage-upstream - Relay plane for federated stages
//!
//! Stages federate through an upstream relay: each stage registers the pids
//! it hosts, proxies outbound messages for pids it does not host, and polls
//! its own inbound buffer. This crate provides all three parties of that
//! conversation:
//!
//! - [`protocol`] - the wire surface: length-delimited JSON frames carrying
//!   register/proxy/fetch calls and their replies
//! - [`TcpUpstream`] - the client side, implementing
//!   [`stage_rt::Upstream`] over one TCP session
//! - [`Relay`] and [`serve`] - the relay itself: pid-to-stage routing,
//!   bounded per-stage buffers, and the accept loop
//!
//! # Example
//!
//! ```ignore
//! // Relay side
//! let listener = TcpListener::bind("127.0.0.1:31400").await?;
//! tokio::spawn(serve(listener, Relay::new(RelayConfig::default()), cancel));
//!
//! // Stage side
//! let upstream = TcpUpstream::connect("s1", "127.0.0.1:31400").await?;
//! let stage = Stage::with_upstream(StageConfig::default(), Arc::new(upstream));
//! ```

pub mod client;
pub mod protocol;
pub mod relay;

pub use client::TcpUpstream;
pub use protocol::{Call, Op, Reply, WireError};
pub use relay::{listen_and_serve, serve, Relay, RelayConfig, RelayConfigBuilder};
