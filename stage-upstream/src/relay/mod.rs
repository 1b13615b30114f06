//! The relay: routing state and the serve loop.

pub mod server;
pub mod state;

pub use server::{listen_and_serve, serve};
pub use state::{Relay, RelayConfig, RelayConfigBuilder};
