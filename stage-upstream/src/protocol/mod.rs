//! Wire surface of the upstream relay.

pub mod codec;
pub mod wire;

pub use codec::{framed, WireError, WireStream};
pub use wire::{Call, Op, Reply};
