//! The seam between a stage and its upstream relay.

pub mod traits;

pub use traits::{Upstream, UpstreamError};
