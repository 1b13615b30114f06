//! Actor trait, method dispatch, and the media capability handle.
//!
//! An actor is a user object driven exclusively by messages delivered in
//! order by its cell. Its only outbound channel is the [`Media`] handle
//! passed to every handler invocation.
//!
//! Method resolution is table-driven: an actor builds a [`MethodTable`]
//! mapping operation names to typed handlers once, and consults it from its
//! [`Actor::dispatch`] entry point. Actors with a closed protocol are free
//! to skip the table and match on the method name directly.

pub mod error;
pub mod media;
pub mod routes;
pub mod traits;

pub use error::DispatchError;
pub use media::Media;
pub use routes::{HandlerFuture, MethodTable};
pub use traits::{Actor, BoxActor};
