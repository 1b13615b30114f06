//! Name-to-handler tables: the method dispatcher.
//!
//! The reference behaviour (resolve the message's method name against the
//! actor's operation set, decode the payload into the operation's request
//! type, invoke) is realised here as a table built once per actor type
//! instead of runtime reflection. Signature checking thereby moves to
//! compile time; what remains at runtime is name resolution and payload
//! decoding.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::future::{ready, Future};
use std::marker::PhantomData;
use std::pin::Pin;

// Layer 2: Third-party crate imports
use serde::de::DeserializeOwned;

// Layer 3: Internal module imports
use super::error::DispatchError;
use super::media::Media;
use crate::message::Message;
use crate::util::Identity;

/// Boxed future returned by a handler; borrows the actor for its duration.
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<(), DispatchError>> + Send + 'a>>;

/// Type-erased operation: payload in, handler future out.
trait ErasedOperation<A>: Send + Sync {
    fn invoke<'a>(
        &self,
        actor: &'a mut A,
        from: Identity,
        payload: &'a [u8],
        media: &'a Media,
    ) -> HandlerFuture<'a>;
}

/// Pairs a typed handler with the decode step for its request type.
struct TypedOperation<A, Req, F> {
    handler: F,
    _actor: PhantomData<fn(&A)>,
    _req: PhantomData<fn(Req)>,
}

impl<A, Req, F> ErasedOperation<A> for TypedOperation<A, Req, F>
where
    A: Send + 'static,
    Req: DeserializeOwned + Send + 'static,
    F: for<'a> Fn(&'a mut A, Identity, Req, &'a Media) -> HandlerFuture<'a>
        + Send
        + Sync
        + 'static,
{
    fn invoke<'a>(
        &self,
        actor: &'a mut A,
        from: Identity,
        payload: &'a [u8],
        media: &'a Media,
    ) -> HandlerFuture<'a> {
        match serde_json::from_slice::<Req>(payload) {
            Ok(req) => (self.handler)(actor, from, req, media),
            Err(err) => Box::pin(ready(Err(DispatchError::Decode(err)))),
        }
    }
}

/// Operation table for one actor type.
///
/// Every entry pairs a method name with a typed handler of shape
/// `(actor, sender, request, media) → result`. Registration wraps the
/// handler with the JSON decode step, so dispatch is: look the name up,
/// decode, invoke. Registering a name twice keeps the latest handler.
///
/// Handlers are ordinary generic functions returning a [`HandlerFuture`]:
///
/// ```ignore
/// fn inc<'a>(c: &'a mut Counter, _from: Identity, by: u64, _media: &'a Media) -> HandlerFuture<'a> {
///     Box::pin(async move {
///         c.count += by;
///         Ok(())
///     })
/// }
///
/// static ROUTES: LazyLock<MethodTable<Counter>> =
///     LazyLock::new(|| MethodTable::new().operation("Inc", inc));
/// ```
pub struct MethodTable<A> {
    entries: HashMap<&'static str, Box<dyn ErasedOperation<A>>>,
}

impl<A: Send + 'static> MethodTable<A> {
    /// Empty table.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register the handler for one operation name.
    pub fn operation<Req, F>(mut self, name: &'static str, handler: F) -> Self
    where
        Req: DeserializeOwned + Send + 'static,
        F: for<'a> Fn(&'a mut A, Identity, Req, &'a Media) -> HandlerFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        self.entries.insert(
            name,
            Box::new(TypedOperation {
                handler,
                _actor: PhantomData,
                _req: PhantomData,
            }),
        );
        self
    }

    /// Resolve and invoke the handler for `msg`.
    pub async fn dispatch(
        &self,
        actor: &mut A,
        msg: &Message,
        media: &Media,
    ) -> Result<(), DispatchError> {
        if msg.method.is_empty() {
            return Err(DispatchError::InvalidMethod);
        }
        match self.entries.get(msg.method.as_str()) {
            Some(operation) => {
                operation
                    .invoke(actor, msg.from.clone(), &msg.content, media)
                    .await
            }
            None => Err(DispatchError::MethodNotFound(msg.method.clone())),
        }
    }

    /// True when an operation is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of registered operations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no operation is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<A: Send + 'static> Default for MethodTable<A> {
    fn default() -> Self {
        Self::new()
    }
}
