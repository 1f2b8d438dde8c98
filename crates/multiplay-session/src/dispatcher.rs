//! Routing decoded responses to handlers.
//!
//! The handler table is built once with a [`DispatcherBuilder`] and frozen
//! into a [`Dispatcher`] before the receive loop starts. The receive task
//! owns the dispatcher outright, so lookups need no locking.
//!
//! Routing order for every [`Response`]:
//!
//! 1. `response_code != 0` → [`SessionEvent::ApplicationError`]; the
//!    registered handler is **not** invoked.
//! 2. Table hit → the handler runs synchronously on the receive task.
//! 3. Table miss → warning logged, message dropped.

use std::collections::HashMap;

use multiplay_protocol::{HandlerId, ProtocolError, Response};

use crate::{EventSender, Outbox, SessionEvent};

/// What a handler may touch while it runs.
pub struct DispatchContext<'a> {
    outbox: &'a Outbox,
    events: &'a EventSender,
}

impl<'a> DispatchContext<'a> {
    pub fn new(outbox: &'a Outbox, events: &'a EventSender) -> Self {
        Self { outbox, events }
    }

    /// The session's send path.
    pub fn outbox(&self) -> &'a Outbox {
        self.outbox
    }

    /// Publishes an event. A dropped receiver is not an error.
    pub fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

/// Handles one kind of response.
///
/// Handlers run on the receive task, so they must not block. To send,
/// use the context's [`Outbox`]; its async methods can be driven from a
/// spawned task, and [`Outbox::schedule_ping`] does that internally.
pub trait Handler: Send + Sync + 'static {
    /// Processes a successful response.
    ///
    /// An error here counts as a protocol violation; the session stays up
    /// until the violation limit is reached.
    fn handle(&self, response: &Response, ctx: &DispatchContext<'_>) -> Result<(), ProtocolError>;
}

/// Adapts a closure into a [`Handler`].
struct FnHandler<F>(F);

impl<F> Handler for FnHandler<F>
where
    F: Fn(&Response, &DispatchContext<'_>) -> Result<(), ProtocolError> + Send + Sync + 'static,
{
    fn handle(&self, response: &Response, ctx: &DispatchContext<'_>) -> Result<(), ProtocolError> {
        (self.0)(response, ctx)
    }
}

/// Outcome of [`Dispatcher::route`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// A handler ran and succeeded.
    Handled,
    /// The response carried a non-zero code.
    ApplicationError,
    /// No handler is registered for the id.
    Unhandled,
}

/// Collects handlers before the session starts.
#[derive(Default)]
pub struct DispatcherBuilder {
    handlers: HashMap<HandlerId, Box<dyn Handler>>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `id`, replacing any earlier registration.
    pub fn register(mut self, id: HandlerId, handler: impl Handler) -> Self {
        if self.handlers.insert(id, Box::new(handler)).is_some() {
            tracing::debug!(handler = %id, "handler replaced");
        }
        self
    }

    /// Registers a closure for `id`.
    ///
    /// ```rust
    /// use multiplay_protocol::HandlerId;
    /// use multiplay_session::DispatcherBuilder;
    ///
    /// let builder = DispatcherBuilder::new().register_fn(HandlerId(9), |response, _ctx| {
    ///     println!("got {} bytes", response.data.len());
    ///     Ok(())
    /// });
    /// assert!(builder.contains(HandlerId(9)));
    /// ```
    pub fn register_fn<F>(self, id: HandlerId, f: F) -> Self
    where
        F: Fn(&Response, &DispatchContext<'_>) -> Result<(), ProtocolError>
            + Send
            + Sync
            + 'static,
    {
        self.register(id, FnHandler(f))
    }

    /// Adds every handler from `other`; `other` wins on conflicts.
    pub fn merge(mut self, other: DispatcherBuilder) -> Self {
        self.handlers.extend(other.handlers);
        self
    }

    pub fn contains(&self, id: HandlerId) -> bool {
        self.handlers.contains_key(&id)
    }

    /// Freezes the table.
    pub fn build(self) -> Dispatcher {
        Dispatcher {
            handlers: self.handlers,
        }
    }
}

impl std::fmt::Debug for DispatcherBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

/// A fixed handler table.
pub struct Dispatcher {
    handlers: HashMap<HandlerId, Box<dyn Handler>>,
}

impl Dispatcher {
    /// Routes one response. See the module docs for the order of checks.
    pub fn route(
        &self,
        response: &Response,
        ctx: &DispatchContext<'_>,
    ) -> Result<Routed, ProtocolError> {
        let id = response.handler();

        if !response.is_success() {
            tracing::warn!(
                handler = %id,
                code = response.response_code,
                "server returned an error"
            );
            ctx.emit(SessionEvent::ApplicationError {
                handler_id: id,
                response_code: response.response_code,
                timestamp: response.timestamp,
            });
            return Ok(Routed::ApplicationError);
        }

        match self.handlers.get(&id) {
            Some(handler) => {
                handler.handle(response, ctx)?;
                Ok(Routed::Handled)
            }
            None => {
                tracing::warn!(handler = %id, bytes = response.data.len(), "no handler, dropping");
                Ok(Routed::Unhandled)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}
