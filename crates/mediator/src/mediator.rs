//! Registration table and dispatch.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde_json::Value;

use crate::error::{MediatorError, Result};
use crate::handler::{CommandHandler, EventHandler, QueryHandler};
use crate::message::{Command, Event, Query};

type AnyMessage = dyn Any + Send + Sync;

/// Identity of a handler instance: the address its `Arc` points to.
fn identity<H>(handler: &Arc<H>) -> usize {
    Arc::as_ptr(handler) as *const () as usize
}

#[async_trait]
trait ErasedEventHandler: Send + Sync {
    fn identity(&self) -> usize;

    async fn handle_message(&self, name: &str, event: &AnyMessage) -> Result<()>;

    async fn handle_value(&self, name: &str, payload: &Value) -> Result<()>;
}

struct EventSlot<E, H> {
    handler: Arc<H>,
    _event: PhantomData<fn(&E)>,
}

#[async_trait]
impl<E, H> ErasedEventHandler for EventSlot<E, H>
where
    E: Event,
    H: EventHandler<E> + 'static,
{
    fn identity(&self) -> usize {
        identity(&self.handler)
    }

    async fn handle_message(&self, name: &str, event: &AnyMessage) -> Result<()> {
        let event = event
            .downcast_ref::<E>()
            .ok_or_else(|| MediatorError::TypeMismatch(name.to_string()))?;
        self.handler
            .handle(event)
            .await
            .map_err(|source| MediatorError::Handler {
                name: name.to_string(),
                source,
            })
    }

    async fn handle_value(&self, name: &str, payload: &Value) -> Result<()> {
        let event: E =
            serde_json::from_value(payload.clone()).map_err(|source| MediatorError::Payload {
                name: name.to_string(),
                source,
            })?;
        self.handler
            .handle(&event)
            .await
            .map_err(|source| MediatorError::Handler {
                name: name.to_string(),
                source,
            })
    }
}

/// Single-handler slot for commands and queries. `handler` holds an
/// `Arc<dyn CommandHandler<C>>` or `Arc<dyn QueryHandler<Q>>`.
struct RequestSlot {
    identity: usize,
    handler: Box<AnyMessage>,
}

fn register_request(
    table: &mut HashMap<&'static str, RequestSlot>,
    name: &'static str,
    identity: usize,
    handler: Box<AnyMessage>,
) -> Result<()> {
    match table.get(name) {
        Some(slot) if slot.identity == identity => Ok(()),
        Some(_) => Err(MediatorError::DuplicateHandler(name.to_string())),
        None => {
            table.insert(name, RequestSlot { identity, handler });
            Ok(())
        }
    }
}

/// Collects handler registrations, then freezes them into a [`Mediator`].
#[derive(Default)]
pub struct MediatorBuilder {
    events: HashMap<&'static str, Vec<Arc<dyn ErasedEventHandler>>>,
    event_types: HashMap<&'static str, TypeId>,
    commands: HashMap<&'static str, RequestSlot>,
    queries: HashMap<&'static str, RequestSlot>,
    handler_timeout: Option<Duration>,
}

impl MediatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an event handler. Registering the same instance twice is a no-op;
    /// distinct instances are all invoked, in registration order.
    ///
    /// Every handler under one name must take the same event type. An
    /// `Envelope<T>` travels under `T`'s name, so handlers for `T` and for
    /// `Envelope<T>` cannot be mixed; the second kind fails with
    /// [`MediatorError::TypeMismatch`].
    pub fn register_event_handler<E, H>(&mut self, handler: Arc<H>) -> Result<&mut Self>
    where
        E: Event,
        H: EventHandler<E> + 'static,
    {
        let registered = *self.event_types.entry(E::NAME).or_insert(TypeId::of::<E>());
        if registered != TypeId::of::<E>() {
            return Err(MediatorError::TypeMismatch(E::NAME.to_string()));
        }

        let slots = self.events.entry(E::NAME).or_default();
        let id = identity(&handler);
        if slots.iter().any(|slot| slot.identity() == id) {
            tracing::debug!(event = E::NAME, "handler already registered");
            return Ok(self);
        }
        slots.push(Arc::new(EventSlot::<E, H> {
            handler,
            _event: PhantomData,
        }));
        Ok(self)
    }

    /// Sets the command's handler. Fails if a different instance is already set.
    pub fn register_command_handler<C, H>(&mut self, handler: Arc<H>) -> Result<&mut Self>
    where
        C: Command,
        H: CommandHandler<C> + 'static,
    {
        let id = identity(&handler);
        let erased: Arc<dyn CommandHandler<C>> = handler;
        register_request(&mut self.commands, C::NAME, id, Box::new(erased))?;
        Ok(self)
    }

    /// Sets the query's handler. Fails if a different instance is already set.
    pub fn register_query_handler<Q, H>(&mut self, handler: Arc<H>) -> Result<&mut Self>
    where
        Q: Query,
        H: QueryHandler<Q> + 'static,
    {
        let id = identity(&handler);
        let erased: Arc<dyn QueryHandler<Q>> = handler;
        register_request(&mut self.queries, Q::NAME, id, Box::new(erased))?;
        Ok(self)
    }

    /// Bounds every handler invocation. Unbounded by default.
    pub fn handler_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.handler_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Mediator {
        Mediator {
            inner: Arc::new(Registry {
                events: self.events,
                commands: self.commands,
                queries: self.queries,
                handler_timeout: self.handler_timeout,
            }),
        }
    }
}

struct Registry {
    events: HashMap<&'static str, Vec<Arc<dyn ErasedEventHandler>>>,
    commands: HashMap<&'static str, RequestSlot>,
    queries: HashMap<&'static str, RequestSlot>,
    handler_timeout: Option<Duration>,
}

/// Dispatches messages to the handlers registered at build time.
///
/// The table is immutable once built; clones share it.
#[derive(Clone)]
pub struct Mediator {
    inner: Arc<Registry>,
}

impl Mediator {
    pub fn builder() -> MediatorBuilder {
        MediatorBuilder::new()
    }

    /// Number of distinct handlers registered for an event name.
    pub fn event_handler_count(&self, name: &str) -> usize {
        self.inner.events.get(name).map_or(0, Vec::len)
    }

    pub fn has_command_handler(&self, name: &str) -> bool {
        self.inner.commands.contains_key(name)
    }

    pub fn has_query_handler(&self, name: &str) -> bool {
        self.inner.queries.contains_key(name)
    }

    /// Delivers `event` to every handler registered under its name.
    ///
    /// Handlers are started in registration order and awaited together. Once all
    /// have settled, the first failure (in registration order) is returned.
    #[tracing::instrument(skip(self, event), fields(event = E::NAME))]
    pub async fn publish<E: Event>(&self, event: &E) -> Result<()> {
        metrics::counter!("mediator_dispatch_total", "kind" => "event").increment(1);
        let handlers = self.event_handlers(E::NAME)?;
        let message: &AnyMessage = event;

        let results = join_all(
            handlers
                .iter()
                .map(|handler| self.guard(E::NAME, handler.handle_message(E::NAME, message))),
        )
        .await;
        settle(E::NAME, results)
    }

    /// Delivers a JSON payload to the event handlers registered under `name`.
    ///
    /// Each handler decodes the payload into its own event type. Used when the
    /// concrete type is known only by name, as with queued jobs.
    #[tracing::instrument(skip(self, payload))]
    pub async fn dispatch(&self, name: &str, payload: &Value) -> Result<()> {
        metrics::counter!("mediator_dispatch_total", "kind" => "event").increment(1);
        let handlers = self.event_handlers(name)?;

        let results = join_all(
            handlers
                .iter()
                .map(|handler| self.guard(name, handler.handle_value(name, payload))),
        )
        .await;
        settle(name, results)
    }

    /// Executes a command through its single handler.
    #[tracing::instrument(skip(self, command), fields(command = C::NAME))]
    pub async fn send<C: Command>(&self, command: C) -> Result<C::Output> {
        metrics::counter!("mediator_dispatch_total", "kind" => "command").increment(1);
        let slot = self
            .inner
            .commands
            .get(C::NAME)
            .ok_or_else(|| MediatorError::NoHandler(C::NAME.to_string()))?;
        let handler = slot
            .handler
            .downcast_ref::<Arc<dyn CommandHandler<C>>>()
            .ok_or_else(|| MediatorError::TypeMismatch(C::NAME.to_string()))?;

        self.guard(C::NAME, async {
            handler
                .handle(command)
                .await
                .map_err(|source| MediatorError::Handler {
                    name: C::NAME.to_string(),
                    source,
                })
        })
        .await
    }

    /// Answers a query through its single handler.
    #[tracing::instrument(skip(self, query), fields(query = Q::NAME))]
    pub async fn query<Q: Query>(&self, query: Q) -> Result<Q::Output> {
        metrics::counter!("mediator_dispatch_total", "kind" => "query").increment(1);
        let slot = self
            .inner
            .queries
            .get(Q::NAME)
            .ok_or_else(|| MediatorError::NoHandler(Q::NAME.to_string()))?;
        let handler = slot
            .handler
            .downcast_ref::<Arc<dyn QueryHandler<Q>>>()
            .ok_or_else(|| MediatorError::TypeMismatch(Q::NAME.to_string()))?;

        self.guard(Q::NAME, async {
            handler
                .handle(query)
                .await
                .map_err(|source| MediatorError::Handler {
                    name: Q::NAME.to_string(),
                    source,
                })
        })
        .await
    }

    fn event_handlers(&self, name: &str) -> Result<&[Arc<dyn ErasedEventHandler>]> {
        match self.inner.events.get(name) {
            Some(handlers) if !handlers.is_empty() => Ok(handlers),
            _ => Err(MediatorError::NoHandler(name.to_string())),
        }
    }

    async fn guard<T>(&self, name: &str, invocation: impl Future<Output = Result<T>>) -> Result<T> {
        match self.inner.handler_timeout {
            Some(timeout) => tokio::time::timeout(timeout, invocation)
                .await
                .map_err(|_| MediatorError::HandlerTimeout {
                    name: name.to_string(),
                    timeout,
                })?,
            None => invocation.await,
        }
    }
}

fn settle(name: &str, results: Vec<Result<()>>) -> Result<()> {
    let mut first = None;
    for err in results.into_iter().filter_map(|r| r.err()) {
        metrics::counter!("mediator_handler_failures_total").increment(1);
        if first.is_none() {
            first = Some(err);
        } else {
            tracing::warn!(event = name, error = %err, "additional handler failure");
        }
    }
    first.map_or(Ok(()), Err)
}
