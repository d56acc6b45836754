//! Handler registry: which event types this service reacts to.
//!
//! Registration happens once at service startup; the registry is then shared
//! immutably with the dispatch workers. Event types with no registered
//! handler are expected (every service sees the full event stream of the
//! subjects it subscribes to) and are acknowledged without side effect.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

/// Envelope metadata handed to handlers alongside the payload.
#[derive(Debug, Clone)]
pub struct EventContext {
    pub event_id: Uuid,
    pub event_type: String,
    pub source_service: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    /// Partition key (aggregate id) the event was routed by.
    pub key: String,
    /// 1-based delivery attempt.
    pub attempt: u32,
}

/// A business-logic failure during event processing.
///
/// Any error leaves the idempotency record unwritten, the message unacked,
/// and redelivery to a future attempt.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("payload decode failed: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// A consumer-side event handler.
///
/// Handlers run concurrently across partitions and must not assume any
/// ordering beyond same-aggregate, same-event-type. In particular a handler
/// must tolerate cross-type reordering: `project.member.added` can arrive
/// before the `project.created` that names the same project.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// `data` passed the catalog schema check for the envelope's version.
    async fn handle(&self, ctx: &EventContext, data: &serde_json::Value)
        -> Result<(), HandlerError>;
}

/// Adapt an async closure over a typed payload into an [`EventHandler`].
///
/// ```rust
/// use event_consumer::registry::{typed_handler, HandlerError};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// #[serde(rename_all = "camelCase")]
/// struct TaskCreatedV1 { task_id: i64, user_id: i64 }
///
/// let handler = typed_handler(|ctx, task: TaskCreatedV1| async move {
///     let _ = (ctx.event_id, task.task_id, task.user_id);
///     Ok::<(), HandlerError>(())
/// });
/// ```
pub fn typed_handler<T, F, Fut>(f: F) -> Arc<dyn EventHandler>
where
    T: DeserializeOwned + Send + 'static,
    F: Fn(EventContext, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    struct Typed<T, F> {
        f: F,
        _payload: PhantomData<fn(T)>,
    }

    #[async_trait]
    impl<T, F, Fut> EventHandler for Typed<T, F>
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(EventContext, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        async fn handle(
            &self,
            ctx: &EventContext,
            data: &serde_json::Value,
        ) -> Result<(), HandlerError> {
            let payload: T = serde_json::from_value(data.clone())?;
            (self.f)(ctx.clone(), payload).await
        }
    }

    Arc::new(Typed { f, _payload: PhantomData })
}

/// Immutable-after-startup map of event type to handler.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn EventHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for an event type. One handler per type; a
    /// second registration replaces the first (useful in tests, a wiring
    /// bug anywhere else, logged loudly).
    pub fn register(
        &mut self,
        event_type: impl Into<String>,
        handler: Arc<dyn EventHandler>,
    ) -> &mut Self {
        let event_type = event_type.into();
        if self.handlers.insert(event_type.clone(), handler).is_some() {
            tracing::warn!(event_type = %event_type, "Handler replaced an existing registration");
        }
        self
    }

    pub fn get(&self, event_type: &str) -> Option<&Arc<dyn EventHandler>> {
        self.handlers.get(event_type)
    }

    /// Event types this service subscribes to.
    pub fn event_types(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        f.debug_struct("HandlerRegistry")
            .field("event_types", &types)
            .finish()
    }
}
