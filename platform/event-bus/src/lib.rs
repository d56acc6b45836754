//! # EventBus Abstraction
//!
//! Broker abstraction for inter-service domain events.
//!
//! ## Why This Lives in `platform/`
//!
//! Every service publishes and consumes cross-service events through this
//! crate. Keeping it in Tier 1 allows:
//! - Services to depend on platform crates without circular dependencies
//! - Plug-and-play service development (services don't depend on each other)
//! - Config-driven swap between NATS JetStream (production) and InMemory
//!   (dev/test)
//!
//! ## Delivery semantics
//!
//! The bus is at-least-once: a delivery that is not acknowledged comes back.
//! Consumers acknowledge through the [`Delivery`] handle; ordering is
//! guaranteed only per partition key (the trailing subject token), never
//! across keys.
//!
//! ## Implementations
//!
//! - **NatsBus**: Production implementation using NATS JetStream
//! - **InMemoryBus**: Test/dev implementation using in-memory queues
//!
//! ## Usage
//!
//! ```rust,no_run
//! use event_bus::{BusMessage, EventBus, InMemoryBus, subject_for};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let bus: Arc<dyn EventBus> = Arc::new(InMemoryBus::new());
//!
//! let subject = subject_for("user.created", "123");
//! let payload = serde_json::to_vec(&serde_json::json!({"userId": 123}))?;
//! bus.publish(BusMessage::new(subject, "123", payload)).await?;
//!
//! let mut stream = bus.subscribe(&event_bus::pattern_for("user.created"), "demo").await?;
//! if let Some(delivery) = futures::StreamExt::next(&mut stream).await {
//!     println!("got {} bytes on {}", delivery.message.payload.len(), delivery.message.subject);
//!     delivery.ack().await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod consumer_retry;
mod envelope;
mod inmemory_bus;
mod nats_bus;
pub mod publisher;
pub mod reporter;

pub use catalog::{CatalogError, EventCatalog, EventCatalogBuilder};
pub use envelope::{validate_envelope_fields, EventEnvelope};
pub use inmemory_bus::InMemoryBus;
pub use nats_bus::{NatsBus, NatsBusConfig};
pub use publisher::{AggregateEvent, EventPublisher, PublishError};
pub use reporter::{ErrorReporter, FailureReason, TracingReporter};

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Subject prefix for all taskboard domain events.
pub const SUBJECT_PREFIX: &str = "taskboard.events";

/// Header carrying the envelope event id.
///
/// `NatsBus` maps it to `Nats-Msg-Id` so JetStream deduplicates
/// producer-side resends of the same event.
pub const EVENT_ID_HEADER: &str = "Event-Id";

/// Build the broker subject for an event type and partition key.
///
/// The key is the trailing token, so all events about one aggregate share a
/// subject and are delivered in publish order to any single consumer of it.
pub fn subject_for(event_type: &str, key: &str) -> String {
    format!("{}.{}.{}", SUBJECT_PREFIX, event_type, sanitize_key(key))
}

/// Build the subscription pattern covering every key of an event type.
pub fn pattern_for(event_type: &str) -> String {
    format!("{}.{}.>", SUBJECT_PREFIX, event_type)
}

/// Replace characters that are not valid inside a subject token.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c == '.' || c == '*' || c == '>' || c.is_whitespace() {
                '-'
            } else {
                c
            }
        })
        .collect()
}

/// A message published to or delivered from the event bus
#[derive(Debug, Clone)]
pub struct BusMessage {
    /// The subject this message was published to
    pub subject: String,
    /// Partition key (aggregate id in string form)
    pub key: String,
    /// The serialized envelope (raw bytes)
    pub payload: Vec<u8>,
    /// Optional headers
    pub headers: Option<HashMap<String, String>>,
}

impl BusMessage {
    pub fn new(subject: impl Into<String>, key: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            subject: subject.into(),
            key: key.into(),
            payload,
            headers: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .as_ref()
            .and_then(|h| h.get(name))
            .map(String::as_str)
    }
}

/// Acknowledgement confirming the broker stored a published message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishAck {
    /// Position assigned by the broker (JetStream stream sequence).
    pub sequence: u64,
}

/// Transport-level acknowledgement seam behind [`Delivery`].
#[async_trait]
pub trait Acker: Send + Sync {
    async fn ack(&self) -> BusResult<()>;
    async fn nak(&self) -> BusResult<()>;
}

/// A single delivery of a message to a subscriber.
///
/// Dropping a delivery without calling either [`Delivery::ack`] or
/// [`Delivery::nak`] leaves the message pending at the broker; it will be
/// redelivered.
#[derive(Clone)]
pub struct Delivery {
    pub message: BusMessage,
    /// 1-based delivery attempt for this message.
    pub attempt: u32,
    acker: Arc<dyn Acker>,
}

impl Delivery {
    pub fn new(message: BusMessage, attempt: u32, acker: Arc<dyn Acker>) -> Self {
        Self {
            message,
            attempt,
            acker,
        }
    }

    /// Acknowledge: the message is done and must not be redelivered.
    pub async fn ack(&self) -> BusResult<()> {
        self.acker.ack().await
    }

    /// Negative-acknowledge: hand the message back for redelivery.
    pub async fn nak(&self) -> BusResult<()> {
        self.acker.nak().await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("subject", &self.message.subject)
            .field("key", &self.message.key)
            .field("attempt", &self.attempt)
            .finish()
    }
}

/// Errors that can occur when using the event bus
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("failed to publish message: {0}")]
    PublishError(String),

    #[error("failed to subscribe to subject: {0}")]
    SubscribeError(String),

    #[error("connection error: {0}")]
    ConnectionError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("invalid subject pattern: {0}")]
    InvalidSubject(String),

    #[error("acknowledgement failed: {0}")]
    AckError(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

/// Result type for event bus operations
pub type BusResult<T> = Result<T, BusError>;

/// Core event bus abstraction for publish-subscribe messaging
///
/// All transports must satisfy at-least-once delivery with explicit
/// acknowledgement and per-subject ordering.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish a message.
    ///
    /// Resolves once the broker has accepted the message, with the assigned
    /// sequence. Callers that must not block await this on a spawned task
    /// (see [`EventPublisher`]).
    async fn publish(&self, message: BusMessage) -> BusResult<PublishAck>;

    /// Subscribe to deliveries matching a subject pattern.
    ///
    /// # Arguments
    /// * `pattern` - Subject pattern (wildcards: `*` one token, `>` one or
    ///   more tokens), e.g. `taskboard.events.user.created.>`
    /// * `group` - Durable consumer group; each group receives its own copy
    ///   of the stream and tracks its own acknowledgements
    async fn subscribe(&self, pattern: &str, group: &str)
        -> BusResult<BoxStream<'static, Delivery>>;
}

impl fmt::Debug for dyn EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventBus")
    }
}
