//! # Event Publisher
//!
//! Turns a domain occurrence into an envelope and hands it to the broker.
//!
//! The hand-off is asynchronous: `publish` returns once the envelope is
//! built and the delivery task is spawned. The delivery outcome (success
//! with the broker-assigned sequence, or failure) is observed through an
//! optional completion callback and the error reporter, never by blocking
//! the publishing task.
//!
//! The publisher does not retry failed deliveries; resend policy is a
//! transport concern. The envelope id rides in the [`crate::EVENT_ID_HEADER`]
//! header so JetStream deduplicates transport-level resends.

use std::sync::Arc;

use serde::Serialize;

use crate::catalog::{CatalogError, EventCatalog};
use crate::envelope::EventEnvelope;
use crate::reporter::{ErrorReporter, FailureReason};
use crate::{subject_for, BusError, BusMessage, EventBus, PublishAck, EVENT_ID_HEADER};

/// A payload that knows its catalog tag and its aggregate identity.
///
/// The aggregate key becomes the partition key: every event about the same
/// aggregate lands on the same subject and is delivered in producer order to
/// any single consumer of it.
pub trait AggregateEvent: Serialize + Send + 'static {
    const EVENT_TYPE: &'static str;

    /// Aggregate id in string form (user id, project id, ...).
    fn aggregate_key(&self) -> String;
}

/// Errors surfaced synchronously by [`EventPublisher::publish`].
///
/// Delivery failures are asynchronous and reach the completion callback and
/// the error reporter instead.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("failed to serialize envelope: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Outcome delivered to the completion callback.
pub type PublishResult = Result<PublishAck, BusError>;

type Callback = Box<dyn FnOnce(PublishResult) + Send + 'static>;

/// Publisher for one producing service.
///
/// Cheap to clone; construct once at startup and inject wherever the service
/// raises domain events.
#[derive(Clone)]
pub struct EventPublisher {
    bus: Arc<dyn EventBus>,
    catalog: Arc<EventCatalog>,
    source_service: String,
    reporter: Arc<dyn ErrorReporter>,
}

impl EventPublisher {
    pub fn new(
        bus: Arc<dyn EventBus>,
        catalog: Arc<EventCatalog>,
        source_service: impl Into<String>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self {
            bus,
            catalog,
            source_service: source_service.into(),
            reporter,
        }
    }

    /// Publish a domain event.
    ///
    /// Builds the envelope (fresh id, current time, catalog-declared current
    /// version), then hands it to the broker on a spawned task. Returns as
    /// soon as the hand-off is queued.
    ///
    /// Fails synchronously only for catalog misconfiguration
    /// ([`CatalogError::UnknownEventType`]) or serialization bugs, both of
    /// which are producer wiring errors and fatal at startup.
    pub fn publish<T: AggregateEvent>(&self, event: T) -> Result<(), PublishError> {
        self.publish_with_callback(event, |_| {})
    }

    /// Publish with an explicit completion callback.
    ///
    /// The callback runs on the delivery task once the broker accepts or
    /// rejects the message. Failures are additionally reported through the
    /// error reporter.
    pub fn publish_with_callback<T: AggregateEvent>(
        &self,
        event: T,
        on_complete: impl FnOnce(PublishResult) + Send + 'static,
    ) -> Result<(), PublishError> {
        let version = self.catalog.current_version(T::EVENT_TYPE)?.to_string();
        let key = event.aggregate_key();

        let envelope = EventEnvelope::new(T::EVENT_TYPE, &self.source_service, version, event);
        let payload = serde_json::to_vec(&envelope)?;

        let message = BusMessage::new(subject_for(T::EVENT_TYPE, &key), key, payload)
            .with_header(EVENT_ID_HEADER, envelope.event_id.to_string());

        self.spawn_delivery(
            T::EVENT_TYPE,
            envelope.event_id,
            message,
            Box::new(on_complete),
        );
        Ok(())
    }

    fn spawn_delivery(
        &self,
        event_type: &'static str,
        event_id: uuid::Uuid,
        message: BusMessage,
        on_complete: Callback,
    ) {
        let bus = self.bus.clone();
        let reporter = self.reporter.clone();
        let subject = message.subject.clone();

        tokio::spawn(async move {
            match bus.publish(message).await {
                Ok(ack) => {
                    tracing::info!(
                        event_type = %event_type,
                        event_id = %event_id,
                        subject = %subject,
                        sequence = ack.sequence,
                        "Event published"
                    );
                    on_complete(Ok(ack));
                }
                Err(e) => {
                    tracing::error!(
                        event_type = %event_type,
                        event_id = %event_id,
                        subject = %subject,
                        error = %e,
                        "Failed to publish event"
                    );
                    reporter
                        .report(
                            event_type,
                            Some(event_id),
                            &FailureReason::PublishFailure(e.to_string()),
                        )
                        .await;
                    on_complete(Err(e));
                }
            }
        });
    }
}
