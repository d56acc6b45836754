//! NATS JetStream implementation of the EventBus trait
//!
//! JetStream supplies the at-least-once machinery the contract requires:
//! publish acks carry the stream sequence, durable consumers track explicit
//! acks per group, unacked or nak'd messages redeliver, and `max_deliver`
//! bounds redelivery before the server-side dead-letter advisory fires.
//! The [`crate::EVENT_ID_HEADER`] header is mapped to `Nats-Msg-Id` so the
//! broker deduplicates producer-side resends of the same event.

use crate::{
    Acker, BusError, BusMessage, BusResult, Delivery, EventBus, PublishAck, EVENT_ID_HEADER,
};
use async_nats::jetstream::consumer::pull;
use async_nats::jetstream::{self, consumer::AckPolicy, AckKind};
use async_nats::Client;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;

/// Stream configuration for the bus.
#[derive(Debug, Clone)]
pub struct NatsBusConfig {
    /// JetStream stream holding all event subjects.
    pub stream_name: String,
    /// Subjects bound to the stream, e.g. `["taskboard.events.>"]`.
    pub subjects: Vec<String>,
    /// Redeliveries before the server stops trying (dead-letter bound).
    pub max_deliver: i64,
}

impl Default for NatsBusConfig {
    fn default() -> Self {
        Self {
            stream_name: "TASKBOARD_EVENTS".to_string(),
            subjects: vec![format!("{}.>", crate::SUBJECT_PREFIX)],
            max_deliver: 5,
        }
    }
}

/// EventBus implementation using NATS JetStream
///
/// # Example
/// ```rust,no_run
/// use event_bus::{EventBus, NatsBus, NatsBusConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let bus = NatsBus::connect("nats://localhost:4222", NatsBusConfig::default()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct NatsBus {
    context: jetstream::Context,
    config: NatsBusConfig,
}

impl NatsBus {
    /// Connect to a NATS server and ensure the event stream exists.
    pub async fn connect(url: &str, config: NatsBusConfig) -> BusResult<Self> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| BusError::ConnectionError(e.to_string()))?;
        let bus = Self::new(client, config);
        bus.ensure_stream().await?;
        Ok(bus)
    }

    /// Wrap an already-connected client. The stream is created lazily on
    /// first use; call [`NatsBus::ensure_stream`] to fail fast instead.
    pub fn new(client: Client, config: NatsBusConfig) -> Self {
        Self {
            context: jetstream::new(client),
            config,
        }
    }

    /// Create the backing stream if it does not exist yet.
    pub async fn ensure_stream(&self) -> BusResult<()> {
        self.stream().await.map(|_| ())
    }

    async fn stream(&self) -> BusResult<jetstream::stream::Stream> {
        self.context
            .get_or_create_stream(jetstream::stream::Config {
                name: self.config.stream_name.clone(),
                subjects: self.config.subjects.clone(),
                ..Default::default()
            })
            .await
            .map_err(|e| BusError::ConnectionError(e.to_string()))
    }

    /// Durable names must not contain subject separators.
    fn durable_name(group: &str) -> String {
        group.replace(['.', '*', '>', ' '], "-")
    }
}

struct NatsAcker {
    message: jetstream::Message,
}

#[async_trait]
impl Acker for NatsAcker {
    async fn ack(&self) -> BusResult<()> {
        self.message
            .ack()
            .await
            .map_err(|e| BusError::AckError(e.to_string()))
    }

    async fn nak(&self) -> BusResult<()> {
        self.message
            .ack_with(AckKind::Nak(None))
            .await
            .map_err(|e| BusError::AckError(e.to_string()))
    }
}

#[async_trait]
impl EventBus for NatsBus {
    async fn publish(&self, message: BusMessage) -> BusResult<PublishAck> {
        let mut headers = async_nats::HeaderMap::new();
        if let Some(map) = &message.headers {
            for (name, value) in map {
                headers.insert(name.as_str(), value.as_str());
            }
            // JetStream deduplicates on Nats-Msg-Id within its dedup window.
            if let Some(event_id) = map.get(EVENT_ID_HEADER) {
                headers.insert("Nats-Msg-Id", event_id.as_str());
            }
        }

        let ack = self
            .context
            .publish_with_headers(message.subject, headers, message.payload.into())
            .await
            .map_err(|e| BusError::PublishError(e.to_string()))?
            .await
            .map_err(|e| BusError::PublishError(e.to_string()))?;

        Ok(PublishAck {
            sequence: ack.sequence,
        })
    }

    async fn subscribe(
        &self,
        pattern: &str,
        group: &str,
    ) -> BusResult<BoxStream<'static, Delivery>> {
        let stream = self.stream().await?;
        let durable = Self::durable_name(group);

        let consumer = stream
            .get_or_create_consumer(
                &durable,
                pull::Config {
                    durable_name: Some(durable.clone()),
                    filter_subject: pattern.to_string(),
                    ack_policy: AckPolicy::Explicit,
                    max_deliver: self.config.max_deliver,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| BusError::SubscribeError(e.to_string()))?;

        let mut messages = consumer
            .messages()
            .await
            .map_err(|e| BusError::SubscribeError(e.to_string()))?;

        let pattern = pattern.to_string();
        let out = async_stream::stream! {
            while let Some(next) = messages.next().await {
                let message = match next {
                    Ok(m) => m,
                    Err(e) => {
                        tracing::warn!(pattern = %pattern, error = %e, "JetStream delivery error");
                        continue;
                    }
                };

                let subject = message.subject.to_string();
                let key = subject.rsplit('.').next().unwrap_or_default().to_string();
                let attempt = message
                    .info()
                    .map(|info| info.delivered.max(1) as u32)
                    .unwrap_or(1);

                let mut bus_message =
                    BusMessage::new(subject, key, message.payload.to_vec());
                if let Some(nats_headers) = &message.headers {
                    let mut map = HashMap::new();
                    for (name, values) in nats_headers.iter() {
                        if let Some(value) = values.first() {
                            map.insert(name.to_string(), value.to_string());
                        }
                    }
                    if !map.is_empty() {
                        bus_message.headers = Some(map);
                    }
                }

                let acker = Arc::new(NatsAcker { message });
                yield Delivery::new(bus_message, attempt, acker);
            }
        };

        Ok(out.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durable_names_drop_subject_separators() {
        assert_eq!(NatsBus::durable_name("user-service"), "user-service");
        assert_eq!(
            NatsBus::durable_name("user.service consumer"),
            "user-service-consumer"
        );
    }

    // End-to-end JetStream behavior needs a running server:
    //   docker run -p 4222:4222 nats:2.10-alpine -js
    #[tokio::test]
    #[ignore] // Requires NATS server
    async fn publish_subscribe_round_trip() {
        let bus = NatsBus::connect("nats://localhost:4222", NatsBusConfig::default())
            .await
            .expect("NATS server must be running on localhost:4222");

        let mut stream = bus
            .subscribe("taskboard.events.user.created.>", "nats-test")
            .await
            .unwrap();

        let ack = bus
            .publish(BusMessage::new(
                "taskboard.events.user.created.7",
                "7",
                b"hello".to_vec(),
            ))
            .await
            .unwrap();
        assert!(ack.sequence > 0);

        let delivery = tokio::time::timeout(std::time::Duration::from_secs(2), stream.next())
            .await
            .expect("timeout waiting for delivery")
            .expect("stream ended");

        assert_eq!(delivery.message.key, "7");
        assert_eq!(delivery.message.payload, b"hello");
        delivery.ack().await.unwrap();
    }
}
