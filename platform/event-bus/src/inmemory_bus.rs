//! In-memory implementation of the EventBus trait for testing and development
//!
//! Unlike a plain broadcast channel, this implementation models the delivery
//! semantics consumers rely on: each (pattern, group) pair gets its own queue,
//! so every group sees every matching message while subscribers within one
//! group split them, deliveries carry an attempt counter, and a `nak`
//! re-enqueues the message for redelivery. Publish order is preserved per
//! queue, which gives the per-key ordering guarantee for free since all
//! events about one aggregate share a subject.

use crate::{Acker, BusMessage, BusResult, Delivery, EventBus, PublishAck};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Clone)]
struct Queued {
    message: BusMessage,
    attempt: u32,
}

struct GroupQueue {
    pattern: String,
    group: String,
    members: Vec<mpsc::UnboundedSender<Queued>>,
    next: usize,
}

/// EventBus implementation backed by in-process queues
///
/// Suitable for unit tests, local development without a broker, and
/// integration tests that need fast, isolated delivery with real
/// at-least-once behavior (nak → redelivery).
///
/// # Example
/// ```rust
/// use event_bus::{BusMessage, EventBus, InMemoryBus};
/// use futures::StreamExt;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let bus = InMemoryBus::new();
/// let mut stream = bus.subscribe("test.events.>", "demo").await?;
///
/// bus.publish(BusMessage::new("test.events.created", "1", b"hello".to_vec())).await?;
///
/// let delivery = stream.next().await.unwrap();
/// assert_eq!(delivery.message.subject, "test.events.created");
/// delivery.ack().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct InMemoryBus {
    queues: Arc<Mutex<Vec<GroupQueue>>>,
    sequence: Arc<AtomicU64>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self {
            queues: Arc::new(Mutex::new(Vec::new())),
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Check if a subject matches a subscription pattern.
    ///
    /// NATS-style wildcards:
    /// - `*` matches exactly one token
    /// - `>` matches one or more trailing tokens
    fn matches_pattern(subject: &str, pattern: &str) -> bool {
        let subject_tokens: Vec<&str> = subject.split('.').collect();
        let pattern_tokens: Vec<&str> = pattern.split('.').collect();

        let mut s_idx = 0;
        let mut p_idx = 0;

        while s_idx < subject_tokens.len() && p_idx < pattern_tokens.len() {
            let pattern_token = pattern_tokens[p_idx];

            if pattern_token == ">" {
                return true;
            } else if pattern_token == "*" || subject_tokens[s_idx] == pattern_token {
                s_idx += 1;
                p_idx += 1;
            } else {
                return false;
            }
        }

        s_idx == subject_tokens.len() && p_idx == pattern_tokens.len()
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

struct InMemoryAcker {
    tx: mpsc::UnboundedSender<Queued>,
    queued: Queued,
}

#[async_trait]
impl Acker for InMemoryAcker {
    async fn ack(&self) -> BusResult<()> {
        Ok(())
    }

    async fn nak(&self) -> BusResult<()> {
        // Re-enqueue for redelivery with a bumped attempt counter. If the
        // subscriber is gone there is nobody left to redeliver to.
        let _ = self.tx.send(Queued {
            message: self.queued.message.clone(),
            attempt: self.queued.attempt + 1,
        });
        Ok(())
    }
}

#[async_trait]
impl EventBus for InMemoryBus {
    async fn publish(&self, message: BusMessage) -> BusResult<PublishAck> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;

        let mut queues = self
            .queues
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Drop members whose receiver went away, then empty groups.
        queues.retain_mut(|queue| {
            queue.members.retain(|tx| !tx.is_closed());
            !queue.members.is_empty()
        });

        for queue in queues.iter_mut() {
            if Self::matches_pattern(&message.subject, &queue.pattern) {
                // Round-robin within the group, like pullers sharing one
                // durable consumer.
                let member = &queue.members[queue.next % queue.members.len()];
                queue.next = queue.next.wrapping_add(1);
                let _ = member.send(Queued {
                    message: message.clone(),
                    attempt: 1,
                });
            }
        }

        Ok(PublishAck { sequence })
    }

    async fn subscribe(
        &self,
        pattern: &str,
        group: &str,
    ) -> BusResult<BoxStream<'static, Delivery>> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Queued>();

        {
            let mut queues = self
                .queues
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match queues
                .iter_mut()
                .find(|queue| queue.pattern == pattern && queue.group == group)
            {
                Some(queue) => queue.members.push(tx.clone()),
                None => queues.push(GroupQueue {
                    pattern: pattern.to_string(),
                    group: group.to_string(),
                    members: vec![tx.clone()],
                    next: 0,
                }),
            }
        }

        tracing::debug!(pattern = %pattern, group = %group, "in-memory subscription created");

        let stream = async_stream::stream! {
            while let Some(queued) = rx.recv().await {
                let acker = Arc::new(InMemoryAcker {
                    tx: tx.clone(),
                    queued: queued.clone(),
                });
                yield Delivery::new(queued.message, queued.attempt, acker);
            }
        };

        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn next_delivery(stream: &mut BoxStream<'static, Delivery>) -> Delivery {
        tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("timeout")
            .expect("stream ended")
    }

    #[test]
    fn pattern_matching() {
        assert!(InMemoryBus::matches_pattern(
            "taskboard.events.user.created.7",
            "taskboard.events.user.created.>"
        ));
        assert!(InMemoryBus::matches_pattern(
            "taskboard.events.user.created.7",
            "taskboard.events.*.created.*"
        ));
        assert!(!InMemoryBus::matches_pattern(
            "taskboard.events.user.created.7",
            "taskboard.events.task.>"
        ));
        assert!(InMemoryBus::matches_pattern("single", "*"));
        assert!(InMemoryBus::matches_pattern("single", ">"));
        assert!(!InMemoryBus::matches_pattern("one.two", "one"));
        assert!(!InMemoryBus::matches_pattern(
            "taskboard.events.user.created.7",
            "taskboard.events.user.created"
        ));
    }

    #[tokio::test]
    async fn publish_and_subscribe() {
        let bus = InMemoryBus::new();
        let mut stream = bus.subscribe("test.events.>", "g1").await.unwrap();

        bus.publish(BusMessage::new("test.events.user.created", "7", b"m".to_vec()))
            .await
            .unwrap();

        let delivery = next_delivery(&mut stream).await;
        assert_eq!(delivery.message.subject, "test.events.user.created");
        assert_eq!(delivery.message.key, "7");
        assert_eq!(delivery.attempt, 1);
        delivery.ack().await.unwrap();
    }

    #[tokio::test]
    async fn sequences_are_monotonic() {
        let bus = InMemoryBus::new();
        let a = bus
            .publish(BusMessage::new("t.a", "1", vec![]))
            .await
            .unwrap();
        let b = bus
            .publish(BusMessage::new("t.b", "1", vec![]))
            .await
            .unwrap();
        assert!(b.sequence > a.sequence);
    }

    #[tokio::test]
    async fn messages_arrive_in_publish_order() {
        let bus = InMemoryBus::new();
        let mut stream = bus.subscribe("test.>", "g1").await.unwrap();

        for i in 0..5 {
            bus.publish(BusMessage::new(
                format!("test.msg.{i}"),
                i.to_string(),
                format!("message {i}").into_bytes(),
            ))
            .await
            .unwrap();
        }

        for i in 0..5 {
            let delivery = next_delivery(&mut stream).await;
            assert_eq!(delivery.message.subject, format!("test.msg.{i}"));
        }
    }

    #[tokio::test]
    async fn nak_causes_redelivery_with_bumped_attempt() {
        let bus = InMemoryBus::new();
        let mut stream = bus.subscribe("test.>", "g1").await.unwrap();

        bus.publish(BusMessage::new("test.msg", "1", b"retry me".to_vec()))
            .await
            .unwrap();

        let first = next_delivery(&mut stream).await;
        assert_eq!(first.attempt, 1);
        first.nak().await.unwrap();

        let second = next_delivery(&mut stream).await;
        assert_eq!(second.attempt, 2);
        assert_eq!(second.message.payload, b"retry me");
        second.ack().await.unwrap();

        let no_more = tokio::time::timeout(Duration::from_millis(100), stream.next()).await;
        assert!(no_more.is_err(), "acked message must not come back");
    }

    #[tokio::test]
    async fn each_group_receives_its_own_copy() {
        let bus = InMemoryBus::new();
        let mut user_svc = bus.subscribe("test.>", "user-service").await.unwrap();
        let mut proj_svc = bus.subscribe("test.>", "project-service").await.unwrap();

        bus.publish(BusMessage::new("test.msg", "1", b"fanout".to_vec()))
            .await
            .unwrap();

        assert_eq!(next_delivery(&mut user_svc).await.message.payload, b"fanout");
        assert_eq!(next_delivery(&mut proj_svc).await.message.payload, b"fanout");
    }

    #[tokio::test]
    async fn same_group_subscribers_split_deliveries() {
        let bus = InMemoryBus::new();
        let mut a = bus.subscribe("test.>", "workers").await.unwrap();
        let mut b = bus.subscribe("test.>", "workers").await.unwrap();

        for i in 0..4u8 {
            bus.publish(BusMessage::new(format!("test.msg.{i}"), i.to_string(), vec![i]))
                .await
                .unwrap();
        }

        // Round-robin: each member sees half the messages, none twice.
        let mut subjects = Vec::new();
        for _ in 0..2 {
            subjects.push(next_delivery(&mut a).await.message.subject);
            subjects.push(next_delivery(&mut b).await.message.subject);
        }
        subjects.sort();
        assert_eq!(
            subjects,
            vec!["test.msg.0", "test.msg.1", "test.msg.2", "test.msg.3"]
        );

        let no_more = tokio::time::timeout(Duration::from_millis(100), a.next()).await;
        assert!(no_more.is_err(), "no member may see a message twice");
    }

    #[tokio::test]
    async fn non_matching_subjects_are_filtered() {
        let bus = InMemoryBus::new();
        let mut stream = bus.subscribe("test.events.user.*", "g1").await.unwrap();

        bus.publish(BusMessage::new("test.events.user.created", "1", b"yes".to_vec()))
            .await
            .unwrap();
        bus.publish(BusMessage::new("test.events.task.created", "1", b"no".to_vec()))
            .await
            .unwrap();

        let delivery = next_delivery(&mut stream).await;
        assert_eq!(delivery.message.payload, b"yes");

        let no_more = tokio::time::timeout(Duration::from_millis(100), stream.next()).await;
        assert!(no_more.is_err());
    }
}
