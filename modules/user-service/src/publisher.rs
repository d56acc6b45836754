//! Outgoing user lifecycle events.

use chrono::Utc;
use event_bus::publisher::PublishResult;
use event_bus::{EventPublisher, PublishError};
use event_contracts::{UserCreatedV1, UserDeletedV1, UserUpdatedV1};

/// Facade over the shared publisher for the events this service owns.
///
/// Publication is fire-and-forget from the caller's perspective; broker
/// acknowledgement arrives on the completion callback.
#[derive(Clone)]
pub struct UserEventPublisher {
    publisher: EventPublisher,
}

impl UserEventPublisher {
    pub fn new(publisher: EventPublisher) -> Self {
        Self { publisher }
    }

    pub fn user_created(&self, event: UserCreatedV1) -> Result<(), PublishError> {
        let user_id = event.user_id;
        self.publisher.publish_with_callback(event, move |result| {
            log_outcome("user.created", user_id, result);
        })
    }

    pub fn user_updated(&self, event: UserUpdatedV1) -> Result<(), PublishError> {
        let user_id = event.user_id;
        self.publisher.publish_with_callback(event, move |result| {
            log_outcome("user.updated", user_id, result);
        })
    }

    /// Emits the tombstone other services use to prune their references.
    pub fn user_deleted(&self, user_id: i64, username: String, email: String) -> Result<(), PublishError> {
        let event = UserDeletedV1 {
            user_id,
            username,
            email,
            deleted_at: Utc::now(),
        };
        self.publisher.publish_with_callback(event, move |result| {
            log_outcome("user.deleted", user_id, result);
        })
    }
}

fn log_outcome(event_type: &str, user_id: i64, result: PublishResult) {
    match result {
        Ok(ack) => {
            tracing::debug!(event_type, user_id, sequence = ack.sequence, "Event accepted by broker");
        }
        Err(e) => {
            tracing::error!(event_type, user_id, error = %e, "Event publication failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_bus::{EventBus, InMemoryBus, TracingReporter};
    use futures::StreamExt;
    use std::sync::Arc;

    #[tokio::test]
    async fn user_deleted_lands_on_the_user_subject() {
        let bus = Arc::new(InMemoryBus::new());
        let mut stream = bus.subscribe("taskboard.events.user.deleted.>", "t").await.unwrap();

        let publisher = UserEventPublisher::new(EventPublisher::new(
            bus.clone(),
            Arc::new(event_contracts::catalog()),
            "user-service",
            Arc::new(TracingReporter),
        ));
        publisher
            .user_deleted(7, "jdoe".into(), "jdoe@example.com".into())
            .unwrap();

        let delivery = stream.next().await.unwrap();
        assert_eq!(delivery.message.subject, "taskboard.events.user.deleted.7");

        let envelope: serde_json::Value =
            serde_json::from_slice(&delivery.message.payload).unwrap();
        assert_eq!(envelope["eventType"], "user.deleted");
        assert_eq!(envelope["sourceService"], "user-service");
        assert_eq!(envelope["data"]["userId"], 7);
    }
}
