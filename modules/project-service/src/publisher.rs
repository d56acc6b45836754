//! Outgoing project lifecycle and roster events.

use event_bus::publisher::PublishResult;
use event_bus::{EventPublisher, PublishError};
use event_contracts::{ProjectCreatedV1, ProjectMemberAddedV1};

#[derive(Clone)]
pub struct ProjectEventPublisher {
    publisher: EventPublisher,
}

impl ProjectEventPublisher {
    pub fn new(publisher: EventPublisher) -> Self {
        Self { publisher }
    }

    pub fn project_created(&self, event: ProjectCreatedV1) -> Result<(), PublishError> {
        let project_id = event.project_id;
        self.publisher.publish_with_callback(event, move |result| {
            log_outcome("project.created", project_id, result);
        })
    }

    /// Both roster and project events share the project id as partition key,
    /// so a member-added never overtakes the project.created it follows.
    pub fn member_added(&self, event: ProjectMemberAddedV1) -> Result<(), PublishError> {
        let project_id = event.project_id;
        self.publisher.publish_with_callback(event, move |result| {
            log_outcome("project.member.added", project_id, result);
        })
    }
}

fn log_outcome(event_type: &str, project_id: i64, result: PublishResult) {
    match result {
        Ok(ack) => {
            tracing::debug!(
                event_type,
                project_id,
                sequence = ack.sequence,
                "Event accepted by broker"
            );
        }
        Err(e) => {
            tracing::error!(event_type, project_id, error = %e, "Event publication failed");
        }
    }
}
