//! Incoming event subscriptions for the project service.

use std::sync::Arc;

use event_consumer::{typed_handler, HandlerRegistry};
use event_contracts::{topics, UserDeletedV1};

use crate::roster::ProjectRosterStore;

pub fn build_registry(roster: Arc<ProjectRosterStore>) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();

    registry.register(
        topics::USER_DELETED,
        typed_handler(move |_ctx, user: UserDeletedV1| {
            let roster = roster.clone();
            async move {
                let pruned = roster.remove_user(user.user_id);
                tracing::info!(
                    user_id = user.user_id,
                    username = %user.username,
                    pruned,
                    "Removed deleted user from project rosters"
                );
                Ok(())
            }
        }),
    );

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use event_consumer::EventContext;
    use uuid::Uuid;

    #[tokio::test]
    async fn user_deleted_prunes_rosters() {
        let roster = Arc::new(ProjectRosterStore::new());
        roster.add_member(1, 7);
        roster.add_member(2, 7);

        let registry = build_registry(roster.clone());
        let handler = registry.get(topics::USER_DELETED).unwrap();

        let ctx = EventContext {
            event_id: Uuid::new_v4(),
            event_type: topics::USER_DELETED.into(),
            source_service: "user-service".into(),
            timestamp: Utc::now(),
            version: "1.0".into(),
            key: "7".into(),
            attempt: 1,
        };
        let data = serde_json::json!({
            "userId": 7,
            "username": "jdoe",
            "email": "jdoe@example.com",
            "deletedAt": "2026-03-01T12:00:00Z"
        });
        handler.handle(&ctx, &data).await.unwrap();

        assert!(!roster.is_member(1, 7));
        assert!(!roster.is_member(2, 7));
    }
}
