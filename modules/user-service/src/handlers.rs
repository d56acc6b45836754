//! Incoming event subscriptions for the user service.

use std::sync::Arc;

use event_consumer::{typed_handler, HandlerRegistry};
use event_contracts::{topics, ProjectMemberAddedV1, TaskCreatedV1, TaskUpdatedV1};

use crate::stats::UserStatsStore;

/// Wire up every event type this service consumes.
pub fn build_registry(stats: Arc<UserStatsStore>) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();

    let store = stats.clone();
    registry.register(
        topics::TASK_CREATED,
        typed_handler(move |ctx, task: TaskCreatedV1| {
            let store = store.clone();
            async move {
                tracing::info!(
                    task_id = task.task_id,
                    user_id = task.user_id,
                    source = %ctx.source_service,
                    "Task created for user"
                );
                store.record_task_created(task.user_id);
                Ok(())
            }
        }),
    );

    let store = stats.clone();
    registry.register(
        topics::TASK_UPDATED,
        typed_handler(move |_ctx, task: TaskUpdatedV1| {
            let store = store.clone();
            async move {
                store.record_task_updated(task.user_id);
                Ok(())
            }
        }),
    );

    let store = stats;
    registry.register(
        topics::PROJECT_MEMBER_ADDED,
        typed_handler(move |_ctx, member: ProjectMemberAddedV1| {
            let store = store.clone();
            async move {
                tracing::info!(
                    project_id = member.project_id,
                    user_id = member.user_id,
                    role = %member.user_role,
                    "User added to project"
                );
                store.record_project_membership(member.user_id);
                Ok(())
            }
        }),
    );

    registry
}
