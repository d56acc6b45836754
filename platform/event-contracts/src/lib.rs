//! Shared event contracts for the taskboard services.
//!
//! Every cross-service event type lives here: the canonical type name, the
//! current schema version, and the typed payload struct. Services build
//! their [`EventCatalog`] from [`catalog()`] so producers and consumers
//! agree on what a valid payload looks like.
//!
//! Payload structs serialize with camelCase field names; that is the wire
//! contract, not a style choice.

use event_bus::EventCatalog;

pub mod project;
pub mod task;
pub mod user;

pub use project::{ProjectCreatedV1, ProjectMemberAddedV1};
pub use task::{TaskCreatedV1, TaskDeletedV1, TaskUpdatedV1};
pub use user::{UserCreatedV1, UserDeletedV1, UserUpdatedV1};

/// Canonical event type names. Dotted, lowercase, `<aggregate>.<action>`.
pub mod topics {
    pub const USER_CREATED: &str = "user.created";
    pub const USER_UPDATED: &str = "user.updated";
    pub const USER_DELETED: &str = "user.deleted";
    pub const PROJECT_CREATED: &str = "project.created";
    pub const PROJECT_MEMBER_ADDED: &str = "project.member.added";
    pub const TASK_CREATED: &str = "task.created";
    pub const TASK_UPDATED: &str = "task.updated";
    pub const TASK_DELETED: &str = "task.deleted";
}

/// The full taskboard catalog.
///
/// Versions are registered oldest first; the last registration for a type
/// becomes the version new publications carry. `user.updated` 1.1 added
/// optional fields on top of 1.0, so one struct parses both.
pub fn catalog() -> EventCatalog {
    EventCatalog::builder()
        .event::<UserCreatedV1>(topics::USER_CREATED, "1.0")
        .event::<UserUpdatedV1>(topics::USER_UPDATED, "1.0")
        .event::<UserUpdatedV1>(topics::USER_UPDATED, "1.1")
        .event::<UserDeletedV1>(topics::USER_DELETED, "1.0")
        .event::<ProjectCreatedV1>(topics::PROJECT_CREATED, "1.0")
        .event::<ProjectMemberAddedV1>(topics::PROJECT_MEMBER_ADDED, "1.0")
        .event::<TaskCreatedV1>(topics::TASK_CREATED, "1.0")
        .event::<TaskUpdatedV1>(topics::TASK_UPDATED, "1.0")
        .event::<TaskDeletedV1>(topics::TASK_DELETED, "1.0")
        .build()
}
