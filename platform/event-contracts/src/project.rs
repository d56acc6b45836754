//! Events emitted by the project service.

use chrono::{DateTime, NaiveDate, Utc};
use event_bus::AggregateEvent;
use serde::{Deserialize, Serialize};

use crate::topics;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCreatedV1 {
    pub project_id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub owner_id: i64,
    pub status: String,
    pub priority: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl AggregateEvent for ProjectCreatedV1 {
    const EVENT_TYPE: &'static str = topics::PROJECT_CREATED;

    fn aggregate_key(&self) -> String {
        self.project_id.to_string()
    }
}

/// A user joined a project roster.
///
/// May legitimately arrive before the matching [`ProjectCreatedV1`] when the
/// two were published close together; consumers must tolerate that order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMemberAddedV1 {
    pub project_id: i64,
    pub project_name: String,
    pub user_id: i64,
    pub user_role: String,
    pub added_by: i64,
    pub added_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invitation_token: Option<String>,
}

impl AggregateEvent for ProjectMemberAddedV1 {
    const EVENT_TYPE: &'static str = topics::PROJECT_MEMBER_ADDED;

    fn aggregate_key(&self) -> String {
        self.project_id.to_string()
    }
}
