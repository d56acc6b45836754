//! Events emitted by the task service.

use chrono::{DateTime, Utc};
use event_bus::AggregateEvent;
use serde::{Deserialize, Serialize};

use crate::topics;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreatedV1 {
    pub task_id: i64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub user_id: i64,
    pub project_id: i64,
    pub status: String,
    pub priority: String,
    pub created_at: DateTime<Utc>,
}

impl AggregateEvent for TaskCreatedV1 {
    const EVENT_TYPE: &'static str = topics::TASK_CREATED;

    fn aggregate_key(&self) -> String {
        self.task_id.to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdatedV1 {
    pub task_id: i64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub user_id: i64,
    pub project_id: i64,
    pub status: String,
    pub priority: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

impl AggregateEvent for TaskUpdatedV1 {
    const EVENT_TYPE: &'static str = topics::TASK_UPDATED;

    fn aggregate_key(&self) -> String {
        self.task_id.to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDeletedV1 {
    pub task_id: i64,
    pub title: String,
    pub user_id: i64,
    pub project_id: i64,
    pub deleted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AggregateEvent for TaskDeletedV1 {
    const EVENT_TYPE: &'static str = topics::TASK_DELETED;

    fn aggregate_key(&self) -> String {
        self.task_id.to_string()
    }
}
