//! Events emitted by the user service.

use chrono::{DateTime, Utc};
use event_bus::AggregateEvent;
use serde::{Deserialize, Serialize};

use crate::topics;

/// A new account was registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCreatedV1 {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
}

impl AggregateEvent for UserCreatedV1 {
    const EVENT_TYPE: &'static str = topics::USER_CREATED;

    fn aggregate_key(&self) -> String {
        self.user_id.to_string()
    }
}

/// Profile or account-state change.
///
/// Version 1.1 added `status` and `changedFields`; both stay optional so a
/// 1.0 payload still parses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdatedV1 {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_fields: Option<Vec<String>>,
    pub updated_at: DateTime<Utc>,
}

impl AggregateEvent for UserUpdatedV1 {
    const EVENT_TYPE: &'static str = topics::USER_UPDATED;

    fn aggregate_key(&self) -> String {
        self.user_id.to_string()
    }
}

/// An account was removed; consumers prune their references to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDeletedV1 {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub deleted_at: DateTime<Utc>,
}

impl AggregateEvent for UserDeletedV1 {
    const EVENT_TYPE: &'static str = topics::USER_DELETED;

    fn aggregate_key(&self) -> String {
        self.user_id.to_string()
    }
}
