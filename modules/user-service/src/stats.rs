//! Per-user activity counters maintained from consumed events.

use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UserStats {
    pub tasks_created: u64,
    pub tasks_updated: u64,
    pub project_memberships: u64,
}

/// In-memory projection of user activity.
///
/// Counters only move when the dispatcher commits an event, so at-least-once
/// delivery upstream still yields exact counts here.
#[derive(Debug, Default)]
pub struct UserStatsStore {
    stats: Mutex<HashMap<i64, UserStats>>,
}

impl UserStatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_task_created(&self, user_id: i64) {
        self.with_entry(user_id, |s| s.tasks_created += 1);
    }

    pub fn record_task_updated(&self, user_id: i64) {
        self.with_entry(user_id, |s| s.tasks_updated += 1);
    }

    pub fn record_project_membership(&self, user_id: i64) {
        self.with_entry(user_id, |s| s.project_memberships += 1);
    }

    pub fn get(&self, user_id: i64) -> Option<UserStats> {
        self.lock().get(&user_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn with_entry(&self, user_id: i64, update: impl FnOnce(&mut UserStats)) {
        update(self.lock().entry(user_id).or_default());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<i64, UserStats>> {
        self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
