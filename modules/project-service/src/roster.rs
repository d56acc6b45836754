//! Project membership rosters maintained from consumed events.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// In-memory view of who belongs to which project.
///
/// Membership for a project can arrive before the project itself is known
/// here; the roster is created on first touch either way.
#[derive(Debug, Default)]
pub struct ProjectRosterStore {
    members: Mutex<HashMap<i64, HashSet<i64>>>,
}

impl ProjectRosterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_member(&self, project_id: i64, user_id: i64) -> bool {
        self.lock().entry(project_id).or_default().insert(user_id)
    }

    /// Remove a user from every roster. Returns how many projects they
    /// were pruned from.
    pub fn remove_user(&self, user_id: i64) -> usize {
        let mut members = self.lock();
        let mut pruned = 0;
        for roster in members.values_mut() {
            if roster.remove(&user_id) {
                pruned += 1;
            }
        }
        pruned
    }

    pub fn members_of(&self, project_id: i64) -> Vec<i64> {
        let members = self.lock();
        let mut ids: Vec<i64> = members
            .get(&project_id)
            .map(|roster| roster.iter().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    pub fn is_member(&self, project_id: i64, user_id: i64) -> bool {
        self.lock()
            .get(&project_id)
            .is_some_and(|roster| roster.contains(&user_id))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<i64, HashSet<i64>>> {
        self.members
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removing_a_user_prunes_every_roster() {
        let store = ProjectRosterStore::new();
        assert!(store.add_member(1, 7));
        assert!(store.add_member(2, 7));
        assert!(store.add_member(2, 9));
        // Re-adding is a no-op, not an error.
        assert!(!store.add_member(2, 9));

        assert_eq!(store.remove_user(7), 2);
        assert!(!store.is_member(1, 7));
        assert_eq!(store.members_of(2), vec![9]);
        assert_eq!(store.remove_user(7), 0);
    }
}
