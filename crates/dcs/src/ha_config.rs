use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Member;

const DEFAULT_MAX_LAG_ON_SWITCHOVER: u64 = 1_048_576;

/// Per-member deletion marker.
///
/// Members absent from the marker map are [`DeletionState::NotDeleting`].
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DeletionState {
    /// No removal in progress.
    #[default]
    NotDeleting,

    /// Removal started but not confirmed.
    Deleting,

    /// Removal confirmed.
    Deleted,
}

/// HA configuration kept by the store for the whole cluster.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HaConfig {
    /// Whether HA management is enabled for the cluster.
    pub enable: bool,

    /// Leader lease TTL in seconds.
    pub ttl: u64,

    /// Maximum replication lag (bytes) tolerated for a switchover candidate.
    pub max_lag_on_switchover: u64,

    /// Deletion markers keyed by member name.
    #[serde(default)]
    pub delete_members: BTreeMap<String, DeletionState>,
}

impl Default for HaConfig {
    fn default() -> Self {
        Self {
            enable: true,
            ttl: 15,
            max_lag_on_switchover: DEFAULT_MAX_LAG_ON_SWITCHOVER,
            delete_members: BTreeMap::new(),
        }
    }
}

impl HaConfig {
    /// Current marker for `member`.
    #[must_use]
    pub fn deletion_state(&self, member: &Member) -> DeletionState {
        self.delete_members
            .get(&member.name)
            .copied()
            .unwrap_or_default()
    }

    /// Whether `member` is marked as being removed.
    #[must_use]
    pub fn is_deleting(&self, member: &Member) -> bool {
        self.deletion_state(member) == DeletionState::Deleting
    }

    /// Whether `member` removal has been confirmed.
    #[must_use]
    pub fn is_deleted(&self, member: &Member) -> bool {
        self.deletion_state(member) == DeletionState::Deleted
    }

    /// Marks `member` as being removed.
    pub fn add_member_to_delete(&mut self, member: &Member) {
        self.delete_members
            .insert(member.name.clone(), DeletionState::Deleting);
    }

    /// Confirms removal of `member`. A member that was never marked is left alone.
    pub fn finish_deleted(&mut self, member: &Member) {
        if let Some(state) = self.delete_members.get_mut(&member.name) {
            *state = DeletionState::Deleted;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(name: &str) -> Member {
        Member {
            name: name.to_string(),
            ..Member::default()
        }
    }

    #[test]
    fn test_marker_transitions() {
        let mut config = HaConfig::default();
        let m = member("pod-0");

        assert_eq!(config.deletion_state(&m), DeletionState::NotDeleting);

        config.add_member_to_delete(&m);
        assert!(config.is_deleting(&m));

        config.finish_deleted(&m);
        assert!(config.is_deleted(&m));
        assert!(!config.is_deleting(&m));
    }

    #[test]
    fn test_finish_without_mark_is_noop() {
        let mut config = HaConfig::default();
        let m = member("pod-1");

        config.finish_deleted(&m);

        assert_eq!(config.deletion_state(&m), DeletionState::NotDeleting);
        assert!(config.delete_members.is_empty());
    }

    #[test]
    fn test_serialized_marker_names() {
        let mut config = HaConfig::default();
        config.add_member_to_delete(&member("pod-2"));

        let json = serde_json::to_value(&config).unwrap();

        assert_eq!(json["deleteMembers"]["pod-2"], "deleting");
        assert_eq!(json["maxLagOnSwitchover"], 1_048_576);
    }
}
