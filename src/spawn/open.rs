use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::domain::OpenSpawn;

/// Open (published, unclaimed) spawns of one tenant, keyed by collectible id.
///
/// `take` is the claim gate: `DashMap::remove_if` checks liveness and removes
/// under the same shard lock, so at most one caller gets a given entry.
#[derive(Debug, Default)]
pub struct OpenSpawnTable {
    entries: DashMap<String, OpenSpawn>,
}

impl OpenSpawnTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a spawn; returns the entry it displaced, if any
    pub fn insert(&self, spawn: OpenSpawn) -> Option<OpenSpawn> {
        self.entries.insert(spawn.collectible_id.clone(), spawn)
    }

    pub fn contains(&self, collectible_id: &str) -> bool {
        self.entries.contains_key(collectible_id)
    }

    pub fn get(&self, collectible_id: &str) -> Option<OpenSpawn> {
        self.entries.get(collectible_id).map(|e| e.value().clone())
    }

    /// Remove and return the spawn if it is present and not expired
    pub fn take(&self, collectible_id: &str, now: DateTime<Utc>) -> Option<OpenSpawn> {
        self.entries
            .remove_if(collectible_id, |_, spawn| !spawn.is_expired(now))
            .map(|(_, spawn)| spawn)
    }

    /// Drop every expired entry and return what was dropped
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<OpenSpawn> {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.value().is_expired(now))
            .map(|e| e.key().clone())
            .collect();

        expired
            .iter()
            .filter_map(|id| self.entries.remove_if(id, |_, spawn| spawn.is_expired(now)))
            .map(|(_, spawn)| spawn)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current entries, soonest expiry first
    pub fn snapshot(&self) -> Vec<OpenSpawn> {
        let mut open: Vec<OpenSpawn> = self.entries.iter().map(|e| e.value().clone()).collect();
        open.sort_by(|a, b| a.expires_at.cmp(&b.expires_at));
        open
    }
}
