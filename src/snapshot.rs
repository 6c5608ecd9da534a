//! Per-station last-known state used as the diff baseline.

use std::collections::HashMap;

use crate::model::StationSnapshot;

/// Mapping of station id to its latest snapshot. At most one entry per id.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    entries: HashMap<String, StationSnapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&StationSnapshot> {
        self.entries.get(id)
    }

    /// Stores `snapshot`, returning the entry it replaced.
    pub fn upsert(&mut self, snapshot: StationSnapshot) -> Option<StationSnapshot> {
        self.entries.insert(snapshot.id.clone(), snapshot)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Sum of `bikes_available` across all stored stations.
    pub fn total_bikes(&self) -> u64 {
        self.entries
            .values()
            .map(|s| u64::from(s.bikes_available))
            .sum()
    }
}
