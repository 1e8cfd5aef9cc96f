//! Per-key MVCC version chain

use crate::stored_value::StoredValue;
use std::collections::VecDeque;

/// Versions of one key, newest first
///
/// Snapshot reads want the most recent version at or below the snapshot,
/// so keeping the chain newest-first makes the common case a scan of one
/// or two entries. `VecDeque` gives O(1) `push_front` for keys that are
/// rewritten repeatedly (queue tails, counters).
#[derive(Debug, Clone)]
pub struct VersionChain {
    versions: VecDeque<StoredValue>,
}

impl VersionChain {
    /// Create a chain holding a single version
    pub fn new(value: StoredValue) -> Self {
        let mut versions = VecDeque::with_capacity(4);
        versions.push_front(value);
        Self { versions }
    }

    /// Add a version (must be newer than every existing version)
    #[inline]
    pub fn push(&mut self, value: StoredValue) {
        debug_assert!(
            self.versions
                .front()
                .map_or(true, |newest| newest.version() < value.version()),
            "versions must be pushed in increasing order"
        );
        self.versions.push_front(value);
    }

    /// Replace the newest entry (a later mutation of the same commit)
    pub fn replace_latest(&mut self, value: StoredValue) {
        match self.versions.front_mut() {
            Some(newest) => *newest = value,
            None => self.versions.push_front(value),
        }
    }

    /// Newest entry with `version <= max_version`
    pub fn get_at_version(&self, max_version: u64) -> Option<&StoredValue> {
        self.versions.iter().find(|sv| sv.version() <= max_version)
    }

    /// Newest entry
    #[inline]
    pub fn latest(&self) -> Option<&StoredValue> {
        self.versions.front()
    }

    /// Drop versions no snapshot at or after `min_version` can observe
    ///
    /// Keeps every version newer than `min_version` plus the newest one at
    /// or below it. Returns the number of versions removed.
    pub fn gc(&mut self, min_version: u64) -> usize {
        let visible = self
            .versions
            .iter()
            .position(|sv| sv.version() <= min_version);
        match visible {
            Some(index) => {
                let before = self.versions.len();
                self.versions.truncate(index + 1);
                before - self.versions.len()
            }
            None => 0,
        }
    }

    /// Whether the only remaining entry is a tombstone at or below `min_version`
    ///
    /// Such a chain is invisible to every current and future snapshot and can
    /// be removed outright.
    pub fn is_dead(&self, min_version: u64) -> bool {
        self.versions.len() == 1
            && self
                .versions
                .front()
                .is_some_and(|sv| sv.is_tombstone() && sv.version() <= min_version)
    }

    /// Number of versions stored
    pub fn version_count(&self) -> usize {
        self.versions.len()
    }
}
