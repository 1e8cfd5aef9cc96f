//! UnifiedStore: ordered in-memory MVCC key-value store
//!
//! This module implements the backing store using:
//! - `BTreeMap<ByteSlice, VersionChain>` for ordered keys with version history
//! - `parking_lot::RwLock` for thread-safe access
//! - `AtomicU64` for the published commit version
//!
//! # Design Notes
//!
//! - **Snapshot reads**: every read names a version and sees the newest
//!   entry at or below it, so readers never block on a concurrent commit
//!   beyond the brief read lock.
//! - **Tombstones**: clears push a tombstone instead of removing the chain,
//!   which lets conflict validation see that a key changed.
//! - **Publish after apply**: `apply` installs every mutation of a commit
//!   under the write lock and only then advances `current_version`. A
//!   snapshot taken at `current_version()` therefore never observes half a
//!   commit.
//! - **Single writer**: callers serialize `apply` (the transaction manager
//!   holds its commit lock); versions passed to `apply` must increase.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use strata_core::ByteSlice;
use tracing::debug;

use crate::stored_value::StoredValue;
use crate::version_chain::VersionChain;

/// A buffered write, applied atomically at commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Write `value` at `key`
    Set {
        /// Target key
        key: ByteSlice,
        /// New value
        value: ByteSlice,
    },
    /// Remove `key`
    Clear {
        /// Target key
        key: ByteSlice,
    },
    /// Remove every key with `begin <= key < end`
    ClearRange {
        /// Inclusive lower bound
        begin: ByteSlice,
        /// Exclusive upper bound
        end: ByteSlice,
    },
}

/// Ordered MVCC store shared by every transaction of a database
#[derive(Debug, Default)]
pub struct UnifiedStore {
    data: RwLock<BTreeMap<ByteSlice, VersionChain>>,
    version: AtomicU64,
}

impl UnifiedStore {
    /// Create an empty store at version 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest fully applied commit version
    pub fn current_version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Value of `key` as of `version` (`None` if absent or deleted)
    pub fn get_at(&self, key: &ByteSlice, version: u64) -> Option<ByteSlice> {
        let data = self.data.read();
        data.get(key)
            .and_then(|chain| chain.get_at_version(version))
            .and_then(|sv| sv.value().cloned())
    }

    /// Commit version of the newest change to `key`, tombstones included
    pub fn latest_version(&self, key: &ByteSlice) -> Option<u64> {
        let data = self.data.read();
        data.get(key)
            .and_then(|chain| chain.latest())
            .map(|sv| sv.version())
    }

    /// Live pairs with `begin <= key < end` as of `version`
    ///
    /// Keys for which `skip` returns true are passed over without counting
    /// toward `limit`. Pairs come back in ascending key order, or descending
    /// when `reverse` is set.
    pub fn scan_at<F>(
        &self,
        begin: &ByteSlice,
        end: &ByteSlice,
        version: u64,
        limit: Option<usize>,
        reverse: bool,
        skip: F,
    ) -> Vec<(ByteSlice, ByteSlice)>
    where
        F: Fn(&ByteSlice) -> bool,
    {
        if begin >= end {
            return Vec::new();
        }
        let limit = limit.unwrap_or(usize::MAX);
        let data = self.data.read();
        let range = data.range::<ByteSlice, _>((Bound::Included(begin), Bound::Excluded(end)));

        let visible = |(key, chain): (&ByteSlice, &VersionChain)| {
            if skip(key) {
                return None;
            }
            chain
                .get_at_version(version)
                .and_then(|sv| sv.value())
                .map(|value| (key.clone(), value.clone()))
        };

        if reverse {
            range.rev().filter_map(visible).take(limit).collect()
        } else {
            range.filter_map(visible).take(limit).collect()
        }
    }

    /// First key in `[begin, end)` changed by a commit newer than `version`
    ///
    /// Used to validate range reads: any such key means the range a
    /// transaction observed is no longer what it would observe now.
    pub fn first_changed_in_range(
        &self,
        begin: &ByteSlice,
        end: &ByteSlice,
        version: u64,
    ) -> Option<ByteSlice> {
        if begin >= end {
            return None;
        }
        let data = self.data.read();
        data.range::<ByteSlice, _>((Bound::Included(begin), Bound::Excluded(end)))
            .find(|(_, chain)| chain.latest().is_some_and(|sv| sv.version() > version))
            .map(|(key, _)| key.clone())
    }

    /// Install all `mutations` at `version`, then publish `version`
    ///
    /// Mutations apply in order, so a set after a range clear survives it.
    pub fn apply(&self, mutations: &[Mutation], version: u64) {
        let mut data = self.data.write();
        for mutation in mutations {
            match mutation {
                Mutation::Set { key, value } => {
                    write_entry(&mut data, key, StoredValue::new(value.clone(), version));
                }
                Mutation::Clear { key } => {
                    if is_live(&data, key) {
                        write_entry(&mut data, key, StoredValue::tombstone(version));
                    }
                }
                Mutation::ClearRange { begin, end } => {
                    if begin >= end {
                        continue;
                    }
                    for (_, chain) in data
                        .range_mut::<ByteSlice, _>((Bound::Included(begin), Bound::Excluded(end)))
                    {
                        if chain.latest().is_some_and(|sv| !sv.is_tombstone()) {
                            overwrite(chain, StoredValue::tombstone(version));
                        }
                    }
                }
            }
        }
        drop(data);
        self.version.store(version, Ordering::Release);
    }

    /// Prune versions invisible to snapshots at or after `min_version`
    ///
    /// Returns the number of versions removed.
    pub fn gc(&self, min_version: u64) -> usize {
        let mut data = self.data.write();
        let mut pruned = 0;
        for chain in data.values_mut() {
            pruned += chain.gc(min_version);
        }
        let before = data.len();
        data.retain(|_, chain| !chain.is_dead(min_version));
        pruned += before - data.len();
        if pruned > 0 {
            debug!(min_version, pruned, "Pruned unreachable versions");
        }
        pruned
    }

    /// Number of keys whose newest entry is live
    pub fn len(&self) -> usize {
        self.data
            .read()
            .values()
            .filter(|chain| chain.latest().is_some_and(|sv| !sv.is_tombstone()))
            .count()
    }

    /// Check if no key is live
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total versions held across all chains
    pub fn version_count(&self) -> usize {
        self.data.read().values().map(VersionChain::version_count).sum()
    }
}

fn is_live(data: &BTreeMap<ByteSlice, VersionChain>, key: &ByteSlice) -> bool {
    data.get(key)
        .and_then(|chain| chain.latest())
        .is_some_and(|sv| !sv.is_tombstone())
}

fn write_entry(data: &mut BTreeMap<ByteSlice, VersionChain>, key: &ByteSlice, entry: StoredValue) {
    match data.get_mut(key) {
        Some(chain) => overwrite(chain, entry),
        None => {
            data.insert(key.clone(), VersionChain::new(entry));
        }
    }
}

/// Push `entry`, replacing the newest version if the same commit already wrote it
fn overwrite(chain: &mut VersionChain, entry: StoredValue) {
    if chain.latest().is_some_and(|sv| sv.version() == entry.version()) {
        chain.replace_latest(entry);
    } else {
        chain.push(entry);
    }
}
