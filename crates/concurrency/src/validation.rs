//! Transaction validation for OCC
//!
//! Conflict rules:
//! - First-committer-wins based on what was READ, not what was written
//! - Blind writes (write without read) do NOT conflict
//! - A range read conflicts with any later commit touching a key inside it,
//!   including keys that did not exist when the range was read
//! - Reads satisfied from the transaction's own buffer are never validated

use crate::transaction::{KeyRange, TransactionContext};
use std::collections::HashSet;
use std::fmt::Write as _;
use strata_core::ByteSlice;
use strata_storage::UnifiedStore;

/// Types of conflicts that can occur during transaction validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictType {
    /// A key read by the transaction was written by a later commit
    ReadWriteConflict {
        /// The key that has a conflict
        key: ByteSlice,
        /// Snapshot version the transaction read at
        read_version: u64,
        /// Commit version of the newest change to the key
        current_version: u64,
    },

    /// A range read by the transaction had a key changed by a later commit
    RangeConflict {
        /// Inclusive start of the range that was read
        begin: ByteSlice,
        /// Exclusive end of the range that was read
        end: ByteSlice,
        /// First key inside the range that changed
        changed_key: ByteSlice,
    },
}

impl std::fmt::Display for ConflictType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictType::ReadWriteConflict {
                key,
                read_version,
                current_version,
            } => write!(
                f,
                "key {} read at version {} changed at version {}",
                key, read_version, current_version
            ),
            ConflictType::RangeConflict {
                begin,
                end,
                changed_key,
            } => write!(
                f,
                "range [{}, {}) changed at key {}",
                begin, end, changed_key
            ),
        }
    }
}

/// Result of transaction validation
///
/// Accumulates all conflicts found during validation.
/// A transaction commits only if is_valid() returns true.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// All conflicts detected during validation
    pub conflicts: Vec<ConflictType>,
}

impl ValidationResult {
    /// Create a successful validation result (no conflicts)
    pub fn ok() -> Self {
        ValidationResult {
            conflicts: Vec::new(),
        }
    }

    /// Create a validation result with a single conflict
    pub fn conflict(conflict: ConflictType) -> Self {
        ValidationResult {
            conflicts: vec![conflict],
        }
    }

    /// Check if validation passed (no conflicts)
    pub fn is_valid(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Merge another validation result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        self.conflicts.extend(other.conflicts);
    }

    /// Get the number of conflicts
    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }

    /// One-line summary naming the first conflict
    pub fn describe(&self) -> String {
        let mut out = String::new();
        match self.conflicts.first() {
            None => out.push_str("no conflicts"),
            Some(first) => {
                let _ = write!(out, "{}", first);
                if self.conflicts.len() > 1 {
                    let _ = write!(out, " (+{} more)", self.conflicts.len() - 1);
                }
            }
        }
        out
    }
}

/// Check each read key for a commit newer than `start_version`
pub fn validate_read_set(
    read_set: &HashSet<ByteSlice>,
    start_version: u64,
    store: &UnifiedStore,
) -> ValidationResult {
    let mut result = ValidationResult::ok();

    for key in read_set {
        if let Some(current_version) = store.latest_version(key) {
            if current_version > start_version {
                result.conflicts.push(ConflictType::ReadWriteConflict {
                    key: key.clone(),
                    read_version: start_version,
                    current_version,
                });
            }
        }
    }

    result
}

/// Check each read range for a key changed after `start_version`
pub fn validate_read_ranges(
    read_ranges: &[KeyRange],
    start_version: u64,
    store: &UnifiedStore,
) -> ValidationResult {
    let mut result = ValidationResult::ok();

    for range in read_ranges {
        if let Some(changed_key) =
            store.first_changed_in_range(&range.begin, &range.end, start_version)
        {
            result.conflicts.push(ConflictType::RangeConflict {
                begin: range.begin.clone(),
                end: range.end.clone(),
                changed_key,
            });
        }
    }

    result
}

/// Validate a complete transaction against current storage state
///
/// Read-only transactions always pass: they observed one consistent
/// snapshot and have nothing to publish.
pub fn validate_transaction(txn: &TransactionContext) -> ValidationResult {
    if txn.is_read_only() {
        return ValidationResult::ok();
    }

    let store = txn.store();
    let mut result = validate_read_set(&txn.read_set, txn.start_version, store);
    result.merge(validate_read_ranges(&txn.read_ranges, txn.start_version, store));
    result
}
