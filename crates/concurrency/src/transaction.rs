//! Transaction context for OCC
//!
//! This module implements the core transaction data structure for optimistic
//! concurrency control. `TransactionContext` reads from a fixed snapshot of
//! the store, buffers every write, and records what it observed so the
//! commit can be validated against everything committed since it started.
//!
//! # Read-your-writes
//!
//! Reads consult the transaction's own buffered writes before the snapshot:
//! a buffered set is returned as-is, a buffered clear (point or range) reads
//! as absent. Such reads depend only on this transaction and are not
//! recorded for validation.
//!
//! # Write ordering
//!
//! `clear_range` discards buffered point writes inside the range, so the
//! write set only ever holds writes made after the last covering range
//! clear. Commit therefore applies range clears first, then point writes.

use crate::validation::{validate_transaction, ValidationResult};
use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::sync::Arc;
use strata_core::{ByteSlice, KeyValue, RangeOptions, StrataError, StrataResult, Transaction};
use strata_storage::{Mutation, UnifiedStore};
use thiserror::Error;

/// Error type for commit failures
#[derive(Debug, Clone, Error)]
pub enum CommitError {
    /// Aborted because something this transaction read has since changed
    #[error("Commit failed: {} conflict(s)", .0.conflict_count())]
    ValidationFailed(ValidationResult),

    /// Transaction was not in a state that allows commit
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl From<CommitError> for StrataError {
    fn from(e: CommitError) -> Self {
        match e {
            CommitError::ValidationFailed(result) => StrataError::conflict(result.describe()),
            CommitError::InvalidState(msg) => StrataError::internal(msg),
        }
    }
}

/// Status of a transaction in its lifecycle
///
/// State transitions:
/// - `Active` → `Validating` (begin commit)
/// - `Validating` → `Committed` (validation passed)
/// - `Validating` → `Aborted` (conflict detected)
/// - `Active` → `Aborted` (caller gave up)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Transaction is executing, can read/write
    Active,
    /// Transaction is being validated for conflicts
    Validating,
    /// Transaction committed successfully
    Committed,
    /// Transaction was aborted
    Aborted {
        /// Human-readable reason for abort
        reason: String,
    },
}

/// Counts of buffered writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingOperations {
    /// Buffered point sets
    pub sets: usize,
    /// Buffered point clears
    pub clears: usize,
    /// Buffered range clears
    pub range_clears: usize,
}

impl PendingOperations {
    /// Total number of buffered operations
    pub fn total(&self) -> usize {
        self.sets + self.clears + self.range_clears
    }

    /// Check if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// A half-open key range `[begin, end)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    /// Inclusive lower bound
    pub begin: ByteSlice,
    /// Exclusive upper bound
    pub end: ByteSlice,
}

impl KeyRange {
    /// Create a range
    pub fn new(begin: ByteSlice, end: ByteSlice) -> Self {
        KeyRange { begin, end }
    }

    /// Whether `key` falls inside the range
    pub fn contains(&self, key: &ByteSlice) -> bool {
        *key >= self.begin && *key < self.end
    }
}

/// Per-transaction state for optimistic concurrency control
///
/// # Lifecycle
///
/// 1. **BEGIN**: created by the transaction manager at the current version
/// 2. **READ/WRITE**: `get`, `get_range`, `set`, `clear`, `clear_range`
/// 3. **VALIDATE**: `commit` checks the read set and read ranges
/// 4. **APPLY**: the manager installs `mutations()` at the commit version
pub struct TransactionContext {
    /// Unique transaction ID
    pub txn_id: u64,

    /// Version at transaction start; every read observes this snapshot
    pub start_version: u64,

    store: Arc<UnifiedStore>,

    /// Keys read from the snapshot (validated at commit)
    pub read_set: HashSet<ByteSlice>,

    /// Ranges read from the snapshot (validated at commit)
    pub read_ranges: Vec<KeyRange>,

    /// Buffered point writes; `None` is a buffered clear
    pub write_set: BTreeMap<ByteSlice, Option<ByteSlice>>,

    /// Buffered range clears, in call order
    pub range_clears: Vec<KeyRange>,

    /// Current transaction status
    pub status: TransactionStatus,
}

impl TransactionContext {
    /// Create a transaction reading `store` as of `start_version`
    pub fn new(txn_id: u64, store: Arc<UnifiedStore>, start_version: u64) -> Self {
        TransactionContext {
            txn_id,
            start_version,
            store,
            read_set: HashSet::new(),
            read_ranges: Vec::new(),
            write_set: BTreeMap::new(),
            range_clears: Vec::new(),
            status: TransactionStatus::Active,
        }
    }

    /// The store this transaction reads from
    pub fn store(&self) -> &UnifiedStore {
        &self.store
    }

    // === Read Operations ===

    /// Read a key, recording it for validation
    ///
    /// # Errors
    /// Returns `StrataError::Internal` if the transaction is not active.
    pub fn get(&mut self, key: &ByteSlice) -> StrataResult<Option<ByteSlice>> {
        self.read(key, false)
    }

    /// Read a key without recording it for validation
    ///
    /// # Errors
    /// Returns `StrataError::Internal` if the transaction is not active.
    pub fn get_snapshot(&mut self, key: &ByteSlice) -> StrataResult<Option<ByteSlice>> {
        self.read(key, true)
    }

    fn read(&mut self, key: &ByteSlice, snapshot: bool) -> StrataResult<Option<ByteSlice>> {
        self.ensure_active()?;

        if let Some(buffered) = self.write_set.get(key) {
            return Ok(buffered.clone());
        }
        if self.is_range_cleared(key) {
            return Ok(None);
        }

        if !snapshot {
            self.read_set.insert(key.clone());
        }
        Ok(self.store.get_at(key, self.start_version))
    }

    /// Read the pairs with `begin <= key < end`, merged with buffered writes
    ///
    /// Unless `options.snapshot` is set, the observed range is recorded for
    /// validation. When `options.limit` cuts the read short, only the part
    /// up to the last returned key is recorded.
    ///
    /// # Errors
    /// Returns `StrataError::Internal` if the transaction is not active.
    pub fn get_range(
        &mut self,
        begin: &ByteSlice,
        end: &ByteSlice,
        options: RangeOptions,
    ) -> StrataResult<Vec<KeyValue>> {
        self.ensure_active()?;
        if begin >= end || options.limit == Some(0) {
            return Ok(Vec::new());
        }

        let stored = self.store.scan_at(
            begin,
            end,
            self.start_version,
            options.limit,
            options.reverse,
            |key| self.write_set.contains_key(key) || self.is_range_cleared(key),
        );

        let buffered = self
            .write_set
            .range::<ByteSlice, _>((Bound::Included(begin), Bound::Excluded(end)))
            .filter_map(|(key, value)| value.as_ref().map(|v| (key.clone(), v.clone())));

        let mut merged: Vec<(ByteSlice, ByteSlice)> = stored.into_iter().chain(buffered).collect();
        if options.reverse {
            merged.sort_by(|a, b| b.0.cmp(&a.0));
        } else {
            merged.sort_by(|a, b| a.0.cmp(&b.0));
        }

        let truncated = match options.limit {
            Some(limit) if merged.len() >= limit => {
                merged.truncate(limit);
                true
            }
            _ => false,
        };

        if !options.snapshot {
            let observed = match (truncated, merged.last()) {
                (true, Some((last, _))) if options.reverse => {
                    KeyRange::new(last.clone(), end.clone())
                }
                (true, Some((last, _))) => KeyRange::new(begin.clone(), last.concat(&[0x00])),
                _ => KeyRange::new(begin.clone(), end.clone()),
            };
            self.read_ranges.push(observed);
        }

        Ok(merged
            .into_iter()
            .map(|(key, value)| KeyValue::new(key, value))
            .collect())
    }

    fn is_range_cleared(&self, key: &ByteSlice) -> bool {
        self.range_clears.iter().any(|range| range.contains(key))
    }

    // === Write Operations ===

    /// Buffer a write
    ///
    /// # Errors
    /// Returns `StrataError::Internal` if the transaction is not active.
    pub fn set(&mut self, key: ByteSlice, value: ByteSlice) -> StrataResult<()> {
        self.ensure_active()?;
        self.write_set.insert(key, Some(value));
        Ok(())
    }

    /// Buffer a point clear
    ///
    /// # Errors
    /// Returns `StrataError::Internal` if the transaction is not active.
    pub fn clear(&mut self, key: &ByteSlice) -> StrataResult<()> {
        self.ensure_active()?;
        self.write_set.insert(key.clone(), None);
        Ok(())
    }

    /// Buffer a range clear, discarding buffered point writes inside it
    ///
    /// # Errors
    /// Returns `StrataError::Internal` if the transaction is not active.
    pub fn clear_range(&mut self, begin: &ByteSlice, end: &ByteSlice) -> StrataResult<()> {
        self.ensure_active()?;
        if begin >= end {
            return Ok(());
        }
        let range = KeyRange::new(begin.clone(), end.clone());
        self.write_set.retain(|key, _| !range.contains(key));
        self.range_clears.push(range);
        Ok(())
    }

    // === State ===

    /// Check if the transaction can still read and write
    pub fn is_active(&self) -> bool {
        self.status == TransactionStatus::Active
    }

    /// Check if the transaction committed
    pub fn is_committed(&self) -> bool {
        self.status == TransactionStatus::Committed
    }

    /// Check if the transaction was aborted
    pub fn is_aborted(&self) -> bool {
        matches!(self.status, TransactionStatus::Aborted { .. })
    }

    /// Check if no write is buffered
    pub fn is_read_only(&self) -> bool {
        self.write_set.is_empty() && self.range_clears.is_empty()
    }

    /// Check if transaction can accept operations
    ///
    /// # Errors
    /// Returns `StrataError::Internal` if transaction is not in `Active` state.
    pub fn ensure_active(&self) -> StrataResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(StrataError::internal(format!(
                "Transaction {} is not active: {:?}",
                self.txn_id, self.status
            )))
        }
    }

    /// Abort, discarding every buffered write
    ///
    /// # Errors
    /// Returns `StrataError::Internal` if already committed or aborted.
    pub fn mark_aborted(&mut self, reason: impl Into<String>) -> StrataResult<()> {
        match &self.status {
            TransactionStatus::Committed => Err(StrataError::internal(format!(
                "Cannot abort committed transaction {}",
                self.txn_id
            ))),
            TransactionStatus::Aborted { .. } => Err(StrataError::internal(format!(
                "Transaction {} already aborted",
                self.txn_id
            ))),
            _ => {
                self.status = TransactionStatus::Aborted {
                    reason: reason.into(),
                };
                self.write_set.clear();
                self.range_clears.clear();
                Ok(())
            }
        }
    }

    /// Counts of buffered writes
    pub fn pending_operations(&self) -> PendingOperations {
        let clears = self.write_set.values().filter(|v| v.is_none()).count();
        PendingOperations {
            sets: self.write_set.len() - clears,
            clears,
            range_clears: self.range_clears.len(),
        }
    }

    // === Commit ===

    /// Validate against the store and move to `Committed` or `Aborted`
    ///
    /// The caller must hold the commit lock from here until the mutations
    /// are applied, otherwise a concurrent commit could slip in between.
    ///
    /// # Errors
    /// - `CommitError::InvalidState` if the transaction is not active
    /// - `CommitError::ValidationFailed` if a read key or range changed
    pub fn commit(&mut self) -> Result<(), CommitError> {
        if !self.is_active() {
            return Err(CommitError::InvalidState(format!(
                "Cannot commit transaction {} from {:?} state - must be Active",
                self.txn_id, self.status
            )));
        }
        self.status = TransactionStatus::Validating;

        let result = validate_transaction(self);
        if !result.is_valid() {
            self.status = TransactionStatus::Aborted {
                reason: format!("Commit failed: {} conflict(s)", result.conflict_count()),
            };
            self.write_set.clear();
            self.range_clears.clear();
            return Err(CommitError::ValidationFailed(result));
        }

        self.status = TransactionStatus::Committed;
        Ok(())
    }

    /// Buffered writes in application order
    pub fn mutations(&self) -> Vec<Mutation> {
        let mut mutations = Vec::with_capacity(self.range_clears.len() + self.write_set.len());
        mutations.extend(self.range_clears.iter().map(|range| Mutation::ClearRange {
            begin: range.begin.clone(),
            end: range.end.clone(),
        }));
        mutations.extend(self.write_set.iter().map(|(key, value)| match value {
            Some(value) => Mutation::Set {
                key: key.clone(),
                value: value.clone(),
            },
            None => Mutation::Clear { key: key.clone() },
        }));
        mutations
    }
}

impl std::fmt::Debug for TransactionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionContext")
            .field("txn_id", &self.txn_id)
            .field("start_version", &self.start_version)
            .field("reads", &self.read_set.len())
            .field("read_ranges", &self.read_ranges.len())
            .field("pending", &self.pending_operations())
            .field("status", &self.status)
            .finish()
    }
}

impl Transaction for TransactionContext {
    fn get(&mut self, key: &ByteSlice) -> StrataResult<Option<ByteSlice>> {
        TransactionContext::get(self, key)
    }

    fn get_range(
        &mut self,
        begin: &ByteSlice,
        end: &ByteSlice,
        options: RangeOptions,
    ) -> StrataResult<Vec<KeyValue>> {
        TransactionContext::get_range(self, begin, end, options)
    }

    fn set(&mut self, key: ByteSlice, value: ByteSlice) -> StrataResult<()> {
        TransactionContext::set(self, key, value)
    }

    fn clear(&mut self, key: &ByteSlice) -> StrataResult<()> {
        TransactionContext::clear(self, key)
    }

    fn clear_range(&mut self, begin: &ByteSlice, end: &ByteSlice) -> StrataResult<()> {
        TransactionContext::clear_range(self, begin, end)
    }
}
