//! Core traits for transactional key-value access
//!
//! These traits are the seam between the layers (tuple-keyed collections
//! such as the queue) and whatever ordered key-value store backs them. The
//! layers only ever see a [`Transaction`] handed to them by a
//! [`TransactionRunner`]; they never commit, retry or sleep themselves.

use crate::cancel::CancellationToken;
use crate::error::StrataResult;
use crate::slice::ByteSlice;

/// A single key-value pair returned by a range read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    /// Stored key
    pub key: ByteSlice,
    /// Stored value
    pub value: ByteSlice,
}

impl KeyValue {
    /// Create a new pair
    pub fn new(key: ByteSlice, value: ByteSlice) -> Self {
        KeyValue { key, value }
    }
}

/// Options for [`Transaction::get_range`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeOptions {
    /// Maximum number of pairs to return (`None` = unbounded)
    pub limit: Option<usize>,
    /// Return pairs in descending key order
    pub reverse: bool,
    /// Snapshot read: do not add the range to the conflict set
    pub snapshot: bool,
}

impl RangeOptions {
    /// Forward, unbounded, conflicting read
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the number of returned pairs
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Read in descending key order
    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// Do not record the read for conflict detection
    pub fn snapshot(mut self) -> Self {
        self.snapshot = true;
        self
    }
}

/// Transactional view of an ordered key-value store
///
/// Reads observe a consistent snapshot plus the transaction's own
/// uncommitted writes. Writes are buffered until the runner commits.
///
/// Thread safety: a transaction is owned by one thread for its lifetime.
pub trait Transaction {
    /// Read a single key (conflicting read)
    ///
    /// Returns `None` if the key is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is no longer active.
    fn get(&mut self, key: &ByteSlice) -> StrataResult<Option<ByteSlice>>;

    /// Read the pairs with `begin <= key < end`
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is no longer active.
    fn get_range(
        &mut self,
        begin: &ByteSlice,
        end: &ByteSlice,
        options: RangeOptions,
    ) -> StrataResult<Vec<KeyValue>>;

    /// Buffer a write of `value` at `key`
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is no longer active.
    fn set(&mut self, key: ByteSlice, value: ByteSlice) -> StrataResult<()>;

    /// Buffer a removal of `key`
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is no longer active.
    fn clear(&mut self, key: &ByteSlice) -> StrataResult<()>;

    /// Buffer a removal of every key with `begin <= key < end`
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is no longer active.
    fn clear_range(&mut self, begin: &ByteSlice, end: &ByteSlice) -> StrataResult<()>;
}

/// Runs a transaction body to completion
///
/// Implementations own begin, commit, conflict retry and backoff. The body
/// may be invoked several times and must not have side effects outside the
/// transaction.
pub trait TransactionRunner {
    /// Transaction type handed to the body
    type Txn: Transaction;

    /// Run `body` until it commits or fails with a non-retryable error
    ///
    /// # Errors
    ///
    /// Returns `StrataError::Cancelled` if `cancel` fires before commit,
    /// the body's own error if it is not retryable, or the last conflict
    /// once retries are exhausted.
    fn run<T, F>(&self, cancel: &CancellationToken, body: F) -> StrataResult<T>
    where
        F: FnMut(&mut Self::Txn) -> StrataResult<T>;
}
