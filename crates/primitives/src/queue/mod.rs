//! Queue: transactional FIFO over tuple-encoded keys
//!
//! ## Key Layout
//!
//! Everything lives under the queue's subspace `S`:
//!
//! - `S + ("item", index)` → value: canonical entries, popped in index order
//! - `S + ("pending", ticket, slot)` → value: high-contention pushes waiting
//!   to be assigned a canonical index
//!
//! Values are MessagePack-encoded with `rmp-serde`.
//!
//! ## Modes
//!
//! **Simple**: a push reads the highest canonical index (a conflicting read)
//! and writes at index + 1. Concurrent pushes all read the same tail key, so
//! all but one conflict and retry.
//!
//! **High-contention**: a push reads the newest pending ticket with a
//! snapshot read, so it does not conflict with other pushes, and writes at
//! `(ticket + 1, random slot)`. Concurrent producers pick distinct slots
//! with high probability. Only the chosen key itself is read with conflict
//! detection, which makes two pushes into the same slot conflict rather
//! than overwrite each other. A pop that finds no canonical entry moves a
//! batch of pending entries into canonical order before popping.
//!
//! ## Purity
//!
//! Every operation is a transaction body that the runner may execute
//! several times. Bodies touch nothing but the transaction they are handed;
//! the only process-local state, the [`QueueState`], is updated after a
//! runner reports a successful commit.

mod config;

pub use config::{QueueConfig, DEFAULT_COMPACTION_BATCH, DEFAULT_SLOT_WINDOW};

use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use strata_core::{
    ByteSlice, CancellationToken, KeyValue, RangeOptions, StrataError, StrataResult, Transaction,
    TransactionRunner,
};
use strata_tuple::{Element, Subspace, Tuple};
use tracing::debug;

const ITEM_MARKER: &str = "item";
const PENDING_MARKER: &str = "pending";

/// Lifecycle of a queue instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// No operation has committed through this instance yet
    Uninitialized,
    /// At least one operation has committed
    Ready,
}

/// Transactional FIFO queue of `T` stored under a subspace
///
/// The queue holds no data of its own: it is a view over the keys in its
/// subspace, and any number of instances, in any number of processes, can
/// operate on the same subspace.
///
/// ## Example
///
/// ```rust
/// use strata_core::{CancellationToken, StrataResult};
/// use strata_engine::Database;
/// use strata_primitives::{Queue, QueueConfig};
/// use strata_tuple::{Subspace, Tuple};
///
/// fn main() -> StrataResult<()> {
///     let db = Database::new();
///     let queue: Queue<u32> =
///         Queue::new(Subspace::new(Tuple::new().push("jobs")), QueueConfig::new())?;
///     let cancel = CancellationToken::new();
///
///     queue.push_with(&db, &cancel, &10)?;
///     assert_eq!(queue.pop_with(&db, &cancel)?, Some(10));
///     assert!(queue.empty_with(&db, &cancel)?);
///     Ok(())
/// }
/// ```
pub struct Queue<T> {
    subspace: Subspace,
    items: Subspace,
    pending: Subspace,
    config: QueueConfig,
    ready: AtomicBool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Queue<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Create a queue over `subspace`
    ///
    /// # Errors
    /// Returns `StrataError::InvalidInput` if `config` fails validation.
    pub fn new(subspace: Subspace, config: QueueConfig) -> StrataResult<Self> {
        config.validate()?;
        Ok(Self::with_valid_config(subspace, config))
    }

    /// Simple-mode queue with default tuning
    pub fn simple(subspace: Subspace) -> Self {
        Self::with_valid_config(subspace, QueueConfig::new())
    }

    /// High-contention queue with default tuning
    pub fn high_contention(subspace: Subspace) -> Self {
        Self::with_valid_config(subspace, QueueConfig::high_contention())
    }

    fn with_valid_config(subspace: Subspace, config: QueueConfig) -> Self {
        Queue {
            items: subspace.partition(ITEM_MARKER),
            pending: subspace.partition(PENDING_MARKER),
            subspace,
            config,
            ready: AtomicBool::new(false),
            _marker: PhantomData,
        }
    }

    /// The subspace holding this queue's keys
    pub fn subspace(&self) -> &Subspace {
        &self.subspace
    }

    /// This queue's tuning
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Whether an operation has committed through this instance
    pub fn state(&self) -> QueueState {
        if self.ready.load(Ordering::Acquire) {
            QueueState::Ready
        } else {
            QueueState::Uninitialized
        }
    }

    // ========================================================================
    // Transaction bodies
    // ========================================================================

    /// Remove every entry
    ///
    /// # Errors
    /// Returns an error if the transaction is no longer active.
    pub fn clear<X: Transaction>(&self, txn: &mut X) -> StrataResult<()> {
        let (begin, end) = self.subspace.range();
        txn.clear_range(&begin, &end)
    }

    /// Whether the queue holds no entry, canonical or pending
    ///
    /// # Errors
    /// Returns an error if the transaction is no longer active.
    pub fn empty<X: Transaction>(&self, txn: &mut X) -> StrataResult<bool> {
        let (begin, end) = self.subspace.range();
        let first = txn.get_range(&begin, &end, RangeOptions::new().with_limit(1))?;
        Ok(first.is_empty())
    }

    /// Number of entries, canonical and pending
    ///
    /// Reads the whole queue; intended for diagnostics and tests.
    ///
    /// # Errors
    /// Returns an error if the transaction is no longer active.
    pub fn len<X: Transaction>(&self, txn: &mut X) -> StrataResult<usize> {
        let (begin, end) = self.items.range();
        let canonical = txn.get_range(&begin, &end, RangeOptions::new())?.len();
        let (begin, end) = self.pending.range();
        let pending = txn.get_range(&begin, &end, RangeOptions::new())?.len();
        Ok(canonical + pending)
    }

    /// The value that `pop` would return, without removing it
    ///
    /// # Errors
    /// - `StrataError::Codec` if the first key is malformed
    /// - `StrataError::Serialization` if its value cannot be decoded
    pub fn peek<X: Transaction>(&self, txn: &mut X) -> StrataResult<Option<T>> {
        if let Some(first) = self.first_item(txn)? {
            return decode_value(&first.value).map(Some);
        }
        let (begin, end) = self.pending.range();
        let first = txn.get_range(&begin, &end, RangeOptions::new().with_limit(1))?;
        match first.into_iter().next() {
            Some(kv) => {
                self.pending_position(&kv.key)?;
                decode_value(&kv.value).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Append `value`
    ///
    /// # Errors
    /// - `StrataError::Serialization` if `value` cannot be encoded
    /// - `StrataError::Codec` if the tail key is malformed
    pub fn push<X: Transaction>(&self, txn: &mut X, value: &T) -> StrataResult<()> {
        let encoded = encode_value(value)?;
        if self.config.high_contention {
            self.push_pending(txn, encoded)
        } else {
            self.push_canonical(txn, encoded)
        }
    }

    /// Remove and return the oldest value
    ///
    /// `None` under concurrent draining does not prove the queue is empty;
    /// only a committed `empty()` does.
    ///
    /// # Errors
    /// - `StrataError::Codec` if the popped key is malformed
    /// - `StrataError::Serialization` if its value cannot be decoded
    pub fn pop<X: Transaction>(&self, txn: &mut X) -> StrataResult<Option<T>> {
        match self.first_item(txn)? {
            Some(first) => {
                txn.clear(&first.key)?;
                debug!(target: "strata::queue", key = %first.key, "Popped queue entry");
                decode_value(&first.value).map(Some)
            }
            None => self.compact_and_pop(txn),
        }
    }

    // ========================================================================
    // Runner wrappers: one operation, one retried transaction
    // ========================================================================

    /// Run [`Queue::clear`] as its own transaction
    ///
    /// # Errors
    /// `StrataError::Cancelled` or any error from the runner.
    pub fn clear_with<R: TransactionRunner>(
        &self,
        runner: &R,
        cancel: &CancellationToken,
    ) -> StrataResult<()> {
        self.committed(runner.run(cancel, |txn| self.clear(txn)))
    }

    /// Run [`Queue::empty`] as its own transaction
    ///
    /// # Errors
    /// `StrataError::Cancelled` or any error from the runner.
    pub fn empty_with<R: TransactionRunner>(
        &self,
        runner: &R,
        cancel: &CancellationToken,
    ) -> StrataResult<bool> {
        self.committed(runner.run(cancel, |txn| self.empty(txn)))
    }

    /// Run [`Queue::len`] as its own transaction
    ///
    /// # Errors
    /// `StrataError::Cancelled` or any error from the runner.
    pub fn len_with<R: TransactionRunner>(
        &self,
        runner: &R,
        cancel: &CancellationToken,
    ) -> StrataResult<usize> {
        self.committed(runner.run(cancel, |txn| self.len(txn)))
    }

    /// Run [`Queue::peek`] as its own transaction
    ///
    /// # Errors
    /// `StrataError::Cancelled` or any error from the runner.
    pub fn peek_with<R: TransactionRunner>(
        &self,
        runner: &R,
        cancel: &CancellationToken,
    ) -> StrataResult<Option<T>> {
        self.committed(runner.run(cancel, |txn| self.peek(txn)))
    }

    /// Run [`Queue::push`] as its own transaction
    ///
    /// # Errors
    /// `StrataError::Cancelled` or any error from the runner.
    pub fn push_with<R: TransactionRunner>(
        &self,
        runner: &R,
        cancel: &CancellationToken,
        value: &T,
    ) -> StrataResult<()> {
        self.committed(runner.run(cancel, |txn| self.push(txn, value)))
    }

    /// Run [`Queue::pop`] as its own transaction
    ///
    /// # Errors
    /// `StrataError::Cancelled` or any error from the runner.
    pub fn pop_with<R: TransactionRunner>(
        &self,
        runner: &R,
        cancel: &CancellationToken,
    ) -> StrataResult<Option<T>> {
        self.committed(runner.run(cancel, |txn| self.pop(txn)))
    }

    fn committed<V>(&self, result: StrataResult<V>) -> StrataResult<V> {
        if result.is_ok() {
            self.ready.store(true, Ordering::Release);
        }
        result
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn item_key(&self, index: i64) -> ByteSlice {
        self.items.key(&Tuple::new().push(index))
    }

    fn pending_key(&self, ticket: i64, slot: i64) -> ByteSlice {
        self.pending.key(&Tuple::new().push(ticket).push(slot))
    }

    /// Index of a canonical key
    fn item_index(&self, key: &ByteSlice) -> StrataResult<i64> {
        let tuple = self.items.unpack(key)?;
        match (tuple.len(), tuple.get(0).and_then(Element::as_i64)) {
            (1, Some(index)) => Ok(index),
            _ => Err(malformed_key(key)),
        }
    }

    /// `(ticket, slot)` of a pending key
    fn pending_position(&self, key: &ByteSlice) -> StrataResult<(i64, i64)> {
        let tuple = self.pending.unpack(key)?;
        let ticket = tuple.get(0).and_then(Element::as_i64);
        let slot = tuple.get(1).and_then(Element::as_i64);
        match (tuple.len(), ticket, slot) {
            (2, Some(ticket), Some(slot)) => Ok((ticket, slot)),
            _ => Err(malformed_key(key)),
        }
    }

    /// First canonical entry, read with conflict detection
    fn first_item<X: Transaction>(&self, txn: &mut X) -> StrataResult<Option<KeyValue>> {
        let (begin, end) = self.items.range();
        let first = txn.get_range(&begin, &end, RangeOptions::new().with_limit(1))?;
        match first.into_iter().next() {
            Some(kv) => {
                self.item_index(&kv.key)?;
                Ok(Some(kv))
            }
            None => Ok(None),
        }
    }

    fn push_canonical<X: Transaction>(&self, txn: &mut X, encoded: ByteSlice) -> StrataResult<()> {
        let (begin, end) = self.items.range();
        let last = txn.get_range(&begin, &end, RangeOptions::new().reversed().with_limit(1))?;
        let index = match last.first() {
            Some(kv) => next_position(self.item_index(&kv.key)?)?,
            None => 0,
        };
        txn.set(self.item_key(index), encoded)?;
        debug!(target: "strata::queue", index, "Pushed queue entry");
        Ok(())
    }

    fn push_pending<X: Transaction>(&self, txn: &mut X, encoded: ByteSlice) -> StrataResult<()> {
        let (begin, end) = self.pending.range();
        let newest = txn.get_range(
            &begin,
            &end,
            RangeOptions::new().reversed().with_limit(1).snapshot(),
        )?;
        let mut ticket = match newest.first() {
            Some(kv) => next_position(self.pending_position(&kv.key)?.0)?,
            None => 0,
        };

        let window = i64::from(self.config.slot_window);
        let mut rng = rand::thread_rng();
        loop {
            let start = rng.gen_range(0..window);
            for probe in 0..window {
                let slot = (start + probe) % window;
                let key = self.pending_key(ticket, slot);
                if txn.get(&key)?.is_none() {
                    txn.set(key, encoded)?;
                    debug!(target: "strata::queue", ticket, slot, "Pushed pending queue entry");
                    return Ok(());
                }
            }
            ticket = next_position(ticket)?;
        }
    }

    /// Move up to `compaction_batch` pending entries into canonical order and
    /// pop the first of them
    ///
    /// Only called once the canonical range has been read as empty, so the
    /// moved entries take indexes from 0.
    fn compact_and_pop<X: Transaction>(&self, txn: &mut X) -> StrataResult<Option<T>> {
        let (begin, end) = self.pending.range();
        let batch = txn.get_range(
            &begin,
            &end,
            RangeOptions::new().with_limit(self.config.compaction_batch),
        )?;

        let mut entries = batch.into_iter();
        let first = match entries.next() {
            Some(first) => first,
            None => return Ok(None),
        };
        self.pending_position(&first.key)?;
        txn.clear(&first.key)?;
        let value = decode_value(&first.value)?;

        let mut moved = 0;
        for (index, kv) in entries.enumerate() {
            self.pending_position(&kv.key)?;
            txn.clear(&kv.key)?;
            txn.set(self.item_key(index as i64), kv.value)?;
            moved += 1;
        }
        debug!(target: "strata::queue", moved, "Compacted pending queue entries");
        Ok(Some(value))
    }
}

impl<T> std::fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("subspace", &self.subspace.to_string())
            .field("config", &self.config)
            .finish()
    }
}

fn next_position(position: i64) -> StrataResult<i64> {
    position
        .checked_add(1)
        .ok_or_else(|| StrataError::internal("queue position overflow"))
}

fn malformed_key(key: &ByteSlice) -> StrataError {
    StrataError::codec(0, format!("malformed queue key {}", key))
}

fn encode_value<T: Serialize>(value: &T) -> StrataResult<ByteSlice> {
    rmp_serde::to_vec(value)
        .map(ByteSlice::from_vec)
        .map_err(|e| StrataError::serialization(e.to_string()))
}

fn decode_value<T: DeserializeOwned>(bytes: &ByteSlice) -> StrataResult<T> {
    rmp_serde::from_slice(bytes.as_bytes()).map_err(|e| StrataError::serialization(e.to_string()))
}
