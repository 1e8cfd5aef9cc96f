//! Database struct and transaction API
//!
//! This module provides the main Database struct that orchestrates:
//! - The in-memory MVCC store
//! - Transaction coordination (begin, validate, commit)
//! - Conflict retry with exponential backoff
//! - Periodic garbage collection of unreachable versions
//!
//! ## Transaction API
//!
//! The Database provides three ways to execute transactions:
//!
//! 1. **Retry API** (recommended): `db.run(&cancel, |txn| { ... })`
//!    - Re-executes the body on conflict until it commits
//!    - Honors a cancellation token before every attempt and before commit
//!
//! 2. **Closure API**: `db.transaction(|txn| { ... })`
//!    - Single attempt: commit on success, abort on error
//!
//! 3. **Manual API**: `begin_transaction()` + `commit_transaction()`
//!    - For cases requiring external control over commit timing

mod transactions;

pub use transactions::RetryConfig;

use crate::coordinator::{TransactionCoordinator, TransactionMetrics};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use strata_concurrency::TransactionContext;
use strata_core::{CancellationToken, StrataResult, TransactionRunner};
use strata_storage::UnifiedStore;
use tracing::{debug, warn};

/// Commits between automatic garbage collection passes
pub const DEFAULT_GC_INTERVAL: u64 = 1024;

// ============================================================================
// Database Struct
// ============================================================================

/// In-process transactional ordered key-value store
///
/// Transactions are serializable: each reads a snapshot taken at begin and
/// commits only if nothing it read has changed since. Conflicting commits
/// fail with a retryable `StrataError::Conflict`; `run` retries them.
///
/// # Example
///
/// ```text
/// use strata_engine::Database;
/// use strata_core::{ByteSlice, CancellationToken};
///
/// let db = Database::new();
/// db.run(&CancellationToken::new(), |txn| {
///     txn.set(ByteSlice::from("k"), ByteSlice::from("v"))
/// })?;
/// ```
pub struct Database {
    coordinator: TransactionCoordinator,
    retry: RetryConfig,
    gc_interval: u64,
    commits_since_gc: AtomicU64,
}

impl Database {
    /// Create an empty database with the default retry policy
    pub fn new() -> Self {
        Self::with_retry(RetryConfig::default())
    }

    /// Create an empty database with a custom retry policy
    pub fn with_retry(retry: RetryConfig) -> Self {
        Database {
            coordinator: TransactionCoordinator::new(Arc::new(UnifiedStore::new())),
            retry,
            gc_interval: DEFAULT_GC_INTERVAL,
            commits_since_gc: AtomicU64::new(0),
        }
    }

    /// Set the number of commits between garbage collection passes
    ///
    /// Zero disables automatic collection.
    pub fn with_gc_interval(mut self, gc_interval: u64) -> Self {
        self.gc_interval = gc_interval;
        self
    }

    /// The retry policy used by `run`
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Access the underlying store
    pub fn storage(&self) -> &Arc<UnifiedStore> {
        self.coordinator.store()
    }

    /// Highest committed version
    pub fn current_version(&self) -> u64 {
        self.coordinator.current_version()
    }

    /// Transaction statistics
    pub fn metrics(&self) -> TransactionMetrics {
        self.coordinator.metrics()
    }

    /// Drop versions no live or future snapshot can observe
    ///
    /// Returns the number of versions removed.
    pub fn collect_garbage(&self) -> usize {
        self.commits_since_gc.store(0, Ordering::Relaxed);
        self.coordinator.collect_garbage()
    }

    fn maybe_collect_garbage(&self) {
        if self.gc_interval == 0 {
            return;
        }
        let commits = self.commits_since_gc.fetch_add(1, Ordering::Relaxed) + 1;
        if commits >= self.gc_interval {
            let removed = self.collect_garbage();
            debug!(target: "strata::db", removed, "Collected garbage");
        }
    }

    // ========================================================================
    // Manual API
    // ========================================================================

    /// Begin a new transaction (for manual control)
    ///
    /// Returns a TransactionContext that must be committed or aborted, then
    /// passed to `end_transaction` to release its snapshot.
    ///
    /// # Example
    /// ```text
    /// let mut txn = db.begin_transaction();
    /// txn.set(key, value)?;
    /// db.commit_transaction(&mut txn)?;
    /// db.end_transaction(txn);
    /// ```
    pub fn begin_transaction(&self) -> TransactionContext {
        self.coordinator.start_transaction()
    }

    /// Commit a transaction
    ///
    /// # Returns
    /// * `Ok(commit_version)` - the version all writes became visible at;
    ///   a read-only transaction returns its start version
    ///
    /// # Errors
    /// - `StrataError::Conflict` - something the transaction read has changed
    /// - `StrataError::Internal` - transaction not in Active state
    pub fn commit_transaction(&self, txn: &mut TransactionContext) -> StrataResult<u64> {
        let read_only = txn.is_read_only();
        let version = self.coordinator.commit(txn)?;
        if !read_only {
            self.maybe_collect_garbage();
        }
        Ok(version)
    }

    /// Release a finished (or abandoned) transaction
    ///
    /// An active transaction is aborted.
    pub fn end_transaction(&self, mut txn: TransactionContext) {
        self.coordinator.abort(&mut txn, "ended without commit");
        self.coordinator.end_transaction(&txn);
    }

    // ========================================================================
    // Closure API
    // ========================================================================

    /// Run one attempt: commit the body's writes if it succeeds
    ///
    /// A conflict is returned to the caller rather than retried.
    ///
    /// # Errors
    /// The body's error (writes discarded) or the commit error.
    pub fn transaction<F, T>(&self, f: F) -> StrataResult<T>
    where
        F: FnOnce(&mut TransactionContext) -> StrataResult<T>,
    {
        self.transaction_with_version(f).map(|(value, _)| value)
    }

    /// Like `transaction` but also returns the commit version
    ///
    /// # Errors
    /// The body's error (writes discarded) or the commit error.
    pub fn transaction_with_version<F, T>(&self, f: F) -> StrataResult<(T, u64)>
    where
        F: FnOnce(&mut TransactionContext) -> StrataResult<T>,
    {
        let mut txn = self.begin_transaction();
        let outcome = f(&mut txn).and_then(|value| {
            let version = self.commit_transaction(&mut txn)?;
            Ok((value, version))
        });
        self.end_transaction(txn);
        outcome
    }

    /// Run `body` until it commits, retrying conflicts with the default policy
    ///
    /// The body is re-executed from scratch on every attempt against a fresh
    /// snapshot, so it must not depend on state it mutated in an earlier one.
    ///
    /// # Errors
    /// - `StrataError::Cancelled` if `cancel` fires before commit; nothing
    ///   from the cancelled attempt is published
    /// - the body's own error, which is never retried
    /// - the last `StrataError::Conflict` once retries are exhausted
    pub fn run<F, T>(&self, cancel: &CancellationToken, body: F) -> StrataResult<T>
    where
        F: FnMut(&mut TransactionContext) -> StrataResult<T>,
    {
        self.run_with_retry(cancel, &self.retry, body)
    }

    /// Run `body` until it commits, retrying conflicts with `config`
    ///
    /// # Errors
    /// See [`Database::run`].
    pub fn run_with_retry<F, T>(
        &self,
        cancel: &CancellationToken,
        config: &RetryConfig,
        mut body: F,
    ) -> StrataResult<T>
    where
        F: FnMut(&mut TransactionContext) -> StrataResult<T>,
    {
        let mut attempt = 0;
        loop {
            cancel.check()?;

            let mut txn = self.begin_transaction();
            let outcome = body(&mut txn).and_then(|value| {
                cancel.check()?;
                self.commit_transaction(&mut txn)?;
                Ok(value)
            });
            let txn_id = txn.txn_id;
            self.end_transaction(txn);

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < config.max_retries => {
                    let delay = config.calculate_delay(attempt);
                    warn!(
                        target: "strata::txn",
                        txn_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transaction conflicted, retrying"
                    );
                    attempt += 1;
                    std::thread::sleep(delay);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("current_version", &self.current_version())
            .field("retry", &self.retry)
            .field("gc_interval", &self.gc_interval)
            .finish()
    }
}

impl TransactionRunner for Database {
    type Txn = TransactionContext;

    fn run<T, F>(&self, cancel: &CancellationToken, body: F) -> StrataResult<T>
    where
        F: FnMut(&mut TransactionContext) -> StrataResult<T>,
    {
        Database::run(self, cancel, body)
    }
}
