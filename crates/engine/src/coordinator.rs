//! Transaction coordinator for managing transaction lifecycle
//!
//! The TransactionCoordinator wraps TransactionManager and adds:
//! - Active snapshot tracking, which bounds version garbage collection
//! - Transaction metrics (started, committed, aborted)
//! - Conversion of commit failures into `StrataError`

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use strata_concurrency::{TransactionContext, TransactionManager};
use strata_core::{StrataError, StrataResult};
use strata_storage::UnifiedStore;
use tracing::{debug, trace};

/// Transaction coordinator for the database
///
/// # Memory Ordering
///
/// The metric counters use Relaxed ordering: they are observational only
/// and do not synchronize any other memory operations.
pub struct TransactionCoordinator {
    manager: TransactionManager,
    /// Start versions of transactions not yet ended, with multiplicity
    active_snapshots: Mutex<BTreeMap<u64, usize>>,
    total_started: AtomicU64,
    total_committed: AtomicU64,
    total_aborted: AtomicU64,
}

impl TransactionCoordinator {
    /// Create a coordinator committing into `store`
    pub fn new(store: Arc<UnifiedStore>) -> Self {
        Self {
            manager: TransactionManager::new(store),
            active_snapshots: Mutex::new(BTreeMap::new()),
            total_started: AtomicU64::new(0),
            total_committed: AtomicU64::new(0),
            total_aborted: AtomicU64::new(0),
        }
    }

    /// The store transactions read from and commit into
    pub fn store(&self) -> &Arc<UnifiedStore> {
        self.manager.store()
    }

    /// Start a new transaction and register its snapshot
    ///
    /// The snapshot stays registered (and its versions protected from
    /// garbage collection) until `end_transaction`.
    pub fn start_transaction(&self) -> TransactionContext {
        // Register under the lock so a concurrent GC cannot pick a horizon
        // above a snapshot that is being handed out.
        let mut active = self.active_snapshots.lock();
        let txn = self.manager.begin();
        *active.entry(txn.start_version).or_insert(0) += 1;
        drop(active);

        self.total_started.fetch_add(1, Ordering::Relaxed);
        trace!(target: "strata::txn", txn_id = txn.txn_id, start_version = txn.start_version, "Transaction started");
        txn
    }

    /// Commit a transaction through the concurrency layer
    ///
    /// # Errors
    /// - `StrataError::Conflict` if validation failed (retryable)
    /// - `StrataError::Internal` if the transaction was not active
    pub fn commit(&self, txn: &mut TransactionContext) -> StrataResult<u64> {
        match self.manager.commit(txn) {
            Ok(version) => {
                self.total_committed.fetch_add(1, Ordering::Relaxed);
                Ok(version)
            }
            Err(e) => {
                self.total_aborted.fetch_add(1, Ordering::Relaxed);
                debug!(target: "strata::txn", txn_id = txn.txn_id, error = %e, "Transaction aborted");
                Err(StrataError::from(e))
            }
        }
    }

    /// Abort a transaction that is still active
    pub fn abort(&self, txn: &mut TransactionContext, reason: impl Into<String>) {
        if txn.is_active() {
            self.manager.abort(txn, reason);
            self.total_aborted.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Release a transaction's snapshot
    pub fn end_transaction(&self, txn: &TransactionContext) {
        let mut active = self.active_snapshots.lock();
        if let Some(count) = active.get_mut(&txn.start_version) {
            *count -= 1;
            if *count == 0 {
                active.remove(&txn.start_version);
            }
        }
    }

    /// Oldest version any live or future snapshot can read
    pub fn gc_horizon(&self) -> u64 {
        let active = self.active_snapshots.lock();
        match active.keys().next() {
            Some(oldest) => *oldest,
            None => self.manager.current_version(),
        }
    }

    /// Drop versions no live or future snapshot can observe
    ///
    /// Returns the number of versions removed.
    pub fn collect_garbage(&self) -> usize {
        let horizon = self.gc_horizon();
        self.store().gc(horizon)
    }

    /// Get current global version
    pub fn current_version(&self) -> u64 {
        self.manager.current_version()
    }

    /// Number of transactions started but not yet ended
    pub fn active_count(&self) -> usize {
        self.active_snapshots.lock().values().sum()
    }

    /// Get transaction metrics
    pub fn metrics(&self) -> TransactionMetrics {
        let started = self.total_started.load(Ordering::Relaxed);
        let committed = self.total_committed.load(Ordering::Relaxed);

        TransactionMetrics {
            active_count: self.active_count() as u64,
            total_started: started,
            total_committed: committed,
            total_aborted: self.total_aborted.load(Ordering::Relaxed),
            commit_rate: if started > 0 {
                committed as f64 / started as f64
            } else {
                0.0
            },
        }
    }
}

/// Transaction metrics
#[derive(Debug, Clone)]
pub struct TransactionMetrics {
    /// Number of currently active transactions
    pub active_count: u64,
    /// Total number of transactions started
    pub total_started: u64,
    /// Total number of transactions committed
    pub total_committed: u64,
    /// Total number of transactions aborted
    pub total_aborted: u64,
    /// Commit success rate (committed / started)
    pub commit_rate: f64,
}

impl TransactionMetrics {
    /// Total transactions that completed (committed + aborted)
    pub fn total_completed(&self) -> u64 {
        self.total_committed + self.total_aborted
    }

    /// Abort rate (aborted / started)
    pub fn abort_rate(&self) -> f64 {
        if self.total_started > 0 {
            self.total_aborted as f64 / self.total_started as f64
        } else {
            0.0
        }
    }
}
