//! Transaction manager for coordinating commit operations
//!
//! Provides atomic commit by orchestrating validation and storage
//! application under a single commit lock.
//!
//! ## Commit Sequence
//!
//! ```text
//! 1. Read-only? mark committed, return start_version (nothing to publish)
//! 2. Acquire commit lock
//! 3. txn.commit() - Validate read set and read ranges
//! 4. IF conflicts: transaction is aborted, return error
//! 5. commit_version = store.current_version() + 1
//! 6. store.apply(mutations, commit_version) - publishes the version
//! 7. Release lock, return Ok(commit_version)
//! ```
//!
//! Holding the lock from validation through application is what makes
//! first-committer-wins sound: no commit can land between the check and
//! the write. Readers never take this lock.

use crate::{CommitError, TransactionContext, TransactionStatus};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use strata_storage::UnifiedStore;
use tracing::{debug, trace};

/// Manages transaction lifecycle and atomic commits
///
/// Every commit that publishes writes advances the store's version by
/// exactly one; all keys in a transaction get the same commit version.
pub struct TransactionManager {
    store: Arc<UnifiedStore>,

    /// Next transaction ID
    next_txn_id: AtomicU64,

    /// Serializes validate-then-apply
    commit_lock: Mutex<()>,
}

impl TransactionManager {
    /// Create a manager committing into `store`
    pub fn new(store: Arc<UnifiedStore>) -> Self {
        TransactionManager {
            store,
            next_txn_id: AtomicU64::new(1),
            commit_lock: Mutex::new(()),
        }
    }

    /// The store transactions read from and commit into
    pub fn store(&self) -> &Arc<UnifiedStore> {
        &self.store
    }

    /// Highest published commit version
    pub fn current_version(&self) -> u64 {
        self.store.current_version()
    }

    /// Allocate a transaction ID
    pub fn next_txn_id(&self) -> u64 {
        self.next_txn_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Start a transaction at the current version
    pub fn begin(&self) -> TransactionContext {
        let txn_id = self.next_txn_id();
        let start_version = self.store.current_version();
        trace!(txn_id, start_version, "Began transaction");
        TransactionContext::new(txn_id, Arc::clone(&self.store), start_version)
    }

    /// Validate and publish a transaction
    ///
    /// Returns the version the writes became visible at. A read-only
    /// transaction returns its start version without taking the lock.
    ///
    /// # Errors
    /// - `CommitError::ValidationFailed` if something it read has changed;
    ///   the transaction is aborted and may be retried from scratch
    /// - `CommitError::InvalidState` if the transaction is not active
    pub fn commit(&self, txn: &mut TransactionContext) -> Result<u64, CommitError> {
        if txn.is_read_only() {
            txn.commit()?;
            return Ok(txn.start_version);
        }

        let _guard = self.commit_lock.lock();
        if let Err(e) = txn.commit() {
            debug!(txn_id = txn.txn_id, error = %e, "Transaction failed validation");
            return Err(e);
        }

        let commit_version = self.store.current_version() + 1;
        let mutations = txn.mutations();
        self.store.apply(&mutations, commit_version);
        debug!(
            txn_id = txn.txn_id,
            commit_version,
            writes = mutations.len(),
            "Committed transaction"
        );
        Ok(commit_version)
    }

    /// Abort a transaction, discarding its buffered writes
    ///
    /// Aborting a transaction that is already finished is a no-op.
    pub fn abort(&self, txn: &mut TransactionContext, reason: impl Into<String>) {
        if txn.status == TransactionStatus::Active {
            // Active -> Aborted cannot fail
            let _ = txn.mark_aborted(reason);
        }
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("current_version", &self.current_version())
            .field("next_txn_id", &self.next_txn_id.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;
    use std::thread;
    use strata_core::{ByteSlice, RangeOptions};

    fn key(s: &str) -> ByteSlice {
        ByteSlice::from(s)
    }

    fn manager() -> TransactionManager {
        TransactionManager::new(Arc::new(UnifiedStore::new()))
    }

    #[test]
    fn test_new_manager() {
        let manager = manager();
        assert_eq!(manager.current_version(), 0);
        assert_eq!(manager.next_txn_id(), 1);
        assert_eq!(manager.next_txn_id(), 2);
    }

    #[test]
    fn test_commit_version_increment() {
        let manager = manager();
        for expected in 1..=3 {
            let mut txn = manager.begin();
            txn.set(key("k"), key("v")).unwrap();
            assert_eq!(manager.commit(&mut txn).unwrap(), expected);
        }
        assert_eq!(manager.current_version(), 3);
    }

    #[test]
    fn test_all_keys_same_version() {
        let manager = manager();
        let mut txn = manager.begin();
        txn.set(key("a"), key("1")).unwrap();
        txn.set(key("b"), key("2")).unwrap();
        let version = manager.commit(&mut txn).unwrap();

        assert_eq!(manager.store().latest_version(&key("a")), Some(version));
        assert_eq!(manager.store().latest_version(&key("b")), Some(version));
    }

    #[test]
    fn test_read_only_commit_does_not_advance_version() {
        let manager = manager();
        let mut txn = manager.begin();
        txn.get(&key("a")).unwrap();
        assert_eq!(manager.commit(&mut txn).unwrap(), 0);
        assert!(txn.is_committed());
        assert_eq!(manager.current_version(), 0);
    }

    #[test]
    fn test_first_committer_wins() {
        let manager = manager();

        let mut t1 = manager.begin();
        let mut t2 = manager.begin();
        t1.get(&key("counter")).unwrap();
        t2.get(&key("counter")).unwrap();
        t1.set(key("counter"), key("1")).unwrap();
        t2.set(key("counter"), key("1")).unwrap();

        assert!(manager.commit(&mut t1).is_ok());
        let err = manager.commit(&mut t2).unwrap_err();
        assert!(matches!(err, CommitError::ValidationFailed(_)));
        assert!(t2.is_aborted());
    }

    #[test]
    fn test_abort_discards_writes() {
        let manager = manager();
        let mut txn = manager.begin();
        txn.set(key("a"), key("1")).unwrap();
        manager.abort(&mut txn, "caller gave up");

        assert!(txn.is_aborted());
        assert!(manager.commit(&mut txn).is_err());
        assert_eq!(manager.store().get_at(&key("a"), u64::MAX), None);

        // Second abort is a no-op
        manager.abort(&mut txn, "again");
    }

    #[test]
    fn test_concurrent_increments_are_serializable() {
        let manager = Arc::new(manager());
        let threads = 4;
        let per_thread = 50;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let manager = Arc::clone(&manager);
                thread::spawn(move || {
                    let mut done = 0;
                    while done < per_thread {
                        let mut txn = manager.begin();
                        let current = txn
                            .get(&key("counter"))
                            .unwrap()
                            .map(|v| v.to_i64_ne().unwrap())
                            .unwrap_or(0);
                        txn.set(key("counter"), ByteSlice::from_i64_ne(current + 1))
                            .unwrap();
                        if manager.commit(&mut txn).is_ok() {
                            done += 1;
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let total = manager
            .store()
            .get_at(&key("counter"), u64::MAX)
            .map(|v| v.to_i64_ne().unwrap());
        assert_eq!(total, Some(threads * per_thread));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Set(u8, u8),
        Clear(u8),
        ClearRange(u8, u8),
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..16, any::<u8>()).prop_map(|(k, v)| Op::Set(k, v)),
            (0u8..16).prop_map(Op::Clear),
            (0u8..16, 0u8..16).prop_map(|(a, b)| Op::ClearRange(a.min(b), a.max(b))),
        ]
    }

    proptest! {
        #[test]
        fn prop_buffered_view_matches_committed_state(
            seed in proptest::collection::vec((0u8..16, any::<u8>()), 0..16),
            ops in proptest::collection::vec(arb_op(), 0..32),
        ) {
            let manager = manager();
            let mut model = BTreeMap::new();

            let mut setup = manager.begin();
            for (k, v) in &seed {
                setup.set(ByteSlice::from_vec(vec![*k]), ByteSlice::from_vec(vec![*v])).unwrap();
                model.insert(*k, *v);
            }
            manager.commit(&mut setup).unwrap();

            let mut txn = manager.begin();
            for op in &ops {
                match op {
                    Op::Set(k, v) => {
                        txn.set(ByteSlice::from_vec(vec![*k]), ByteSlice::from_vec(vec![*v])).unwrap();
                        model.insert(*k, *v);
                    }
                    Op::Clear(k) => {
                        txn.clear(&ByteSlice::from_vec(vec![*k])).unwrap();
                        model.remove(k);
                    }
                    Op::ClearRange(a, b) => {
                        txn.clear_range(&ByteSlice::from_vec(vec![*a]), &ByteSlice::from_vec(vec![*b])).unwrap();
                        model.retain(|k, _| k < a || k >= b);
                    }
                }
            }

            let expected: Vec<(u8, u8)> = model.iter().map(|(k, v)| (*k, *v)).collect();
            let read = |pairs: Vec<strata_core::KeyValue>| -> Vec<(u8, u8)> {
                pairs.iter().map(|kv| (kv.key.as_bytes()[0], kv.value.as_bytes()[0])).collect()
            };

            let begin = ByteSlice::from_vec(vec![0]);
            let end = ByteSlice::from_vec(vec![0xFF]);
            let buffered = txn.get_range(&begin, &end, RangeOptions::new().snapshot()).unwrap();
            prop_assert_eq!(read(buffered), expected.clone());

            manager.commit(&mut txn).unwrap();
            let mut after = manager.begin();
            let committed = after.get_range(&begin, &end, RangeOptions::new()).unwrap();
            prop_assert_eq!(read(committed), expected);
        }
    }
}
