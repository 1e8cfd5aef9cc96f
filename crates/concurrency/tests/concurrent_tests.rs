//! Concurrent/Multi-threaded Tests for strata-concurrency
//!
//! These tests verify correct behavior under actual concurrent execution:
//!
//! 1. **TOCTOU Prevention** - The commit lock prevents validate/apply races
//! 2. **Version Monotonicity** - Commit versions are unique and dense
//! 3. **Phantom Protection** - Range reads conflict with concurrent inserts
//! 4. **Snapshot Stability** - Readers never observe a partial commit
//!
//! ## Running These Tests
//!
//! ```bash
//! cargo test --test concurrent_tests
//! ```

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use strata_concurrency::{CommitError, TransactionManager};
use strata_core::{ByteSlice, RangeOptions};
use strata_storage::UnifiedStore;

// ============================================================================
// Test Helpers
// ============================================================================

fn key(s: &str) -> ByteSlice {
    ByteSlice::from(s)
}

fn int(v: i64) -> ByteSlice {
    ByteSlice::from_i64_ne(v)
}

fn create_manager() -> Arc<TransactionManager> {
    Arc::new(TransactionManager::new(Arc::new(UnifiedStore::new())))
}

// ============================================================================
// SECTION 1: TOCTOU Prevention
// ============================================================================

/// Two transactions read the same key from the same snapshot and both try
/// to write it. Exactly one may commit.
#[test]
fn test_commit_lock_prevents_toctou_race() {
    for _ in 0..50 {
        let manager = create_manager();
        let barrier = Arc::new(Barrier::new(2));
        let successes = Arc::new(AtomicUsize::new(0));
        let conflicts = Arc::new(AtomicUsize::new(0));

        // Both begin before either commits
        let txns: Vec<_> = (0..2).map(|_| manager.begin()).collect();

        let handles: Vec<_> = txns
            .into_iter()
            .enumerate()
            .map(|(i, mut txn)| {
                let (manager, barrier, successes, conflicts) = (
                    Arc::clone(&manager),
                    Arc::clone(&barrier),
                    Arc::clone(&successes),
                    Arc::clone(&conflicts),
                );
                thread::spawn(move || {
                    txn.get(&key("contested")).unwrap();
                    txn.set(key("contested"), int(i as i64)).unwrap();
                    barrier.wait();
                    match manager.commit(&mut txn) {
                        Ok(_) => successes.fetch_add(1, Ordering::SeqCst),
                        Err(CommitError::ValidationFailed(_)) => {
                            conflicts.fetch_add(1, Ordering::SeqCst)
                        }
                        Err(e) => panic!("unexpected error: {}", e),
                    };
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert_eq!(conflicts.load(Ordering::SeqCst), 1);
        assert_eq!(manager.current_version(), 1);
    }
}

// ============================================================================
// SECTION 2: Version Monotonicity
// ============================================================================

/// Blind writes to distinct keys never conflict, and every commit gets its
/// own version.
#[test]
fn test_concurrent_commit_versions_are_unique() {
    let manager = create_manager();
    let threads = 8;
    let per_thread = 100;
    let versions = Arc::new(Mutex::new(Vec::new()));
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let (manager, versions, barrier) = (
                Arc::clone(&manager),
                Arc::clone(&versions),
                Arc::clone(&barrier),
            );
            thread::spawn(move || {
                barrier.wait();
                for i in 0..per_thread {
                    let mut txn = manager.begin();
                    txn.set(key(&format!("t{}/k{}", t, i)), int(i)).unwrap();
                    let version = manager.commit(&mut txn).unwrap();
                    versions.lock().push(version);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let versions = versions.lock();
    let unique: HashSet<_> = versions.iter().copied().collect();
    let total = (threads * per_thread as usize) as u64;
    assert_eq!(unique.len() as u64, total);
    assert_eq!(unique.iter().max().copied(), Some(total));
    assert_eq!(manager.current_version(), total);
}

// ============================================================================
// SECTION 3: Phantom Protection
// ============================================================================

/// A transaction that counted a range and writes the count must conflict
/// with a concurrent insert into that range.
#[test]
fn test_range_read_conflicts_with_concurrent_insert() {
    let manager = create_manager();

    let mut counter = manager.begin();
    let count = counter
        .get_range(&key("item/"), &key("item0"), RangeOptions::new())
        .unwrap()
        .len();
    counter.set(key("count"), int(count as i64)).unwrap();

    let mut inserter = manager.begin();
    inserter.set(key("item/a"), key("x")).unwrap();
    manager.commit(&mut inserter).unwrap();

    assert!(matches!(
        manager.commit(&mut counter),
        Err(CommitError::ValidationFailed(_))
    ));
}

/// A limited range read only protects the part it returned.
#[test]
fn test_limited_read_ignores_inserts_past_boundary() {
    let manager = create_manager();
    let mut seed = manager.begin();
    seed.set(key("item/a"), key("1")).unwrap();
    seed.set(key("item/b"), key("2")).unwrap();
    manager.commit(&mut seed).unwrap();

    let mut head = manager.begin();
    let first = head
        .get_range(&key("item/"), &key("item0"), RangeOptions::new().with_limit(1))
        .unwrap();
    head.clear(&first[0].key).unwrap();

    let mut tail = manager.begin();
    tail.set(key("item/z"), key("3")).unwrap();
    manager.commit(&mut tail).unwrap();

    assert!(manager.commit(&mut head).is_ok());
}

// ============================================================================
// SECTION 4: Snapshot Stability
// ============================================================================

/// Writers move value between two keys; readers must always see the sum
/// unchanged.
#[test]
fn test_readers_never_see_partial_commits() {
    let manager = create_manager();
    let mut seed = manager.begin();
    seed.set(key("a"), int(500)).unwrap();
    seed.set(key("b"), int(500)).unwrap();
    manager.commit(&mut seed).unwrap();

    let stop = Arc::new(AtomicBool::new(false));

    let writer = {
        let (manager, stop) = (Arc::clone(&manager), Arc::clone(&stop));
        thread::spawn(move || {
            let mut i = 0i64;
            while !stop.load(Ordering::SeqCst) {
                let mut txn = manager.begin();
                let a = txn.get(&key("a")).unwrap().unwrap().to_i64_ne().unwrap();
                let b = txn.get(&key("b")).unwrap().unwrap().to_i64_ne().unwrap();
                let delta = if i % 2 == 0 { 1 } else { -1 };
                txn.set(key("a"), int(a - delta)).unwrap();
                txn.set(key("b"), int(b + delta)).unwrap();
                let _ = manager.commit(&mut txn);
                i += 1;
            }
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                for _ in 0..500 {
                    let mut txn = manager.begin();
                    let sum: i64 = txn
                        .get_range(&key("a"), &key("c"), RangeOptions::new())
                        .unwrap()
                        .iter()
                        .map(|kv| kv.value.to_i64_ne().unwrap())
                        .sum();
                    assert_eq!(sum, 1000);
                    manager.commit(&mut txn).unwrap();
                }
            })
        })
        .collect();

    for handle in readers {
        handle.join().unwrap();
    }
    stop.store(true, Ordering::SeqCst);
    writer.join().unwrap();
}
