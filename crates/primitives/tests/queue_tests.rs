//! Queue behavior through a real transactional store
//!
//! Every operation here runs as its own retried transaction on a
//! `Database`, the way an application would use the queue.

use strata_core::{CancellationToken, StrataError};
use strata_engine::Database;
use strata_primitives::{Queue, QueueConfig, QueueState};
use strata_tuple::{Subspace, Tuple};

// ============================================================================
// Test Helpers
// ============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn queue(config: QueueConfig) -> Queue<i64> {
    Queue::new(Subspace::new(Tuple::new().push("queue-tests")), config).unwrap()
}

fn both_modes() -> [QueueConfig; 2] {
    [QueueConfig::new(), QueueConfig::high_contention()]
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_single_caller_scenario() {
    init_tracing();
    for config in both_modes() {
        let db = Database::new();
        let cancel = CancellationToken::new();
        let q = queue(config);

        for v in [10, 8, 6] {
            q.push_with(&db, &cancel, &v).unwrap();
        }
        assert_eq!(q.pop_with(&db, &cancel).unwrap(), Some(10));
        assert_eq!(q.pop_with(&db, &cancel).unwrap(), Some(8));
        assert_eq!(q.peek_with(&db, &cancel).unwrap(), Some(6));
        assert_eq!(q.pop_with(&db, &cancel).unwrap(), Some(6));
        assert!(q.empty_with(&db, &cancel).unwrap());

        q.push_with(&db, &cancel, &5).unwrap();
        q.clear_with(&db, &cancel).unwrap();
        assert!(q.empty_with(&db, &cancel).unwrap());
        assert_eq!(q.pop_with(&db, &cancel).unwrap(), None);
    }
}

#[test]
fn test_peek_after_first_pop_does_not_remove() {
    let db = Database::new();
    let cancel = CancellationToken::new();
    let q = queue(QueueConfig::new());

    for v in [10, 8, 6] {
        q.push_with(&db, &cancel, &v).unwrap();
    }
    q.pop_with(&db, &cancel).unwrap();
    assert_eq!(q.peek_with(&db, &cancel).unwrap(), Some(8));
    assert_eq!(q.peek_with(&db, &cancel).unwrap(), Some(8));
    assert_eq!(q.len_with(&db, &cancel).unwrap(), 2);
}

#[test]
fn test_state_becomes_ready_after_commit() {
    let db = Database::new();
    let cancel = CancellationToken::new();
    let q = queue(QueueConfig::new());

    assert_eq!(q.state(), QueueState::Uninitialized);
    assert!(q.empty_with(&db, &cancel).unwrap());
    assert_eq!(q.state(), QueueState::Ready);
}

#[test]
fn test_reopened_queue_sees_same_entries() {
    let db = Database::new();
    let cancel = CancellationToken::new();
    let subspace = Subspace::new(Tuple::new().push("shared"));

    let writer: Queue<String> = Queue::simple(subspace.clone());
    writer.push_with(&db, &cancel, &"hello".to_string()).unwrap();

    let reader: Queue<String> = Queue::simple(subspace);
    assert_eq!(reader.state(), QueueState::Uninitialized);
    assert_eq!(
        reader.pop_with(&db, &cancel).unwrap(),
        Some("hello".to_string())
    );
}

#[test]
fn test_queues_in_sibling_subspaces_are_isolated() {
    let db = Database::new();
    let cancel = CancellationToken::new();
    let root = Subspace::new(Tuple::new().push("app"));
    let a: Queue<i64> = Queue::simple(root.partition("a"));
    let b: Queue<i64> = Queue::high_contention(root.partition("b"));

    a.push_with(&db, &cancel, &1).unwrap();
    b.push_with(&db, &cancel, &2).unwrap();
    a.clear_with(&db, &cancel).unwrap();

    assert!(a.empty_with(&db, &cancel).unwrap());
    assert_eq!(b.pop_with(&db, &cancel).unwrap(), Some(2));
}

#[test]
fn test_operations_compose_in_one_transaction() {
    let db = Database::new();
    let cancel = CancellationToken::new();
    let inbox = queue(QueueConfig::new());
    let outbox: Queue<i64> = Queue::simple(Subspace::new(Tuple::new().push("outbox")));

    inbox.push_with(&db, &cancel, &7).unwrap();
    let moved = db
        .run(&cancel, |txn| {
            let value = inbox.pop(txn)?;
            if let Some(v) = value {
                outbox.push(txn, &(v * 2))?;
            }
            Ok(value)
        })
        .unwrap();

    assert_eq!(moved, Some(7));
    assert!(inbox.empty_with(&db, &cancel).unwrap());
    assert_eq!(outbox.pop_with(&db, &cancel).unwrap(), Some(14));
}

#[test]
fn test_failed_body_leaves_queue_untouched() {
    let db = Database::new();
    let cancel = CancellationToken::new();
    let q = queue(QueueConfig::new());
    q.push_with(&db, &cancel, &1).unwrap();

    let result: Result<(), StrataError> = db.run(&cancel, |txn| {
        q.pop(txn)?;
        Err(StrataError::invalid_input("abort after pop"))
    });
    assert!(result.is_err());
    assert_eq!(q.peek_with(&db, &cancel).unwrap(), Some(1));
}

#[test]
fn test_cancelled_operation_makes_no_change() {
    let db = Database::new();
    let cancel = CancellationToken::new();
    let q = queue(QueueConfig::high_contention());
    q.push_with(&db, &cancel, &1).unwrap();

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let err = q.pop_with(&db, &cancelled).unwrap_err();
    assert!(err.is_cancelled());
    assert!(q.push_with(&db, &cancelled, &2).unwrap_err().is_cancelled());

    assert_eq!(q.len_with(&db, &cancel).unwrap(), 1);
    assert_eq!(q.pop_with(&db, &cancel).unwrap(), Some(1));
}

#[test]
fn test_high_contention_compaction_preserves_order() {
    let db = Database::new();
    let cancel = CancellationToken::new();
    let q = queue(QueueConfig::high_contention().with_compaction_batch(3));

    for v in 0..10 {
        q.push_with(&db, &cancel, &v).unwrap();
    }
    let mut popped = Vec::new();
    while let Some(v) = q.pop_with(&db, &cancel).unwrap() {
        popped.push(v);
    }
    assert_eq!(popped, (0..10).collect::<Vec<_>>());
    assert!(q.empty_with(&db, &cancel).unwrap());
}
