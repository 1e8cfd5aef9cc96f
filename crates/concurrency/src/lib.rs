//! Concurrency layer for Strata
//!
//! This crate implements optimistic concurrency control (OCC) with:
//! - TransactionContext: snapshot reads, buffered writes, read tracking
//! - Conflict detection at commit time over read keys and read ranges
//! - TransactionManager: serialized validate-then-apply commits
//!
//! The result is serializable isolation: a transaction commits only if
//! nothing it read changed between its snapshot and its commit.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;
pub mod transaction;
pub mod validation;

pub use manager::TransactionManager;
pub use transaction::{
    CommitError, KeyRange, PendingOperations, TransactionContext, TransactionStatus,
};
pub use validation::{
    validate_read_ranges, validate_read_set, validate_transaction, ConflictType,
    ValidationResult,
};
