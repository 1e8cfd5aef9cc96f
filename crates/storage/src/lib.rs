//! Storage layer for Strata
//!
//! This crate implements the in-memory backing store with:
//! - UnifiedStore: ordered BTreeMap of version chains behind an RwLock
//! - VersionChain: newest-first MVCC history for one key
//! - StoredValue: a committed value or tombstone
//! - Mutation: buffered writes applied atomically at commit
//!
//! Durability is out of scope: the store lives and dies with the process.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod stored_value;
pub mod unified;
pub mod version_chain;

pub use stored_value::StoredValue;
pub use unified::{Mutation, UnifiedStore};
pub use version_chain::VersionChain;
