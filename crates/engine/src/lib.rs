//! Database engine for Strata
//!
//! This crate orchestrates the lower layers into an in-process
//! transactional store:
//! - Database: transaction API with conflict retry and cancellation
//! - TransactionCoordinator: snapshot tracking, metrics, garbage collection
//!
//! `Database` implements `strata_core::TransactionRunner`, so any layer
//! written against the core traits can run on it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod coordinator;
pub mod database;

pub use coordinator::{TransactionCoordinator, TransactionMetrics};
pub use database::{Database, RetryConfig, DEFAULT_GC_INTERVAL};
