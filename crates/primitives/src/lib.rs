//! Primitives layer for Strata
//!
//! Provides transactional data structures as stateless views over a
//! tuple-keyed subspace:
//! - **Queue**: FIFO queue with a simple mode and a high-contention mode
//!
//! ## Design Principle: Stateless Views
//!
//! A primitive holds only its subspace and tuning. Every operation is a
//! transaction body written against `strata_core::Transaction`, so:
//!
//! - Multiple instances over the same subspace are safe
//! - Operations compose with other writes inside one transaction
//! - Bodies can be re-executed by a retrying runner without side effects
//!
//! ```rust
//! use strata_core::{CancellationToken, StrataResult};
//! use strata_engine::Database;
//! use strata_primitives::Queue;
//! use strata_tuple::{Subspace, Tuple};
//!
//! fn main() -> StrataResult<()> {
//!     let db = Database::new();
//!     let cancel = CancellationToken::new();
//!     let jobs: Queue<String> = Queue::simple(Subspace::new(Tuple::new().push("jobs")));
//!     let done: Queue<String> = Queue::simple(Subspace::new(Tuple::new().push("done")));
//!     jobs.push_with(&db, &cancel, &"build".to_string())?;
//!
//!     // Move one job between queues atomically
//!     let moved = db.run(&cancel, |txn| {
//!         let job = jobs.pop(txn)?;
//!         if let Some(job) = &job {
//!             done.push(txn, job)?;
//!         }
//!         Ok(job)
//!     })?;
//!
//!     assert_eq!(moved.as_deref(), Some("build"));
//!     assert_eq!(done.peek_with(&db, &cancel)?.as_deref(), Some("build"));
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod queue;

pub use queue::{Queue, QueueConfig, QueueState};
