//! Strata layers: tuple keys, subspaces and transactional queues
//!
//! Building blocks for modeling data on an ordered, transactional
//! key-value store:
//!
//! - [`ByteSlice`]: immutable byte view with value semantics and escaping
//! - [`Tuple`]: order-preserving encoding of typed element sequences
//! - [`Subspace`]: composable tuple-prefixed key namespaces
//! - [`Queue`]: FIFO queue with simple and high-contention modes
//!
//! The layers talk to storage only through the [`Transaction`] and
//! [`TransactionRunner`] traits. [`Database`] is an in-process
//! implementation with serializable transactions and conflict retry.
//!
//! # Quick Start
//!
//! ```rust
//! use strata_layers::{CancellationToken, Database, Queue, StrataResult, Subspace, Tuple};
//!
//! fn main() -> StrataResult<()> {
//!     let db = Database::new();
//!     let cancel = CancellationToken::new();
//!     let jobs: Queue<String> = Queue::simple(Subspace::new(Tuple::new().push("jobs")));
//!
//!     jobs.push_with(&db, &cancel, &"build".to_string())?;
//!     assert_eq!(jobs.pop_with(&db, &cancel)?, Some("build".to_string()));
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;

pub use config::LayerConfig;
pub use strata_core::{
    ByteSlice, CancellationToken, KeyValue, RangeOptions, StrataError, StrataResult, Transaction,
    TransactionRunner,
};
pub use strata_engine::{Database, RetryConfig};
pub use strata_primitives::{Queue, QueueConfig, QueueState};
pub use strata_tuple::{Element, Subspace, Tuple};

impl LayerConfig {
    /// A database using this configuration's retry policy
    pub fn database(&self) -> Database {
        Database::with_retry(self.retry.clone())
    }

    /// A queue over `subspace` using this configuration's queue tuning
    ///
    /// # Errors
    /// Returns `StrataError::InvalidInput` if the queue tuning is invalid.
    pub fn queue<T>(&self, subspace: Subspace) -> StrataResult<Queue<T>>
    where
        T: serde::Serialize + serde::de::DeserializeOwned,
    {
        Queue::new(subspace, self.queue.clone())
    }
}
