//! Core types and traits for Strata layers
//!
//! This crate defines the foundational types used throughout the workspace:
//! - ByteSlice: immutable, zero-copy view over a shared byte buffer
//! - Error: the `StrataError` taxonomy shared by every crate
//! - Traits: `Transaction` and `TransactionRunner`, the seam between layers
//!   and the backing key-value store
//! - CancellationToken: cooperative cancellation for transaction runners

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cancel;
pub mod error;
pub mod slice;
pub mod traits;

pub use cancel::CancellationToken;
pub use error::{StrataError, StrataResult};
pub use slice::{escape_nul_into, ByteSlice, EMPTY_MARKER, NIL_MARKER, NUL_ESCAPE};
pub use traits::{KeyValue, RangeOptions, Transaction, TransactionRunner};
