//! Order-preserving tuple encoding for Strata keys
//!
//! A [`Tuple`] is an ordered sequence of typed [`Element`]s whose packed form
//! sorts, under unsigned byte comparison, exactly like the tuples themselves.
//! A [`Subspace`] is a tuple-prefixed key namespace built on top of it.
//!
//! # Type codes
//!
//! Codes follow the FoundationDB tuple layer, so ascending code means
//! ascending type rank:
//!
//! | Code | Element | Payload |
//! |------|---------|---------|
//! | 0x00 | Null | none (`0x00 0xFF` inside a nested tuple) |
//! | 0x01 | Bytes | NUL-escaped bytes, `0x00` terminator |
//! | 0x02 | String | NUL-escaped UTF-8, `0x00` terminator |
//! | 0x05 | Tuple | nested elements, `0x00` terminator |
//! | 0x0C-0x13 | negative Int | one's complement big-endian magnitude, `0x14 - len` bytes |
//! | 0x14 | zero Int | none |
//! | 0x15-0x1C | positive Int | big-endian magnitude, `code - 0x14` bytes |
//! | 0x20 | Float | sign-transformed big-endian `f32` bits |
//! | 0x21 | Double | sign-transformed big-endian `f64` bits |
//! | 0x26 / 0x27 | Bool | none (false / true) |
//! | 0x30 | Uuid | 16 raw bytes |
//!
//! # Example
//!
//! ```
//! use strata_tuple::Tuple;
//!
//! let a = Tuple::new().push("users").push(-5i64);
//! let b = Tuple::new().push("users").push(5i64);
//!
//! assert!(a < b);
//! assert!(a.pack() < b.pack());
//! assert_eq!(Tuple::unpack(&a.pack()).unwrap(), a);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod decoding;
mod element;
mod encoding;
mod error;
mod subspace;
mod tuple;

#[cfg(test)]
mod proptest;

pub use element::Element;
pub use error::TupleError;
pub use subspace::Subspace;
pub use tuple::{strinc, Tuple};
