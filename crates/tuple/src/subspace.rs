//! Tuple-prefixed key namespaces

use crate::element::Element;
use crate::encoding::{encode_element, encoded_len};
use crate::tuple::Tuple;
use std::fmt;
use strata_core::{ByteSlice, StrataError, StrataResult};

/// A key namespace identified by a packed prefix
///
/// The prefix is an optional raw byte prefix followed by a packed tuple,
/// computed once at construction. Child subspaces own their own prefix
/// buffer and share no state with the parent.
///
/// # Example
///
/// ```
/// use strata_tuple::{Subspace, Tuple};
///
/// let app = Subspace::new(Tuple::new().push("app"));
/// let users = app.partition("users");
/// let key = users.key(&Tuple::new().push(42i64));
///
/// assert!(key.starts_with(app.prefix().as_bytes()));
/// assert_eq!(users.unpack(&key).unwrap(), Tuple::new().push(42i64));
/// ```
#[derive(Clone)]
pub struct Subspace {
    raw_prefix: ByteSlice,
    tuple: Tuple,
    prefix: ByteSlice,
}

impl Subspace {
    /// Subspace prefixed by the packed form of `tuple`
    pub fn new(tuple: Tuple) -> Self {
        let prefix = tuple.pack();
        Subspace {
            raw_prefix: ByteSlice::empty(),
            tuple,
            prefix,
        }
    }

    /// Subspace prefixed by raw bytes that are not a tuple encoding
    pub fn from_raw_prefix(raw: impl Into<ByteSlice>) -> Self {
        let raw: ByteSlice = raw.into();
        Subspace {
            prefix: raw.clone(),
            raw_prefix: raw,
            tuple: Tuple::new(),
        }
    }

    /// Subspace covering the whole key space (empty prefix)
    pub fn all() -> Self {
        Self::new(Tuple::new())
    }

    /// The memoized packed prefix
    pub fn prefix(&self) -> &ByteSlice {
        &self.prefix
    }

    /// The prefix tuple (without any raw prefix)
    pub fn tuple(&self) -> &Tuple {
        &self.tuple
    }

    /// Child subspace extended by one element
    pub fn partition<E: Into<Element>>(&self, element: E) -> Subspace {
        let element = element.into();
        let mut buf = Vec::with_capacity(self.prefix.len() + encoded_len(&element, false));
        buf.extend_from_slice(self.prefix.as_bytes());
        encode_element(&element, &mut buf, false);
        Subspace {
            raw_prefix: self.raw_prefix.clone(),
            tuple: self.tuple.append(element),
            prefix: ByteSlice::from_vec(buf),
        }
    }

    /// Child subspace extended by two elements
    pub fn partition2<A: Into<Element>, B: Into<Element>>(&self, first: A, second: B) -> Subspace {
        self.partition_tuple(&Tuple::new().push(first).push(second))
    }

    /// Child subspace extended by every element of `suffix`
    pub fn partition_tuple(&self, suffix: &Tuple) -> Subspace {
        Subspace {
            raw_prefix: self.raw_prefix.clone(),
            tuple: self.tuple.concat(suffix),
            prefix: self.key(suffix),
        }
    }

    /// `prefix ++ tuple.pack()` in a single allocation
    pub fn key(&self, tuple: &Tuple) -> ByteSlice {
        let mut buf = Vec::with_capacity(self.prefix.len() + tuple.packed_len());
        buf.extend_from_slice(self.prefix.as_bytes());
        tuple.pack_into(&mut buf);
        ByteSlice::from_vec(buf)
    }

    /// `prefix ++ raw` verbatim, for pre-encoded keys
    pub fn key_raw(&self, raw: &[u8]) -> ByteSlice {
        self.prefix.concat(raw)
    }

    /// Whether `key` starts with this subspace's prefix
    pub fn contains_key(&self, key: &[u8]) -> bool {
        key.starts_with(self.prefix.as_bytes())
    }

    /// Decode the tuple that follows the prefix in `key`
    ///
    /// # Errors
    ///
    /// Returns `StrataError::InvalidInput` if `key` is not inside this
    /// subspace, or `StrataError::Codec` if the suffix is not a valid tuple.
    pub fn unpack(&self, key: &ByteSlice) -> StrataResult<Tuple> {
        if !self.contains_key(key.as_bytes()) {
            return Err(StrataError::invalid_input(format!(
                "key {} is not in subspace {}",
                key, self
            )));
        }
        Tuple::unpack(&key.substring(self.prefix.len() as isize))
    }

    /// Key range covering every key strictly inside this subspace
    ///
    /// Returns `(prefix ++ 0x00, prefix ++ 0xFF)`.
    pub fn range(&self) -> (ByteSlice, ByteSlice) {
        (self.prefix.concat(&[0x00]), self.prefix.concat(&[0xFF]))
    }

    /// Key range covering every key inside `self.partition_tuple(suffix)`
    pub fn range_of(&self, suffix: &Tuple) -> (ByteSlice, ByteSlice) {
        let packed = self.key(suffix);
        (packed.concat(&[0x00]), packed.concat(&[0xFF]))
    }
}

impl PartialEq for Subspace {
    fn eq(&self, other: &Self) -> bool {
        self.raw_prefix == other.raw_prefix && self.tuple == other.tuple
    }
}

impl Eq for Subspace {}

impl fmt::Display for Subspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.raw_prefix.is_empty() {
            write!(f, "Subspace{}", self.tuple)
        } else {
            write!(f, "Subspace({}, {})", self.raw_prefix, self.tuple)
        }
    }
}

impl fmt::Debug for Subspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
