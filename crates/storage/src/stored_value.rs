//! Storage-layer versioned value
//!
//! A `StoredValue` is one entry in a key's version chain. A deletion is
//! recorded as a tombstone (`value == None`) rather than by dropping the
//! chain, so that a later commit validating a read of the deleted key still
//! sees that the key changed.

use strata_core::ByteSlice;

/// A value written at a commit version, or a tombstone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    version: u64,
    value: Option<ByteSlice>,
}

impl StoredValue {
    /// A live value written at `version`
    pub fn new(value: ByteSlice, version: u64) -> Self {
        StoredValue {
            version,
            value: Some(value),
        }
    }

    /// A deletion recorded at `version`
    pub fn tombstone(version: u64) -> Self {
        StoredValue {
            version,
            value: None,
        }
    }

    /// Commit version that wrote this entry
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The value, or `None` for a tombstone
    pub fn value(&self) -> Option<&ByteSlice> {
        self.value.as_ref()
    }

    /// Check if this entry records a deletion
    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tombstone() {
        let live = StoredValue::new(ByteSlice::from("v"), 3);
        let dead = StoredValue::tombstone(4);

        assert!(!live.is_tombstone());
        assert_eq!(live.value(), Some(&ByteSlice::from("v")));
        assert!(dead.is_tombstone());
        assert_eq!(dead.value(), None);
        assert_eq!(dead.version(), 4);
    }
}
