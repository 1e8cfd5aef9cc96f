//! Tuple decoding errors

use strata_core::StrataError;
use thiserror::Error;

/// Errors raised while decoding a packed tuple
///
/// Every variant carries the byte offset at which decoding failed. They all
/// convert into `StrataError::Codec`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TupleError {
    /// Input ended inside an element
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEnd {
        /// Offset of the truncated element
        offset: usize,
    },

    /// Type code not assigned to any element kind
    #[error("unknown type code 0x{code:02X} at offset {offset}")]
    UnknownTypeCode {
        /// The offending code
        code: u8,
        /// Offset of the code
        offset: usize,
    },

    /// String payload is not valid UTF-8
    #[error("invalid UTF-8 in string at offset {offset}")]
    InvalidUtf8 {
        /// Offset of the string element
        offset: usize,
    },

    /// Byte or string payload has no `0x00` terminator
    #[error("missing terminator for element at offset {offset}")]
    MissingTerminator {
        /// Offset of the payload
        offset: usize,
    },

    /// Integer magnitude does not fit in an `i64`
    #[error("integer at offset {offset} does not fit in i64")]
    IntegerOverflow {
        /// Offset of the integer element
        offset: usize,
    },

    /// Integer uses more bytes than its value needs
    #[error("non-canonical integer encoding at offset {offset}")]
    NonCanonicalInteger {
        /// Offset of the integer element
        offset: usize,
    },

    /// Nested tuple has no `0x00` terminator
    #[error("unterminated nested tuple at offset {offset}")]
    UnterminatedNested {
        /// Offset of the nested payload
        offset: usize,
    },
}

impl TupleError {
    /// Byte offset at which decoding failed
    pub fn offset(&self) -> usize {
        match self {
            TupleError::UnexpectedEnd { offset }
            | TupleError::UnknownTypeCode { offset, .. }
            | TupleError::InvalidUtf8 { offset }
            | TupleError::MissingTerminator { offset }
            | TupleError::IntegerOverflow { offset }
            | TupleError::NonCanonicalInteger { offset }
            | TupleError::UnterminatedNested { offset } => *offset,
        }
    }
}

impl From<TupleError> for StrataError {
    fn from(e: TupleError) -> Self {
        StrataError::codec(e.offset(), e.to_string())
    }
}
