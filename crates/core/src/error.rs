//! Error types for the layer stack
//!
//! This module defines the single error type used throughout the workspace.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! # Taxonomy
//!
//! | Variant | Raised by | Retried? |
//! |---------|-----------|----------|
//! | `Range` | slice bounds violations | no |
//! | `Format` | malformed hex / escaped / text input | no |
//! | `Codec` | corrupt, truncated or unknown tuple encodings | no |
//! | `Conflict` | commit-time conflict in the backing store | yes, by the runner |
//! | `Cancelled` | cancellation observed before commit | no |
//! | `Serialization` | value encode/decode failures | no |
//! | `InvalidInput` | bad arguments or configuration | no |
//! | `Internal` | invariant violations (fatal) | no |

use thiserror::Error;

/// Result type alias for layer operations
pub type StrataResult<T> = std::result::Result<T, StrataError>;

/// Error type for the layer stack
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrataError {
    /// Slice bounds violation
    #[error("Range error: {message}")]
    Range {
        /// What was out of range
        message: String,
    },

    /// Malformed textual input (hex, escaped string, text)
    #[error("Format error: {message}")]
    Format {
        /// Description of the malformed input
        message: String,
    },

    /// Corrupt, truncated or unknown tuple encoding
    #[error("Codec error at offset {offset}: {message}")]
    Codec {
        /// Byte offset where decoding failed
        offset: usize,
        /// Description of the corruption
        message: String,
    },

    /// Transaction conflicted with a concurrent commit and may be re-run
    #[error("Transaction conflict: {reason}")]
    Conflict {
        /// Why the commit was rejected
        reason: String,
    },

    /// Cancellation was requested before the transaction committed
    #[error("Operation cancelled")]
    Cancelled,

    /// Stored value could not be encoded or decoded
    #[error("Serialization error: {message}")]
    Serialization {
        /// Underlying serializer message
        message: String,
    },

    /// Invalid argument or configuration
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// What was invalid
        message: String,
    },

    /// Invariant violation or other unrecoverable failure
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the failure
        message: String,
    },
}

impl StrataError {
    /// Create a range error
    pub fn range(message: impl Into<String>) -> Self {
        StrataError::Range {
            message: message.into(),
        }
    }

    /// Create a format error
    pub fn format(message: impl Into<String>) -> Self {
        StrataError::Format {
            message: message.into(),
        }
    }

    /// Create a codec error at a byte offset
    pub fn codec(offset: usize, message: impl Into<String>) -> Self {
        StrataError::Codec {
            offset,
            message: message.into(),
        }
    }

    /// Create a retryable conflict error
    pub fn conflict(reason: impl Into<String>) -> Self {
        StrataError::Conflict {
            reason: reason.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        StrataError::Serialization {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        StrataError::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal (fatal) error
    pub fn internal(message: impl Into<String>) -> Self {
        StrataError::Internal {
            message: message.into(),
        }
    }

    /// Whether a transaction runner may transparently re-run the body
    ///
    /// Only commit conflicts are retryable. Everything else, including
    /// cancellation and corrupt data, surfaces to the caller untouched.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StrataError::Conflict { .. })
    }

    /// Check if this is a conflict error
    pub fn is_conflict(&self) -> bool {
        matches!(self, StrataError::Conflict { .. })
    }

    /// Check if this is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StrataError::Cancelled)
    }
}
