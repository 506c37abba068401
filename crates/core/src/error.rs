//! The unified error taxonomy
//!
//! Every crate in the workspace returns the same [`Error`] type, so callers
//! see one stable set of error kinds regardless of which backend a
//! transaction runs against. Backend-native failures are translated at the
//! adapter boundary: retryable signals become [`Error::TransactionConflict`],
//! everything else is wrapped in [`Error::Backend`].
//!
//! Two kinds are retryable and both are covered by the single
//! [`Error::is_retryable`] predicate consumed by the retry loop:
//!
//! - `TransactionConflict`: the commit lost a race and may succeed on retry
//! - `TransactionTooOld`: the transaction outlived its window (timeout or
//!   retry exhaustion)

use thiserror::Error;

/// Result type alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all KeyspanDB operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The transaction conflicted with another commit. Retryable.
    #[error("transaction conflict: {reason}")]
    TransactionConflict {
        /// What the backend reported about the conflict.
        reason: String,
    },

    /// The transaction outlived its window (timeout or retry exhaustion).
    /// Retryable with a fresh transaction.
    #[error("transaction too old")]
    TransactionTooOld,

    /// The requested key does not exist.
    #[error("key not found")]
    KeyNotFound,

    /// The operation is not valid for the transaction's current state,
    /// or the backend does not support it.
    #[error("invalid operation: {reason}")]
    InvalidOperation {
        /// Why the operation was rejected.
        reason: String,
    },

    /// An error raised by the underlying store that does not map onto a
    /// more specific kind.
    #[error("backend error: {message}")]
    Backend {
        /// Description of the underlying failure.
        message: String,
    },

    /// Decoding ran off the end of the input.
    #[error("unexpected end of data at offset {offset}")]
    UnexpectedEndOfData {
        /// Byte offset where input was exhausted.
        offset: usize,
    },

    /// An unknown type code was encountered while decoding a tuple.
    #[error("invalid type code 0x{code:02X} at offset {offset}")]
    InvalidTypeCode {
        /// The unrecognized type code.
        code: u8,
        /// Byte offset of the type code.
        offset: usize,
    },

    /// A decoded integer does not fit in a signed 64-bit value.
    #[error("integer overflow at offset {offset}")]
    IntegerOverflow {
        /// Byte offset of the integer element.
        offset: usize,
    },

    /// A string element's payload is not valid UTF-8.
    #[error("invalid UTF-8 at offset {offset}")]
    InvalidUtf8 {
        /// Byte offset of the string element.
        offset: usize,
    },

    /// `strinc` was asked to increment a key with no incrementable bytes.
    #[error("cannot increment key: no byte below 0xFF")]
    CannotIncrementKey,

    /// A key handed to a subspace does not begin with its prefix.
    #[error("key does not begin with the subspace prefix")]
    PrefixMismatch,
}

impl Error {
    /// Create a [`Error::TransactionConflict`].
    pub fn conflict(reason: impl Into<String>) -> Self {
        Error::TransactionConflict {
            reason: reason.into(),
        }
    }

    /// Create an [`Error::InvalidOperation`].
    pub fn invalid_operation(reason: impl Into<String>) -> Self {
        Error::InvalidOperation {
            reason: reason.into(),
        }
    }

    /// Create an [`Error::Backend`].
    pub fn backend(message: impl Into<String>) -> Self {
        Error::Backend {
            message: message.into(),
        }
    }

    /// Check whether this error may succeed if the whole transaction is
    /// retried from scratch.
    ///
    /// This is the predicate the retry loop keys off. Exactly two kinds
    /// are retryable: conflicts and expiry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::TransactionConflict { .. } | Error::TransactionTooOld
        )
    }

    /// Check whether this error came out of the tuple/key codec rather
    /// than the transaction layer.
    pub fn is_codec_error(&self) -> bool {
        matches!(
            self,
            Error::UnexpectedEndOfData { .. }
                | Error::InvalidTypeCode { .. }
                | Error::IntegerOverflow { .. }
                | Error::InvalidUtf8 { .. }
                | Error::CannotIncrementKey
                | Error::PrefixMismatch
        )
    }
}
