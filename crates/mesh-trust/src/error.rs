//! Error types for the trust controller.

use thiserror::Error;

/// Errors that can occur in trust controller operations.
///
/// Forwarding outcomes (duplicate packet ids, a congested ledger, an
/// admission drop) are not errors; they are reported through return values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrustError {
    /// A gossip record or advertisement had the wrong length.
    #[error("length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        /// Expected length (a record size or a multiple of it).
        expected: usize,
        /// Actual number of bytes received.
        actual: usize,
    },

    /// Configuration error.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for trust controller operations.
pub type TrustResult<T> = Result<T, TrustError>;
