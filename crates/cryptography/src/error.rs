//! Error types for the cryptography crate.

use thiserror::Error;

/// Cryptographic operation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// A point or key failed to parse
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// A signature failed to parse
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Base58 or hex decoding failed
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// A checksum did not match
    #[error("Checksum mismatch")]
    ChecksumMismatch,

    /// Input had the wrong length
    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Result type for cryptographic operations
pub type CryptoResult<T> = Result<T, CryptoError>;
