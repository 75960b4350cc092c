//! Error types for the Neo core crate.

use thiserror::Error;

/// Core module errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Invalid format error with detailed description
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Invalid data error with context
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Invalid operation attempted
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] neo3_io::IoError),

    /// Cryptographic operation failed
    #[error("Crypto error: {0}")]
    Crypto(#[from] neo3_cryptography::CryptoError),
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;
