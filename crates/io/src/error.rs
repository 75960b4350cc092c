//! Error types for the Neo I/O crate.

use thiserror::Error;

/// I/O operation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IoError {
    /// Unexpected end of stream
    #[error("Unexpected end of stream: expected {expected} more bytes while reading {context}")]
    EndOfStream { expected: usize, context: String },

    /// Invalid data content
    #[error("Invalid data: {context}, value: {value}")]
    InvalidData { context: String, value: String },

    /// A length prefix exceeded the caller-supplied maximum
    #[error("Length {actual} exceeds maximum {max} while reading {context}")]
    ExceedsMaximum {
        context: String,
        actual: u64,
        max: u64,
    },

    /// A var-int was not minimally encoded
    #[error("Non-canonical variable-length integer: value {value} encoded with prefix 0x{prefix:02x}")]
    NonCanonicalVarInt { value: u64, prefix: u8 },

    /// Invalid operation on the reader or writer
    #[error("Invalid operation: {operation}, reason: {reason}")]
    InvalidOperation { operation: String, reason: String },
}

impl IoError {
    pub fn end_of_stream(expected: usize, context: &str) -> Self {
        IoError::EndOfStream {
            expected,
            context: context.to_string(),
        }
    }

    pub fn invalid_data(context: &str, value: &str) -> Self {
        IoError::InvalidData {
            context: context.to_string(),
            value: value.to_string(),
        }
    }

    pub fn invalid_operation(operation: &str, reason: &str) -> Self {
        IoError::InvalidOperation {
            operation: operation.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for I/O operations
pub type IoResult<T> = Result<T, IoError>;
