//! Error types for the persistence crate.

use thiserror::Error;

/// Persistence layer errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// Write attempted on a committed snapshot
    #[error("Snapshot already committed")]
    AlreadyCommitted,

    /// Write attempted on a read-only storage item
    #[error("Storage item is read-only")]
    ReadOnlyItem,

    /// Snapshot chain would form a cycle
    #[error("Snapshot cycle detected at id {0}")]
    CycleDetected(u64),

    /// Malformed stored bytes
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    /// Backend failure
    #[error("Store error: {0}")]
    Store(String),
}

/// Result type for persistence operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;
