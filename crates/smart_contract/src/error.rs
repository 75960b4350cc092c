//! Error types for the smart contract crate.

use thiserror::Error;

/// Contract execution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("Contract not found: {0}")]
    ContractNotFound(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Storage error: {0}")]
    Storage(#[from] neo3_persistence::PersistenceError),

    #[error("VM error: {0}")]
    Vm(#[from] neo3_vm::VmError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Execution failed: {0}")]
    Execution(String),
}

impl From<neo3_io::IoError> for ContractError {
    fn from(e: neo3_io::IoError) -> Self {
        ContractError::Serialization(e.to_string())
    }
}

impl From<neo3_core::CoreError> for ContractError {
    fn from(e: neo3_core::CoreError) -> Self {
        ContractError::Execution(e.to_string())
    }
}

impl From<neo3_cryptography::CryptoError> for ContractError {
    fn from(e: neo3_cryptography::CryptoError) -> Self {
        ContractError::InvalidArgument(e.to_string())
    }
}

impl From<ContractError> for neo3_vm::VmError {
    fn from(e: ContractError) -> Self {
        match e {
            ContractError::Vm(inner) => inner,
            other => neo3_vm::VmError::Syscall(other.to_string()),
        }
    }
}

/// Result type for contract operations
pub type ContractResult<T> = Result<T, ContractError>;
