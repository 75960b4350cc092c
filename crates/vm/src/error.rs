//! Error types for the Neo VM.
//!
//! Faults are explicit values, never panics: every handler returns
//! `VmResult` and the engine converts an `Err` into the FAULT state.

use thiserror::Error;

/// VM execution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("Invalid opcode 0x{0:02x}")]
    InvalidOpcode(u8),

    #[error("Invalid script: {0}")]
    InvalidScript(String),

    #[error("Invalid jump target {target} in script of {len} bytes")]
    InvalidJumpTarget { target: i64, len: usize },

    #[error("Evaluation stack underflow: needed {needed}, had {available}")]
    StackUnderflow { needed: usize, available: usize },

    #[error("Stack size limit exceeded: {count} > {limit}")]
    StackOverflow { count: usize, limit: usize },

    #[error("Invocation depth limit exceeded: {limit}")]
    InvocationOverflow { limit: usize },

    #[error("Try nesting limit exceeded: {limit}")]
    TryNestingOverflow { limit: usize },

    #[error("Item size limit exceeded: {size} > {limit}")]
    ItemTooLarge { size: usize, limit: usize },

    #[error("Integer out of the 256-bit range")]
    IntegerOutOfRange,

    #[error("Invalid type for operation: expected {expected}, got {actual}")]
    InvalidType {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Invalid conversion to {0}")]
    InvalidConversion(&'static str),

    #[error("Index {index} out of range {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Invalid slot access: slot {slot} of {len}")]
    InvalidSlotAccess { slot: usize, len: usize },

    #[error("Uncaught exception")]
    UncaughtException,

    #[error("ABORT executed: {0}")]
    Abort(String),

    #[error("ASSERT failed: {0}")]
    AssertFailed(String),

    #[error("Unknown syscall 0x{0:08x}")]
    UnknownSyscall(u32),

    #[error("Missing call flags: required {required:#04x}, granted {granted:#04x}")]
    MissingCallFlags { required: u8, granted: u8 },

    #[error("Out of gas: consumed {consumed}, budget {budget}")]
    OutOfGas { consumed: i64, budget: i64 },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Syscall error: {0}")]
    Syscall(String),
}

/// Result type for VM operations
pub type VmResult<T> = Result<T, VmError>;
