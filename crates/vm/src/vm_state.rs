//! VM execution states.

use std::fmt;

/// The state of the virtual machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VMState {
    /// Not started or mid-execution.
    #[default]
    NONE,
    /// Execution completed successfully.
    HALT,
    /// Execution faulted; the failure is recorded on the engine.
    FAULT,
    /// Execution paused by a debugger.
    BREAK,
}

impl fmt::Display for VMState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            VMState::NONE => "NONE",
            VMState::HALT => "HALT",
            VMState::FAULT => "FAULT",
            VMState::BREAK => "BREAK",
        };
        write!(f, "{text}")
    }
}
