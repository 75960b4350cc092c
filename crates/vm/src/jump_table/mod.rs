//! The jump table: one handler per opcode, grouped by category.
//!
//! RET, THROW, SYSCALL, CALLT and ENDFINALLY are intercepted by the
//! engine's step loop (they need the syscall router) and never reach the
//! table.

pub mod bitwise;
pub mod compound;
pub mod control;
pub mod numeric;
pub mod push;
pub mod slot_ops;
pub mod splice;
pub mod stack_ops;
pub mod types;

use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;

/// Handler signature shared by every opcode.
pub type OpHandler = fn(&mut ExecutionEngine, &Instruction) -> VmResult<()>;

fn invalid(_engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    Err(VmError::InvalidOpcode(instruction.opcode as u8))
}

/// An array of handlers indexed by opcode byte.
pub struct JumpTable {
    handlers: [OpHandler; 256],
}

impl JumpTable {
    pub fn handler(&self, opcode: OpCode) -> OpHandler {
        self.handlers[opcode as u8 as usize]
    }

    pub fn set(&mut self, opcode: OpCode, handler: OpHandler) {
        self.handlers[opcode as u8 as usize] = handler;
    }
}

impl Default for JumpTable {
    fn default() -> Self {
        let mut table = Self {
            handlers: [invalid as OpHandler; 256],
        };
        push::register(&mut table);
        control::register(&mut table);
        stack_ops::register(&mut table);
        slot_ops::register(&mut table);
        splice::register(&mut table);
        bitwise::register(&mut table);
        numeric::register(&mut table);
        compound::register(&mut table);
        types::register(&mut table);
        table
    }
}
