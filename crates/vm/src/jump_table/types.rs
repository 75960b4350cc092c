//! Type-introspection opcodes.

use super::JumpTable;
use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::stack_item::{StackItem, StackItemType};

pub fn register(table: &mut JumpTable) {
    table.set(OpCode::ISNULL, is_null);
    table.set(OpCode::ISTYPE, is_type);
    table.set(OpCode::CONVERT, convert);
}

fn is_null(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let item = engine.pop()?;
    engine.push(StackItem::from_bool(item.is_null()))
}

fn is_type(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let target = StackItemType::from_byte(instruction.token_u8()?)
        .ok_or(VmError::InvalidConversion("unknown item type"))?;
    if target == StackItemType::Any {
        return Err(VmError::InvalidScript("ISTYPE with Any".to_string()));
    }
    let item = engine.pop()?;
    engine.push(StackItem::from_bool(item.item_type() == target))
}

fn convert(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let target = StackItemType::from_byte(instruction.token_u8()?)
        .ok_or(VmError::InvalidConversion("unknown item type"))?;
    let item = engine.pop()?;
    let converted = item.convert_to(target, engine.limits())?;
    engine.push(converted)
}
