//! Constant-pushing opcodes.

use super::JumpTable;
use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::stack_item::StackItem;
use num_bigint::BigInt;

pub fn register(table: &mut JumpTable) {
    for opcode in [
        OpCode::PUSHINT8,
        OpCode::PUSHINT16,
        OpCode::PUSHINT32,
        OpCode::PUSHINT64,
        OpCode::PUSHINT128,
        OpCode::PUSHINT256,
    ] {
        table.set(opcode, push_int);
    }
    table.set(OpCode::PUSHT, |engine, _| {
        engine.push(StackItem::from_bool(true))
    });
    table.set(OpCode::PUSHF, |engine, _| {
        engine.push(StackItem::from_bool(false))
    });
    table.set(OpCode::PUSHA, push_a);
    table.set(OpCode::PUSHNULL, |engine, _| engine.push(StackItem::Null));
    for opcode in [OpCode::PUSHDATA1, OpCode::PUSHDATA2, OpCode::PUSHDATA4] {
        table.set(opcode, push_data);
    }
    // PUSHM1..PUSH16 share one handler; the value falls out of the byte.
    for byte in OpCode::PUSHM1 as u8..=OpCode::PUSH16 as u8 {
        let opcode = OpCode::from_byte(byte).expect("contiguous push range");
        table.set(opcode, push_small_int);
    }
}

fn push_int(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let value = instruction.token_integer();
    engine.push(StackItem::check_integer(value)?)
}

fn push_small_int(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let value = instruction.opcode as u8 as i64 - OpCode::PUSH0 as u8 as i64;
    engine.push(StackItem::from_int(BigInt::from(value)))
}

fn push_a(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let offset = instruction.token_i32()?;
    let context = engine.current_context()?;
    let target = context.script.checked_target(instruction.ip, offset)?;
    engine.push(StackItem::Pointer(target))
}

fn push_data(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    if instruction.operand.len() > engine.limits().max_item_size {
        return Err(VmError::ItemTooLarge {
            size: instruction.operand.len(),
            limit: engine.limits().max_item_size,
        });
    }
    engine.push(StackItem::from_bytes(instruction.operand.clone()))
}

#[cfg(test)]
mod tests {
    use crate::{CallFlags, ExecutionEngine, ExecutionEngineLimits, Script, VMState};
    use num_bigint::BigInt;

    fn run(script: Vec<u8>) -> ExecutionEngine {
        let mut engine = ExecutionEngine::new(ExecutionEngineLimits::default());
        engine
            .load_script(Script::new(script), -1, CallFlags::ALL)
            .unwrap();
        engine.execute();
        engine
    }

    #[test]
    fn push_small_ints() {
        let engine = run(vec![0x0F, 0x10, 0x20]);
        assert_eq!(engine.state(), VMState::HALT);
        let values: Vec<BigInt> = engine
            .result_stack()
            .iter()
            .map(|item| item.as_int().unwrap())
            .collect();
        assert_eq!(values, vec![BigInt::from(-1), BigInt::from(0), BigInt::from(16)]);
    }

    #[test]
    fn push_int8_sign() {
        let engine = run(vec![0x00, 0xFF]);
        assert_eq!(engine.result_stack()[0].as_int().unwrap(), BigInt::from(-1));
    }

    #[test]
    fn push_data() {
        let engine = run(vec![0x0C, 0x02, 0xAA, 0xBB]);
        assert_eq!(
            engine.result_stack()[0].as_bytes().unwrap(),
            vec![0xAA, 0xBB]
        );
    }

    #[test]
    fn push_bools_and_null() {
        let engine = run(vec![0x08, 0x09, 0x0B]);
        assert!(engine.result_stack()[0].as_bool().unwrap());
        assert!(!engine.result_stack()[1].as_bool().unwrap());
        assert!(engine.result_stack()[2].is_null());
    }
}
