//! Bitwise and equality opcodes.

use super::JumpTable;
use crate::error::VmResult;
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::stack_item::StackItem;
use num_bigint::BigInt;

pub fn register(table: &mut JumpTable) {
    table.set(OpCode::INVERT, invert);
    table.set(OpCode::AND, and);
    table.set(OpCode::OR, or);
    table.set(OpCode::XOR, xor);
    table.set(OpCode::EQUAL, equal);
    table.set(OpCode::NOTEQUAL, not_equal);
}

fn invert(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let x = engine.pop_int()?;
    // Two's complement inversion.
    engine.push(StackItem::check_integer(-(x + BigInt::from(1)))?)
}

fn and(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let b = engine.pop_int()?;
    let a = engine.pop_int()?;
    engine.push(StackItem::check_integer(a & b)?)
}

fn or(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let b = engine.pop_int()?;
    let a = engine.pop_int()?;
    engine.push(StackItem::check_integer(a | b)?)
}

fn xor(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let b = engine.pop_int()?;
    let a = engine.pop_int()?;
    engine.push(StackItem::check_integer(a ^ b)?)
}

fn equal(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let b = engine.pop()?;
    let a = engine.pop()?;
    let result = a.equals(&b, engine.limits())?;
    engine.push(StackItem::from_bool(result))
}

fn not_equal(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let b = engine.pop()?;
    let a = engine.pop()?;
    let result = a.equals(&b, engine.limits())?;
    engine.push(StackItem::from_bool(!result))
}

#[cfg(test)]
mod tests {
    use crate::{CallFlags, ExecutionEngine, ExecutionEngineLimits, Script, VMState};
    use num_bigint::BigInt;

    fn run_int(script: Vec<u8>) -> BigInt {
        let mut engine = ExecutionEngine::new(ExecutionEngineLimits::default());
        engine
            .load_script(Script::new(script), -1, CallFlags::ALL)
            .unwrap();
        assert_eq!(engine.execute(), VMState::HALT);
        engine.result_stack()[0].as_int().unwrap()
    }

    #[test]
    fn bit_operations() {
        // 0b0110 AND 0b0101 = 0b0100
        assert_eq!(run_int(vec![0x16, 0x15, 0x91]), BigInt::from(4));
        // OR = 0b0111
        assert_eq!(run_int(vec![0x16, 0x15, 0x92]), BigInt::from(7));
        // XOR = 0b0011
        assert_eq!(run_int(vec![0x16, 0x15, 0x93]), BigInt::from(3));
    }

    #[test]
    fn invert_is_twos_complement() {
        assert_eq!(run_int(vec![0x10, 0x90]), BigInt::from(-1));
        assert_eq!(run_int(vec![0x15, 0x90]), BigInt::from(-6));
    }

    #[test]
    fn equal_on_values_and_references() {
        let mut engine = ExecutionEngine::new(ExecutionEngineLimits::default());
        // PUSH1 PUSH1 EQUAL
        engine
            .load_script(Script::new(vec![0x11, 0x11, 0x97]), -1, CallFlags::ALL)
            .unwrap();
        assert_eq!(engine.execute(), VMState::HALT);
        assert!(engine.result_stack()[0].as_bool().unwrap());

        // NEWARRAY0 DUP EQUAL -> same reference, true
        let mut engine = ExecutionEngine::new(ExecutionEngineLimits::default());
        engine
            .load_script(Script::new(vec![0xC2, 0x4A, 0x97]), -1, CallFlags::ALL)
            .unwrap();
        assert_eq!(engine.execute(), VMState::HALT);
        assert!(engine.result_stack()[0].as_bool().unwrap());

        // NEWARRAY0 NEWARRAY0 EQUAL -> distinct references, false
        let mut engine = ExecutionEngine::new(ExecutionEngineLimits::default());
        engine
            .load_script(Script::new(vec![0xC2, 0xC2, 0x97]), -1, CallFlags::ALL)
            .unwrap();
        assert_eq!(engine.execute(), VMState::HALT);
        assert!(!engine.result_stack()[0].as_bool().unwrap());
    }
}
