//! Evaluation-stack manipulation opcodes.

use super::JumpTable;
use crate::error::VmResult;
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::stack_item::StackItem;

pub fn register(table: &mut JumpTable) {
    table.set(OpCode::DEPTH, depth);
    table.set(OpCode::DROP, |engine, _| engine.pop().map(|_| ()));
    table.set(OpCode::NIP, nip);
    table.set(OpCode::XDROP, xdrop);
    table.set(OpCode::CLEAR, clear);
    table.set(OpCode::DUP, dup);
    table.set(OpCode::OVER, over);
    table.set(OpCode::PICK, pick);
    table.set(OpCode::TUCK, tuck);
    table.set(OpCode::SWAP, swap);
    table.set(OpCode::ROT, rot);
    table.set(OpCode::ROLL, roll);
    table.set(OpCode::REVERSE3, |engine, _| reverse_n(engine, 3));
    table.set(OpCode::REVERSE4, |engine, _| reverse_n(engine, 4));
    table.set(OpCode::REVERSEN, reverse_pop_n);
}

fn depth(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let depth = engine.current_context()?.evaluation_stack.borrow().len();
    engine.push(StackItem::from_int(depth as i64))
}

fn nip(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    engine
        .current_context()?
        .evaluation_stack
        .borrow_mut()
        .remove(1)
        .map(|_| ())
}

fn xdrop(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let n = engine.pop_usize()?;
    engine
        .current_context()?
        .evaluation_stack
        .borrow_mut()
        .remove(n)
        .map(|_| ())
}

fn clear(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    engine
        .current_context()?
        .evaluation_stack
        .borrow_mut()
        .clear();
    Ok(())
}

fn dup(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let top = engine.peek(0)?;
    engine.push(top)
}

fn over(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let second = engine.peek(1)?;
    engine.push(second)
}

fn pick(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let n = engine.pop_usize()?;
    let item = engine.peek(n)?;
    engine.push(item)
}

fn tuck(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let top = engine.peek(0)?;
    engine
        .current_context()?
        .evaluation_stack
        .borrow_mut()
        .insert(2, top)
}

fn swap(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let item = engine
        .current_context()?
        .evaluation_stack
        .borrow_mut()
        .remove(1)?;
    engine.push(item)
}

fn rot(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let item = engine
        .current_context()?
        .evaluation_stack
        .borrow_mut()
        .remove(2)?;
    engine.push(item)
}

fn roll(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let n = engine.pop_usize()?;
    if n == 0 {
        return Ok(());
    }
    let item = engine
        .current_context()?
        .evaluation_stack
        .borrow_mut()
        .remove(n)?;
    engine.push(item)
}

fn reverse_n(engine: &mut ExecutionEngine, n: usize) -> VmResult<()> {
    engine
        .current_context()?
        .evaluation_stack
        .borrow_mut()
        .reverse(n)
}

fn reverse_pop_n(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let n = engine.pop_usize()?;
    reverse_n(engine, n)
}

#[cfg(test)]
mod tests {
    use crate::{CallFlags, ExecutionEngine, ExecutionEngineLimits, Script, VMState};
    use num_traits::ToPrimitive;

    fn run(script: Vec<u8>) -> Vec<i64> {
        let mut engine = ExecutionEngine::new(ExecutionEngineLimits::default());
        engine
            .load_script(Script::new(script), -1, CallFlags::ALL)
            .unwrap();
        assert_eq!(engine.execute(), VMState::HALT);
        engine
            .result_stack()
            .iter()
            .map(|item| item.as_int().unwrap().to_i64().unwrap())
            .collect()
    }

    #[test]
    fn swap_rot_roll() {
        // PUSH1 PUSH2 SWAP -> [2, 1]
        assert_eq!(run(vec![0x11, 0x12, 0x50]), vec![2, 1]);
        // PUSH1 PUSH2 PUSH3 ROT -> [2, 3, 1]
        assert_eq!(run(vec![0x11, 0x12, 0x13, 0x51]), vec![2, 3, 1]);
        // PUSH1 PUSH2 PUSH3 PUSH2 ROLL -> [2, 3, 1]
        assert_eq!(run(vec![0x11, 0x12, 0x13, 0x12, 0x52]), vec![2, 3, 1]);
    }

    #[test]
    fn dup_over_tuck() {
        assert_eq!(run(vec![0x11, 0x4A]), vec![1, 1]);
        assert_eq!(run(vec![0x11, 0x12, 0x4B]), vec![1, 2, 1]);
        // TUCK: a b -> b a b
        assert_eq!(run(vec![0x11, 0x12, 0x4E]), vec![2, 1, 2]);
    }

    #[test]
    fn depth_and_drop() {
        assert_eq!(run(vec![0x11, 0x12, 0x43]), vec![1, 2, 2]);
        assert_eq!(run(vec![0x11, 0x12, 0x45]), vec![1]);
        // NIP: a b -> b
        assert_eq!(run(vec![0x11, 0x12, 0x46]), vec![2]);
    }

    #[test]
    fn reverse3() {
        assert_eq!(run(vec![0x11, 0x12, 0x13, 0x53]), vec![3, 2, 1]);
    }
}
