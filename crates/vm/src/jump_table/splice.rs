//! Byte-splice opcodes over buffers and byte strings.

use super::JumpTable;
use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::stack_item::StackItem;

pub fn register(table: &mut JumpTable) {
    table.set(OpCode::NEWBUFFER, new_buffer);
    table.set(OpCode::MEMCPY, memcpy);
    table.set(OpCode::CAT, cat);
    table.set(OpCode::SUBSTR, substr);
    table.set(OpCode::LEFT, left);
    table.set(OpCode::RIGHT, right);
}

fn check_size(engine: &ExecutionEngine, size: usize) -> VmResult<()> {
    if size > engine.limits().max_item_size {
        return Err(VmError::ItemTooLarge {
            size,
            limit: engine.limits().max_item_size,
        });
    }
    Ok(())
}

fn new_buffer(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let size = engine.pop_usize()?;
    check_size(engine, size)?;
    engine.push(StackItem::new_buffer(vec![0u8; size]))
}

fn memcpy(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let count = engine.pop_usize()?;
    let src_index = engine.pop_usize()?;
    let src = engine.pop_bytes()?;
    let dst_index = engine.pop_usize()?;
    let dst = engine.pop()?.as_buffer()?;

    if src_index.checked_add(count).map(|end| end > src.len()).unwrap_or(true) {
        return Err(VmError::IndexOutOfRange {
            index: (src_index + count) as i64,
            len: src.len(),
        });
    }
    let mut dst = dst.borrow_mut();
    if dst_index.checked_add(count).map(|end| end > dst.len()).unwrap_or(true) {
        return Err(VmError::IndexOutOfRange {
            index: (dst_index + count) as i64,
            len: dst.len(),
        });
    }
    dst[dst_index..dst_index + count].copy_from_slice(&src[src_index..src_index + count]);
    Ok(())
}

fn cat(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let b = engine.pop_bytes()?;
    let a = engine.pop_bytes()?;
    check_size(engine, a.len() + b.len())?;
    let mut result = a;
    result.extend_from_slice(&b);
    engine.push(StackItem::new_buffer(result))
}

fn substr(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let count = engine.pop_usize()?;
    let index = engine.pop_usize()?;
    let data = engine.pop_bytes()?;
    if index.checked_add(count).map(|end| end > data.len()).unwrap_or(true) {
        return Err(VmError::IndexOutOfRange {
            index: (index + count) as i64,
            len: data.len(),
        });
    }
    engine.push(StackItem::new_buffer(data[index..index + count].to_vec()))
}

fn left(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let count = engine.pop_usize()?;
    let data = engine.pop_bytes()?;
    if count > data.len() {
        return Err(VmError::IndexOutOfRange {
            index: count as i64,
            len: data.len(),
        });
    }
    engine.push(StackItem::new_buffer(data[..count].to_vec()))
}

fn right(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let count = engine.pop_usize()?;
    let data = engine.pop_bytes()?;
    if count > data.len() {
        return Err(VmError::IndexOutOfRange {
            index: count as i64,
            len: data.len(),
        });
    }
    engine.push(StackItem::new_buffer(data[data.len() - count..].to_vec()))
}

#[cfg(test)]
mod tests {
    use crate::{CallFlags, ExecutionEngine, ExecutionEngineLimits, Script, VMState};

    fn run(script: Vec<u8>) -> ExecutionEngine {
        let mut engine = ExecutionEngine::new(ExecutionEngineLimits::default());
        engine
            .load_script(Script::new(script), -1, CallFlags::ALL)
            .unwrap();
        engine.execute();
        engine
    }

    #[test]
    fn cat_concatenates() {
        // PUSHDATA "ab" PUSHDATA "cd" CAT
        let engine = run(vec![0x0C, 0x02, b'a', b'b', 0x0C, 0x02, b'c', b'd', 0x8B]);
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(engine.result_stack()[0].as_bytes().unwrap(), b"abcd");
    }

    #[test]
    fn substr_slices() {
        // "abcd" SUBSTR(1, 2) -> "bc"
        let engine = run(vec![
            0x0C, 0x04, b'a', b'b', b'c', b'd', 0x11, 0x12, 0x8C,
        ]);
        assert_eq!(engine.result_stack()[0].as_bytes().unwrap(), b"bc");
    }

    #[test]
    fn left_and_right() {
        let engine = run(vec![0x0C, 0x03, b'x', b'y', b'z', 0x12, 0x8D]);
        assert_eq!(engine.result_stack()[0].as_bytes().unwrap(), b"xy");

        let engine = run(vec![0x0C, 0x03, b'x', b'y', b'z', 0x12, 0x8E]);
        assert_eq!(engine.result_stack()[0].as_bytes().unwrap(), b"yz");
    }

    #[test]
    fn substr_out_of_range_faults() {
        let engine = run(vec![0x0C, 0x02, b'a', b'b', 0x11, 0x12, 0x8C]);
        assert_eq!(engine.state(), VMState::FAULT);
    }

    #[test]
    fn newbuffer_and_memcpy() {
        // NEWBUFFER 4; DUP; PUSH0 (dst_index); "ab" (src); PUSH0 (src_index); PUSH2 (count); MEMCPY
        let engine = run(vec![
            0x14, 0x88, // PUSH4 NEWBUFFER
            0x4A, // DUP (keep a handle to inspect)
            0x10, // PUSH0 dst_index
            0x0C, 0x02, b'a', b'b', // src
            0x10, // src_index
            0x12, // count
            0x89, // MEMCPY
        ]);
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(
            engine.result_stack()[0].as_bytes().unwrap(),
            vec![b'a', b'b', 0, 0]
        );
    }
}
