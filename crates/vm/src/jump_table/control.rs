//! Flow-control opcodes.

use super::JumpTable;
use crate::error::{VmError, VmResult};
use crate::exception_handling::{TryContext, TryState};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use std::cmp::Ordering;

pub fn register(table: &mut JumpTable) {
    table.set(OpCode::NOP, |_, _| Ok(()));
    table.set(OpCode::JMP, jmp);
    table.set(OpCode::JMP_L, jmp);
    table.set(OpCode::JMPIF, jmp_if);
    table.set(OpCode::JMPIF_L, jmp_if);
    table.set(OpCode::JMPIFNOT, jmp_if_not);
    table.set(OpCode::JMPIFNOT_L, jmp_if_not);
    table.set(OpCode::JMPEQ, jmp_compare);
    table.set(OpCode::JMPEQ_L, jmp_compare);
    table.set(OpCode::JMPNE, jmp_compare);
    table.set(OpCode::JMPNE_L, jmp_compare);
    table.set(OpCode::JMPGT, jmp_compare);
    table.set(OpCode::JMPGT_L, jmp_compare);
    table.set(OpCode::JMPGE, jmp_compare);
    table.set(OpCode::JMPGE_L, jmp_compare);
    table.set(OpCode::JMPLT, jmp_compare);
    table.set(OpCode::JMPLT_L, jmp_compare);
    table.set(OpCode::JMPLE, jmp_compare);
    table.set(OpCode::JMPLE_L, jmp_compare);
    table.set(OpCode::CALL, call);
    table.set(OpCode::CALL_L, call);
    table.set(OpCode::CALLA, call_a);
    table.set(OpCode::ABORT, |_, _| Err(VmError::Abort(String::new())));
    table.set(OpCode::ABORTMSG, abort_msg);
    table.set(OpCode::ASSERT, assert_op);
    table.set(OpCode::ASSERTMSG, assert_msg);
    table.set(OpCode::TRY, try_op);
    table.set(OpCode::TRY_L, try_op);
    table.set(OpCode::ENDTRY, end_try);
    table.set(OpCode::ENDTRY_L, end_try);
}

/// The jump offset of a short or long variant.
fn offset_of(instruction: &Instruction) -> VmResult<i32> {
    if instruction.operand.len() == 1 {
        Ok(instruction.token_i8()? as i32)
    } else {
        instruction.token_i32()
    }
}

fn target_of(engine: &ExecutionEngine, instruction: &Instruction, offset: i32) -> VmResult<usize> {
    engine
        .current_context()?
        .script
        .checked_target(instruction.ip, offset)
}

fn jmp(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let target = target_of(engine, instruction, offset_of(instruction)?)?;
    engine.jump_to(target)
}

fn jmp_if(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let target = target_of(engine, instruction, offset_of(instruction)?)?;
    if engine.pop_bool()? {
        engine.jump_to(target)?;
    }
    Ok(())
}

fn jmp_if_not(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let target = target_of(engine, instruction, offset_of(instruction)?)?;
    if !engine.pop_bool()? {
        engine.jump_to(target)?;
    }
    Ok(())
}

fn jmp_compare(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let target = target_of(engine, instruction, offset_of(instruction)?)?;
    let b = engine.pop_int()?;
    let a = engine.pop_int()?;
    let ordering = a.cmp(&b);
    let jump = match instruction.opcode {
        OpCode::JMPEQ | OpCode::JMPEQ_L => ordering == Ordering::Equal,
        OpCode::JMPNE | OpCode::JMPNE_L => ordering != Ordering::Equal,
        OpCode::JMPGT | OpCode::JMPGT_L => ordering == Ordering::Greater,
        OpCode::JMPGE | OpCode::JMPGE_L => ordering != Ordering::Less,
        OpCode::JMPLT | OpCode::JMPLT_L => ordering == Ordering::Less,
        OpCode::JMPLE | OpCode::JMPLE_L => ordering != Ordering::Greater,
        _ => unreachable!("registered only for comparison jumps"),
    };
    if jump {
        engine.jump_to(target)?;
    }
    Ok(())
}

fn call(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let target = target_of(engine, instruction, offset_of(instruction)?)?;
    let frame = engine.current_context()?.fork_for_call(target);
    engine.push_context(frame)
}

fn call_a(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let pointer = engine.pop()?;
    let target = match pointer {
        crate::stack_item::StackItem::Pointer(position) => position,
        other => {
            return Err(VmError::InvalidType {
                expected: "Pointer",
                actual: other.type_name(),
            })
        }
    };
    if target > engine.current_context()?.script.len() {
        return Err(VmError::InvalidJumpTarget {
            target: target as i64,
            len: engine.current_context()?.script.len(),
        });
    }
    let frame = engine.current_context()?.fork_for_call(target);
    engine.push_context(frame)
}

fn abort_msg(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let message = engine.pop_bytes()?;
    Err(VmError::Abort(
        String::from_utf8_lossy(&message).into_owned(),
    ))
}

fn assert_op(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    if !engine.pop_bool()? {
        return Err(VmError::AssertFailed(String::new()));
    }
    Ok(())
}

fn assert_msg(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let message = engine.pop_bytes()?;
    if !engine.pop_bool()? {
        return Err(VmError::AssertFailed(
            String::from_utf8_lossy(&message).into_owned(),
        ));
    }
    Ok(())
}

fn try_op(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let (catch_offset, finally_offset) = if instruction.operand.len() == 2 {
        (
            instruction.token_i8()? as i32,
            instruction.token_i8_1()? as i32,
        )
    } else {
        (instruction.token_i32()?, instruction.token_i32_1()?)
    };
    if catch_offset == 0 && finally_offset == 0 {
        return Err(VmError::InvalidScript(
            "TRY with neither catch nor finally".to_string(),
        ));
    }

    let max_depth = engine.limits().max_try_nesting_depth;
    let catch_pointer = if catch_offset == 0 {
        None
    } else {
        Some(target_of(engine, instruction, catch_offset)?)
    };
    let finally_pointer = if finally_offset == 0 {
        None
    } else {
        Some(target_of(engine, instruction, finally_offset)?)
    };

    let context = engine.current_context_mut()?;
    if context.try_stack.len() >= max_depth {
        return Err(VmError::TryNestingOverflow { limit: max_depth });
    }
    context
        .try_stack
        .push(TryContext::new(catch_pointer, finally_pointer));
    Ok(())
}

fn end_try(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let target = target_of(engine, instruction, offset_of(instruction)?)?;
    let context = engine.current_context_mut()?;
    let try_context = context.try_stack.last_mut().ok_or_else(|| {
        VmError::InvalidOperation("ENDTRY outside a try block".to_string())
    })?;
    if try_context.state == TryState::Finally {
        return Err(VmError::InvalidOperation(
            "ENDTRY inside a finally block".to_string(),
        ));
    }
    if try_context.has_finally() {
        try_context.state = TryState::Finally;
        try_context.end_pointer = target;
        let finally_pointer = try_context.finally_pointer.expect("has_finally checked");
        context.ip = finally_pointer;
    } else {
        context.try_stack.pop();
        context.ip = target;
    }
    Ok(())
}
