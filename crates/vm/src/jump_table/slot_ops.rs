//! Slot opcodes: static fields, locals and arguments.

use super::JumpTable;
use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::slot::Slot;
use std::cell::RefCell;
use std::rc::Rc;

pub fn register(table: &mut JumpTable) {
    table.set(OpCode::INITSSLOT, init_sslot);
    table.set(OpCode::INITSLOT, init_slot);
    for byte in OpCode::LDSFLD0 as u8..=OpCode::LDSFLD as u8 {
        table.set(OpCode::from_byte(byte).expect("contiguous"), ld_sfld);
    }
    for byte in OpCode::STSFLD0 as u8..=OpCode::STSFLD as u8 {
        table.set(OpCode::from_byte(byte).expect("contiguous"), st_sfld);
    }
    for byte in OpCode::LDLOC0 as u8..=OpCode::LDLOC as u8 {
        table.set(OpCode::from_byte(byte).expect("contiguous"), ld_loc);
    }
    for byte in OpCode::STLOC0 as u8..=OpCode::STLOC as u8 {
        table.set(OpCode::from_byte(byte).expect("contiguous"), st_loc);
    }
    for byte in OpCode::LDARG0 as u8..=OpCode::LDARG as u8 {
        table.set(OpCode::from_byte(byte).expect("contiguous"), ld_arg);
    }
    for byte in OpCode::STARG0 as u8..=OpCode::STARG as u8 {
        table.set(OpCode::from_byte(byte).expect("contiguous"), st_arg);
    }
}

/// Index encoded in the opcode itself (…0 to …6) or in the operand.
fn slot_index(instruction: &Instruction, base: OpCode) -> VmResult<usize> {
    let delta = instruction.opcode as u8 - base as u8;
    if delta < 7 {
        Ok(delta as usize)
    } else {
        Ok(instruction.token_u8()? as usize)
    }
}

fn init_sslot(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let count = instruction.token_u8()? as usize;
    if count == 0 {
        return Err(VmError::InvalidScript("INITSSLOT with zero fields".to_string()));
    }
    let counter = engine.reference_counter().clone();
    let context = engine.current_context_mut()?;
    if context.static_fields.is_some() {
        return Err(VmError::InvalidOperation(
            "static fields already initialized".to_string(),
        ));
    }
    context.static_fields = Some(Rc::new(RefCell::new(Slot::new(count, counter))));
    Ok(())
}

fn init_slot(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let local_count = instruction.token_u8()? as usize;
    let argument_count = instruction.token_u8_1()? as usize;
    if local_count == 0 && argument_count == 0 {
        return Err(VmError::InvalidScript(
            "INITSLOT with zero locals and arguments".to_string(),
        ));
    }
    let counter = engine.reference_counter().clone();
    if engine.current_context()?.local_variables.is_some()
        || engine.current_context()?.arguments.is_some()
    {
        return Err(VmError::InvalidOperation(
            "slots already initialized".to_string(),
        ));
    }

    let mut arguments = Vec::with_capacity(argument_count);
    for _ in 0..argument_count {
        arguments.push(engine.pop()?);
    }

    let context = engine.current_context_mut()?;
    if local_count > 0 {
        context.local_variables = Some(Slot::new(local_count, counter.clone()));
    }
    if argument_count > 0 {
        context.arguments = Some(Slot::with_items(arguments, counter));
    }
    Ok(())
}

fn ld_sfld(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let index = slot_index(instruction, OpCode::LDSFLD0)?;
    let item = {
        let context = engine.current_context()?;
        let fields = context.static_fields.as_ref().ok_or_else(|| {
            VmError::InvalidOperation("static fields not initialized".to_string())
        })?;
        fields.borrow().get(index)?
    };
    engine.push(item)
}

fn st_sfld(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let index = slot_index(instruction, OpCode::STSFLD0)?;
    let item = engine.pop()?;
    let context = engine.current_context()?;
    let fields = context.static_fields.as_ref().ok_or_else(|| {
        VmError::InvalidOperation("static fields not initialized".to_string())
    })?;
    fields.borrow_mut().put(index, item)
}

fn ld_loc(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let index = slot_index(instruction, OpCode::LDLOC0)?;
    let item = {
        let context = engine.current_context()?;
        let locals = context.local_variables.as_ref().ok_or_else(|| {
            VmError::InvalidOperation("local slot not initialized".to_string())
        })?;
        locals.get(index)?
    };
    engine.push(item)
}

fn st_loc(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let index = slot_index(instruction, OpCode::STLOC0)?;
    let item = engine.pop()?;
    let context = engine.current_context_mut()?;
    let locals = context.local_variables.as_mut().ok_or_else(|| {
        VmError::InvalidOperation("local slot not initialized".to_string())
    })?;
    locals.put(index, item)
}

fn ld_arg(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let index = slot_index(instruction, OpCode::LDARG0)?;
    let item = {
        let context = engine.current_context()?;
        let arguments = context.arguments.as_ref().ok_or_else(|| {
            VmError::InvalidOperation("argument slot not initialized".to_string())
        })?;
        arguments.get(index)?
    };
    engine.push(item)
}

fn st_arg(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let index = slot_index(instruction, OpCode::STARG0)?;
    let item = engine.pop()?;
    let context = engine.current_context_mut()?;
    let arguments = context.arguments.as_mut().ok_or_else(|| {
        VmError::InvalidOperation("argument slot not initialized".to_string())
    })?;
    arguments.put(index, item)
}

#[cfg(test)]
mod tests {
    use crate::{CallFlags, ExecutionEngine, ExecutionEngineLimits, Script, VMState};
    use num_traits::ToPrimitive;

    fn run(script: Vec<u8>) -> (VMState, Vec<i64>) {
        let mut engine = ExecutionEngine::new(ExecutionEngineLimits::default());
        engine
            .load_script(Script::new(script), -1, CallFlags::ALL)
            .unwrap();
        let state = engine.execute();
        let values = engine
            .result_stack()
            .iter()
            .filter_map(|item| item.as_int().ok().and_then(|v| v.to_i64()))
            .collect();
        (state, values)
    }

    #[test]
    fn locals_store_and_load() {
        // INITSLOT 1 local, 0 args; PUSH7 STLOC0 LDLOC0 LDLOC0
        let (state, values) = run(vec![0x57, 0x01, 0x00, 0x17, 0x70, 0x68, 0x68]);
        assert_eq!(state, VMState::HALT);
        assert_eq!(values, vec![7, 7]);
    }

    #[test]
    fn arguments_load_from_stack() {
        // PUSH1 PUSH2 INITSLOT 0 locals, 2 args; LDARG0 LDARG1
        // arg0 is the top of the stack at INITSLOT.
        let (state, values) = run(vec![0x11, 0x12, 0x57, 0x00, 0x02, 0x78, 0x79]);
        assert_eq!(state, VMState::HALT);
        assert_eq!(values, vec![2, 1]);
    }

    #[test]
    fn static_fields_persist_across_call() {
        // INITSSLOT 1; PUSH5 STSFLD0 ; CALL +4 ; LDSFLD0 RET ; sub: LDSFLD0 DROP RET
        let script = vec![
            0x56, 0x01, // INITSSLOT 1
            0x15, 0x60, // PUSH5 STSFLD0
            0x34, 0x04, // CALL +4 (ip 4 -> target 8)
            0x58, 0x40, // LDSFLD0 RET
            0x58, 0x45, 0x40, // ip 8: LDSFLD0 DROP RET
        ];
        let (state, values) = run(script);
        assert_eq!(state, VMState::HALT);
        assert_eq!(values, vec![5]);
    }

    #[test]
    fn load_without_init_faults() {
        let (state, _) = run(vec![0x68]);
        assert_eq!(state, VMState::FAULT);
    }

    #[test]
    fn out_of_range_slot_faults() {
        // INITSLOT 1 local; LDLOC1
        let (state, _) = run(vec![0x57, 0x01, 0x00, 0x69]);
        assert_eq!(state, VMState::FAULT);
    }
}
