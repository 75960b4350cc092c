// Copyright (C) 2015-2025 The Neo Project.
//
// execution_engine.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! The execution engine: invocation stack management, the instruction
//! loop, exception unwinding and resource accounting.

use crate::call_flags::CallFlags;
use crate::error::{VmError, VmResult};
use crate::evaluation_stack::EvaluationStack;
use crate::exception_handling::TryState;
use crate::execution_context::ExecutionContext;
use crate::instruction::Instruction;
use crate::jump_table::JumpTable;
use crate::limits::ExecutionEngineLimits;
use crate::op_code::OpCode;
use crate::reference_counter::ReferenceCounter;
use crate::script::Script;
use crate::stack_item::StackItem;
use crate::vm_state::VMState;
use num_bigint::BigInt;
use std::collections::HashSet;
use std::rc::Rc;

/// Host hooks driving Neo-specific behavior during execution.
///
/// The base VM uses [`NullRouter`], which rejects every system call; the
/// application engine supplies gas metering and the interop table.
pub trait SyscallRouter {
    /// Called before each instruction; an error faults the engine.
    /// Gas is charged here.
    fn pre_execute(&mut self, _engine: &mut ExecutionEngine, _instr: &Instruction) -> VmResult<()> {
        Ok(())
    }

    /// Handles `SYSCALL hash`.
    fn on_syscall(&mut self, engine: &mut ExecutionEngine, hash: u32) -> VmResult<()>;

    /// Handles `CALLT token`.
    fn on_call_token(&mut self, _engine: &mut ExecutionEngine, _token: u16) -> VmResult<()> {
        Err(VmError::InvalidOperation(
            "CALLT requires an application engine".to_string(),
        ))
    }

    /// Called after a context unloads. `faulted` is true during
    /// exception unwinding.
    fn on_context_unloaded(&mut self, _engine: &mut ExecutionEngine, _faulted: bool) {}
}

/// Router for the bare VM: no system calls available.
pub struct NullRouter;

impl SyscallRouter for NullRouter {
    fn on_syscall(&mut self, _engine: &mut ExecutionEngine, hash: u32) -> VmResult<()> {
        Err(VmError::UnknownSyscall(hash))
    }
}

/// The virtual machine.
pub struct ExecutionEngine {
    state: VMState,
    jump_table: JumpTable,
    limits: ExecutionEngineLimits,
    reference_counter: ReferenceCounter,
    invocation_stack: Vec<ExecutionContext>,
    result_stack: Vec<StackItem>,
    /// The thrown item still looking for a handler, or the one that
    /// faulted the engine.
    uncaught_exception: Option<StackItem>,
    /// The error that moved the engine to FAULT.
    fault_error: Option<VmError>,
}

impl ExecutionEngine {
    pub fn new(limits: ExecutionEngineLimits) -> Self {
        Self {
            state: VMState::NONE,
            jump_table: JumpTable::default(),
            limits,
            reference_counter: ReferenceCounter::new(),
            invocation_stack: Vec::new(),
            result_stack: Vec::new(),
            uncaught_exception: None,
            fault_error: None,
        }
    }

    pub fn state(&self) -> VMState {
        self.state
    }

    pub fn set_state(&mut self, state: VMState) {
        self.state = state;
    }

    pub fn limits(&self) -> &ExecutionEngineLimits {
        &self.limits
    }

    pub fn reference_counter(&self) -> &ReferenceCounter {
        &self.reference_counter
    }

    pub fn result_stack(&self) -> &[StackItem] {
        &self.result_stack
    }

    pub fn uncaught_exception(&self) -> Option<&StackItem> {
        self.uncaught_exception.as_ref()
    }

    pub fn fault_error(&self) -> Option<&VmError> {
        self.fault_error.as_ref()
    }

    pub fn invocation_stack(&self) -> &[ExecutionContext] {
        &self.invocation_stack
    }

    /// The currently executing frame.
    pub fn current_context(&self) -> VmResult<&ExecutionContext> {
        self.invocation_stack
            .last()
            .ok_or_else(|| VmError::InvalidOperation("no execution context".to_string()))
    }

    pub fn current_context_mut(&mut self) -> VmResult<&mut ExecutionContext> {
        self.invocation_stack
            .last_mut()
            .ok_or_else(|| VmError::InvalidOperation("no execution context".to_string()))
    }

    /// The frame the transaction script runs in.
    pub fn entry_context(&self) -> Option<&ExecutionContext> {
        self.invocation_stack.first()
    }

    /// Loads a script as a fresh frame with its own evaluation stack.
    pub fn load_script(
        &mut self,
        script: Script,
        rv_count: i32,
        call_flags: CallFlags,
    ) -> VmResult<&mut ExecutionContext> {
        if self.invocation_stack.len() >= self.limits.max_invocation_stack_size {
            return Err(VmError::InvocationOverflow {
                limit: self.limits.max_invocation_stack_size,
            });
        }
        let mut context = ExecutionContext::new(script, rv_count, &self.reference_counter);
        context.call_flags = call_flags;
        self.invocation_stack.push(context);
        Ok(self.invocation_stack.last_mut().expect("just pushed"))
    }

    /// Pushes an already-built frame (same-script CALL).
    pub fn push_context(&mut self, context: ExecutionContext) -> VmResult<()> {
        if self.invocation_stack.len() >= self.limits.max_invocation_stack_size {
            return Err(VmError::InvocationOverflow {
                limit: self.limits.max_invocation_stack_size,
            });
        }
        self.invocation_stack.push(context);
        Ok(())
    }

    // === Stack helpers used by handlers and interop services ===

    pub fn push(&mut self, item: StackItem) -> VmResult<()> {
        self.current_context()?
            .evaluation_stack
            .borrow_mut()
            .push(item);
        Ok(())
    }

    pub fn pop(&mut self) -> VmResult<StackItem> {
        self.current_context()?.evaluation_stack.borrow_mut().pop()
    }

    pub fn peek(&self, index: usize) -> VmResult<StackItem> {
        self.current_context()?.evaluation_stack.borrow().peek(index)
    }

    pub fn pop_int(&mut self) -> VmResult<BigInt> {
        self.pop()?.as_int()
    }

    pub fn pop_bool(&mut self) -> VmResult<bool> {
        self.pop()?.as_bool()
    }

    pub fn pop_bytes(&mut self) -> VmResult<Vec<u8>> {
        self.pop()?.as_bytes()
    }

    pub fn pop_usize(&mut self) -> VmResult<usize> {
        self.pop()?.as_usize()
    }

    /// Sets the instruction pointer of the current frame.
    pub fn jump_to(&mut self, target: usize) -> VmResult<()> {
        self.current_context_mut()?.ip = target;
        Ok(())
    }

    // === Execution ===

    /// Runs to completion with no system calls available.
    pub fn execute(&mut self) -> VMState {
        self.execute_with_router(&mut NullRouter)
    }

    /// Runs to completion, routing host behavior through `router`.
    pub fn execute_with_router(&mut self, router: &mut dyn SyscallRouter) -> VMState {
        if self.state == VMState::NONE && self.invocation_stack.is_empty() {
            self.state = VMState::HALT;
        }
        while self.state == VMState::NONE {
            if let Err(error) = self.step(router) {
                self.fault(error);
            }
        }
        self.state
    }

    /// Executes a single instruction.
    pub fn step(&mut self, router: &mut dyn SyscallRouter) -> VmResult<()> {
        if self.invocation_stack.is_empty() {
            self.state = VMState::HALT;
            return Ok(());
        }

        let context = self.current_context()?;
        if context.at_end() {
            // Falling off the end behaves like RET.
            self.unload_current_context(router, false)?;
            self.check_stack_limits()?;
            return Ok(());
        }

        let instruction = context.current_instruction()?;
        router.pre_execute(self, &instruction)?;

        // The pointer advances before dispatch; jumping handlers simply
        // overwrite it.
        self.current_context_mut()?.ip = instruction.ip + instruction.len;

        match instruction.opcode {
            OpCode::SYSCALL => {
                let hash = instruction.token_u32()?;
                router.on_syscall(self, hash)?;
            }
            OpCode::CALLT => {
                let token = instruction.token_u16()?;
                router.on_call_token(self, token)?;
            }
            OpCode::RET => {
                self.unload_current_context(router, false)?;
            }
            OpCode::THROW => {
                let exception = self.pop()?;
                self.throw(router, exception)?;
            }
            OpCode::ENDFINALLY => {
                self.end_finally(router)?;
            }
            _ => {
                let handler = self.jump_table.handler(instruction.opcode);
                handler(self, &instruction)?;
            }
        }

        self.check_stack_limits()?;
        Ok(())
    }

    /// Moves the engine to FAULT recording the error.
    pub fn fault(&mut self, error: VmError) {
        self.fault_error = Some(error);
        self.state = VMState::FAULT;
    }

    /// Unloads the current frame, moving return values to the caller or
    /// the result stack.
    pub fn unload_current_context(
        &mut self,
        router: &mut dyn SyscallRouter,
        faulted: bool,
    ) -> VmResult<()> {
        let mut context = self
            .invocation_stack
            .pop()
            .ok_or_else(|| VmError::InvalidOperation("no execution context".to_string()))?;
        context.release_slots();
        if let Some(static_fields) = context.static_fields.take() {
            if Rc::strong_count(&static_fields) == 1 {
                static_fields.borrow_mut().release();
            }
        }

        let shares_stack = self
            .invocation_stack
            .last()
            .map(|caller| Rc::ptr_eq(&caller.evaluation_stack, &context.evaluation_stack))
            .unwrap_or(false);

        if !shares_stack && !faulted {
            let mut stack = context.evaluation_stack.borrow_mut();
            let rv_count = context.rv_count;
            if rv_count >= 0 && (stack.len() as i32) < rv_count {
                return Err(VmError::StackUnderflow {
                    needed: rv_count as usize,
                    available: stack.len(),
                });
            }
            let take = if rv_count < 0 {
                stack.len()
            } else {
                rv_count as usize
            };
            let mut values = Vec::with_capacity(take);
            for _ in 0..take {
                values.push(stack.pop()?);
            }
            values.reverse();
            stack.clear();
            drop(stack);

            match self.invocation_stack.last() {
                Some(caller) => {
                    let mut caller_stack = caller.evaluation_stack.borrow_mut();
                    for value in values {
                        caller_stack.push(value);
                    }
                }
                None => {
                    self.reference_counter.add(values.len());
                    self.result_stack.extend(values);
                }
            }
        } else if !shares_stack {
            context.evaluation_stack.borrow_mut().clear();
        }

        router.on_context_unloaded(self, faulted);

        if self.invocation_stack.is_empty() {
            self.state = VMState::HALT;
        }
        Ok(())
    }

    /// ENDFINALLY: leaves the finally block, either resuming normal flow
    /// at the recorded end pointer or continuing exception unwinding.
    fn end_finally(&mut self, router: &mut dyn SyscallRouter) -> VmResult<()> {
        let context = self.current_context_mut()?;
        let try_context = context.try_stack.pop().ok_or_else(|| {
            VmError::InvalidOperation("ENDFINALLY outside a try block".to_string())
        })?;
        if try_context.state != TryState::Finally {
            return Err(VmError::InvalidOperation(
                "ENDFINALLY outside a finally block".to_string(),
            ));
        }
        if self.uncaught_exception.is_some() {
            self.continue_throw(router)
        } else {
            self.current_context_mut()?.ip = try_context.end_pointer;
            Ok(())
        }
    }

    /// Throws `exception`, searching outward for a handler. Without one
    /// the engine faults with the exception retained.
    pub fn throw(
        &mut self,
        router: &mut dyn SyscallRouter,
        exception: StackItem,
    ) -> VmResult<()> {
        self.uncaught_exception = Some(exception);
        self.continue_throw(router)
    }

    /// Resumes handler search for the pending exception. Also called by
    /// ENDFINALLY when a finally block finishes during unwinding.
    pub fn continue_throw(&mut self, router: &mut dyn SyscallRouter) -> VmResult<()> {
        while !self.invocation_stack.is_empty() {
            let context = self.invocation_stack.last_mut().expect("not empty");
            while let Some(try_context) = context.try_stack.last_mut() {
                match try_context.state {
                    TryState::Try if try_context.has_catch() => {
                        let catch_pointer =
                            try_context.catch_pointer.expect("has_catch checked");
                        try_context.state = TryState::Catch;
                        context.ip = catch_pointer;
                        let exception = self
                            .uncaught_exception
                            .take()
                            .ok_or_else(|| {
                                VmError::InvalidOperation("no pending exception".to_string())
                            })?;
                        context.evaluation_stack.borrow_mut().push(exception);
                        return Ok(());
                    }
                    TryState::Try | TryState::Catch if try_context.has_finally() => {
                        let finally_pointer =
                            try_context.finally_pointer.expect("has_finally checked");
                        try_context.state = TryState::Finally;
                        context.ip = finally_pointer;
                        // ENDFINALLY picks the pending exception back up.
                        return Ok(());
                    }
                    _ => {
                        context.try_stack.pop();
                    }
                }
            }
            self.unload_current_context(router, true)?;
        }
        Err(VmError::UncaughtException)
    }

    /// Enforces the stack item ceiling, falling back to a precise mark
    /// from the live roots before deciding to fault.
    fn check_stack_limits(&mut self) -> VmResult<()> {
        if self.reference_counter.count() <= self.limits.max_stack_size {
            return Ok(());
        }
        let precise = self.precise_item_count();
        self.reference_counter.set(precise);
        if precise > self.limits.max_stack_size {
            return Err(VmError::StackOverflow {
                count: precise,
                limit: self.limits.max_stack_size,
            });
        }
        Ok(())
    }

    /// Counts items reachable from every evaluation stack and slot.
    fn precise_item_count(&self) -> usize {
        let depth = self.limits.max_comparable_depth;
        let mut seen_stacks: HashSet<*const ()> = HashSet::new();
        let mut seen_statics: HashSet<*const ()> = HashSet::new();
        let mut total = 0usize;

        let count_stack = |stack: &EvaluationStack| -> usize {
            stack
                .items()
                .iter()
                .map(|item| item.reachable_count(depth))
                .sum()
        };

        for context in &self.invocation_stack {
            let ptr = Rc::as_ptr(&context.evaluation_stack) as *const ();
            if seen_stacks.insert(ptr) {
                total += count_stack(&context.evaluation_stack.borrow());
            }
            if let Some(static_fields) = &context.static_fields {
                let ptr = Rc::as_ptr(static_fields) as *const ();
                if seen_statics.insert(ptr) {
                    let slot = static_fields.borrow();
                    for i in 0..slot.len() {
                        if let Ok(item) = slot.get(i) {
                            total += item.reachable_count(depth);
                        }
                    }
                }
            }
            for slot in [&context.local_variables, &context.arguments]
                .into_iter()
                .flatten()
            {
                for i in 0..slot.len() {
                    if let Ok(item) = slot.get(i) {
                        total += item.reachable_count(depth);
                    }
                }
            }
        }
        for item in &self.result_stack {
            total += item.reachable_count(depth);
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::ToPrimitive;

    fn run(script: Vec<u8>) -> ExecutionEngine {
        let mut engine = ExecutionEngine::new(ExecutionEngineLimits::default());
        engine
            .load_script(Script::new(script), -1, CallFlags::ALL)
            .unwrap();
        engine.execute();
        engine
    }

    fn result_ints(engine: &ExecutionEngine) -> Vec<i64> {
        engine
            .result_stack()
            .iter()
            .map(|item| item.as_int().unwrap().to_i64().unwrap())
            .collect()
    }

    #[test]
    fn push_add_halts_with_three() {
        // PUSH1 PUSH2 ADD
        let engine = run(vec![0x11, 0x12, 0x9E]);
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(result_ints(&engine), vec![3]);
    }

    #[test]
    fn explicit_ret_halts() {
        let engine = run(vec![0x11, 0x40]);
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(result_ints(&engine), vec![1]);
    }

    #[test]
    fn jmp_skips_instruction() {
        // JMP +3 (to ip 3); PUSH1 at ip 2 is skipped; PUSH2 at ip 3.
        let engine = run(vec![0x22, 0x03, 0x11, 0x12]);
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(result_ints(&engine), vec![2]);
    }

    #[test]
    fn conditional_jump_takes_branch() {
        // PUSHT JMPIF +3 -> skip PUSH1; PUSH2
        let engine = run(vec![0x08, 0x24, 0x03, 0x11, 0x12]);
        assert_eq!(result_ints(&engine), vec![2]);

        // PUSHF JMPIF +3 -> falls through both pushes
        let engine = run(vec![0x09, 0x24, 0x03, 0x11, 0x12]);
        assert_eq!(result_ints(&engine), vec![1, 2]);
    }

    #[test]
    fn call_shares_evaluation_stack() {
        // PUSH2 PUSH3 CALL +3 RET ; subroutine at 5: MUL RET
        let engine = run(vec![0x12, 0x13, 0x34, 0x03, 0x40, 0xA0, 0x40]);
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(result_ints(&engine), vec![6]);
    }

    #[test]
    fn throw_without_handler_faults() {
        // PUSH1 THROW
        let engine = run(vec![0x11, 0x3A]);
        assert_eq!(engine.state(), VMState::FAULT);
        assert!(engine.uncaught_exception().is_some());
        assert!(matches!(
            engine.fault_error(),
            Some(VmError::UncaughtException)
        ));
    }

    #[test]
    fn try_catch_recovers() {
        // TRY catch=+4 finally=0 ; PUSH1 THROW ; catch: DROP PUSH5 ; RET
        // offsets: TRY at 0 (len 3), PUSH1 at 3, THROW at 4,
        // catch target = 0 + 4 = ... catch offset operand is relative to TRY ip.
        let script = vec![
            0x3B, 0x05, 0x00, // TRY catch=+5 (ip 5), no finally
            0x11, // PUSH1
            0x3A, // THROW
            0x45, // ip 5: DROP (drops the exception)
            0x15, // PUSH5
            0x40, // RET
        ];
        let engine = run(script);
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(result_ints(&engine), vec![5]);
    }

    #[test]
    fn finally_runs_on_normal_exit() {
        // TRY with finally only; body pushes 1, ENDTRY jumps past finally;
        // finally pushes 7 then ENDFINALLY resumes at the ENDTRY target.
        let script = vec![
            0x3B, 0x00, 0x06, // TRY no catch, finally=+6 (ip 6)
            0x11, // ip 3: PUSH1
            0x3D, 0x05, // ip 4: ENDTRY +5 (resume ip 9)
            0x17, // ip 6: PUSH7
            0x3F, // ip 7: ENDFINALLY
            // ip 8 unused
            0x40, // ip 8: RET (never needed; resume target is 9 = end)
        ];
        let engine = run(script);
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(result_ints(&engine), vec![1, 7]);
    }

    #[test]
    fn stack_limit_faults() {
        // DUP-loop: PUSH1, then DUP + JMP back, overflowing the stack.
        let mut limits = ExecutionEngineLimits::default();
        limits.max_stack_size = 16;
        let mut engine = ExecutionEngine::new(limits);
        // PUSH1 ; DUP ; JMP -1 (back to DUP)
        engine
            .load_script(Script::new(vec![0x11, 0x4A, 0x22, 0xFF]), -1, CallFlags::ALL)
            .unwrap();
        assert_eq!(engine.execute(), VMState::FAULT);
        assert!(matches!(
            engine.fault_error(),
            Some(VmError::StackOverflow { .. })
        ));
    }

    #[test]
    fn invocation_depth_limit_faults() {
        let mut limits = ExecutionEngineLimits::default();
        limits.max_invocation_stack_size = 8;
        let mut engine = ExecutionEngine::new(limits);
        // CALL 0: infinite self-recursion.
        engine
            .load_script(Script::new(vec![0x34, 0x00]), -1, CallFlags::ALL)
            .unwrap();
        assert_eq!(engine.execute(), VMState::FAULT);
    }

    #[test]
    fn empty_invocation_stack_halts_immediately() {
        let mut engine = ExecutionEngine::new(ExecutionEngineLimits::default());
        assert_eq!(engine.execute(), VMState::HALT);
    }
}
