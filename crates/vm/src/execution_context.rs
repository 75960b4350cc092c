//! Execution contexts: one frame of the invocation stack.

use crate::call_flags::CallFlags;
use crate::error::VmResult;
use crate::evaluation_stack::EvaluationStack;
use crate::exception_handling::TryContext;
use crate::instruction::Instruction;
use crate::reference_counter::ReferenceCounter;
use crate::script::Script;
use crate::slot::Slot;
use neo3_cryptography::hash160;
use std::cell::RefCell;
use std::rc::Rc;

/// One frame of the invocation stack.
///
/// The evaluation stack and static fields are shared handles: a CALL
/// within the same script shares both with its caller, while loading a
/// new script creates fresh ones.
pub struct ExecutionContext {
    pub script: Script,
    /// Instruction pointer.
    pub ip: usize,
    /// Number of values returned to the caller; -1 returns everything.
    pub rv_count: i32,
    pub evaluation_stack: Rc<RefCell<EvaluationStack>>,
    pub static_fields: Option<Rc<RefCell<Slot>>>,
    pub local_variables: Option<Slot>,
    pub arguments: Option<Slot>,
    pub try_stack: Vec<TryContext>,
    /// Capabilities granted to this frame.
    pub call_flags: CallFlags,
    /// The hash this frame executes as; hash160 of the script unless the
    /// loader overrides it with a deployed contract hash.
    pub script_hash: [u8; 20],
    /// Number of notifications emitted before this frame was entered;
    /// used to roll back notifications when the frame faults.
    pub notification_mark: usize,
}

impl ExecutionContext {
    /// Creates a fresh context with its own evaluation stack.
    pub fn new(script: Script, rv_count: i32, counter: &ReferenceCounter) -> Self {
        let script_hash = hash160(script.as_bytes());
        Self {
            script,
            ip: 0,
            rv_count,
            evaluation_stack: Rc::new(RefCell::new(EvaluationStack::new(counter.clone()))),
            static_fields: None,
            local_variables: None,
            arguments: None,
            try_stack: Vec::new(),
            call_flags: CallFlags::ALL,
            script_hash,
            notification_mark: 0,
        }
    }

    /// Creates the frame for a CALL within the same script: shared
    /// evaluation stack and static fields, fresh locals and try stack.
    pub fn fork_for_call(&self, target_ip: usize) -> Self {
        Self {
            script: self.script.clone(),
            ip: target_ip,
            rv_count: -1,
            evaluation_stack: Rc::clone(&self.evaluation_stack),
            static_fields: self.static_fields.clone(),
            local_variables: None,
            arguments: None,
            try_stack: Vec::new(),
            call_flags: self.call_flags,
            script_hash: self.script_hash,
            notification_mark: self.notification_mark,
        }
    }

    /// The instruction at the current position.
    pub fn current_instruction(&self) -> VmResult<Instruction> {
        self.script.instruction_at(self.ip)
    }

    /// Whether the instruction pointer has run off the script's end.
    pub fn at_end(&self) -> bool {
        self.ip >= self.script.len()
    }

    /// Releases slot references held by this frame. The evaluation stack
    /// is handled by the engine, which knows whether it is shared.
    pub fn release_slots(&mut self) {
        if let Some(mut slot) = self.local_variables.take() {
            slot.release();
        }
        if let Some(mut slot) = self.arguments.take() {
            slot.release();
        }
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("ip", &self.ip)
            .field("script_len", &self.script.len())
            .field("rv_count", &self.rv_count)
            .field("try_depth", &self.try_stack.len())
            .finish()
    }
}
