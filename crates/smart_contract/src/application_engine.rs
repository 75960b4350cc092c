// Copyright (C) 2015-2025 The Neo Project.
//
// application_engine.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! The application engine: a gas-metered VM run with Neo state attached.

use crate::application_executed::{stack_item_to_json, ApplicationExecuted, NotificationRecord};
use crate::contract::Contract;
use crate::contract_state::ContractState;
use crate::error::{ContractError, ContractResult};
use crate::interop;
use crate::native::NativeRegistry;
use neo3_config::ProtocolSettings;
use neo3_core::{Block, Signer, Transaction, UInt160, UInt256, WitnessCondition, WitnessRuleAction, WitnessScope};
use neo3_cryptography::{sha256, ECPoint};
use neo3_persistence::SnapshotHandle;
use neo3_vm::{
    CallFlags, ExecutionEngine, ExecutionEngineLimits, Instruction, OpCode, Script, StackItem,
    SyscallRouter, VMState, VmError, VmResult,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Default cap on gas spent verifying a single witness, in datoshi.
pub const MAX_VERIFICATION_GAS: i64 = 150_000_000;

/// Rendering depth for JSON transcripts.
const JSON_DEPTH: usize = 16;

/// The reason the VM is being invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerType {
    OnPersist,
    PostPersist,
    Verification,
    Application,
}

/// The verifiable object an execution runs for.
#[derive(Clone)]
pub enum Container {
    Transaction(Arc<Transaction>),
    Block(Arc<Block>),
}

impl Container {
    pub fn hash(&self) -> ContractResult<UInt256> {
        match self {
            Container::Transaction(tx) => Ok(tx.hash()?),
            Container::Block(block) => Ok(block.hash()?),
        }
    }

    pub fn transaction(&self) -> Option<&Arc<Transaction>> {
        match self {
            Container::Transaction(tx) => Some(tx),
            _ => None,
        }
    }

    pub fn signers(&self) -> &[Signer] {
        match self {
            Container::Transaction(tx) => &tx.signers,
            Container::Block(_) => &[],
        }
    }
}

/// Neo-specific state carried alongside the VM; it is also the syscall
/// router driving gas, interop dispatch and native calls.
pub struct HostState {
    pub trigger: TriggerType,
    pub container: Option<Container>,
    pub snapshot: SnapshotHandle,
    pub persisting_block: Option<Arc<Block>>,
    pub settings: Arc<ProtocolSettings>,
    pub natives: Arc<NativeRegistry>,
    /// Gas budget in datoshi; negative means unmetered (system scope).
    pub gas_budget: i64,
    pub gas_consumed: i64,
    /// Policy multipliers sampled when the engine was created.
    pub exec_fee_factor: i64,
    pub storage_price: i64,
    pub notifications: Vec<(UInt160, String, StackItem)>,
    pub invocation_counters: HashMap<UInt160, u32>,
    random_seed: [u8; 32],
    random_counter: u32,
}

impl HostState {
    /// Adds `datoshi` to the running gas tally, faulting past the budget.
    pub fn add_fee(&mut self, datoshi: i64) -> VmResult<()> {
        self.gas_consumed = self.gas_consumed.saturating_add(datoshi.max(0));
        if self.gas_budget >= 0 && self.gas_consumed > self.gas_budget {
            return Err(VmError::OutOfGas {
                consumed: self.gas_consumed,
                budget: self.gas_budget,
            });
        }
        Ok(())
    }

    /// Remaining budget, or a sentinel for unmetered runs.
    pub fn gas_left(&self) -> i64 {
        if self.gas_budget < 0 {
            i64::MAX
        } else {
            self.gas_budget - self.gas_consumed
        }
    }

    /// Milliseconds timestamp of the block being persisted (or the tip's
    /// notion of now during verification).
    pub fn time(&self) -> u64 {
        self.persisting_block
            .as_ref()
            .map(|b| b.header.timestamp)
            .unwrap_or(0)
    }

    /// The deterministic per-execution random stream.
    pub fn next_random(&mut self) -> [u8; 32] {
        let mut data = Vec::with_capacity(36);
        data.extend_from_slice(&self.random_seed);
        data.extend_from_slice(&self.random_counter.to_le_bytes());
        self.random_counter += 1;
        sha256(&data)
    }

    /// The hash of the frame below the current one.
    pub fn calling_script_hash(&self, engine: &ExecutionEngine) -> Option<UInt160> {
        let stack = engine.invocation_stack();
        if stack.len() < 2 {
            return None;
        }
        UInt160::from_bytes(&stack[stack.len() - 2].script_hash).ok()
    }

    pub fn current_script_hash(&self, engine: &ExecutionEngine) -> VmResult<UInt160> {
        let context = engine.current_context()?;
        UInt160::from_bytes(&context.script_hash)
            .map_err(|e| VmError::InvalidOperation(e.to_string()))
    }

    pub fn entry_script_hash(&self, engine: &ExecutionEngine) -> Option<UInt160> {
        engine
            .entry_context()
            .and_then(|c| UInt160::from_bytes(&c.script_hash).ok())
    }

    /// Manifest group keys of the contract deployed at `hash`, empty when
    /// the hash is not a deployed contract.
    fn contract_groups(&self, hash: &UInt160) -> Vec<ECPoint> {
        crate::native::contract_management::get_contract(&self.snapshot, hash)
            .map(|state| state.manifest.group_keys())
            .unwrap_or_default()
    }

    /// CheckWitness: is the current execution path authorized by `hash`?
    pub fn check_witness_hash(
        &self,
        engine: &ExecutionEngine,
        hash: &UInt160,
    ) -> VmResult<bool> {
        // 1. A contract always witnesses itself.
        if let Some(calling) = self.calling_script_hash(engine) {
            if calling == *hash {
                return Ok(true);
            }
        }

        // 2. Locate the signer.
        let Some(container) = &self.container else {
            return Ok(false);
        };
        let Some(signer) = container.signers().iter().find(|s| s.account == *hash) else {
            return Ok(false);
        };

        // 3. Global.
        if signer.scopes.has_flag(WitnessScope::GLOBAL) {
            return Ok(true);
        }

        let current = self.current_script_hash(engine)?;

        // 4. CalledByEntry: the entry script (or the entry itself) is
        // calling the current contract.
        if signer.scopes.has_flag(WitnessScope::CALLED_BY_ENTRY)
            && self.called_by_entry(engine, &current)
        {
            return Ok(true);
        }

        // 5. CustomContracts.
        if signer.scopes.has_flag(WitnessScope::CUSTOM_CONTRACTS)
            && signer.allowed_contracts.contains(&current)
        {
            return Ok(true);
        }

        // 6. CustomGroups.
        if signer.scopes.has_flag(WitnessScope::CUSTOM_GROUPS) {
            let groups = self.contract_groups(&current);
            if groups.iter().any(|g| signer.allowed_groups.contains(g)) {
                return Ok(true);
            }
        }

        // 7. WitnessRules: any matching Allow wins; a matching Deny
        // blocks; no match means unauthorized.
        if signer.scopes.has_flag(WitnessScope::WITNESS_RULES) {
            let mut denied = false;
            for rule in &signer.rules {
                if self.evaluate_condition(engine, &rule.condition, &current)? {
                    match rule.action {
                        WitnessRuleAction::Allow => return Ok(true),
                        WitnessRuleAction::Deny => denied = true,
                    }
                }
            }
            if denied {
                return Ok(false);
            }
        }

        Ok(false)
    }

    /// CheckWitness for a public key: resolved through the standard
    /// single-signature account.
    pub fn check_witness_key(
        &self,
        engine: &ExecutionEngine,
        key: &ECPoint,
    ) -> VmResult<bool> {
        self.check_witness_hash(engine, &Contract::signature_contract_hash(key))
    }

    fn called_by_entry(&self, engine: &ExecutionEngine, current: &UInt160) -> bool {
        let entry = self.entry_script_hash(engine);
        let calling = self.calling_script_hash(engine);
        match (entry, calling) {
            (Some(entry), Some(calling)) => calling == entry || *current == entry,
            (Some(entry), None) => *current == entry,
            _ => false,
        }
    }

    fn evaluate_condition(
        &self,
        engine: &ExecutionEngine,
        condition: &WitnessCondition,
        current: &UInt160,
    ) -> VmResult<bool> {
        Ok(match condition {
            WitnessCondition::Boolean(value) => *value,
            WitnessCondition::Not(inner) => !self.evaluate_condition(engine, inner, current)?,
            WitnessCondition::And(items) => {
                for item in items {
                    if !self.evaluate_condition(engine, item, current)? {
                        return Ok(false);
                    }
                }
                true
            }
            WitnessCondition::Or(items) => {
                for item in items {
                    if self.evaluate_condition(engine, item, current)? {
                        return Ok(true);
                    }
                }
                false
            }
            WitnessCondition::ScriptHash(hash) => hash == current,
            WitnessCondition::Group(key) => self.contract_groups(current).contains(key),
            WitnessCondition::CalledByEntry => self.called_by_entry(engine, current),
            WitnessCondition::CalledByContract(hash) => self
                .calling_script_hash(engine)
                .map(|calling| calling == *hash)
                .unwrap_or(false),
            WitnessCondition::CalledByGroup(key) => self
                .calling_script_hash(engine)
                .map(|calling| self.contract_groups(&calling).contains(key))
                .unwrap_or(false),
        })
    }

    /// Whether the committee multi-signature address witnessed the
    /// container; used by Policy and other governed setters.
    pub fn check_committee_witness(&self, engine: &ExecutionEngine) -> VmResult<bool> {
        let committee = crate::native::neo_token::committee_address(&self.snapshot, &self.settings)
            .map_err(VmError::from)?;
        self.check_witness_hash(engine, &committee)
    }

    /// Emits a notification into the execution transcript.
    pub fn notify(
        &mut self,
        engine: &ExecutionEngine,
        event_name: String,
        state: StackItem,
    ) -> VmResult<()> {
        if event_name.len() > 32 {
            return Err(VmError::InvalidOperation(
                "notification event name too long".to_string(),
            ));
        }
        let hash = self.current_script_hash(engine)?;
        self.notifications.push((hash, event_name, state));
        Ok(())
    }

    /// Loads a deployed contract's method as a new frame.
    pub fn load_contract_method(
        &mut self,
        engine: &mut ExecutionEngine,
        contract: &ContractState,
        method_name: &str,
        args: Vec<StackItem>,
        flags: CallFlags,
    ) -> VmResult<()> {
        let method = contract
            .manifest
            .method(method_name, args.len())
            .ok_or_else(|| {
                VmError::Syscall(format!(
                    "method {method_name}/{} not found in {}",
                    args.len(),
                    contract.manifest.name
                ))
            })?;
        let rv_count = if method.return_type == "Void" { 0 } else { 1 };
        let offset = method.offset;

        *self.invocation_counters.entry(contract.hash).or_insert(0) += 1;

        let context = engine.load_script(Script::new(contract.nef.script.clone()), rv_count, flags)?;
        context.script_hash = *contract.hash.as_bytes();
        context.ip = offset;
        // INITSLOT pops arguments top-first, so arg0 is pushed last.
        let stack = context.evaluation_stack.clone();
        for arg in args.into_iter().rev() {
            stack.borrow_mut().push(arg);
        }
        Ok(())
    }
}

impl SyscallRouter for HostState {
    fn pre_execute(&mut self, _engine: &mut ExecutionEngine, instr: &Instruction) -> VmResult<()> {
        self.add_fee(opcode_price(instr.opcode) * self.exec_fee_factor)
    }

    fn on_syscall(&mut self, engine: &mut ExecutionEngine, hash: u32) -> VmResult<()> {
        let descriptor = interop::descriptor(hash).ok_or(VmError::UnknownSyscall(hash))?;
        let granted = engine.current_context()?.call_flags;
        if !granted.contains(descriptor.required_flags) {
            return Err(VmError::MissingCallFlags {
                required: descriptor.required_flags.bits(),
                granted: granted.bits(),
            });
        }
        self.add_fee(descriptor.price)?;
        (descriptor.handler)(self, engine)
    }
}

/// The application engine wrapping the VM with Neo semantics.
pub struct ApplicationEngine {
    vm: ExecutionEngine,
    host: HostState,
}

impl ApplicationEngine {
    /// Creates an engine for one invocation.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        trigger: TriggerType,
        container: Option<Container>,
        snapshot: SnapshotHandle,
        persisting_block: Option<Arc<Block>>,
        settings: Arc<ProtocolSettings>,
        natives: Arc<NativeRegistry>,
        gas_budget: i64,
    ) -> ContractResult<Self> {
        let exec_fee_factor = crate::native::policy_contract::exec_fee_factor(&snapshot);
        let storage_price = crate::native::policy_contract::storage_price(&snapshot);

        let mut seed_input = Vec::with_capacity(40);
        seed_input.extend_from_slice(&settings.network.to_le_bytes());
        if let Some(container) = &container {
            seed_input.extend_from_slice(container.hash()?.as_bytes());
        }
        let random_seed = sha256(&seed_input);

        Ok(Self {
            vm: ExecutionEngine::new(ExecutionEngineLimits::default()),
            host: HostState {
                trigger,
                container,
                snapshot,
                persisting_block,
                settings,
                natives,
                gas_budget,
                gas_consumed: 0,
                exec_fee_factor,
                storage_price,
                notifications: Vec::new(),
                invocation_counters: HashMap::new(),
                random_seed,
                random_counter: 0,
            },
        })
    }

    /// An unmetered engine for system scripts (OnPersist/PostPersist).
    pub fn create_system(
        trigger: TriggerType,
        snapshot: SnapshotHandle,
        persisting_block: Arc<Block>,
        settings: Arc<ProtocolSettings>,
        natives: Arc<NativeRegistry>,
    ) -> ContractResult<Self> {
        Self::create(
            trigger,
            None,
            snapshot,
            Some(persisting_block),
            settings,
            natives,
            -1,
        )
    }

    /// Loads a script as the entry frame.
    pub fn load_script(&mut self, script: Vec<u8>, flags: CallFlags) -> ContractResult<()> {
        self.vm.load_script(Script::new(script), -1, flags)?;
        Ok(())
    }

    /// Runs to completion.
    pub fn execute(&mut self) -> VMState {
        self.vm.execute_with_router(&mut self.host)
    }

    pub fn state(&self) -> VMState {
        self.vm.state()
    }

    pub fn result_stack(&self) -> &[StackItem] {
        self.vm.result_stack()
    }

    pub fn gas_consumed(&self) -> i64 {
        self.host.gas_consumed
    }

    pub fn notifications(&self) -> &[(UInt160, String, StackItem)] {
        &self.host.notifications
    }

    pub fn snapshot(&self) -> &SnapshotHandle {
        &self.host.snapshot
    }

    pub fn host(&self) -> &HostState {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut HostState {
        &mut self.host
    }

    pub fn vm(&self) -> &ExecutionEngine {
        &self.vm
    }

    pub fn vm_mut(&mut self) -> &mut ExecutionEngine {
        &mut self.vm
    }

    /// The fault description, when the run faulted.
    pub fn fault_message(&self) -> Option<String> {
        self.vm.fault_error().map(|e| e.to_string()).or_else(|| {
            self.vm
                .uncaught_exception()
                .map(|item| format!("uncaught exception: {item:?}"))
        })
    }

    /// Runs the native `initialize` hooks; called once while building the
    /// genesis state.
    pub fn initialize_natives(&mut self) -> ContractResult<()> {
        let natives = self.host.natives.clone();
        for native in natives.all() {
            let mut ctx = crate::native::NativeCallContext {
                host: &mut self.host,
                engine: &mut self.vm,
            };
            native.initialize(&mut ctx)?;
        }
        Ok(())
    }

    /// Verifies one witness of `container` against `verification_script`.
    /// Returns the gas spent when the witness passes.
    #[allow(clippy::too_many_arguments)]
    pub fn verify_witness(
        container: Container,
        snapshot: SnapshotHandle,
        settings: Arc<ProtocolSettings>,
        natives: Arc<NativeRegistry>,
        verification_script: &[u8],
        invocation_script: &[u8],
        gas_budget: i64,
    ) -> ContractResult<i64> {
        let mut engine = Self::create(
            TriggerType::Verification,
            Some(container),
            snapshot,
            None,
            settings,
            natives,
            gas_budget.min(MAX_VERIFICATION_GAS),
        )?;
        engine.load_script(verification_script.to_vec(), CallFlags::READ_ONLY)?;
        if !invocation_script.is_empty() {
            engine.load_script(invocation_script.to_vec(), CallFlags::NONE)?;
        }
        let state = engine.execute();
        if state != VMState::HALT {
            return Err(ContractError::Unauthorized(
                engine
                    .fault_message()
                    .unwrap_or_else(|| "witness verification faulted".to_string()),
            ));
        }
        let result = engine.result_stack();
        if result.len() != 1 || !result[result.len() - 1].as_bool().unwrap_or(false) {
            return Err(ContractError::Unauthorized(
                "witness verification left a false result".to_string(),
            ));
        }
        Ok(engine.gas_consumed())
    }

    /// Freezes the run into an application-log record.
    pub fn into_executed(self, tx_hash: Option<UInt256>) -> ApplicationExecuted {
        let exception = if self.state() == VMState::FAULT {
            self.fault_message()
        } else {
            None
        };
        ApplicationExecuted {
            tx_hash,
            trigger: self.host.trigger,
            vm_state: self.state().to_string(),
            gas_consumed: self.host.gas_consumed,
            exception,
            stack: self
                .vm
                .result_stack()
                .iter()
                .map(|item| stack_item_to_json(item, JSON_DEPTH))
                .collect(),
            notifications: self
                .host
                .notifications
                .iter()
                .map(|(contract, event_name, state)| NotificationRecord {
                    contract: *contract,
                    event_name: event_name.clone(),
                    state: stack_item_to_json(state, JSON_DEPTH),
                })
                .collect(),
        }
    }
}

/// Base price of an opcode in fee units; multiplied by the Policy
/// execution fee factor to get datoshi.
pub fn opcode_price(opcode: OpCode) -> i64 {
    use OpCode::*;
    match opcode {
        RET | SYSCALL | ABORT | ABORTMSG => 0,
        NOP | ASSERT | ASSERTMSG => 1,
        PUSHINT8 | PUSHINT16 | PUSHINT32 | PUSHINT64 | PUSHINT128 | PUSHINT256 | PUSHT
        | PUSHF | PUSHNULL | PUSHM1 | PUSH0 | PUSH1 | PUSH2 | PUSH3 | PUSH4 | PUSH5 | PUSH6
        | PUSH7 | PUSH8 | PUSH9 | PUSH10 | PUSH11 | PUSH12 | PUSH13 | PUSH14 | PUSH15
        | PUSH16 => 1,
        PUSHA => 4,
        PUSHDATA1 => 8,
        PUSHDATA2 => 512,
        PUSHDATA4 => 4096,
        JMP | JMP_L | JMPIF | JMPIF_L | JMPIFNOT | JMPIFNOT_L | JMPEQ | JMPEQ_L | JMPNE
        | JMPNE_L | JMPGT | JMPGT_L | JMPGE | JMPGE_L | JMPLT | JMPLT_L | JMPLE | JMPLE_L => 2,
        CALL | CALL_L | CALLA => 512,
        CALLT => 32768,
        THROW => 512,
        TRY | TRY_L | ENDTRY | ENDTRY_L | ENDFINALLY => 4,
        DEPTH | DROP | NIP | DUP | OVER | PICK | TUCK | SWAP | ROT | REVERSE3 | REVERSE4 => 2,
        XDROP | CLEAR | ROLL | REVERSEN => 16,
        INITSSLOT => 16,
        INITSLOT => 64,
        LDSFLD0 | LDSFLD1 | LDSFLD2 | LDSFLD3 | LDSFLD4 | LDSFLD5 | LDSFLD6 | LDSFLD
        | STSFLD0 | STSFLD1 | STSFLD2 | STSFLD3 | STSFLD4 | STSFLD5 | STSFLD6 | STSFLD
        | LDLOC0 | LDLOC1 | LDLOC2 | LDLOC3 | LDLOC4 | LDLOC5 | LDLOC6 | LDLOC | STLOC0
        | STLOC1 | STLOC2 | STLOC3 | STLOC4 | STLOC5 | STLOC6 | STLOC | LDARG0 | LDARG1
        | LDARG2 | LDARG3 | LDARG4 | LDARG5 | LDARG6 | LDARG | STARG0 | STARG1 | STARG2
        | STARG3 | STARG4 | STARG5 | STARG6 | STARG => 2,
        NEWBUFFER => 256,
        MEMCPY | CAT | SUBSTR | LEFT | RIGHT => 2048,
        INVERT | SIGN | ABS | NEGATE | INC | DEC | NOT | NZ => 4,
        AND | OR | XOR | ADD | SUB | MUL | DIV | MOD | SHL | SHR | BOOLAND | BOOLOR
        | NUMEQUAL | NUMNOTEQUAL | LT | LE | GT | GE | MIN | MAX | WITHIN => 8,
        EQUAL | NOTEQUAL | MODMUL => 32,
        POW | SQRT => 64,
        MODPOW => 2048,
        PACKMAP | PACKSTRUCT | PACK | UNPACK => 2048,
        NEWARRAY0 | NEWSTRUCT0 => 16,
        NEWARRAY | NEWARRAY_T | NEWSTRUCT => 512,
        NEWMAP => 8,
        SIZE => 4,
        HASKEY | PICKITEM => 64,
        KEYS => 16,
        VALUES | APPEND | SETITEM | REVERSEITEMS | CONVERT => 8192,
        REMOVE | CLEARITEMS | POPITEM => 16,
        ISNULL | ISTYPE => 2,
    }
}
