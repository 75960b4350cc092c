//! System.Contract.* interop services.

use super::InteropDescriptor;
use crate::application_engine::{HostState, TriggerType};
use crate::contract::Contract;
use crate::native::{contract_management, NativeCallContext};
use neo3_core::UInt160;
use neo3_cryptography::ECPoint;
use neo3_vm::{CallFlags, ExecutionEngine, StackItem, VmError, VmResult};
use num_traits::ToPrimitive;

pub fn descriptors() -> Vec<InteropDescriptor> {
    vec![
        InteropDescriptor::new("System.Contract.Call", 32768, CallFlags::ALLOW_CALL, call),
        InteropDescriptor::new(
            "System.Contract.GetCallFlags",
            1024,
            CallFlags::NONE,
            get_call_flags,
        ),
        InteropDescriptor::new(
            "System.Contract.CreateStandardAccount",
            256,
            CallFlags::NONE,
            create_standard_account,
        ),
        InteropDescriptor::new(
            "System.Contract.CreateMultisigAccount",
            256,
            CallFlags::NONE,
            create_multisig_account,
        ),
        InteropDescriptor::new(
            "System.Contract.NativeOnPersist",
            0,
            CallFlags::STATES,
            native_on_persist,
        ),
        InteropDescriptor::new(
            "System.Contract.NativePostPersist",
            0,
            CallFlags::STATES,
            native_post_persist,
        ),
    ]
}

/// System.Contract.Call(hash, method, flags, args[]).
fn call(host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    let hash = UInt160::from_bytes(&engine.pop_bytes()?)
        .map_err(|e| VmError::Syscall(e.to_string()))?;
    let method = String::from_utf8(engine.pop_bytes()?)
        .map_err(|_| VmError::Syscall("method name is not UTF-8".to_string()))?;
    if method.starts_with('_') {
        return Err(VmError::Syscall(format!(
            "reserved method {method} cannot be called directly"
        )));
    }
    let flag_bits = engine
        .pop_int()?
        .to_u8()
        .ok_or_else(|| VmError::Syscall("invalid call flags".to_string()))?;
    let requested = CallFlags::from_bits(flag_bits)
        .ok_or_else(|| VmError::Syscall("invalid call flags".to_string()))?;
    let args_item = engine.pop()?;
    let args: Vec<StackItem> = args_item.as_array()?.borrow().clone();

    // The callee inherits the caller's flags restricted by the request.
    let granted = engine.current_context()?.call_flags & requested;

    // Native target: dispatch in Rust, push the result.
    let natives = host.natives.clone();
    if let Some(native) = natives.by_hash(&hash) {
        let method_info = native.method(&method, args.len()).ok_or_else(|| {
            VmError::Syscall(format!("method {method} not found on {}", native.name()))
        })?;
        if !granted.contains(method_info.required_flags) {
            return Err(VmError::MissingCallFlags {
                required: method_info.required_flags.bits(),
                granted: granted.bits(),
            });
        }
        host.add_fee(method_info.price)?;
        *host.invocation_counters.entry(hash).or_insert(0) += 1;
        let result = {
            let mut ctx = NativeCallContext { host, engine };
            native.invoke(&mut ctx, &method, args).map_err(VmError::from)?
        };
        if method_info.returns_value {
            engine.push(result)?;
        }
        return Ok(());
    }

    // Deployed target: load its script at the method offset.
    let contract = contract_management::get_contract(&host.snapshot, &hash)
        .ok_or_else(|| VmError::Syscall(format!("contract {hash} not found")))?;
    host.load_contract_method(engine, &contract, &method, args, granted)
}

fn get_call_flags(_host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    let flags = engine.current_context()?.call_flags;
    engine.push(StackItem::from_int(flags.bits() as i64))
}

fn create_standard_account(_host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    let key = ECPoint::from_bytes(&engine.pop_bytes()?)
        .map_err(|e| VmError::Syscall(e.to_string()))?;
    let hash = Contract::signature_contract_hash(&key);
    engine.push(StackItem::from_bytes(hash.to_bytes()))
}

fn create_multisig_account(_host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    let m = engine
        .pop_int()?
        .to_usize()
        .ok_or_else(|| VmError::Syscall("invalid multisig threshold".to_string()))?;
    let keys_item = engine.pop()?;
    let keys: VmResult<Vec<ECPoint>> = keys_item
        .as_array()?
        .borrow()
        .iter()
        .map(|item| {
            ECPoint::from_bytes(&item.as_bytes()?)
                .map_err(|e| VmError::Syscall(e.to_string()))
        })
        .collect();
    let hash = Contract::multisig_contract_hash(m, &keys?)
        .map_err(|e| VmError::Syscall(e.to_string()))?;
    engine.push(StackItem::from_bytes(hash.to_bytes()))
}

fn native_on_persist(host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    if host.trigger != TriggerType::OnPersist {
        return Err(VmError::Syscall(
            "NativeOnPersist outside the OnPersist trigger".to_string(),
        ));
    }
    let natives = host.natives.clone();
    for native in natives.all() {
        let mut ctx = NativeCallContext { host, engine };
        native.on_persist(&mut ctx).map_err(VmError::from)?;
    }
    Ok(())
}

fn native_post_persist(host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    if host.trigger != TriggerType::PostPersist {
        return Err(VmError::Syscall(
            "NativePostPersist outside the PostPersist trigger".to_string(),
        ));
    }
    let natives = host.natives.clone();
    for native in natives.all() {
        let mut ctx = NativeCallContext { host, engine };
        native.post_persist(&mut ctx).map_err(VmError::from)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_engine::ApplicationEngine;
    use crate::native::NativeRegistry;
    use neo3_config::ProtocolSettings;
    use neo3_cryptography::KeyPair;
    use neo3_persistence::{MemoryStore, Snapshot};
    use neo3_vm::{ScriptBuilder, VMState};
    use std::sync::Arc;

    fn engine() -> ApplicationEngine {
        let snapshot = Snapshot::on_store(Arc::new(MemoryStore::new())).into_handle();
        ApplicationEngine::create(
            TriggerType::Application,
            None,
            snapshot,
            None,
            Arc::new(ProtocolSettings::private_net()),
            Arc::new(NativeRegistry::new()),
            10_000_000_000,
        )
        .unwrap()
    }

    #[test]
    fn get_call_flags_reports_grant() {
        let mut app = engine();
        let mut builder = ScriptBuilder::new();
        builder.emit_syscall("System.Contract.GetCallFlags");
        app.load_script(builder.to_array(), CallFlags::READ_ONLY)
            .unwrap();
        assert_eq!(app.execute(), VMState::HALT);
        assert_eq!(
            app.result_stack()[0].as_int().unwrap(),
            num_bigint::BigInt::from(CallFlags::READ_ONLY.bits())
        );
    }

    #[test]
    fn create_standard_account_matches_contract_helper() {
        let key = KeyPair::generate().public_key();
        let mut app = engine();
        let mut builder = ScriptBuilder::new();
        builder.emit_push_bytes(key.as_bytes()).unwrap();
        builder.emit_syscall("System.Contract.CreateStandardAccount");
        app.load_script(builder.to_array(), CallFlags::ALL).unwrap();
        assert_eq!(app.execute(), VMState::HALT);
        assert_eq!(
            app.result_stack()[0].as_bytes().unwrap(),
            Contract::signature_contract_hash(&key).to_bytes()
        );
    }

    #[test]
    fn native_call_via_contract_call() {
        // GAS.decimals() through System.Contract.Call.
        let mut app = engine();
        let gas_hash = app.host().natives.by_name("GasToken").unwrap().hash();
        let mut builder = ScriptBuilder::new();
        builder.emit(neo3_vm::OpCode::NEWARRAY0);
        builder.emit_push_i64(CallFlags::READ_ONLY.bits() as i64);
        builder.emit_push_string("decimals").unwrap();
        builder.emit_push_bytes(gas_hash.as_bytes()).unwrap();
        builder.emit_syscall("System.Contract.Call");
        app.load_script(builder.to_array(), CallFlags::ALL).unwrap();
        assert_eq!(app.execute(), VMState::HALT, "{:?}", app.fault_message());
        assert_eq!(
            app.result_stack()[0].as_int().unwrap(),
            num_bigint::BigInt::from(8)
        );
    }

    #[test]
    fn unknown_contract_faults() {
        let mut app = engine();
        let mut builder = ScriptBuilder::new();
        builder.emit(neo3_vm::OpCode::NEWARRAY0);
        builder.emit_push_i64(CallFlags::ALL.bits() as i64);
        builder.emit_push_string("anything").unwrap();
        builder.emit_push_bytes(&[9u8; 20]).unwrap();
        builder.emit_syscall("System.Contract.Call");
        app.load_script(builder.to_array(), CallFlags::ALL).unwrap();
        assert_eq!(app.execute(), VMState::FAULT);
    }

    #[test]
    fn reserved_methods_cannot_be_called() {
        let mut app = engine();
        let gas_hash = app.host().natives.by_name("GasToken").unwrap().hash();
        let mut builder = ScriptBuilder::new();
        builder.emit(neo3_vm::OpCode::NEWARRAY0);
        builder.emit_push_i64(CallFlags::ALL.bits() as i64);
        builder.emit_push_string("_deploy").unwrap();
        builder.emit_push_bytes(gas_hash.as_bytes()).unwrap();
        builder.emit_syscall("System.Contract.Call");
        app.load_script(builder.to_array(), CallFlags::ALL).unwrap();
        assert_eq!(app.execute(), VMState::FAULT);
    }
}
