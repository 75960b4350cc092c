//! System.Runtime.* interop services.

use super::InteropDescriptor;
use crate::application_engine::{HostState, TriggerType};
use crate::application_executed::stack_item_to_json;
use neo3_core::UInt160;
use neo3_cryptography::ECPoint;
use neo3_vm::{CallFlags, ExecutionEngine, StackItem, VmError, VmResult};
use num_bigint::BigInt;
use num_traits::ToPrimitive;

pub fn descriptors() -> Vec<InteropDescriptor> {
    vec![
        InteropDescriptor::new("System.Runtime.Platform", 8, CallFlags::NONE, platform),
        InteropDescriptor::new("System.Runtime.GetNetwork", 8, CallFlags::NONE, get_network),
        InteropDescriptor::new(
            "System.Runtime.GetAddressVersion",
            8,
            CallFlags::NONE,
            get_address_version,
        ),
        InteropDescriptor::new("System.Runtime.GetTrigger", 250, CallFlags::NONE, get_trigger),
        InteropDescriptor::new("System.Runtime.GetTime", 250, CallFlags::NONE, get_time),
        InteropDescriptor::new("System.Runtime.GetRandom", 16, CallFlags::NONE, get_random),
        InteropDescriptor::new("System.Runtime.GasLeft", 16, CallFlags::NONE, gas_left),
        InteropDescriptor::new(
            "System.Runtime.GetInvocationCounter",
            16,
            CallFlags::NONE,
            get_invocation_counter,
        ),
        InteropDescriptor::new(
            "System.Runtime.GetScriptContainer",
            250,
            CallFlags::NONE,
            get_script_container,
        ),
        InteropDescriptor::new(
            "System.Runtime.GetExecutingScriptHash",
            16,
            CallFlags::NONE,
            get_executing_script_hash,
        ),
        InteropDescriptor::new(
            "System.Runtime.GetCallingScriptHash",
            16,
            CallFlags::NONE,
            get_calling_script_hash,
        ),
        InteropDescriptor::new(
            "System.Runtime.GetEntryScriptHash",
            16,
            CallFlags::NONE,
            get_entry_script_hash,
        ),
        InteropDescriptor::new(
            "System.Runtime.CheckWitness",
            1024,
            CallFlags::NONE,
            check_witness,
        ),
        InteropDescriptor::new(
            "System.Runtime.GetNotifications",
            256,
            CallFlags::NONE,
            get_notifications,
        ),
        InteropDescriptor::new("System.Runtime.Log", 1024, CallFlags::NONE, log),
        InteropDescriptor::new(
            "System.Runtime.Notify",
            1024,
            CallFlags::ALLOW_NOTIFY,
            notify,
        ),
        InteropDescriptor::new("System.Runtime.BurnGas", 0, CallFlags::NONE, burn_gas),
    ]
}

fn platform(_host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    engine.push(StackItem::from_bytes(b"NEO".to_vec()))
}

fn get_network(host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    engine.push(StackItem::from_int(host.settings.network as i64))
}

fn get_address_version(host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    engine.push(StackItem::from_int(host.settings.address_version as i64))
}

fn get_trigger(host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    let value = match host.trigger {
        TriggerType::OnPersist => 0x01,
        TriggerType::PostPersist => 0x02,
        TriggerType::Verification => 0x20,
        TriggerType::Application => 0x40,
    };
    engine.push(StackItem::from_int(value))
}

fn get_time(host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    engine.push(StackItem::from_int(host.time() as i64))
}

fn get_random(host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    let bytes = host.next_random();
    // A non-negative 128-bit integer from the deterministic stream.
    let value = BigInt::from_bytes_le(num_bigint::Sign::Plus, &bytes[..16]);
    engine.push(StackItem::from_int(value))
}

fn gas_left(host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    engine.push(StackItem::from_int(host.gas_left()))
}

fn get_invocation_counter(host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    let hash = host.current_script_hash(engine)?;
    let count = *host.invocation_counters.get(&hash).unwrap_or(&1);
    engine.push(StackItem::from_int(count as i64))
}

fn get_script_container(host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    match &host.container {
        Some(crate::application_engine::Container::Transaction(tx)) => {
            let hash = tx.hash().map_err(|e| VmError::Syscall(e.to_string()))?;
            let item = StackItem::new_array(vec![
                StackItem::from_bytes(hash.to_bytes()),
                StackItem::from_int(tx.version as i64),
                StackItem::from_int(tx.nonce as i64),
                StackItem::from_bytes(
                    tx.sender().map(|s| s.to_bytes()).unwrap_or_default(),
                ),
                StackItem::from_int(tx.system_fee),
                StackItem::from_int(tx.network_fee),
                StackItem::from_int(tx.valid_until_block as i64),
                StackItem::from_bytes(tx.script.clone()),
            ]);
            engine.push(item)
        }
        Some(crate::application_engine::Container::Block(block)) => {
            let hash = block.hash().map_err(|e| VmError::Syscall(e.to_string()))?;
            engine.push(StackItem::from_bytes(hash.to_bytes()))
        }
        None => engine.push(StackItem::Null),
    }
}

fn get_executing_script_hash(host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    let hash = host.current_script_hash(engine)?;
    engine.push(StackItem::from_bytes(hash.to_bytes()))
}

fn get_calling_script_hash(host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    match host.calling_script_hash(engine) {
        Some(hash) => engine.push(StackItem::from_bytes(hash.to_bytes())),
        None => engine.push(StackItem::Null),
    }
}

fn get_entry_script_hash(host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    match host.entry_script_hash(engine) {
        Some(hash) => engine.push(StackItem::from_bytes(hash.to_bytes())),
        None => engine.push(StackItem::Null),
    }
}

fn check_witness(host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    let operand = engine.pop_bytes()?;
    let authorized = match operand.len() {
        20 => {
            let hash = UInt160::from_bytes(&operand)
                .map_err(|e| VmError::Syscall(e.to_string()))?;
            host.check_witness_hash(engine, &hash)?
        }
        33 => {
            let key = ECPoint::from_bytes(&operand)
                .map_err(|e| VmError::Syscall(e.to_string()))?;
            host.check_witness_key(engine, &key)?
        }
        other => {
            return Err(VmError::Syscall(format!(
                "CheckWitness operand of {other} bytes"
            )))
        }
    };
    engine.push(StackItem::from_bool(authorized))
}

fn get_notifications(host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    let filter = engine.pop()?;
    let filter_hash = if filter.is_null() {
        None
    } else {
        Some(
            UInt160::from_bytes(&filter.as_bytes()?)
                .map_err(|e| VmError::Syscall(e.to_string()))?,
        )
    };
    let items: Vec<StackItem> = host
        .notifications
        .iter()
        .filter(|(hash, _, _)| filter_hash.map(|f| f == *hash).unwrap_or(true))
        .map(|(hash, name, state)| {
            StackItem::new_array(vec![
                StackItem::from_bytes(hash.to_bytes()),
                StackItem::from_bytes(name.as_bytes().to_vec()),
                state.clone(),
            ])
        })
        .collect();
    engine.push(StackItem::new_array(items))
}

fn log(host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    let message = engine.pop_bytes()?;
    if message.len() > 1024 {
        return Err(VmError::Syscall("log message too long".to_string()));
    }
    let hash = host.current_script_hash(engine)?;
    tracing::debug!(
        contract = %hash,
        message = %String::from_utf8_lossy(&message),
        "contract log"
    );
    Ok(())
}

fn notify(host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    let event_name = String::from_utf8(engine.pop_bytes()?)
        .map_err(|_| VmError::Syscall("event name is not UTF-8".to_string()))?;
    let state = engine.pop()?;
    // The state must be serializable; rendering it proves that and
    // bounds its depth.
    let _ = stack_item_to_json(&state, 16);
    host.notify(engine, event_name, state)
}

fn burn_gas(host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    let datoshi = engine
        .pop_int()?
        .to_i64()
        .ok_or_else(|| VmError::Syscall("invalid BurnGas amount".to_string()))?;
    if datoshi <= 0 {
        return Err(VmError::Syscall("BurnGas amount must be positive".to_string()));
    }
    host.add_fee(datoshi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_engine::{ApplicationEngine, TriggerType};
    use crate::native::NativeRegistry;
    use neo3_config::ProtocolSettings;
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
            100_000_000,
        )
        .unwrap()
    }

    #[test]
    fn get_trigger_pushes_application() {
        let mut app = engine();
        let mut builder = ScriptBuilder::new();
        builder.emit_syscall("System.Runtime.GetTrigger");
        app.load_script(builder.to_array(), CallFlags::ALL).unwrap();
        assert_eq!(app.execute(), VMState::HALT);
        assert_eq!(
            app.result_stack()[0].as_int().unwrap(),
            BigInt::from(0x40)
        );
    }

    #[test]
    fn notify_requires_allow_notify_flag() {
        let mut app = engine();
        let mut builder = ScriptBuilder::new();
        builder.emit_push_null();
        builder.emit_push_string("Transfer").unwrap();
        builder.emit_syscall("System.Runtime.Notify");
        app.load_script(builder.to_array(), CallFlags::READ_ONLY)
            .unwrap();
        assert_eq!(app.execute(), VMState::FAULT);
    }

    #[test]
    fn notify_records_event() {
        let mut app = engine();
        let mut builder = ScriptBuilder::new();
        builder.emit_push_null();
        builder.emit_push_string("Transfer").unwrap();
        builder.emit_syscall("System.Runtime.Notify");
        app.load_script(builder.to_array(), CallFlags::ALL).unwrap();
        assert_eq!(app.execute(), VMState::HALT);
        assert_eq!(app.notifications().len(), 1);
        assert_eq!(app.notifications()[0].1, "Transfer");
    }

    #[test]
    fn burn_gas_consumes_budget() {
        let mut app = engine();
        let mut builder = ScriptBuilder::new();
        builder.emit_push_i64(5_000);
        builder.emit_syscall("System.Runtime.BurnGas");
        app.load_script(builder.to_array(), CallFlags::ALL).unwrap();
        assert_eq!(app.execute(), VMState::HALT);
        assert!(app.gas_consumed() >= 5_000);
    }

    #[test]
    fn gas_left_reflects_budget() {
        let mut app = engine();
        let mut builder = ScriptBuilder::new();
        builder.emit_syscall("System.Runtime.GasLeft");
        app.load_script(builder.to_array(), CallFlags::ALL).unwrap();
        assert_eq!(app.execute(), VMState::HALT);
        let left = app.result_stack()[0].as_int().unwrap().to_i64().unwrap();
        assert!(left > 0 && left < 100_000_000);
    }

    #[test]
    fn check_witness_without_container_is_false() {
        let mut app = engine();
        let mut builder = ScriptBuilder::new();
        builder.emit_push_bytes(&[0u8; 20]).unwrap();
        builder.emit_syscall("System.Runtime.CheckWitness");
        app.load_script(builder.to_array(), CallFlags::ALL).unwrap();
        assert_eq!(app.execute(), VMState::HALT);
        assert!(!app.result_stack()[0].as_bool().unwrap());
    }
}
