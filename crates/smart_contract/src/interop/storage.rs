//! System.Storage.* interop services.

use super::InteropDescriptor;
use crate::application_engine::HostState;
use crate::native::{contract_management, std_lib};
use crate::storage_context::{FindOptions, StorageContext};
use neo3_persistence::{StorageItem, StorageKey};
use neo3_vm::{CallFlags, ExecutionEngine, StackItem, VmError, VmResult};
use std::cell::RefCell;

/// Maximum storage key length in bytes.
pub const MAX_STORAGE_KEY_SIZE: usize = 64;
/// Maximum storage value length in bytes.
pub const MAX_STORAGE_VALUE_SIZE: usize = 0xffff;

pub fn descriptors() -> Vec<InteropDescriptor> {
    vec![
        InteropDescriptor::new(
            "System.Storage.GetContext",
            16,
            CallFlags::READ_STATES,
            get_context,
        ),
        InteropDescriptor::new(
            "System.Storage.GetReadOnlyContext",
            16,
            CallFlags::READ_STATES,
            get_read_only_context,
        ),
        InteropDescriptor::new(
            "System.Storage.AsReadOnly",
            16,
            CallFlags::READ_STATES,
            as_read_only,
        ),
        InteropDescriptor::new("System.Storage.Get", 32768, CallFlags::READ_STATES, get),
        InteropDescriptor::new("System.Storage.Find", 32768, CallFlags::READ_STATES, find),
        InteropDescriptor::new("System.Storage.Put", 0, CallFlags::WRITE_STATES, put),
        InteropDescriptor::new(
            "System.Storage.Delete",
            16,
            CallFlags::WRITE_STATES,
            delete,
        ),
        InteropDescriptor::new("System.Iterator.Next", 32768, CallFlags::NONE, iterator_next),
        InteropDescriptor::new("System.Iterator.Value", 16, CallFlags::NONE, iterator_value),
    ]
}

/// An iterator over a storage prefix scan, yielded by Find.
pub struct StorageIterator {
    entries: Vec<(StorageKey, StorageItem)>,
    position: Option<usize>,
    prefix_length: usize,
    options: FindOptions,
}

impl StorageIterator {
    pub fn new(
        mut entries: Vec<(StorageKey, StorageItem)>,
        prefix_length: usize,
        options: FindOptions,
    ) -> Self {
        if options.contains(FindOptions::BACKWARDS) {
            entries.reverse();
        }
        Self {
            entries,
            position: None,
            prefix_length,
            options,
        }
    }

    pub fn next(&mut self) -> bool {
        let next = self.position.map(|p| p + 1).unwrap_or(0);
        if next < self.entries.len() {
            self.position = Some(next);
            true
        } else {
            self.position = Some(self.entries.len());
            false
        }
    }

    pub fn value(&self) -> VmResult<StackItem> {
        let position = self
            .position
            .filter(|p| *p < self.entries.len())
            .ok_or_else(|| VmError::Syscall("iterator out of range".to_string()))?;
        let (key, item) = &self.entries[position];

        let key_bytes = if self.options.contains(FindOptions::REMOVE_PREFIX) {
            key.key[self.prefix_length.min(key.key.len())..].to_vec()
        } else {
            key.key.clone()
        };
        let key_item = StackItem::from_bytes(key_bytes);

        let value_item = if self.options.contains(FindOptions::DESERIALIZE_VALUES) {
            let deserialized = std_lib::deserialize_item(&item.value)?;
            if self.options.contains(FindOptions::PICK_FIELD_0) {
                Self::pick_field(&deserialized, 0)?
            } else if self.options.contains(FindOptions::PICK_FIELD_1) {
                Self::pick_field(&deserialized, 1)?
            } else {
                deserialized
            }
        } else {
            StackItem::from_bytes(item.value.clone())
        };

        if self.options.contains(FindOptions::KEYS_ONLY) {
            Ok(key_item)
        } else if self.options.contains(FindOptions::VALUES_ONLY) {
            Ok(value_item)
        } else {
            Ok(StackItem::new_struct(vec![key_item, value_item]))
        }
    }

    fn pick_field(item: &StackItem, index: usize) -> VmResult<StackItem> {
        let items = item.as_array()?;
        let items = items.borrow();
        items
            .get(index)
            .cloned()
            .ok_or_else(|| VmError::Syscall("picked field out of range".to_string()))
    }
}

/// The storage context of the currently executing contract.
fn current_context(host: &HostState, engine: &ExecutionEngine) -> VmResult<StorageContext> {
    let hash = host.current_script_hash(engine)?;
    if let Some(native) = host.natives.by_hash(&hash) {
        return Ok(StorageContext::new(native.id(), false));
    }
    let contract = contract_management::get_contract(&host.snapshot, &hash).ok_or_else(|| {
        VmError::Syscall(format!("no storage context for non-contract {hash}"))
    })?;
    Ok(StorageContext::new(contract.id, false))
}

fn pop_context(engine: &mut ExecutionEngine) -> VmResult<StorageContext> {
    let item = engine.pop()?;
    let context = item.as_interface::<StorageContext>()?;
    Ok(*context)
}

fn get_context(host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    let context = current_context(host, engine)?;
    engine.push(StackItem::from_interface(context))
}

fn get_read_only_context(host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    let context = current_context(host, engine)?.as_read_only();
    engine.push(StackItem::from_interface(context))
}

fn as_read_only(_host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    let context = pop_context(engine)?.as_read_only();
    engine.push(StackItem::from_interface(context))
}

fn get(host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    let context = pop_context(engine)?;
    let key = engine.pop_bytes()?;
    let storage_key = StorageKey::new(context.id, key);
    match host.snapshot.read().get(&storage_key) {
        Some(item) => engine.push(StackItem::from_bytes(item.value)),
        None => engine.push(StackItem::Null),
    }
}

fn find(host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    let context = pop_context(engine)?;
    let prefix = engine.pop_bytes()?;
    let options_bits = engine
        .pop_int()?
        .try_into()
        .map_err(|_| VmError::Syscall("invalid find options".to_string()))?;
    let options = FindOptions::from_bits(options_bits)
        .ok_or_else(|| VmError::Syscall("invalid find options".to_string()))?;

    // The scan cost scales with the prefix length.
    host.add_fee(32 * prefix.len() as i64)?;

    let mut full_prefix = context.id.to_le_bytes().to_vec();
    full_prefix.extend_from_slice(&prefix);
    let entries = host.snapshot.read().find(&full_prefix);
    let iterator = StorageIterator::new(entries, prefix.len(), options);
    engine.push(StackItem::from_interface(RefCell::new(iterator)))
}

fn put(host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    let context = pop_context(engine)?;
    if context.is_read_only {
        return Err(VmError::Syscall("storage context is read-only".to_string()));
    }
    let key = engine.pop_bytes()?;
    let value = engine.pop_bytes()?;
    if key.len() > MAX_STORAGE_KEY_SIZE {
        return Err(VmError::Syscall("storage key too long".to_string()));
    }
    if value.len() > MAX_STORAGE_VALUE_SIZE {
        return Err(VmError::Syscall("storage value too long".to_string()));
    }

    let storage_key = StorageKey::new(context.id, key.clone());
    let existing = host.snapshot.read().get(&storage_key);
    if let Some(existing) = &existing {
        if existing.read_only {
            return Err(VmError::Syscall("storage item is read-only".to_string()));
        }
    }

    // New bytes pay the full storage price; overwritten bytes are cheap.
    let (new_bytes, reused_bytes) = match &existing {
        None => (key.len() + value.len(), 0),
        Some(existing) => (
            value.len().saturating_sub(existing.value.len()),
            value.len().min(existing.value.len()),
        ),
    };
    host.add_fee(host.storage_price * new_bytes as i64 + 100 * reused_bytes as i64)?;

    host.snapshot
        .write()
        .put(storage_key, StorageItem::new(value))
        .map_err(|e| VmError::Syscall(e.to_string()))
}

fn delete(host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    let context = pop_context(engine)?;
    if context.is_read_only {
        return Err(VmError::Syscall("storage context is read-only".to_string()));
    }
    let key = engine.pop_bytes()?;
    let storage_key = StorageKey::new(context.id, key);
    host.snapshot
        .write()
        .delete(&storage_key)
        .map_err(|e| VmError::Syscall(e.to_string()))
}

fn iterator_next(_host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    let item = engine.pop()?;
    let iterator = item.as_interface::<RefCell<StorageIterator>>()?;
    let advanced = iterator.borrow_mut().next();
    engine.push(StackItem::from_bool(advanced))
}

fn iterator_value(_host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    let item = engine.pop()?;
    let iterator = item.as_interface::<RefCell<StorageIterator>>()?;
    let value = iterator.borrow().value()?;
    engine.push(value)
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

    /// Runs a script as if it were the GAS native so a storage context
    /// resolves.
    fn run_as_native(build: impl FnOnce(&mut ScriptBuilder)) -> (ApplicationEngine, VMState) {
        let snapshot = Snapshot::on_store(Arc::new(MemoryStore::new())).into_handle();
        let natives = Arc::new(NativeRegistry::new());
        let gas_hash = natives.by_name("GasToken").unwrap().hash();
        let mut engine = ApplicationEngine::create(
            TriggerType::Application,
            None,
            snapshot,
            None,
            Arc::new(ProtocolSettings::private_net()),
            natives,
            1_000_000_000,
        )
        .unwrap();
        let mut builder = ScriptBuilder::new();
        build(&mut builder);
        engine
            .load_script(builder.to_array(), CallFlags::ALL)
            .unwrap();
        // Overwrite the frame hash so storage context resolution finds
        // the native id.
        engine
            .vm_mut()
            .current_context_mut()
            .unwrap()
            .script_hash = *gas_hash.as_bytes();
        let state = engine.execute();
        (engine, state)
    }

    #[test]
    fn put_then_get_round_trips() {
        let (engine, state) = run_as_native(|b| {
            // Put(ctx, "k", "v")
            b.emit_push_bytes(b"v").unwrap();
            b.emit_push_bytes(b"k").unwrap();
            b.emit_syscall("System.Storage.GetContext");
            b.emit_syscall("System.Storage.Put");
            // Get(ctx, "k")
            b.emit_push_bytes(b"k").unwrap();
            b.emit_syscall("System.Storage.GetContext");
            b.emit_syscall("System.Storage.Get");
        });
        assert_eq!(state, VMState::HALT, "{:?}", engine.fault_message());
        assert_eq!(engine.result_stack()[0].as_bytes().unwrap(), b"v");
    }

    #[test]
    fn read_only_context_rejects_put() {
        let (_engine, state) = run_as_native(|b| {
            b.emit_push_bytes(b"v").unwrap();
            b.emit_push_bytes(b"k").unwrap();
            b.emit_syscall("System.Storage.GetReadOnlyContext");
            b.emit_syscall("System.Storage.Put");
        });
        assert_eq!(state, VMState::FAULT);
    }

    #[test]
    fn missing_key_gets_null() {
        let (engine, state) = run_as_native(|b| {
            b.emit_push_bytes(b"absent").unwrap();
            b.emit_syscall("System.Storage.GetContext");
            b.emit_syscall("System.Storage.Get");
        });
        assert_eq!(state, VMState::HALT);
        assert!(engine.result_stack()[0].is_null());
    }

    #[test]
    fn find_iterates_prefix_in_order() {
        let (engine, state) = run_as_native(|b| {
            for (k, v) in [("p1", "a"), ("p2", "b"), ("q1", "c")] {
                b.emit_push_bytes(v.as_bytes()).unwrap();
                b.emit_push_bytes(k.as_bytes()).unwrap();
                b.emit_syscall("System.Storage.GetContext");
                b.emit_syscall("System.Storage.Put");
            }
            // Find(ctx, "p", ValuesOnly) then drain the iterator.
            b.emit_push_i64(0x04);
            b.emit_push_bytes(b"p").unwrap();
            b.emit_syscall("System.Storage.GetContext");
            b.emit_syscall("System.Storage.Find");
            // iterator.Next; iterator.Value; iterator.Next; iterator.Value
            b.emit(neo3_vm::OpCode::DUP);
            b.emit_syscall("System.Iterator.Next");
            b.emit(neo3_vm::OpCode::DROP);
            b.emit(neo3_vm::OpCode::DUP);
            b.emit_syscall("System.Iterator.Value");
            b.emit(neo3_vm::OpCode::SWAP);
            b.emit(neo3_vm::OpCode::DUP);
            b.emit_syscall("System.Iterator.Next");
            b.emit(neo3_vm::OpCode::DROP);
            b.emit_syscall("System.Iterator.Value");
        });
        assert_eq!(state, VMState::HALT, "{:?}", engine.fault_message());
        assert_eq!(engine.result_stack()[0].as_bytes().unwrap(), b"a");
        assert_eq!(engine.result_stack()[1].as_bytes().unwrap(), b"b");
    }

    #[test]
    fn storage_syscalls_require_flags() {
        let snapshot = Snapshot::on_store(Arc::new(MemoryStore::new())).into_handle();
        let mut engine = ApplicationEngine::create(
            TriggerType::Application,
            None,
            snapshot,
            None,
            Arc::new(ProtocolSettings::private_net()),
            Arc::new(NativeRegistry::new()),
            1_000_000_000,
        )
        .unwrap();
        let mut builder = ScriptBuilder::new();
        builder.emit_syscall("System.Storage.GetContext");
        engine
            .load_script(builder.to_array(), CallFlags::NONE)
            .unwrap();
        assert_eq!(engine.execute(), VMState::FAULT);
    }
}
