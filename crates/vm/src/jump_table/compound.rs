//! Compound-type opcodes: arrays, structs, maps.

use super::JumpTable;
use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::stack_item::{StackItem, StackItemType};
use num_traits::{Signed, ToPrimitive};

pub fn register(table: &mut JumpTable) {
    table.set(OpCode::PACKMAP, pack_map);
    table.set(OpCode::PACKSTRUCT, pack_struct);
    table.set(OpCode::PACK, pack);
    table.set(OpCode::UNPACK, unpack);
    table.set(OpCode::NEWARRAY0, |engine, _| {
        engine.push(StackItem::new_array(Vec::new()))
    });
    table.set(OpCode::NEWARRAY, new_array);
    table.set(OpCode::NEWARRAY_T, new_array_typed);
    table.set(OpCode::NEWSTRUCT0, |engine, _| {
        engine.push(StackItem::new_struct(Vec::new()))
    });
    table.set(OpCode::NEWSTRUCT, new_struct);
    table.set(OpCode::NEWMAP, |engine, _| engine.push(StackItem::new_map()));
    table.set(OpCode::SIZE, size);
    table.set(OpCode::HASKEY, has_key);
    table.set(OpCode::KEYS, keys);
    table.set(OpCode::VALUES, values);
    table.set(OpCode::PICKITEM, pick_item);
    table.set(OpCode::APPEND, append);
    table.set(OpCode::SETITEM, set_item);
    table.set(OpCode::REVERSEITEMS, reverse_items);
    table.set(OpCode::REMOVE, remove);
    table.set(OpCode::CLEARITEMS, clear_items);
    table.set(OpCode::POPITEM, pop_item);
}

fn checked_count(engine: &ExecutionEngine, count: usize) -> VmResult<usize> {
    if count > engine.limits().max_array_size {
        return Err(VmError::ItemTooLarge {
            size: count,
            limit: engine.limits().max_array_size,
        });
    }
    Ok(count)
}

fn pack_map(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let count = checked_count(engine, engine.peek(0)?.as_usize()?)?;
    engine.pop()?;
    let map = StackItem::new_map();
    {
        let handle = map.as_map()?;
        let mut inner = handle.borrow_mut();
        for _ in 0..count {
            let key = engine.pop()?;
            if !key.is_valid_map_key() {
                return Err(VmError::InvalidType {
                    expected: "primitive map key",
                    actual: key.type_name(),
                });
            }
            let value = engine.pop()?;
            inner.insert(key, value);
            engine.reference_counter().add(2);
        }
    }
    engine.push(map)
}

fn pack_items(engine: &mut ExecutionEngine) -> VmResult<Vec<StackItem>> {
    let count = checked_count(engine, engine.peek(0)?.as_usize()?)?;
    engine.pop()?;
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        items.push(engine.pop()?);
    }
    engine.reference_counter().add(items.len());
    Ok(items)
}

fn pack_struct(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let items = pack_items(engine)?;
    engine.push(StackItem::new_struct(items))
}

fn pack(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let items = pack_items(engine)?;
    engine.push(StackItem::new_array(items))
}

fn unpack(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let compound = engine.pop()?;
    match &compound {
        StackItem::Array(items) | StackItem::Struct(items) => {
            let items = items.borrow();
            for item in items.iter().rev() {
                engine.push(item.clone())?;
            }
            engine.push(StackItem::from_int(items.len() as i64))?;
        }
        StackItem::Map(map) => {
            let map = map.borrow();
            for (key, value) in map.entries().iter().rev() {
                engine.push(value.clone())?;
                engine.push(key.clone())?;
            }
            engine.push(StackItem::from_int(map.len() as i64))?;
        }
        other => {
            return Err(VmError::InvalidType {
                expected: "Array, Struct or Map",
                actual: other.type_name(),
            })
        }
    }
    Ok(())
}

fn new_array(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let count = checked_count(engine, engine.peek(0)?.as_usize()?)?;
    engine.pop()?;
    engine.reference_counter().add(count);
    engine.push(StackItem::new_array(vec![StackItem::Null; count]))
}

fn new_array_typed(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let type_byte = instruction.token_u8()?;
    StackItemType::from_byte(type_byte)
        .ok_or(VmError::InvalidConversion("unknown item type"))?;
    new_array(engine, instruction)
}

fn new_struct(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let count = checked_count(engine, engine.peek(0)?.as_usize()?)?;
    engine.pop()?;
    engine.reference_counter().add(count);
    engine.push(StackItem::new_struct(vec![StackItem::Null; count]))
}

fn size(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let item = engine.pop()?;
    let size = match &item {
        StackItem::Array(items) | StackItem::Struct(items) => items.borrow().len(),
        StackItem::Map(map) => map.borrow().len(),
        StackItem::Buffer(bytes) => bytes.borrow().len(),
        StackItem::ByteString(bytes) => bytes.len(),
        StackItem::Boolean(_) | StackItem::Integer(_) => item.as_bytes()?.len(),
        other => {
            return Err(VmError::InvalidType {
                expected: "sized item",
                actual: other.type_name(),
            })
        }
    };
    engine.push(StackItem::from_int(size as i64))
}

fn index_of(key: &StackItem, len: usize) -> VmResult<usize> {
    let index = key.as_int()?;
    if index.is_negative() {
        return Err(VmError::IndexOutOfRange {
            index: index.to_i64().unwrap_or(i64::MIN),
            len,
        });
    }
    let index = index.to_usize().ok_or(VmError::IndexOutOfRange {
        index: i64::MAX,
        len,
    })?;
    if index >= len {
        return Err(VmError::IndexOutOfRange {
            index: index as i64,
            len,
        });
    }
    Ok(index)
}

fn has_key(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let key = engine.pop()?;
    let collection = engine.pop()?;
    let result = match &collection {
        StackItem::Array(items) | StackItem::Struct(items) => {
            index_of(&key, usize::MAX)? < items.borrow().len()
        }
        StackItem::Map(map) => map.borrow().contains_key(&key),
        StackItem::Buffer(bytes) => index_of(&key, usize::MAX)? < bytes.borrow().len(),
        StackItem::ByteString(bytes) => index_of(&key, usize::MAX)? < bytes.len(),
        other => {
            return Err(VmError::InvalidType {
                expected: "collection",
                actual: other.type_name(),
            })
        }
    };
    engine.push(StackItem::from_bool(result))
}

fn keys(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let map = engine.pop()?.as_map()?;
    let keys = map.borrow().keys();
    engine.reference_counter().add(keys.len());
    engine.push(StackItem::new_array(keys))
}

fn values(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let collection = engine.pop()?;
    let values = match &collection {
        StackItem::Array(items) | StackItem::Struct(items) => items.borrow().clone(),
        StackItem::Map(map) => map.borrow().values(),
        other => {
            return Err(VmError::InvalidType {
                expected: "Array, Struct or Map",
                actual: other.type_name(),
            })
        }
    };
    engine.reference_counter().add(values.len());
    engine.push(StackItem::new_array(values))
}

fn pick_item(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let key = engine.pop()?;
    let collection = engine.pop()?;
    let item = match &collection {
        StackItem::Array(items) | StackItem::Struct(items) => {
            let items = items.borrow();
            items[index_of(&key, items.len())?].clone()
        }
        StackItem::Map(map) => map
            .borrow()
            .get(&key)
            .ok_or_else(|| VmError::InvalidOperation("key not found in map".to_string()))?,
        StackItem::ByteString(bytes) => {
            let index = index_of(&key, bytes.len())?;
            StackItem::from_int(bytes[index] as i64)
        }
        StackItem::Buffer(bytes) => {
            let bytes = bytes.borrow();
            let index = index_of(&key, bytes.len())?;
            StackItem::from_int(bytes[index] as i64)
        }
        other => {
            return Err(VmError::InvalidType {
                expected: "collection",
                actual: other.type_name(),
            })
        }
    };
    engine.push(item)
}

fn append(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let item = engine.pop()?;
    let target = engine.pop()?;
    let items = target.as_array()?;
    if items.borrow().len() >= engine.limits().max_array_size {
        return Err(VmError::ItemTooLarge {
            size: items.borrow().len() + 1,
            limit: engine.limits().max_array_size,
        });
    }
    // Structs keep value semantics when stored into another compound.
    let item = if matches!(item, StackItem::Struct(_)) {
        item.deep_clone(engine.limits())?
    } else {
        item
    };
    items.borrow_mut().push(item);
    engine.reference_counter().add(1);
    Ok(())
}

fn set_item(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let value = engine.pop()?;
    let key = engine.pop()?;
    let collection = engine.pop()?;
    let value = if matches!(value, StackItem::Struct(_)) {
        value.deep_clone(engine.limits())?
    } else {
        value
    };
    match &collection {
        StackItem::Array(items) | StackItem::Struct(items) => {
            let mut items = items.borrow_mut();
            let index = index_of(&key, items.len())?;
            items[index] = value;
        }
        StackItem::Map(map) => {
            if !key.is_valid_map_key() {
                return Err(VmError::InvalidType {
                    expected: "primitive map key",
                    actual: key.type_name(),
                });
            }
            let mut map = map.borrow_mut();
            if map.len() >= engine.limits().max_array_size && !map.contains_key(&key) {
                return Err(VmError::ItemTooLarge {
                    size: map.len() + 1,
                    limit: engine.limits().max_array_size,
                });
            }
            if map.insert(key, value) {
                engine.reference_counter().add(2);
            }
        }
        StackItem::Buffer(bytes) => {
            let mut bytes = bytes.borrow_mut();
            let index = index_of(&key, bytes.len())?;
            let byte = value
                .as_int()?
                .to_u8()
                .ok_or_else(|| VmError::InvalidOperation("byte out of range".to_string()))?;
            bytes[index] = byte;
        }
        other => {
            return Err(VmError::InvalidType {
                expected: "collection",
                actual: other.type_name(),
            })
        }
    }
    Ok(())
}

fn reverse_items(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let collection = engine.pop()?;
    match &collection {
        StackItem::Array(items) | StackItem::Struct(items) => {
            items.borrow_mut().reverse();
            Ok(())
        }
        StackItem::Buffer(bytes) => {
            bytes.borrow_mut().reverse();
            Ok(())
        }
        other => Err(VmError::InvalidType {
            expected: "Array, Struct or Buffer",
            actual: other.type_name(),
        }),
    }
}

fn remove(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let key = engine.pop()?;
    let collection = engine.pop()?;
    match &collection {
        StackItem::Array(items) | StackItem::Struct(items) => {
            let mut items = items.borrow_mut();
            let index = index_of(&key, items.len())?;
            items.remove(index);
            engine.reference_counter().remove(1);
            Ok(())
        }
        StackItem::Map(map) => {
            if map.borrow_mut().remove(&key).is_some() {
                engine.reference_counter().remove(2);
            }
            Ok(())
        }
        other => Err(VmError::InvalidType {
            expected: "Array, Struct or Map",
            actual: other.type_name(),
        }),
    }
}

fn clear_items(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let collection = engine.pop()?;
    match &collection {
        StackItem::Array(items) | StackItem::Struct(items) => {
            let count = items.borrow().len();
            items.borrow_mut().clear();
            engine.reference_counter().remove(count);
            Ok(())
        }
        StackItem::Map(map) => {
            let count = map.borrow().len();
            map.borrow_mut().clear();
            engine.reference_counter().remove(count * 2);
            Ok(())
        }
        other => Err(VmError::InvalidType {
            expected: "Array, Struct or Map",
            actual: other.type_name(),
        }),
    }
}

fn pop_item(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let collection = engine.pop()?;
    let items = collection.as_array()?;
    let item = items
        .borrow_mut()
        .pop()
        .ok_or_else(|| VmError::InvalidOperation("POPITEM on empty array".to_string()))?;
    engine.reference_counter().remove(1);
    engine.push(item)
}

#[cfg(test)]
mod tests {
    use crate::{CallFlags, ExecutionEngine, ExecutionEngineLimits, Script, VMState};
    use num_traits::ToPrimitive;

    fn run(script: Vec<u8>) -> ExecutionEngine {
        let mut engine = ExecutionEngine::new(ExecutionEngineLimits::default());
        engine
            .load_script(Script::new(script), -1, CallFlags::ALL)
            .unwrap();
        engine.execute();
        engine
    }

    fn ints(engine: &ExecutionEngine) -> Vec<i64> {
        engine
            .result_stack()
            .iter()
            .map(|item| item.as_int().unwrap().to_i64().unwrap())
            .collect()
    }

    #[test]
    fn pack_then_unpack() {
        // PUSH1 PUSH2 PUSH2 PACK UNPACK
        let engine = run(vec![0x11, 0x12, 0x12, 0xC0, 0xC1]);
        assert_eq!(engine.state(), VMState::HALT);
        // UNPACK pushes items then the count; array[0] was the top (2).
        assert_eq!(ints(&engine), vec![1, 2, 2]);
    }

    #[test]
    fn array_append_and_pickitem() {
        // NEWARRAY0 DUP PUSH7 APPEND PUSH0 PICKITEM
        let engine = run(vec![0xC2, 0x4A, 0x17, 0xCF, 0x10, 0xCE]);
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(ints(&engine), vec![7]);
    }

    #[test]
    fn setitem_on_array() {
        // PUSH1 NEWARRAY (one null) DUP PUSH0 PUSH9 SETITEM PUSH0 PICKITEM
        let engine = run(vec![0x11, 0xC3, 0x4A, 0x10, 0x19, 0xD0, 0x10, 0xCE]);
        assert_eq!(ints(&engine), vec![9]);
    }

    #[test]
    fn map_set_get_size() {
        // NEWMAP DUP PUSH1 PUSH5 SETITEM DUP PUSH1 PICKITEM SWAP SIZE
        let engine = run(vec![0xC8, 0x4A, 0x11, 0x15, 0xD0, 0x4A, 0x11, 0xCE, 0x50, 0xCA]);
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(ints(&engine), vec![5, 1]);
    }

    #[test]
    fn missing_map_key_faults() {
        let engine = run(vec![0xC8, 0x11, 0xCE]);
        assert_eq!(engine.state(), VMState::FAULT);
    }

    #[test]
    fn packmap_pairs_key_value() {
        // Push value 9 then key 1, count 1: PACKMAP; PUSH1 PICKITEM
        let engine = run(vec![0x19, 0x11, 0x11, 0xBE, 0x11, 0xCE]);
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(ints(&engine), vec![9]);
    }

    #[test]
    fn popitem_returns_last() {
        // PUSH1 PUSH2 PUSH2 PACK POPITEM  (array [2,1] -> pops 1)
        let engine = run(vec![0x11, 0x12, 0x12, 0xC0, 0xD4]);
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(ints(&engine), vec![1]);
    }

    #[test]
    fn oversized_newarray_faults() {
        // PUSHINT16 5000 NEWARRAY
        let engine = run(vec![0x01, 0x88, 0x13, 0xC3]);
        assert_eq!(engine.state(), VMState::FAULT);
    }
}
