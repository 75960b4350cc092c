// Copyright (C) 2015-2025 The Neo Project.
//
// stack_item.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Stack items: the tagged value model of the Neo VM.
//!
//! Compound items (Array, Struct, Map, Buffer) are shared references;
//! cloning a `StackItem` clones the handle, not the contents. Structs get
//! value semantics through explicit [`StackItem::deep_clone`] at the
//! mutation sites that require it.

use crate::error::{VmError, VmResult};
use crate::limits::ExecutionEngineLimits;
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use once_cell::sync::Lazy;
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

/// Maximum byte width of an integer item.
pub const MAX_INTEGER_SIZE: usize = 32;

static INT_MAX: Lazy<BigInt> = Lazy::new(|| (BigInt::from(1) << 255) - 1);
static INT_MIN: Lazy<BigInt> = Lazy::new(|| {
    let one: BigInt = BigInt::from(1i32);
    -(one << 255u32)
});

/// Type tags, also used as the operand of ISTYPE/CONVERT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StackItemType {
    Any = 0x00,
    Pointer = 0x10,
    Boolean = 0x20,
    Integer = 0x21,
    ByteString = 0x28,
    Buffer = 0x30,
    Array = 0x40,
    Struct = 0x41,
    Map = 0x48,
    InteropInterface = 0x60,
}

impl StackItemType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Any),
            0x10 => Some(Self::Pointer),
            0x20 => Some(Self::Boolean),
            0x21 => Some(Self::Integer),
            0x28 => Some(Self::ByteString),
            0x30 => Some(Self::Buffer),
            0x40 => Some(Self::Array),
            0x41 => Some(Self::Struct),
            0x48 => Some(Self::Map),
            0x60 => Some(Self::InteropInterface),
            _ => None,
        }
    }
}

/// An ordered map with primitive keys, preserving insertion order.
#[derive(Debug, Default)]
pub struct OrderedMap {
    entries: Vec<(StackItem, StackItem)>,
}

impl OrderedMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, key: &StackItem) -> Option<usize> {
        let key_span = key.as_bytes().ok()?;
        self.entries
            .iter()
            .position(|(k, _)| k.as_bytes().map(|s| s == key_span).unwrap_or(false))
    }

    pub fn get(&self, key: &StackItem) -> Option<StackItem> {
        self.position(key).map(|i| self.entries[i].1.clone())
    }

    pub fn contains_key(&self, key: &StackItem) -> bool {
        self.position(key).is_some()
    }

    /// Inserts or replaces; returns true when the key was new.
    pub fn insert(&mut self, key: StackItem, value: StackItem) -> bool {
        match self.position(&key) {
            Some(i) => {
                self.entries[i].1 = value;
                false
            }
            None => {
                self.entries.push((key, value));
                true
            }
        }
    }

    /// Removes the entry; returns the removed value.
    pub fn remove(&mut self, key: &StackItem) -> Option<StackItem> {
        self.position(key).map(|i| self.entries.remove(i).1)
    }

    pub fn keys(&self) -> Vec<StackItem> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn values(&self) -> Vec<StackItem> {
        self.entries.iter().map(|(_, v)| v.clone()).collect()
    }

    pub fn entries(&self) -> &[(StackItem, StackItem)] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// A value in the Neo VM.
#[derive(Clone)]
pub enum StackItem {
    Null,
    Boolean(bool),
    Integer(BigInt),
    ByteString(Rc<Vec<u8>>),
    Buffer(Rc<RefCell<Vec<u8>>>),
    Array(Rc<RefCell<Vec<StackItem>>>),
    Struct(Rc<RefCell<Vec<StackItem>>>),
    Map(Rc<RefCell<OrderedMap>>),
    Pointer(usize),
    InteropInterface(Rc<dyn Any>),
}

impl StackItem {
    pub fn null() -> Self {
        StackItem::Null
    }

    pub fn from_bool(value: bool) -> Self {
        StackItem::Boolean(value)
    }

    pub fn from_int<T: Into<BigInt>>(value: T) -> Self {
        StackItem::Integer(value.into())
    }

    pub fn from_bytes<T: Into<Vec<u8>>>(value: T) -> Self {
        StackItem::ByteString(Rc::new(value.into()))
    }

    pub fn new_buffer(value: Vec<u8>) -> Self {
        StackItem::Buffer(Rc::new(RefCell::new(value)))
    }

    pub fn new_array(items: Vec<StackItem>) -> Self {
        StackItem::Array(Rc::new(RefCell::new(items)))
    }

    pub fn new_struct(items: Vec<StackItem>) -> Self {
        StackItem::Struct(Rc::new(RefCell::new(items)))
    }

    pub fn new_map() -> Self {
        StackItem::Map(Rc::new(RefCell::new(OrderedMap::new())))
    }

    pub fn from_interface<T: Any>(value: T) -> Self {
        StackItem::InteropInterface(Rc::new(value))
    }

    /// The type tag of the item.
    pub fn item_type(&self) -> StackItemType {
        match self {
            StackItem::Null => StackItemType::Any,
            StackItem::Boolean(_) => StackItemType::Boolean,
            StackItem::Integer(_) => StackItemType::Integer,
            StackItem::ByteString(_) => StackItemType::ByteString,
            StackItem::Buffer(_) => StackItemType::Buffer,
            StackItem::Array(_) => StackItemType::Array,
            StackItem::Struct(_) => StackItemType::Struct,
            StackItem::Map(_) => StackItemType::Map,
            StackItem::Pointer(_) => StackItemType::Pointer,
            StackItem::InteropInterface(_) => StackItemType::InteropInterface,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            StackItem::Null => "Null",
            StackItem::Boolean(_) => "Boolean",
            StackItem::Integer(_) => "Integer",
            StackItem::ByteString(_) => "ByteString",
            StackItem::Buffer(_) => "Buffer",
            StackItem::Array(_) => "Array",
            StackItem::Struct(_) => "Struct",
            StackItem::Map(_) => "Map",
            StackItem::Pointer(_) => "Pointer",
            StackItem::InteropInterface(_) => "InteropInterface",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, StackItem::Null)
    }

    /// Whether the item is a compound tracked by the reference counter.
    pub fn is_compound(&self) -> bool {
        matches!(
            self,
            StackItem::Array(_) | StackItem::Struct(_) | StackItem::Map(_) | StackItem::Buffer(_)
        )
    }

    /// Truthiness used by conditional jumps.
    pub fn as_bool(&self) -> VmResult<bool> {
        match self {
            StackItem::Null => Ok(false),
            StackItem::Boolean(value) => Ok(*value),
            StackItem::Integer(value) => Ok(!value.is_zero()),
            StackItem::ByteString(bytes) => {
                if bytes.len() > MAX_INTEGER_SIZE {
                    return Err(VmError::InvalidConversion("Boolean"));
                }
                Ok(bytes.iter().any(|b| *b != 0))
            }
            StackItem::Buffer(_)
            | StackItem::Array(_)
            | StackItem::Struct(_)
            | StackItem::Map(_)
            | StackItem::Pointer(_)
            | StackItem::InteropInterface(_) => Ok(true),
        }
    }

    /// Numeric value; byte strings decode as little-endian two's
    /// complement of at most 32 bytes.
    pub fn as_int(&self) -> VmResult<BigInt> {
        match self {
            StackItem::Boolean(value) => Ok(BigInt::from(u8::from(*value))),
            StackItem::Integer(value) => Ok(value.clone()),
            StackItem::ByteString(bytes) => Self::int_from_span(bytes),
            StackItem::Buffer(bytes) => Self::int_from_span(&bytes.borrow()),
            other => Err(VmError::InvalidType {
                expected: "Integer",
                actual: other.type_name(),
            }),
        }
    }

    fn int_from_span(bytes: &[u8]) -> VmResult<BigInt> {
        if bytes.len() > MAX_INTEGER_SIZE {
            return Err(VmError::InvalidConversion("Integer"));
        }
        Ok(BigInt::from_signed_bytes_le(bytes))
    }

    /// `as_int` narrowed to usize for indexes and counts.
    pub fn as_usize(&self) -> VmResult<usize> {
        let value = self.as_int()?;
        value
            .to_usize()
            .ok_or_else(|| VmError::IndexOutOfRange {
                index: value.to_i64().unwrap_or(i64::MAX),
                len: usize::MAX,
            })
    }

    /// The canonical byte span of a primitive item.
    pub fn as_bytes(&self) -> VmResult<Vec<u8>> {
        match self {
            StackItem::Boolean(value) => Ok(vec![u8::from(*value)]),
            StackItem::Integer(value) => Ok(Self::int_to_span(value)),
            StackItem::ByteString(bytes) => Ok(bytes.as_ref().clone()),
            StackItem::Buffer(bytes) => Ok(bytes.borrow().clone()),
            other => Err(VmError::InvalidType {
                expected: "ByteString",
                actual: other.type_name(),
            }),
        }
    }

    fn int_to_span(value: &BigInt) -> Vec<u8> {
        if value.is_zero() {
            Vec::new()
        } else {
            value.to_signed_bytes_le()
        }
    }

    /// Shared element vector of an Array or Struct.
    pub fn as_array(&self) -> VmResult<Rc<RefCell<Vec<StackItem>>>> {
        match self {
            StackItem::Array(items) | StackItem::Struct(items) => Ok(Rc::clone(items)),
            other => Err(VmError::InvalidType {
                expected: "Array",
                actual: other.type_name(),
            }),
        }
    }

    /// Shared map handle.
    pub fn as_map(&self) -> VmResult<Rc<RefCell<OrderedMap>>> {
        match self {
            StackItem::Map(map) => Ok(Rc::clone(map)),
            other => Err(VmError::InvalidType {
                expected: "Map",
                actual: other.type_name(),
            }),
        }
    }

    /// Shared buffer handle.
    pub fn as_buffer(&self) -> VmResult<Rc<RefCell<Vec<u8>>>> {
        match self {
            StackItem::Buffer(bytes) => Ok(Rc::clone(bytes)),
            other => Err(VmError::InvalidType {
                expected: "Buffer",
                actual: other.type_name(),
            }),
        }
    }

    /// Interop handle downcast.
    pub fn as_interface<T: Any>(&self) -> VmResult<Rc<T>> {
        match self {
            StackItem::InteropInterface(handle) => Rc::clone(handle)
                .downcast::<T>()
                .map_err(|_| VmError::InvalidConversion("InteropInterface")),
            other => Err(VmError::InvalidType {
                expected: "InteropInterface",
                actual: other.type_name(),
            }),
        }
    }

    /// Whether a map may use this item as a key.
    pub fn is_valid_map_key(&self) -> bool {
        matches!(
            self,
            StackItem::Boolean(_) | StackItem::Integer(_) | StackItem::ByteString(_)
        )
    }

    /// Checks an arithmetic result against the 256-bit semantic range.
    pub fn check_integer(value: BigInt) -> VmResult<StackItem> {
        if value > *INT_MAX || value < *INT_MIN {
            return Err(VmError::IntegerOutOfRange);
        }
        Ok(StackItem::Integer(value))
    }

    /// Equality per the VM rules: Null equals only Null, primitives by
    /// canonical span, Struct element-wise, Array/Map by identity.
    pub fn equals(&self, other: &StackItem, limits: &ExecutionEngineLimits) -> VmResult<bool> {
        self.equals_at(other, limits.max_comparable_depth)
    }

    fn equals_at(&self, other: &StackItem, depth_left: usize) -> VmResult<bool> {
        if depth_left == 0 {
            return Err(VmError::InvalidOperation(
                "comparison nesting too deep".to_string(),
            ));
        }
        match (self, other) {
            (StackItem::Null, StackItem::Null) => Ok(true),
            (StackItem::Null, _) | (_, StackItem::Null) => Ok(false),
            (StackItem::Array(a), StackItem::Array(b)) => Ok(Rc::ptr_eq(a, b)),
            (StackItem::Map(a), StackItem::Map(b)) => Ok(Rc::ptr_eq(a, b)),
            (StackItem::InteropInterface(a), StackItem::InteropInterface(b)) => {
                Ok(Rc::ptr_eq(a, b))
            }
            (StackItem::Pointer(a), StackItem::Pointer(b)) => Ok(a == b),
            (StackItem::Struct(a), StackItem::Struct(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Ok(true);
                }
                let a = a.borrow();
                let b = b.borrow();
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (left, right) in a.iter().zip(b.iter()) {
                    if !left.equals_at(right, depth_left - 1)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (left, right) => {
                // Remaining comparable pairs are the primitive-span kinds.
                match (left.as_bytes(), right.as_bytes()) {
                    (Ok(a), Ok(b)) => Ok(a == b),
                    _ => Ok(false),
                }
            }
        }
    }

    /// Recursively copies the item, giving Structs their value semantics.
    pub fn deep_clone(&self, limits: &ExecutionEngineLimits) -> VmResult<StackItem> {
        self.deep_clone_at(limits.max_comparable_depth)
    }

    fn deep_clone_at(&self, depth_left: usize) -> VmResult<StackItem> {
        if depth_left == 0 {
            return Err(VmError::InvalidOperation(
                "clone nesting too deep".to_string(),
            ));
        }
        Ok(match self {
            StackItem::Struct(items) => {
                let cloned: VmResult<Vec<StackItem>> = items
                    .borrow()
                    .iter()
                    .map(|item| item.deep_clone_at(depth_left - 1))
                    .collect();
                StackItem::new_struct(cloned?)
            }
            StackItem::Array(items) => {
                let cloned: VmResult<Vec<StackItem>> = items
                    .borrow()
                    .iter()
                    .map(|item| item.deep_clone_at(depth_left - 1))
                    .collect();
                StackItem::new_array(cloned?)
            }
            StackItem::Map(map) => {
                let mut cloned = OrderedMap::new();
                for (key, value) in map.borrow().entries() {
                    cloned.insert(key.clone(), value.deep_clone_at(depth_left - 1)?);
                }
                StackItem::Map(Rc::new(RefCell::new(cloned)))
            }
            StackItem::Buffer(bytes) => StackItem::new_buffer(bytes.borrow().clone()),
            other => other.clone(),
        })
    }

    /// CONVERT: explicit type conversion.
    pub fn convert_to(
        &self,
        target: StackItemType,
        limits: &ExecutionEngineLimits,
    ) -> VmResult<StackItem> {
        if target == self.item_type() {
            return Ok(self.clone());
        }
        match target {
            StackItemType::Boolean => Ok(StackItem::Boolean(self.as_bool()?)),
            StackItemType::Integer => {
                let value = self.as_int()?;
                StackItem::check_integer(value)
            }
            StackItemType::ByteString => Ok(StackItem::from_bytes(self.as_bytes()?)),
            StackItemType::Buffer => {
                let bytes = self.as_bytes()?;
                if bytes.len() > limits.max_item_size {
                    return Err(VmError::ItemTooLarge {
                        size: bytes.len(),
                        limit: limits.max_item_size,
                    });
                }
                Ok(StackItem::new_buffer(bytes))
            }
            StackItemType::Array => match self {
                StackItem::Struct(items) => Ok(StackItem::new_array(items.borrow().clone())),
                _ => Err(VmError::InvalidConversion("Array")),
            },
            StackItemType::Struct => match self {
                StackItem::Array(items) => Ok(StackItem::new_struct(items.borrow().clone())),
                _ => Err(VmError::InvalidConversion("Struct")),
            },
            StackItemType::Any if self.is_null() => Ok(StackItem::Null),
            _ => Err(VmError::InvalidConversion("unsupported target type")),
        }
    }

    /// The number of items reachable from this one, itself included.
    /// Used by the reference counter's mark pass.
    pub fn reachable_count(&self, depth_left: usize) -> usize {
        if depth_left == 0 {
            return 1;
        }
        match self {
            StackItem::Array(items) | StackItem::Struct(items) => {
                1 + items
                    .borrow()
                    .iter()
                    .map(|item| item.reachable_count(depth_left - 1))
                    .sum::<usize>()
            }
            StackItem::Map(map) => {
                1 + map
                    .borrow()
                    .entries()
                    .iter()
                    .map(|(k, v)| {
                        k.reachable_count(depth_left - 1) + v.reachable_count(depth_left - 1)
                    })
                    .sum::<usize>()
            }
            _ => 1,
        }
    }
}

impl std::fmt::Debug for StackItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StackItem::Null => write!(f, "Null"),
            StackItem::Boolean(value) => write!(f, "Boolean({value})"),
            StackItem::Integer(value) => write!(f, "Integer({value})"),
            StackItem::ByteString(bytes) => write!(f, "ByteString(0x{})", hex::encode(&**bytes)),
            StackItem::Buffer(bytes) => write!(f, "Buffer(0x{})", hex::encode(&*bytes.borrow())),
            StackItem::Array(items) => write!(f, "Array[{}]", items.borrow().len()),
            StackItem::Struct(items) => write!(f, "Struct[{}]", items.borrow().len()),
            StackItem::Map(map) => write!(f, "Map[{}]", map.borrow().len()),
            StackItem::Pointer(position) => write!(f, "Pointer({position})"),
            StackItem::InteropInterface(_) => write!(f, "InteropInterface"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> ExecutionEngineLimits {
        ExecutionEngineLimits::default()
    }

    #[test]
    fn null_equals_only_null() {
        let limits = limits();
        assert!(StackItem::Null.equals(&StackItem::Null, &limits).unwrap());
        assert!(!StackItem::Null
            .equals(&StackItem::from_int(0), &limits)
            .unwrap());
        assert!(!StackItem::from_bool(false)
            .equals(&StackItem::Null, &limits)
            .unwrap());
    }

    #[test]
    fn numeric_equality_crosses_types() {
        let limits = limits();
        assert!(StackItem::from_int(1)
            .equals(&StackItem::from_bool(true), &limits)
            .unwrap());
        assert!(StackItem::from_int(1)
            .equals(&StackItem::from_bytes(vec![1]), &limits)
            .unwrap());
        assert!(StackItem::from_int(0)
            .equals(&StackItem::from_bytes(vec![]), &limits)
            .unwrap());
        assert!(!StackItem::from_int(2)
            .equals(&StackItem::from_bool(true), &limits)
            .unwrap());
    }

    #[test]
    fn arrays_compare_by_identity() {
        let limits = limits();
        let a = StackItem::new_array(vec![StackItem::from_int(1)]);
        let b = StackItem::new_array(vec![StackItem::from_int(1)]);
        assert!(!a.equals(&b, &limits).unwrap());
        assert!(a.equals(&a.clone(), &limits).unwrap());
    }

    #[test]
    fn structs_compare_element_wise() {
        let limits = limits();
        let a = StackItem::new_struct(vec![StackItem::from_int(1), StackItem::from_bool(true)]);
        let b = StackItem::new_struct(vec![StackItem::from_int(1), StackItem::from_bool(true)]);
        assert!(a.equals(&b, &limits).unwrap());
        let c = StackItem::new_struct(vec![StackItem::from_int(2)]);
        assert!(!a.equals(&c, &limits).unwrap());
    }

    #[test]
    fn shared_array_mutation_is_visible_through_clones() {
        let a = StackItem::new_array(vec![]);
        let b = a.clone();
        a.as_array().unwrap().borrow_mut().push(StackItem::from_int(5));
        assert_eq!(b.as_array().unwrap().borrow().len(), 1);
    }

    #[test]
    fn deep_clone_detaches_structs() {
        let limits = limits();
        let a = StackItem::new_struct(vec![StackItem::from_int(1)]);
        let b = a.deep_clone(&limits).unwrap();
        a.as_array().unwrap().borrow_mut().push(StackItem::from_int(2));
        assert_eq!(b.as_array().unwrap().borrow().len(), 1);
    }

    #[test]
    fn integer_range_is_enforced() {
        let max = (BigInt::from(1) << 255) - 1;
        assert!(StackItem::check_integer(max.clone()).is_ok());
        assert!(StackItem::check_integer(max + 1).is_err());
        let min = -(BigInt::from(1) << 255);
        assert!(StackItem::check_integer(min.clone()).is_ok());
        assert!(StackItem::check_integer(min - 1).is_err());
    }

    #[test]
    fn integer_span_is_canonical() {
        assert_eq!(StackItem::from_int(0).as_bytes().unwrap(), Vec::<u8>::new());
        assert_eq!(StackItem::from_int(1).as_bytes().unwrap(), vec![1]);
        assert_eq!(StackItem::from_int(-1).as_bytes().unwrap(), vec![0xff]);
        assert_eq!(StackItem::from_int(256).as_bytes().unwrap(), vec![0, 1]);
    }

    #[test]
    fn byte_string_to_int_round_trip() {
        for value in [0i64, 1, -1, 127, -128, 255, 65535, -65536] {
            let item = StackItem::from_int(value);
            let bytes = item.as_bytes().unwrap();
            assert_eq!(
                StackItem::from_bytes(bytes).as_int().unwrap(),
                BigInt::from(value)
            );
        }
    }

    #[test]
    fn conversions() {
        let limits = limits();
        let array = StackItem::new_array(vec![StackItem::from_int(1)]);
        let as_struct = array.convert_to(StackItemType::Struct, &limits).unwrap();
        assert_eq!(as_struct.item_type(), StackItemType::Struct);
        assert!(array
            .convert_to(StackItemType::Integer, &limits)
            .is_err());
        let n = StackItem::from_bytes(vec![42]);
        assert_eq!(
            n.convert_to(StackItemType::Integer, &limits)
                .unwrap()
                .as_int()
                .unwrap(),
            BigInt::from(42)
        );
    }

    #[test]
    fn map_preserves_insertion_order() {
        let mut map = OrderedMap::new();
        map.insert(StackItem::from_int(3), StackItem::from_int(30));
        map.insert(StackItem::from_int(1), StackItem::from_int(10));
        map.insert(StackItem::from_int(2), StackItem::from_int(20));
        let keys: Vec<i64> = map
            .keys()
            .iter()
            .map(|k| k.as_int().unwrap().to_i64().unwrap())
            .collect();
        assert_eq!(keys, vec![3, 1, 2]);
    }

    #[test]
    fn map_key_equality_is_by_value() {
        let mut map = OrderedMap::new();
        map.insert(StackItem::from_int(1), StackItem::from_int(10));
        assert!(map.contains_key(&StackItem::from_bytes(vec![1])));
        assert!(map.contains_key(&StackItem::from_bool(true)));
        map.remove(&StackItem::from_bool(true));
        assert!(map.is_empty());
    }

    #[test]
    fn oversized_byte_string_cannot_become_integer() {
        let item = StackItem::from_bytes(vec![1u8; 33]);
        assert!(item.as_int().is_err());
        assert!(item.as_bool().is_err());
    }
}
