//! StdLib native contract: deterministic encoding helpers.

use super::{native_hash, NativeCallContext, NativeContract, NativeMethod};
use crate::error::{ContractError, ContractResult};
use neo3_core::UInt160;
use neo3_cryptography::{base58check_decode, base58check_encode};
use neo3_io::{BinaryWriter, MemoryReader};
use neo3_vm::{ExecutionEngineLimits, StackItem, StackItemType, VmError, VmResult};
use num_bigint::BigInt;
use num_traits::Num;
use once_cell::sync::Lazy;

const ID: i32 = -2;
const NAME: &str = "StdLib";

/// Maximum input size accepted by StdLib methods.
const MAX_INPUT_SIZE: usize = 1024 * 1024;

static HASH: Lazy<UInt160> = Lazy::new(|| native_hash(NAME));

/// Serializes a stack item to the deterministic binary item format.
pub fn serialize_item(item: &StackItem) -> VmResult<Vec<u8>> {
    let mut writer = BinaryWriter::new();
    serialize_into(item, &mut writer, 16)?;
    let bytes = writer.to_bytes();
    if bytes.len() > MAX_INPUT_SIZE {
        return Err(VmError::ItemTooLarge {
            size: bytes.len(),
            limit: MAX_INPUT_SIZE,
        });
    }
    Ok(bytes)
}

fn serialize_into(item: &StackItem, writer: &mut BinaryWriter, depth: usize) -> VmResult<()> {
    if depth == 0 {
        return Err(VmError::InvalidOperation("serialization too deep".to_string()));
    }
    let io = |e: neo3_io::IoError| VmError::Syscall(e.to_string());
    writer.write_byte(item.item_type() as u8).map_err(io)?;
    match item {
        StackItem::Null => Ok(()),
        StackItem::Boolean(value) => writer.write_bool(*value).map_err(io),
        StackItem::Integer(_) | StackItem::ByteString(_) | StackItem::Buffer(_) => {
            writer.write_var_bytes(&item.as_bytes()?).map_err(io)
        }
        StackItem::Array(items) | StackItem::Struct(items) => {
            let items = items.borrow();
            writer.write_var_int(items.len() as u64).map_err(io)?;
            for element in items.iter() {
                serialize_into(element, writer, depth - 1)?;
            }
            Ok(())
        }
        StackItem::Map(map) => {
            let map = map.borrow();
            writer.write_var_int(map.len() as u64).map_err(io)?;
            for (key, value) in map.entries() {
                serialize_into(key, writer, depth - 1)?;
                serialize_into(value, writer, depth - 1)?;
            }
            Ok(())
        }
        other => Err(VmError::InvalidType {
            expected: "serializable item",
            actual: other.type_name(),
        }),
    }
}

/// Parses the deterministic binary item format.
pub fn deserialize_item(data: &[u8]) -> VmResult<StackItem> {
    let mut reader = MemoryReader::new(data);
    let item = deserialize_from(&mut reader, 16)?;
    Ok(item)
}

fn deserialize_from(reader: &mut MemoryReader<'_>, depth: usize) -> VmResult<StackItem> {
    if depth == 0 {
        return Err(VmError::InvalidOperation("deserialization too deep".to_string()));
    }
    let io = |e: neo3_io::IoError| VmError::Syscall(e.to_string());
    let tag = reader.read_byte().map_err(io)?;
    let item_type = StackItemType::from_byte(tag)
        .ok_or_else(|| VmError::Syscall(format!("unknown item type 0x{tag:02x}")))?;
    match item_type {
        StackItemType::Any => Ok(StackItem::Null),
        StackItemType::Boolean => Ok(StackItem::from_bool(reader.read_bool().map_err(io)?)),
        StackItemType::Integer => {
            let bytes = reader.read_var_bytes(32).map_err(io)?;
            Ok(StackItem::from_int(BigInt::from_signed_bytes_le(&bytes)))
        }
        StackItemType::ByteString => Ok(StackItem::from_bytes(
            reader.read_var_bytes(MAX_INPUT_SIZE).map_err(io)?,
        )),
        StackItemType::Buffer => Ok(StackItem::new_buffer(
            reader.read_var_bytes(MAX_INPUT_SIZE).map_err(io)?,
        )),
        StackItemType::Array | StackItemType::Struct => {
            let count = reader
                .read_var_int(ExecutionEngineLimits::default().max_array_size as u64)
                .map_err(io)? as usize;
            let mut items = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                items.push(deserialize_from(reader, depth - 1)?);
            }
            Ok(if item_type == StackItemType::Array {
                StackItem::new_array(items)
            } else {
                StackItem::new_struct(items)
            })
        }
        StackItemType::Map => {
            let count = reader
                .read_var_int(ExecutionEngineLimits::default().max_array_size as u64)
                .map_err(io)? as usize;
            let map = StackItem::new_map();
            {
                let handle = map.as_map()?;
                let mut inner = handle.borrow_mut();
                for _ in 0..count {
                    let key = deserialize_from(reader, depth - 1)?;
                    let value = deserialize_from(reader, depth - 1)?;
                    inner.insert(key, value);
                }
            }
            Ok(map)
        }
        _ => Err(VmError::Syscall(format!(
            "type 0x{tag:02x} is not deserializable"
        ))),
    }
}

/// Renders a stack item as JSON text (jsonSerialize).
fn item_to_json(item: &StackItem, depth: usize) -> ContractResult<serde_json::Value> {
    use num_traits::ToPrimitive;
    if depth == 0 {
        return Err(ContractError::InvalidArgument("JSON too deep".to_string()));
    }
    Ok(match item {
        StackItem::Null => serde_json::Value::Null,
        StackItem::Boolean(value) => serde_json::Value::Bool(*value),
        StackItem::Integer(value) => serde_json::Value::Number(
            value
                .to_i64()
                .ok_or_else(|| {
                    ContractError::InvalidArgument("integer too large for JSON".to_string())
                })?
                .into(),
        ),
        StackItem::ByteString(_) | StackItem::Buffer(_) => {
            let bytes = item.as_bytes().map_err(ContractError::Vm)?;
            serde_json::Value::String(
                String::from_utf8(bytes)
                    .map_err(|_| ContractError::InvalidArgument("non-UTF-8 string".to_string()))?,
            )
        }
        StackItem::Array(items) => serde_json::Value::Array(
            items
                .borrow()
                .iter()
                .map(|i| item_to_json(i, depth - 1))
                .collect::<ContractResult<_>>()?,
        ),
        StackItem::Map(map) => {
            let mut object = serde_json::Map::new();
            for (key, value) in map.borrow().entries() {
                let key_bytes = key.as_bytes().map_err(ContractError::Vm)?;
                let key_text = String::from_utf8(key_bytes).map_err(|_| {
                    ContractError::InvalidArgument("non-UTF-8 map key".to_string())
                })?;
                object.insert(key_text, item_to_json(value, depth - 1)?);
            }
            serde_json::Value::Object(object)
        }
        other => {
            return Err(ContractError::InvalidArgument(format!(
                "{} is not JSON-serializable",
                other.type_name()
            )))
        }
    })
}

fn json_to_item(value: &serde_json::Value, depth: usize) -> ContractResult<StackItem> {
    if depth == 0 {
        return Err(ContractError::InvalidArgument("JSON too deep".to_string()));
    }
    Ok(match value {
        serde_json::Value::Null => StackItem::Null,
        serde_json::Value::Bool(b) => StackItem::from_bool(*b),
        serde_json::Value::Number(n) => {
            let int = n
                .as_i64()
                .ok_or_else(|| ContractError::InvalidArgument("non-integer number".to_string()))?;
            StackItem::from_int(int)
        }
        serde_json::Value::String(s) => StackItem::from_bytes(s.as_bytes().to_vec()),
        serde_json::Value::Array(items) => StackItem::new_array(
            items
                .iter()
                .map(|v| json_to_item(v, depth - 1))
                .collect::<ContractResult<_>>()?,
        ),
        serde_json::Value::Object(object) => {
            let map = StackItem::new_map();
            {
                let handle = map.as_map().map_err(ContractError::Vm)?;
                let mut inner = handle.borrow_mut();
                for (key, value) in object {
                    inner.insert(
                        StackItem::from_bytes(key.as_bytes().to_vec()),
                        json_to_item(value, depth - 1)?,
                    );
                }
            }
            map
        }
    })
}

pub struct StdLib {
    methods: Vec<NativeMethod>,
}

impl StdLib {
    pub fn new() -> Self {
        Self {
            methods: vec![
                NativeMethod::safe("serialize", 1 << 12, 1),
                NativeMethod::safe("deserialize", 1 << 14, 1),
                NativeMethod::safe("jsonSerialize", 1 << 12, 1),
                NativeMethod::safe("jsonDeserialize", 1 << 14, 1),
                NativeMethod::safe("itoa", 1 << 12, 1),
                NativeMethod::safe("itoa", 1 << 12, 2),
                NativeMethod::safe("atoi", 1 << 6, 1),
                NativeMethod::safe("atoi", 1 << 6, 2),
                NativeMethod::safe("base64Encode", 1 << 5, 1),
                NativeMethod::safe("base64Decode", 1 << 5, 1),
                NativeMethod::safe("base58Encode", 1 << 13, 1),
                NativeMethod::safe("base58Decode", 1 << 10, 1),
                NativeMethod::safe("base58CheckEncode", 1 << 16, 1),
                NativeMethod::safe("base58CheckDecode", 1 << 16, 1),
                NativeMethod::safe("memoryCompare", 1 << 5, 2),
                NativeMethod::safe("memorySearch", 1 << 6, 2),
                NativeMethod::safe("memorySearch", 1 << 6, 3),
                NativeMethod::safe("stringSplit", 1 << 8, 2),
                NativeMethod::safe("strLen", 1 << 8, 1),
            ],
        }
    }

    fn arg_bytes(args: &[StackItem], index: usize) -> ContractResult<Vec<u8>> {
        args.get(index)
            .ok_or_else(|| ContractError::InvalidArgument(format!("missing argument {index}")))?
            .as_bytes()
            .map_err(ContractError::Vm)
    }
}

impl Default for StdLib {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeContract for StdLib {
    fn id(&self) -> i32 {
        ID
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn hash(&self) -> UInt160 {
        *HASH
    }

    fn methods(&self) -> &[NativeMethod] {
        &self.methods
    }

    fn invoke(
        &self,
        _ctx: &mut NativeCallContext<'_>,
        method: &str,
        args: Vec<StackItem>,
    ) -> ContractResult<StackItem> {
        use base64::Engine as _;
        let b64 = base64::engine::general_purpose::STANDARD;
        match method {
            "serialize" => Ok(StackItem::from_bytes(serialize_item(&args[0])?)),
            "deserialize" => Ok(deserialize_item(&Self::arg_bytes(&args, 0)?)?),
            "jsonSerialize" => {
                let json = item_to_json(&args[0], 10)?;
                Ok(StackItem::from_bytes(json.to_string().into_bytes()))
            }
            "jsonDeserialize" => {
                let bytes = Self::arg_bytes(&args, 0)?;
                let value: serde_json::Value = serde_json::from_slice(&bytes)
                    .map_err(|e| ContractError::InvalidArgument(e.to_string()))?;
                json_to_item(&value, 10)
            }
            "itoa" => {
                let value = args[0].as_int().map_err(ContractError::Vm)?;
                let base = match args.get(1) {
                    Some(b) => b.as_int().map_err(ContractError::Vm)?,
                    None => BigInt::from(10),
                };
                let radix: u32 = base
                    .try_into()
                    .map_err(|_| ContractError::InvalidArgument("invalid base".to_string()))?;
                let text = match radix {
                    10 => value.to_string(),
                    16 => value.to_str_radix(16),
                    _ => {
                        return Err(ContractError::InvalidArgument(
                            "itoa base must be 10 or 16".to_string(),
                        ))
                    }
                };
                Ok(StackItem::from_bytes(text.into_bytes()))
            }
            "atoi" => {
                let text = String::from_utf8(Self::arg_bytes(&args, 0)?)
                    .map_err(|_| ContractError::InvalidArgument("non-UTF-8 input".to_string()))?;
                let base = match args.get(1) {
                    Some(b) => b.as_int().map_err(ContractError::Vm)?,
                    None => BigInt::from(10),
                };
                let radix: u32 = base
                    .try_into()
                    .map_err(|_| ContractError::InvalidArgument("invalid base".to_string()))?;
                if radix != 10 && radix != 16 {
                    return Err(ContractError::InvalidArgument(
                        "atoi base must be 10 or 16".to_string(),
                    ));
                }
                let value = BigInt::from_str_radix(text.trim(), radix)
                    .map_err(|e| ContractError::InvalidArgument(e.to_string()))?;
                Ok(StackItem::from_int(value))
            }
            "base64Encode" => Ok(StackItem::from_bytes(
                b64.encode(Self::arg_bytes(&args, 0)?).into_bytes(),
            )),
            "base64Decode" => {
                let text = String::from_utf8(Self::arg_bytes(&args, 0)?)
                    .map_err(|_| ContractError::InvalidArgument("non-UTF-8 input".to_string()))?;
                let bytes = b64
                    .decode(text.as_bytes())
                    .map_err(|e| ContractError::InvalidArgument(e.to_string()))?;
                Ok(StackItem::from_bytes(bytes))
            }
            "base58Encode" => Ok(StackItem::from_bytes(
                bs58::encode(Self::arg_bytes(&args, 0)?)
                    .into_string()
                    .into_bytes(),
            )),
            "base58Decode" => {
                let text = String::from_utf8(Self::arg_bytes(&args, 0)?)
                    .map_err(|_| ContractError::InvalidArgument("non-UTF-8 input".to_string()))?;
                let bytes = bs58::decode(&text)
                    .into_vec()
                    .map_err(|e| ContractError::InvalidArgument(e.to_string()))?;
                Ok(StackItem::from_bytes(bytes))
            }
            "base58CheckEncode" => Ok(StackItem::from_bytes(
                base58check_encode(&Self::arg_bytes(&args, 0)?).into_bytes(),
            )),
            "base58CheckDecode" => {
                let text = String::from_utf8(Self::arg_bytes(&args, 0)?)
                    .map_err(|_| ContractError::InvalidArgument("non-UTF-8 input".to_string()))?;
                let bytes = base58check_decode(&text)
                    .map_err(|e| ContractError::InvalidArgument(e.to_string()))?;
                Ok(StackItem::from_bytes(bytes))
            }
            "memoryCompare" => {
                let a = Self::arg_bytes(&args, 0)?;
                let b = Self::arg_bytes(&args, 1)?;
                let ordering = a.cmp(&b) as i64;
                Ok(StackItem::from_int(ordering))
            }
            "memorySearch" => {
                let haystack = Self::arg_bytes(&args, 0)?;
                let needle = Self::arg_bytes(&args, 1)?;
                let start = match args.get(2) {
                    Some(item) => item.as_usize().map_err(ContractError::Vm)?,
                    None => 0,
                };
                let position = if needle.is_empty() || start > haystack.len() {
                    None
                } else {
                    haystack[start..]
                        .windows(needle.len())
                        .position(|window| window == needle)
                        .map(|p| p + start)
                };
                Ok(StackItem::from_int(
                    position.map(|p| p as i64).unwrap_or(-1),
                ))
            }
            "stringSplit" => {
                let text = String::from_utf8(Self::arg_bytes(&args, 0)?)
                    .map_err(|_| ContractError::InvalidArgument("non-UTF-8 input".to_string()))?;
                let separator = String::from_utf8(Self::arg_bytes(&args, 1)?)
                    .map_err(|_| ContractError::InvalidArgument("non-UTF-8 input".to_string()))?;
                if separator.is_empty() {
                    return Err(ContractError::InvalidArgument(
                        "empty separator".to_string(),
                    ));
                }
                let parts: Vec<StackItem> = text
                    .split(&separator)
                    .map(|part| StackItem::from_bytes(part.as_bytes().to_vec()))
                    .collect();
                Ok(StackItem::new_array(parts))
            }
            "strLen" => {
                let text = String::from_utf8(Self::arg_bytes(&args, 0)?)
                    .map_err(|_| ContractError::InvalidArgument("non-UTF-8 input".to_string()))?;
                Ok(StackItem::from_int(text.chars().count() as i64))
            }
            other => Err(ContractError::MethodNotFound(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_item_round_trip() {
        let item = StackItem::new_array(vec![
            StackItem::from_int(42),
            StackItem::from_bool(true),
            StackItem::from_bytes(b"neo".to_vec()),
            StackItem::Null,
        ]);
        let bytes = serialize_item(&item).unwrap();
        let parsed = deserialize_item(&bytes).unwrap();
        let limits = ExecutionEngineLimits::default();
        // Arrays compare by identity, so compare elements.
        let a = item.as_array().unwrap();
        let b = parsed.as_array().unwrap();
        for (x, y) in a.borrow().iter().zip(b.borrow().iter()) {
            assert!(x.equals(y, &limits).unwrap());
        }
    }

    #[test]
    fn map_round_trip_preserves_order() {
        let map = StackItem::new_map();
        {
            let handle = map.as_map().unwrap();
            let mut inner = handle.borrow_mut();
            inner.insert(StackItem::from_int(2), StackItem::from_bytes(vec![2]));
            inner.insert(StackItem::from_int(1), StackItem::from_bytes(vec![1]));
        }
        let bytes = serialize_item(&map).unwrap();
        let parsed = deserialize_item(&bytes).unwrap();
        let keys = parsed.as_map().unwrap().borrow().keys();
        assert_eq!(keys[0].as_int().unwrap(), BigInt::from(2));
        assert_eq!(keys[1].as_int().unwrap(), BigInt::from(1));
    }

    #[test]
    fn interop_interfaces_do_not_serialize() {
        let item = StackItem::from_interface(42u64);
        assert!(serialize_item(&item).is_err());
    }
}
