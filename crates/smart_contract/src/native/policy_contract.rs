//! Policy native contract: tunable protocol parameters.

use super::{native_hash, NativeCallContext, NativeContract, NativeMethod};
use crate::error::{ContractError, ContractResult};
use neo3_core::UInt160;
use neo3_persistence::{SnapshotHandle, StorageKey};
use neo3_vm::StackItem;
use num_traits::ToPrimitive;
use once_cell::sync::Lazy;

pub const ID: i32 = -7;
const NAME: &str = "PolicyContract";

static HASH: Lazy<UInt160> = Lazy::new(|| native_hash(NAME));

// Storage prefixes.
const PREFIX_FEE_PER_BYTE: u8 = 10;
const PREFIX_EXEC_FEE_FACTOR: u8 = 18;
const PREFIX_STORAGE_PRICE: u8 = 19;
const PREFIX_BLOCKED_ACCOUNT: u8 = 15;
const PREFIX_ATTRIBUTE_FEE: u8 = 21;
const PREFIX_MILLISECONDS_PER_BLOCK: u8 = 22;
const PREFIX_MAX_VUB_INCREMENT: u8 = 23;

// Defaults and bounds, in datoshi where applicable.
pub const DEFAULT_FEE_PER_BYTE: i64 = 1000;
pub const DEFAULT_EXEC_FEE_FACTOR: i64 = 30;
pub const MAX_EXEC_FEE_FACTOR: i64 = 100;
pub const DEFAULT_STORAGE_PRICE: i64 = 100_000;
pub const MAX_STORAGE_PRICE: i64 = 10_000_000;
pub const DEFAULT_ATTRIBUTE_FEE: i64 = 0;
pub const MAX_ATTRIBUTE_FEE: i64 = 1_000_000_000;
pub const MAX_MILLISECONDS_PER_BLOCK: i64 = 30_000;
pub const MAX_MAX_VUB_INCREMENT: i64 = 86_400;

fn read_i64(snapshot: &SnapshotHandle, prefix: u8, default: i64) -> i64 {
    snapshot
        .read()
        .get(&StorageKey::with_prefix(ID, prefix, &[]))
        .and_then(|item| item.value.try_into().ok().map(i64::from_le_bytes))
        .unwrap_or(default)
}

/// The network fee charged per transaction byte.
pub fn fee_per_byte(snapshot: &SnapshotHandle) -> i64 {
    read_i64(snapshot, PREFIX_FEE_PER_BYTE, DEFAULT_FEE_PER_BYTE)
}

/// The multiplier applied to opcode base prices.
pub fn exec_fee_factor(snapshot: &SnapshotHandle) -> i64 {
    read_i64(snapshot, PREFIX_EXEC_FEE_FACTOR, DEFAULT_EXEC_FEE_FACTOR)
}

/// The price per byte of new contract storage.
pub fn storage_price(snapshot: &SnapshotHandle) -> i64 {
    read_i64(snapshot, PREFIX_STORAGE_PRICE, DEFAULT_STORAGE_PRICE)
}

/// The additional fee charged for a transaction attribute type.
pub fn attribute_fee(snapshot: &SnapshotHandle, attribute_type: u8) -> i64 {
    snapshot
        .read()
        .get(&StorageKey::with_prefix(
            ID,
            PREFIX_ATTRIBUTE_FEE,
            &[attribute_type],
        ))
        .and_then(|item| item.value.try_into().ok().map(i64::from_le_bytes))
        .unwrap_or(DEFAULT_ATTRIBUTE_FEE)
}

/// Whether the account is barred from sending transactions.
pub fn is_blocked(snapshot: &SnapshotHandle, account: &UInt160) -> bool {
    snapshot
        .read()
        .contains(&StorageKey::with_prefix(
            ID,
            PREFIX_BLOCKED_ACCOUNT,
            account.as_bytes(),
        ))
}

/// The block interval, defaulting to the protocol settings value.
pub fn milliseconds_per_block(snapshot: &SnapshotHandle, default: u64) -> u64 {
    read_i64(snapshot, PREFIX_MILLISECONDS_PER_BLOCK, default as i64) as u64
}

/// The maximum `valid_until_block` distance, defaulting to settings.
pub fn max_valid_until_block_increment(snapshot: &SnapshotHandle, default: u32) -> u32 {
    read_i64(snapshot, PREFIX_MAX_VUB_INCREMENT, default as i64) as u32
}

pub struct PolicyContract {
    methods: Vec<NativeMethod>,
}

impl PolicyContract {
    pub fn new() -> Self {
        Self {
            methods: vec![
                NativeMethod::safe("getFeePerByte", 1 << 15, 0),
                NativeMethod::unsafe_method("setFeePerByte", 1 << 15, 1).returns_nothing(),
                NativeMethod::safe("getExecFeeFactor", 1 << 15, 0),
                NativeMethod::unsafe_method("setExecFeeFactor", 1 << 15, 1).returns_nothing(),
                NativeMethod::safe("getStoragePrice", 1 << 15, 0),
                NativeMethod::unsafe_method("setStoragePrice", 1 << 15, 1).returns_nothing(),
                NativeMethod::safe("getAttributeFee", 1 << 15, 1),
                NativeMethod::unsafe_method("setAttributeFee", 1 << 15, 2).returns_nothing(),
                NativeMethod::safe("isBlocked", 1 << 15, 1),
                NativeMethod::unsafe_method("blockAccount", 1 << 15, 1),
                NativeMethod::unsafe_method("unblockAccount", 1 << 15, 1),
                NativeMethod::safe("getMillisecondsPerBlock", 1 << 15, 0),
                NativeMethod::unsafe_method("setMillisecondsPerBlock", 1 << 15, 1)
                    .returns_nothing(),
                NativeMethod::safe("getMaxValidUntilBlockIncrement", 1 << 15, 0),
                NativeMethod::unsafe_method("setMaxValidUntilBlockIncrement", 1 << 15, 1)
                    .returns_nothing(),
                NativeMethod::safe("getMaxTraceableBlocks", 1 << 15, 0),
            ],
        }
    }

    fn require_committee(ctx: &NativeCallContext<'_>) -> ContractResult<()> {
        if !ctx.check_committee()? {
            return Err(ContractError::Unauthorized(
                "committee witness required".to_string(),
            ));
        }
        Ok(())
    }

    fn set_i64(
        ctx: &mut NativeCallContext<'_>,
        prefix: u8,
        value: i64,
        min: i64,
        max: i64,
    ) -> ContractResult<()> {
        if value < min || value > max {
            return Err(ContractError::InvalidArgument(format!(
                "value {value} outside [{min}, {max}]"
            )));
        }
        Self::require_committee(ctx)?;
        ctx.put_storage(ID, &[prefix], value.to_le_bytes().to_vec())
    }

    fn arg_i64(args: &[StackItem], index: usize) -> ContractResult<i64> {
        args.get(index)
            .ok_or_else(|| ContractError::InvalidArgument(format!("missing argument {index}")))?
            .as_int()
            .map_err(ContractError::Vm)?
            .to_i64()
            .ok_or_else(|| ContractError::InvalidArgument("integer out of range".to_string()))
    }

    fn arg_hash(args: &[StackItem], index: usize) -> ContractResult<UInt160> {
        let bytes = args
            .get(index)
            .ok_or_else(|| ContractError::InvalidArgument(format!("missing argument {index}")))?
            .as_bytes()
            .map_err(ContractError::Vm)?;
        UInt160::from_bytes(&bytes).map_err(Into::into)
    }
}

impl Default for PolicyContract {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeContract for PolicyContract {
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
        ctx: &mut NativeCallContext<'_>,
        method: &str,
        args: Vec<StackItem>,
    ) -> ContractResult<StackItem> {
        match method {
            "getFeePerByte" => Ok(StackItem::from_int(fee_per_byte(ctx.snapshot()))),
            "setFeePerByte" => {
                let value = Self::arg_i64(&args, 0)?;
                Self::set_i64(ctx, PREFIX_FEE_PER_BYTE, value, 0, i64::MAX)?;
                Ok(StackItem::Null)
            }
            "getExecFeeFactor" => Ok(StackItem::from_int(exec_fee_factor(ctx.snapshot()))),
            "setExecFeeFactor" => {
                let value = Self::arg_i64(&args, 0)?;
                Self::set_i64(ctx, PREFIX_EXEC_FEE_FACTOR, value, 1, MAX_EXEC_FEE_FACTOR)?;
                Ok(StackItem::Null)
            }
            "getStoragePrice" => Ok(StackItem::from_int(storage_price(ctx.snapshot()))),
            "setStoragePrice" => {
                let value = Self::arg_i64(&args, 0)?;
                Self::set_i64(ctx, PREFIX_STORAGE_PRICE, value, 1, MAX_STORAGE_PRICE)?;
                Ok(StackItem::Null)
            }
            "getAttributeFee" => {
                let attribute_type = Self::arg_i64(&args, 0)? as u8;
                Ok(StackItem::from_int(attribute_fee(
                    ctx.snapshot(),
                    attribute_type,
                )))
            }
            "setAttributeFee" => {
                let attribute_type = Self::arg_i64(&args, 0)? as u8;
                let value = Self::arg_i64(&args, 1)?;
                if !(0..=MAX_ATTRIBUTE_FEE).contains(&value) {
                    return Err(ContractError::InvalidArgument(
                        "attribute fee out of range".to_string(),
                    ));
                }
                Self::require_committee(ctx)?;
                ctx.put_storage(
                    ID,
                    &[PREFIX_ATTRIBUTE_FEE, attribute_type],
                    value.to_le_bytes().to_vec(),
                )?;
                Ok(StackItem::Null)
            }
            "isBlocked" => {
                let account = Self::arg_hash(&args, 0)?;
                Ok(StackItem::from_bool(is_blocked(ctx.snapshot(), &account)))
            }
            "blockAccount" => {
                Self::require_committee(ctx)?;
                let account = Self::arg_hash(&args, 0)?;
                if ctx.host.natives.is_native(&account) {
                    return Err(ContractError::InvalidArgument(
                        "native contracts cannot be blocked".to_string(),
                    ));
                }
                let mut key = vec![PREFIX_BLOCKED_ACCOUNT];
                key.extend_from_slice(account.as_bytes());
                let fresh = ctx.get_storage(ID, &key).is_none();
                if fresh {
                    ctx.put_storage(ID, &key, vec![1])?;
                }
                Ok(StackItem::from_bool(fresh))
            }
            "unblockAccount" => {
                Self::require_committee(ctx)?;
                let account = Self::arg_hash(&args, 0)?;
                let mut key = vec![PREFIX_BLOCKED_ACCOUNT];
                key.extend_from_slice(account.as_bytes());
                let existed = ctx.get_storage(ID, &key).is_some();
                if existed {
                    ctx.delete_storage(ID, &key)?;
                }
                Ok(StackItem::from_bool(existed))
            }
            "getMillisecondsPerBlock" => Ok(StackItem::from_int(milliseconds_per_block(
                ctx.snapshot(),
                ctx.settings().milliseconds_per_block,
            ) as i64)),
            "setMillisecondsPerBlock" => {
                let value = Self::arg_i64(&args, 0)?;
                Self::set_i64(
                    ctx,
                    PREFIX_MILLISECONDS_PER_BLOCK,
                    value,
                    1,
                    MAX_MILLISECONDS_PER_BLOCK,
                )?;
                Ok(StackItem::Null)
            }
            "getMaxValidUntilBlockIncrement" => Ok(StackItem::from_int(
                max_valid_until_block_increment(
                    ctx.snapshot(),
                    ctx.settings().max_valid_until_block_increment,
                ) as i64,
            )),
            "setMaxValidUntilBlockIncrement" => {
                let value = Self::arg_i64(&args, 0)?;
                Self::set_i64(ctx, PREFIX_MAX_VUB_INCREMENT, value, 1, MAX_MAX_VUB_INCREMENT)?;
                Ok(StackItem::Null)
            }
            "getMaxTraceableBlocks" => Ok(StackItem::from_int(
                ctx.settings().max_traceable_blocks as i64,
            )),
            other => Err(ContractError::MethodNotFound(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo3_persistence::{MemoryStore, Snapshot};
    use std::sync::Arc;

    #[test]
    fn defaults_without_storage() {
        let snapshot = Snapshot::on_store(Arc::new(MemoryStore::new())).into_handle();
        assert_eq!(fee_per_byte(&snapshot), 1000);
        assert_eq!(exec_fee_factor(&snapshot), 30);
        assert_eq!(storage_price(&snapshot), 100_000);
        assert_eq!(attribute_fee(&snapshot, 0x01), 0);
        assert!(!is_blocked(&snapshot, &UInt160::zero()));
    }

    #[test]
    fn stored_values_override_defaults() {
        let snapshot = Snapshot::on_store(Arc::new(MemoryStore::new())).into_handle();
        snapshot
            .write()
            .put(
                StorageKey::with_prefix(ID, PREFIX_FEE_PER_BYTE, &[]),
                neo3_persistence::StorageItem::new(5000i64.to_le_bytes().to_vec()),
            )
            .unwrap();
        assert_eq!(fee_per_byte(&snapshot), 5000);
    }
}
