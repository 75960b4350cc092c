// Copyright (C) 2015-2025 The Neo Project.
//
// ledger_contract.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Ledger native contract: block and transaction records.

use super::{native_hash, NativeCallContext, NativeContract, NativeMethod};
use crate::error::{ContractError, ContractResult};
use neo3_core::{Block, Transaction, UInt160, UInt256};
use neo3_persistence::{SnapshotHandle, StorageItem, StorageKey};
use neo3_vm::{StackItem, VMState};
use num_traits::ToPrimitive;
use once_cell::sync::Lazy;
use neo3_io::SerializableExt;

pub const ID: i32 = -4;
const NAME: &str = "LedgerContract";

static HASH: Lazy<UInt160> = Lazy::new(|| native_hash(NAME));

const PREFIX_BLOCK: u8 = 5;
const PREFIX_BLOCK_HASH: u8 = 9;
const PREFIX_TRANSACTION: u8 = 11;
const PREFIX_CURRENT_BLOCK: u8 = 12;

/// A stored transaction: its containing block, execution state and body.
#[derive(Debug, Clone)]
pub struct TransactionState {
    pub block_index: u32,
    pub vm_state: u8,
    pub transaction: Transaction,
}

fn current_key() -> StorageKey {
    StorageKey::with_prefix(ID, PREFIX_CURRENT_BLOCK, &[])
}

fn block_key(hash: &UInt256) -> StorageKey {
    StorageKey::with_prefix(ID, PREFIX_BLOCK, hash.as_bytes())
}

fn hash_key(index: u32) -> StorageKey {
    StorageKey::with_prefix(ID, PREFIX_BLOCK_HASH, &index.to_le_bytes())
}

fn transaction_key(hash: &UInt256) -> StorageKey {
    StorageKey::with_prefix(ID, PREFIX_TRANSACTION, hash.as_bytes())
}

/// The committed tip, when a block has been persisted.
pub fn current(snapshot: &SnapshotHandle) -> Option<(UInt256, u32)> {
    let item = snapshot.read().get(&current_key())?;
    if item.value.len() != 36 {
        return None;
    }
    let hash = UInt256::from_bytes(&item.value[..32]).ok()?;
    let index = u32::from_le_bytes(item.value[32..36].try_into().ok()?);
    Some((hash, index))
}

/// The committed tip height; `None` before genesis.
pub fn current_index(snapshot: &SnapshotHandle) -> Option<u32> {
    current(snapshot).map(|(_, index)| index)
}

/// The block hash at `index`.
pub fn get_block_hash(snapshot: &SnapshotHandle, index: u32) -> Option<UInt256> {
    let item = snapshot.read().get(&hash_key(index))?;
    UInt256::from_bytes(&item.value).ok()
}

/// The full block stored under `hash`.
pub fn get_block(snapshot: &SnapshotHandle, hash: &UInt256) -> Option<Block> {
    let item = snapshot.read().get(&block_key(hash))?;
    Block::from_array(&item.value).ok()
}

/// A stored transaction with its execution state.
pub fn get_transaction_state(
    snapshot: &SnapshotHandle,
    hash: &UInt256,
) -> Option<TransactionState> {
    let item = snapshot.read().get(&transaction_key(hash))?;
    if item.value.len() < 5 {
        return None;
    }
    let block_index = u32::from_le_bytes(item.value[..4].try_into().ok()?);
    let vm_state = item.value[4];
    let transaction = Transaction::from_array(&item.value[5..]).ok()?;
    Some(TransactionState {
        block_index,
        vm_state,
        transaction,
    })
}

/// Whether the ledger already contains a committed transaction.
pub fn contains_transaction(snapshot: &SnapshotHandle, hash: &UInt256) -> bool {
    snapshot.read().contains(&transaction_key(hash))
}

/// Records the block and its transactions; invoked during OnPersist.
pub fn put_block(snapshot: &SnapshotHandle, block: &Block) -> ContractResult<()> {
    let hash = block.hash()?;
    let mut snapshot = snapshot.write();
    snapshot.put(block_key(&hash), StorageItem::new(block.to_array()?))?;
    snapshot.put(
        hash_key(block.index()),
        StorageItem::new(hash.to_bytes()),
    )?;
    for tx in &block.transactions {
        let mut value = Vec::with_capacity(5 + tx.size());
        value.extend_from_slice(&block.index().to_le_bytes());
        value.push(0); // NONE until execution records the outcome
        value.extend_from_slice(&tx.to_array()?);
        snapshot.put(transaction_key(&tx.hash()?), StorageItem::new(value))?;
    }
    let mut tip = Vec::with_capacity(36);
    tip.extend_from_slice(hash.as_bytes());
    tip.extend_from_slice(&block.index().to_le_bytes());
    snapshot.put(current_key(), StorageItem::new(tip))?;
    Ok(())
}

/// Updates the stored execution state of a committed transaction.
pub fn set_transaction_state(
    snapshot: &SnapshotHandle,
    hash: &UInt256,
    state: VMState,
) -> ContractResult<()> {
    let key = transaction_key(hash);
    let Some(mut item) = snapshot.read().get(&key) else {
        return Err(ContractError::Execution(format!(
            "transaction {hash} is not stored"
        )));
    };
    if item.value.len() < 5 {
        return Err(ContractError::Execution("corrupt transaction record".to_string()));
    }
    item.value[4] = match state {
        VMState::HALT => 1,
        VMState::FAULT => 2,
        _ => 0,
    };
    snapshot.write().put(key, item)?;
    Ok(())
}

fn block_to_item(block: &Block) -> ContractResult<StackItem> {
    Ok(StackItem::new_array(vec![
        StackItem::from_bytes(block.hash()?.to_bytes()),
        StackItem::from_int(block.header.version as i64),
        StackItem::from_bytes(block.header.prev_hash.to_bytes()),
        StackItem::from_bytes(block.header.merkle_root.to_bytes()),
        StackItem::from_int(block.header.timestamp as i64),
        StackItem::from_int(block.header.nonce as i64),
        StackItem::from_int(block.header.index as i64),
        StackItem::from_int(block.header.primary_index as i64),
        StackItem::from_bytes(block.header.next_consensus.to_bytes()),
        StackItem::from_int(block.transactions.len() as i64),
    ]))
}

fn transaction_to_item(tx: &Transaction) -> ContractResult<StackItem> {
    Ok(StackItem::new_array(vec![
        StackItem::from_bytes(tx.hash()?.to_bytes()),
        StackItem::from_int(tx.version as i64),
        StackItem::from_int(tx.nonce as i64),
        StackItem::from_bytes(tx.sender().map(|s| s.to_bytes()).unwrap_or_default()),
        StackItem::from_int(tx.system_fee),
        StackItem::from_int(tx.network_fee),
        StackItem::from_int(tx.valid_until_block as i64),
        StackItem::from_bytes(tx.script.clone()),
    ]))
}

pub struct LedgerContract {
    methods: Vec<NativeMethod>,
}

impl LedgerContract {
    pub fn new() -> Self {
        Self {
            methods: vec![
                NativeMethod::safe("currentHash", 1 << 15, 0),
                NativeMethod::safe("currentIndex", 1 << 15, 0),
                NativeMethod::safe("getBlock", 1 << 15, 1),
                NativeMethod::safe("getTransaction", 1 << 15, 1),
                NativeMethod::safe("getTransactionHeight", 1 << 15, 1),
                NativeMethod::safe("getTransactionFromBlock", 1 << 16, 2),
                NativeMethod::safe("getTransactionVMState", 1 << 15, 1),
            ],
        }
    }

    /// Blocks older than MaxTraceableBlocks are invisible to contracts.
    fn is_traceable(ctx: &NativeCallContext<'_>, index: u32) -> bool {
        let Some(current) = current_index(ctx.snapshot()) else {
            return false;
        };
        index <= current
            && current - index < ctx.settings().max_traceable_blocks
    }

    fn resolve_block(
        ctx: &NativeCallContext<'_>,
        arg: &StackItem,
    ) -> ContractResult<Option<Block>> {
        let bytes = arg.as_bytes().map_err(ContractError::Vm)?;
        let hash = match bytes.len() {
            32 => UInt256::from_bytes(&bytes)?,
            _ => {
                let index = arg
                    .as_int()
                    .map_err(ContractError::Vm)?
                    .to_u32()
                    .ok_or_else(|| {
                        ContractError::InvalidArgument("invalid block index".to_string())
                    })?;
                match get_block_hash(ctx.snapshot(), index) {
                    Some(hash) => hash,
                    None => return Ok(None),
                }
            }
        };
        Ok(get_block(ctx.snapshot(), &hash)
            .filter(|block| Self::is_traceable(ctx, block.index())))
    }
}

impl Default for LedgerContract {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeContract for LedgerContract {
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

    fn on_persist(&self, ctx: &mut NativeCallContext<'_>) -> ContractResult<()> {
        let block = ctx.persisting_block()?;
        put_block(ctx.snapshot(), &block)
    }

    fn invoke(
        &self,
        ctx: &mut NativeCallContext<'_>,
        method: &str,
        args: Vec<StackItem>,
    ) -> ContractResult<StackItem> {
        match method {
            "currentHash" => match current(ctx.snapshot()) {
                Some((hash, _)) => Ok(StackItem::from_bytes(hash.to_bytes())),
                None => Ok(StackItem::Null),
            },
            "currentIndex" => match current_index(ctx.snapshot()) {
                Some(index) => Ok(StackItem::from_int(index as i64)),
                None => Ok(StackItem::from_int(-1)),
            },
            "getBlock" => match Self::resolve_block(ctx, &args[0])? {
                Some(block) => block_to_item(&block),
                None => Ok(StackItem::Null),
            },
            "getTransaction" => {
                let hash = UInt256::from_bytes(
                    &args[0].as_bytes().map_err(ContractError::Vm)?,
                )?;
                match get_transaction_state(ctx.snapshot(), &hash) {
                    Some(state) if Self::is_traceable(ctx, state.block_index) => {
                        transaction_to_item(&state.transaction)
                    }
                    _ => Ok(StackItem::Null),
                }
            }
            "getTransactionHeight" => {
                let hash = UInt256::from_bytes(
                    &args[0].as_bytes().map_err(ContractError::Vm)?,
                )?;
                match get_transaction_state(ctx.snapshot(), &hash) {
                    Some(state) if Self::is_traceable(ctx, state.block_index) => {
                        Ok(StackItem::from_int(state.block_index as i64))
                    }
                    _ => Ok(StackItem::from_int(-1)),
                }
            }
            "getTransactionFromBlock" => {
                let index = args[1]
                    .as_int()
                    .map_err(ContractError::Vm)?
                    .to_usize()
                    .ok_or_else(|| {
                        ContractError::InvalidArgument("invalid transaction index".to_string())
                    })?;
                match Self::resolve_block(ctx, &args[0])? {
                    Some(block) => match block.transactions.get(index) {
                        Some(tx) => transaction_to_item(tx),
                        None => Ok(StackItem::Null),
                    },
                    None => Ok(StackItem::Null),
                }
            }
            "getTransactionVMState" => {
                let hash = UInt256::from_bytes(
                    &args[0].as_bytes().map_err(ContractError::Vm)?,
                )?;
                match get_transaction_state(ctx.snapshot(), &hash) {
                    Some(state) => Ok(StackItem::from_int(state.vm_state as i64)),
                    None => Ok(StackItem::from_int(0)),
                }
            }
            other => Err(ContractError::MethodNotFound(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo3_core::{Header, Signer, Witness};
    use neo3_persistence::{MemoryStore, Snapshot};
    use std::sync::Arc;

    fn sample_block(index: u32) -> Block {
        let mut tx = Transaction::new();
        tx.nonce = index;
        tx.valid_until_block = index + 100;
        tx.signers = vec![Signer::called_by_entry(UInt160::from_script(b"s"))];
        tx.script = vec![0x11, 0x40];
        tx.witnesses = vec![Witness::empty()];
        let transactions = vec![tx];
        Block {
            header: Header {
                version: 0,
                prev_hash: UInt256::zero(),
                merkle_root: Block::compute_merkle_root(&transactions).unwrap(),
                timestamp: 1000 + index as u64,
                nonce: 1,
                index,
                primary_index: 0,
                next_consensus: UInt160::zero(),
                witness: Witness::empty(),
            },
            transactions,
        }
    }

    #[test]
    fn put_block_updates_tip_and_indexes() {
        let snapshot = Snapshot::on_store(Arc::new(MemoryStore::new())).into_handle();
        let block = sample_block(0);
        put_block(&snapshot, &block).unwrap();

        let (hash, index) = current(&snapshot).unwrap();
        assert_eq!(index, 0);
        assert_eq!(hash, block.hash().unwrap());
        assert_eq!(get_block_hash(&snapshot, 0), Some(hash));
        assert_eq!(get_block(&snapshot, &hash).unwrap(), block);

        let tx_hash = block.transactions[0].hash().unwrap();
        let state = get_transaction_state(&snapshot, &tx_hash).unwrap();
        assert_eq!(state.block_index, 0);
        assert_eq!(state.vm_state, 0);
    }

    #[test]
    fn transaction_state_update() {
        let snapshot = Snapshot::on_store(Arc::new(MemoryStore::new())).into_handle();
        let block = sample_block(0);
        put_block(&snapshot, &block).unwrap();
        let tx_hash = block.transactions[0].hash().unwrap();

        set_transaction_state(&snapshot, &tx_hash, VMState::HALT).unwrap();
        assert_eq!(get_transaction_state(&snapshot, &tx_hash).unwrap().vm_state, 1);

        set_transaction_state(&snapshot, &tx_hash, VMState::FAULT).unwrap();
        assert_eq!(get_transaction_state(&snapshot, &tx_hash).unwrap().vm_state, 2);
    }

    #[test]
    fn missing_tip_before_genesis() {
        let snapshot = Snapshot::on_store(Arc::new(MemoryStore::new())).into_handle();
        assert!(current(&snapshot).is_none());
        assert!(!contains_transaction(&snapshot, &UInt256::zero()));
    }
}
