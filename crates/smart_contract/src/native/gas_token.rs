// Copyright (C) 2015-2025 The Neo Project.
//
// gas_token.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! GAS native contract: the NEP-17 utility token paying for execution.

use super::{native_hash, neo_token, NativeCallContext, NativeContract, NativeMethod};
use crate::contract::Contract;
use crate::error::{ContractError, ContractResult};
use neo3_core::UInt160;
use neo3_cryptography::ECPoint;
use neo3_persistence::{SnapshotHandle, StorageItem, StorageKey};
use neo3_vm::StackItem;
use num_traits::ToPrimitive;
use once_cell::sync::Lazy;

pub const ID: i32 = -6;
const NAME: &str = "GasToken";

static HASH: Lazy<UInt160> = Lazy::new(|| native_hash(NAME));

const PREFIX_TOTAL_SUPPLY: u8 = 11;
const PREFIX_ACCOUNT: u8 = 20;

pub const DECIMALS: u32 = 8;
pub const SYMBOL: &str = "GAS";

/// The script hash of the GAS native contract.
pub fn gas_hash() -> UInt160 {
    *HASH
}

fn account_key(account: &UInt160) -> StorageKey {
    StorageKey::with_prefix(ID, PREFIX_ACCOUNT, account.as_bytes())
}

fn supply_key() -> StorageKey {
    StorageKey::with_prefix(ID, PREFIX_TOTAL_SUPPLY, &[])
}

/// The GAS balance of an account, in datoshi.
pub fn balance_of(snapshot: &SnapshotHandle, account: &UInt160) -> i64 {
    snapshot
        .read()
        .get(&account_key(account))
        .and_then(|item| item.value.try_into().ok().map(i64::from_le_bytes))
        .unwrap_or(0)
}

/// The total GAS supply, in datoshi.
pub fn total_supply(snapshot: &SnapshotHandle) -> i64 {
    snapshot
        .read()
        .get(&supply_key())
        .and_then(|item| item.value.try_into().ok().map(i64::from_le_bytes))
        .unwrap_or(0)
}

fn write_balance(snapshot: &SnapshotHandle, account: &UInt160, balance: i64) -> ContractResult<()> {
    let mut snapshot = snapshot.write();
    if balance == 0 {
        snapshot.delete(&account_key(account))?;
    } else {
        snapshot.put(
            account_key(account),
            StorageItem::new(balance.to_le_bytes().to_vec()),
        )?;
    }
    Ok(())
}

fn write_supply(snapshot: &SnapshotHandle, supply: i64) -> ContractResult<()> {
    snapshot
        .write()
        .put(supply_key(), StorageItem::new(supply.to_le_bytes().to_vec()))?;
    Ok(())
}

fn transfer_notification(
    ctx: &mut NativeCallContext<'_>,
    from: Option<&UInt160>,
    to: Option<&UInt160>,
    amount: i64,
) {
    let state = StackItem::new_array(vec![
        from.map(|f| StackItem::from_bytes(f.to_bytes()))
            .unwrap_or(StackItem::Null),
        to.map(|t| StackItem::from_bytes(t.to_bytes()))
            .unwrap_or(StackItem::Null),
        StackItem::from_int(amount),
    ]);
    ctx.notify(*HASH, "Transfer", state);
}

/// Creates GAS out of thin air; only the protocol itself calls this.
pub fn mint(
    ctx: &mut NativeCallContext<'_>,
    account: &UInt160,
    amount: i64,
) -> ContractResult<()> {
    if amount < 0 {
        return Err(ContractError::InvalidArgument("negative mint".to_string()));
    }
    if amount == 0 {
        return Ok(());
    }
    let balance = balance_of(ctx.snapshot(), account);
    write_balance(ctx.snapshot(), account, balance + amount)?;
    write_supply(ctx.snapshot(), total_supply(ctx.snapshot()) + amount)?;
    transfer_notification(ctx, None, Some(account), amount);
    Ok(())
}

/// Returns the unspent part of a transaction's system fee to its
/// sender once execution has settled. OnPersist burned the declared
/// fee in full, so the sender only ends up paying for the gas the
/// script actually consumed.
pub fn refund_unspent_gas(
    snapshot: &SnapshotHandle,
    account: &UInt160,
    amount: i64,
) -> ContractResult<()> {
    if amount <= 0 {
        return Ok(());
    }
    let balance = balance_of(snapshot, account);
    write_balance(snapshot, account, balance + amount)?;
    write_supply(snapshot, total_supply(snapshot) + amount)
}

/// Destroys GAS from an account; fees are burned this way.
pub fn burn(
    ctx: &mut NativeCallContext<'_>,
    account: &UInt160,
    amount: i64,
) -> ContractResult<()> {
    if amount < 0 {
        return Err(ContractError::InvalidArgument("negative burn".to_string()));
    }
    if amount == 0 {
        return Ok(());
    }
    let balance = balance_of(ctx.snapshot(), account);
    if balance < amount {
        return Err(ContractError::InsufficientFunds(format!(
            "account {account} holds {balance} datoshi, burning {amount}"
        )));
    }
    write_balance(ctx.snapshot(), account, balance - amount)?;
    write_supply(ctx.snapshot(), total_supply(ctx.snapshot()) - amount)?;
    transfer_notification(ctx, Some(account), None, amount);
    Ok(())
}

pub struct GasToken {
    methods: Vec<NativeMethod>,
}

impl GasToken {
    pub fn new() -> Self {
        Self {
            methods: vec![
                NativeMethod::safe("symbol", 0, 0),
                NativeMethod::safe("decimals", 0, 0),
                NativeMethod::safe("totalSupply", 1 << 15, 0),
                NativeMethod::safe("balanceOf", 1 << 15, 1),
                NativeMethod::unsafe_method("transfer", 1 << 17, 4),
            ],
        }
    }
}

impl Default for GasToken {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeContract for GasToken {
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

    /// Mints the genesis distribution to the standby validators.
    fn initialize(&self, ctx: &mut NativeCallContext<'_>) -> ContractResult<()> {
        if total_supply(ctx.snapshot()) > 0 {
            return Ok(());
        }
        let keys: ContractResult<Vec<ECPoint>> = ctx
            .settings()
            .standby_validators()
            .iter()
            .map(|hex| ECPoint::from_hex(hex).map_err(Into::into))
            .collect();
        let account = Contract::validators_address(&keys?)?;
        let amount = ctx.settings().initial_gas_distribution;
        mint(ctx, &account, amount)
    }

    /// Burns every confirmed transaction's fees from its sender, then
    /// pays the collected network fees to the block's primary.
    fn on_persist(&self, ctx: &mut NativeCallContext<'_>) -> ContractResult<()> {
        let block = ctx.persisting_block()?;
        let mut network_fees: i64 = 0;
        for tx in &block.transactions {
            let sender = tx.sender().ok_or_else(|| {
                ContractError::Execution("transaction without sender".to_string())
            })?;
            burn(ctx, &sender, tx.system_fee + tx.network_fee)?;
            network_fees += tx.network_fee;
        }
        if network_fees > 0 {
            let validators = neo_token::next_block_validators(ctx.snapshot(), ctx.settings())?;
            let primary = validators
                .get(block.header.primary_index as usize)
                .ok_or_else(|| {
                    ContractError::Execution("primary index out of range".to_string())
                })?;
            let account = Contract::signature_contract_hash(primary);
            mint(ctx, &account, network_fees)?;
        }
        Ok(())
    }

    fn invoke(
        &self,
        ctx: &mut NativeCallContext<'_>,
        method: &str,
        args: Vec<StackItem>,
    ) -> ContractResult<StackItem> {
        match method {
            "symbol" => Ok(StackItem::from_bytes(SYMBOL.as_bytes().to_vec())),
            "decimals" => Ok(StackItem::from_int(DECIMALS as i64)),
            "totalSupply" => Ok(StackItem::from_int(total_supply(ctx.snapshot()))),
            "balanceOf" => {
                let account =
                    UInt160::from_bytes(&args[0].as_bytes().map_err(ContractError::Vm)?)?;
                Ok(StackItem::from_int(balance_of(ctx.snapshot(), &account)))
            }
            "transfer" => {
                let from = UInt160::from_bytes(&args[0].as_bytes().map_err(ContractError::Vm)?)?;
                let to = UInt160::from_bytes(&args[1].as_bytes().map_err(ContractError::Vm)?)?;
                let amount = args[2]
                    .as_int()
                    .map_err(ContractError::Vm)?
                    .to_i64()
                    .ok_or_else(|| {
                        ContractError::InvalidArgument("amount out of range".to_string())
                    })?;
                if amount < 0 {
                    return Err(ContractError::InvalidArgument(
                        "negative transfer amount".to_string(),
                    ));
                }
                if !ctx.check_witness(&from)? {
                    return Ok(StackItem::from_bool(false));
                }
                let from_balance = balance_of(ctx.snapshot(), &from);
                if from_balance < amount {
                    return Ok(StackItem::from_bool(false));
                }
                if from != to && amount > 0 {
                    write_balance(ctx.snapshot(), &from, from_balance - amount)?;
                    let to_balance = balance_of(ctx.snapshot(), &to);
                    write_balance(ctx.snapshot(), &to, to_balance + amount)?;
                }
                transfer_notification(ctx, Some(&from), Some(&to), amount);
                Ok(StackItem::from_bool(true))
            }
            other => Err(ContractError::MethodNotFound(other.to_string())),
        }
    }
}

/// The sum of fees a block burns; used by tests asserting supply deltas.
pub fn block_fees(transactions: &[neo3_core::Transaction]) -> i64 {
    transactions
        .iter()
        .map(|tx| tx.system_fee + tx.network_fee)
        .sum()
}
