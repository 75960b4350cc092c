// Copyright (C) 2015-2025 The Neo Project.
//
// mod.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Native contracts: deterministic built-ins with fixed negative ids.

pub mod contract_management;
pub mod crypto_lib;
pub mod gas_token;
pub mod ledger_contract;
pub mod neo_token;
pub mod oracle_contract;
pub mod policy_contract;
pub mod role_management;
pub mod std_lib;

use crate::application_engine::HostState;
use crate::contract::Contract;
use crate::error::{ContractError, ContractResult};
use neo3_core::{Block, UInt160};
use neo3_persistence::{SnapshotHandle, StorageItem, StorageKey};
use neo3_vm::{CallFlags, ExecutionEngine, ScriptBuilder, StackItem, VmResult};
use std::collections::HashMap;
use std::sync::Arc;

/// A method exported by a native contract.
#[derive(Debug, Clone)]
pub struct NativeMethod {
    pub name: &'static str,
    /// Price in datoshi charged before dispatch.
    pub price: i64,
    pub required_flags: CallFlags,
    pub parameter_count: usize,
    pub returns_value: bool,
}

impl NativeMethod {
    /// A read-only method.
    pub fn safe(name: &'static str, price: i64, parameter_count: usize) -> Self {
        Self {
            name,
            price,
            required_flags: CallFlags::READ_STATES,
            parameter_count,
            returns_value: true,
        }
    }

    /// A state-changing method.
    pub fn unsafe_method(name: &'static str, price: i64, parameter_count: usize) -> Self {
        Self {
            name,
            price,
            required_flags: CallFlags::STATES,
            parameter_count,
            returns_value: true,
        }
    }

    pub fn returns_nothing(mut self) -> Self {
        self.returns_value = false;
        self
    }
}

/// Host access handed to native implementations.
pub struct NativeCallContext<'a> {
    pub host: &'a mut HostState,
    pub engine: &'a mut ExecutionEngine,
}

impl NativeCallContext<'_> {
    pub fn snapshot(&self) -> &SnapshotHandle {
        &self.host.snapshot
    }

    pub fn settings(&self) -> &neo3_config::ProtocolSettings {
        &self.host.settings
    }

    /// The block currently being persisted; present for the persist
    /// triggers and transaction executions inside a block.
    pub fn persisting_block(&self) -> ContractResult<Arc<Block>> {
        self.host
            .persisting_block
            .clone()
            .ok_or_else(|| ContractError::Execution("no persisting block".to_string()))
    }

    pub fn get_storage(&self, id: i32, key: &[u8]) -> Option<StorageItem> {
        self.host
            .snapshot
            .read()
            .get(&StorageKey::new(id, key.to_vec()))
    }

    pub fn put_storage(&mut self, id: i32, key: &[u8], value: Vec<u8>) -> ContractResult<()> {
        self.host
            .snapshot
            .write()
            .put(StorageKey::new(id, key.to_vec()), StorageItem::new(value))?;
        Ok(())
    }

    pub fn delete_storage(&mut self, id: i32, key: &[u8]) -> ContractResult<()> {
        self.host
            .snapshot
            .write()
            .delete(&StorageKey::new(id, key.to_vec()))?;
        Ok(())
    }

    pub fn find_storage(&self, id: i32, prefix: &[u8]) -> Vec<(StorageKey, StorageItem)> {
        let mut full_prefix = id.to_le_bytes().to_vec();
        full_prefix.extend_from_slice(prefix);
        self.host.snapshot.read().find(&full_prefix)
    }

    pub fn check_witness(&self, account: &UInt160) -> ContractResult<bool> {
        self.host
            .check_witness_hash(self.engine, account)
            .map_err(|e| ContractError::Execution(e.to_string()))
    }

    pub fn check_committee(&self) -> ContractResult<bool> {
        self.host
            .check_committee_witness(self.engine)
            .map_err(|e| ContractError::Execution(e.to_string()))
    }

    /// Emits a notification attributed to the native contract itself.
    pub fn notify(&mut self, contract: UInt160, event_name: &str, state: StackItem) {
        self.host
            .notifications
            .push((contract, event_name.to_string(), state));
    }

    pub fn add_fee(&mut self, datoshi: i64) -> VmResult<()> {
        self.host.add_fee(datoshi)
    }
}

/// A deterministic built-in contract.
pub trait NativeContract: Send + Sync {
    /// The fixed negative id.
    fn id(&self) -> i32;

    fn name(&self) -> &'static str;

    /// The deterministic script hash derived from the name.
    fn hash(&self) -> UInt160;

    fn methods(&self) -> &[NativeMethod];

    /// Dispatches a method call.
    fn invoke(
        &self,
        ctx: &mut NativeCallContext<'_>,
        method: &str,
        args: Vec<StackItem>,
    ) -> ContractResult<StackItem>;

    /// Genesis-time state initialization.
    fn initialize(&self, _ctx: &mut NativeCallContext<'_>) -> ContractResult<()> {
        Ok(())
    }

    /// Invoked by the OnPersist system script.
    fn on_persist(&self, _ctx: &mut NativeCallContext<'_>) -> ContractResult<()> {
        Ok(())
    }

    /// Invoked by the PostPersist system script.
    fn post_persist(&self, _ctx: &mut NativeCallContext<'_>) -> ContractResult<()> {
        Ok(())
    }

    /// Looks a method up by name and arity.
    fn method(&self, name: &str, parameter_count: usize) -> Option<&NativeMethod> {
        self.methods()
            .iter()
            .find(|m| m.name == name && m.parameter_count == parameter_count)
    }
}

/// The hash a native contract occupies, derived from its name alone.
pub fn native_hash(name: &str) -> UInt160 {
    Contract::contract_hash(&UInt160::zero(), 0, name)
}

/// The fixed set of native contracts.
pub struct NativeRegistry {
    // Kept in persist order: Ledger before NEO before GAS.
    contracts: Vec<Arc<dyn NativeContract>>,
    by_hash: HashMap<UInt160, usize>,
    by_id: HashMap<i32, usize>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        let contracts: Vec<Arc<dyn NativeContract>> = vec![
            Arc::new(contract_management::ContractManagement::new()),
            Arc::new(std_lib::StdLib::new()),
            Arc::new(crypto_lib::CryptoLib::new()),
            Arc::new(ledger_contract::LedgerContract::new()),
            Arc::new(neo_token::NeoToken::new()),
            Arc::new(gas_token::GasToken::new()),
            Arc::new(policy_contract::PolicyContract::new()),
            Arc::new(role_management::RoleManagement::new()),
            Arc::new(oracle_contract::OracleContract::new()),
        ];
        let by_hash = contracts
            .iter()
            .enumerate()
            .map(|(i, c)| (c.hash(), i))
            .collect();
        let by_id = contracts
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id(), i))
            .collect();
        Self {
            contracts,
            by_hash,
            by_id,
        }
    }

    pub fn all(&self) -> Vec<Arc<dyn NativeContract>> {
        self.contracts.clone()
    }

    pub fn by_hash(&self, hash: &UInt160) -> Option<Arc<dyn NativeContract>> {
        self.by_hash.get(hash).map(|i| self.contracts[*i].clone())
    }

    pub fn by_id(&self, id: i32) -> Option<Arc<dyn NativeContract>> {
        self.by_id.get(&id).map(|i| self.contracts[*i].clone())
    }

    pub fn by_name(&self, name: &str) -> Option<Arc<dyn NativeContract>> {
        self.contracts.iter().find(|c| c.name() == name).cloned()
    }

    /// Whether `hash` is a native contract.
    pub fn is_native(&self, hash: &UInt160) -> bool {
        self.by_hash.contains_key(hash)
    }

    /// The fixed OnPersist system script.
    pub fn on_persist_script() -> Vec<u8> {
        let mut builder = ScriptBuilder::new();
        builder.emit_syscall("System.Contract.NativeOnPersist");
        builder.to_array()
    }

    /// The fixed PostPersist system script.
    pub fn post_persist_script() -> Vec<u8> {
        let mut builder = ScriptBuilder::new();
        builder.emit_syscall("System.Contract.NativePostPersist");
        builder.to_array()
    }
}

impl Default for NativeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nine_natives_with_fixed_ids() {
        let registry = NativeRegistry::new();
        assert_eq!(registry.all().len(), 9);
        for (id, name) in [
            (-1, "ContractManagement"),
            (-2, "StdLib"),
            (-3, "CryptoLib"),
            (-4, "LedgerContract"),
            (-5, "NeoToken"),
            (-6, "GasToken"),
            (-7, "PolicyContract"),
            (-8, "RoleManagement"),
            (-9, "OracleContract"),
        ] {
            let native = registry.by_id(id).unwrap_or_else(|| panic!("{name}"));
            assert_eq!(native.name(), name);
            assert_eq!(native.hash(), native_hash(name));
            assert!(registry.is_native(&native.hash()));
        }
    }

    #[test]
    fn hashes_are_distinct_and_stable() {
        let registry = NativeRegistry::new();
        let mut hashes: Vec<UInt160> = registry.all().iter().map(|c| c.hash()).collect();
        hashes.sort();
        hashes.dedup();
        assert_eq!(hashes.len(), 9);
        // The derivation depends only on the name.
        assert_eq!(
            registry.by_id(-6).unwrap().hash(),
            native_hash("GasToken")
        );
    }

    #[test]
    fn persist_order_runs_ledger_before_tokens() {
        let registry = NativeRegistry::new();
        let order: Vec<i32> = registry.all().iter().map(|c| c.id()).collect();
        let ledger = order.iter().position(|id| *id == -4).unwrap();
        let neo = order.iter().position(|id| *id == -5).unwrap();
        let gas = order.iter().position(|id| *id == -6).unwrap();
        assert!(ledger < neo && neo < gas);
    }
}
