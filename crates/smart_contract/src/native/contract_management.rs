// Copyright (C) 2015-2025 The Neo Project.
//
// contract_management.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! ContractManagement native contract: deploy, update and destroy.

use super::{native_hash, NativeCallContext, NativeContract, NativeMethod};
use crate::contract::Contract;
use crate::contract_state::{ContractState, NefFile};
use crate::error::{ContractError, ContractResult};
use crate::manifest::ContractManifest;
use neo3_config::DATOSHI_PER_GAS;
use neo3_core::UInt160;
use neo3_io::SerializableExt;
use neo3_persistence::{SnapshotHandle, StorageItem, StorageKey};
use neo3_vm::{CallFlags, StackItem};
use num_traits::ToPrimitive;
use once_cell::sync::Lazy;

pub const ID: i32 = -1;
const NAME: &str = "ContractManagement";

static HASH: Lazy<UInt160> = Lazy::new(|| native_hash(NAME));

const PREFIX_CONTRACT: u8 = 8;
const PREFIX_CONTRACT_HASH: u8 = 12;
const PREFIX_NEXT_ID: u8 = 15;
const PREFIX_MIN_DEPLOY_FEE: u8 = 20;

pub const DEFAULT_MIN_DEPLOY_FEE: i64 = 10 * DATOSHI_PER_GAS;

fn contract_key(hash: &UInt160) -> StorageKey {
    StorageKey::with_prefix(ID, PREFIX_CONTRACT, hash.as_bytes())
}

fn id_key(id: i32) -> StorageKey {
    StorageKey::with_prefix(ID, PREFIX_CONTRACT_HASH, &id.to_be_bytes())
}

/// Looks a deployed contract up by hash.
pub fn get_contract(snapshot: &SnapshotHandle, hash: &UInt160) -> Option<ContractState> {
    let item = snapshot.read().get(&contract_key(hash))?;
    ContractState::from_storage_bytes(&item.value).ok()
}

/// Looks a deployed contract up by id.
pub fn get_contract_by_id(snapshot: &SnapshotHandle, id: i32) -> Option<ContractState> {
    let item = snapshot.read().get(&id_key(id))?;
    let hash = UInt160::from_bytes(&item.value).ok()?;
    get_contract(snapshot, &hash)
}

/// The minimum fee charged for deployment.
pub fn minimum_deployment_fee(snapshot: &SnapshotHandle) -> i64 {
    snapshot
        .read()
        .get(&StorageKey::with_prefix(ID, PREFIX_MIN_DEPLOY_FEE, &[]))
        .and_then(|item| item.value.try_into().ok().map(i64::from_le_bytes))
        .unwrap_or(DEFAULT_MIN_DEPLOY_FEE)
}

fn next_available_id(snapshot: &SnapshotHandle) -> ContractResult<i32> {
    let key = StorageKey::with_prefix(ID, PREFIX_NEXT_ID, &[]);
    let next = snapshot
        .read()
        .get(&key)
        .and_then(|item| item.value.try_into().ok().map(i32::from_le_bytes))
        .unwrap_or(1);
    snapshot
        .write()
        .put(key, StorageItem::new((next + 1).to_le_bytes().to_vec()))?;
    Ok(next)
}

fn write_contract(snapshot: &SnapshotHandle, state: &ContractState) -> ContractResult<()> {
    let bytes = state.to_storage_bytes()?;
    let mut snapshot = snapshot.write();
    snapshot.put(contract_key(&state.hash), StorageItem::new(bytes))?;
    snapshot.put(
        id_key(state.id),
        StorageItem::new(state.hash.to_bytes()),
    )?;
    Ok(())
}

fn contract_to_item(state: &ContractState) -> ContractResult<StackItem> {
    Ok(StackItem::new_array(vec![
        StackItem::from_int(state.id as i64),
        StackItem::from_int(state.update_counter as i64),
        StackItem::from_bytes(state.hash.to_bytes()),
        StackItem::from_bytes(state.nef.to_array()?),
        StackItem::from_bytes(state.manifest.to_json_bytes()?),
    ]))
}

pub struct ContractManagement {
    methods: Vec<NativeMethod>,
}

impl ContractManagement {
    pub fn new() -> Self {
        Self {
            methods: vec![
                NativeMethod::safe("getContract", 1 << 15, 1),
                NativeMethod::safe("getContractById", 1 << 15, 1),
                NativeMethod::safe("hasMethod", 1 << 15, 3),
                NativeMethod::safe("getMinimumDeploymentFee", 1 << 15, 0),
                NativeMethod::unsafe_method("setMinimumDeploymentFee", 1 << 15, 1)
                    .returns_nothing(),
                NativeMethod::unsafe_method("deploy", 0, 2),
                NativeMethod::unsafe_method("deploy", 0, 3),
                NativeMethod::unsafe_method("update", 0, 2).returns_nothing(),
                NativeMethod::unsafe_method("update", 0, 3).returns_nothing(),
                NativeMethod::unsafe_method("destroy", 1 << 15, 0).returns_nothing(),
            ],
        }
    }

    fn deploy(
        &self,
        ctx: &mut NativeCallContext<'_>,
        nef_bytes: Vec<u8>,
        manifest_bytes: Vec<u8>,
        data: StackItem,
    ) -> ContractResult<StackItem> {
        let nef = NefFile::from_array(&nef_bytes)?;
        nef.verify_checksum()?;
        let manifest = ContractManifest::from_json_bytes(&manifest_bytes)?;

        let sender = ctx
            .host
            .container
            .as_ref()
            .and_then(|c| c.transaction())
            .and_then(|tx| tx.sender())
            .ok_or_else(|| {
                ContractError::Execution("deployment requires a transaction sender".to_string())
            })?;

        ctx.add_fee(minimum_deployment_fee(ctx.snapshot()))
            .map_err(ContractError::Vm)?;

        let hash = Contract::contract_hash(&sender, nef.checksum, &manifest.name);
        if get_contract(ctx.snapshot(), &hash).is_some() || ctx.host.natives.is_native(&hash) {
            return Err(ContractError::InvalidArgument(format!(
                "contract {hash} already exists"
            )));
        }

        let state = ContractState {
            id: next_available_id(ctx.snapshot())?,
            update_counter: 0,
            hash,
            nef,
            manifest,
        };
        write_contract(ctx.snapshot(), &state)?;

        ctx.notify(
            *HASH,
            "Deploy",
            StackItem::new_array(vec![StackItem::from_bytes(hash.to_bytes())]),
        );

        // Run the contract's _deploy hook when it exports one.
        if state.manifest.method_by_name("_deploy").is_some() {
            ctx.host.load_contract_method(
                ctx.engine,
                &state,
                "_deploy",
                vec![data, StackItem::from_bool(false)],
                CallFlags::ALL,
            )?;
        }

        contract_to_item(&state)
    }

    /// The contract invoking ContractManagement; update and destroy act
    /// on the caller itself.
    fn calling_contract(ctx: &NativeCallContext<'_>) -> ContractResult<ContractState> {
        let hash = ctx
            .host
            .current_script_hash(ctx.engine)
            .map_err(ContractError::Vm)?;
        get_contract(ctx.snapshot(), &hash)
            .ok_or_else(|| ContractError::ContractNotFound(hash.to_string()))
    }
}

impl Default for ContractManagement {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeContract for ContractManagement {
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
            "getContract" => {
                let hash = UInt160::from_bytes(&args[0].as_bytes().map_err(ContractError::Vm)?)?;
                match get_contract(ctx.snapshot(), &hash) {
                    Some(state) => contract_to_item(&state),
                    None => Ok(StackItem::Null),
                }
            }
            "getContractById" => {
                let id = args[0]
                    .as_int()
                    .map_err(ContractError::Vm)?
                    .to_i32()
                    .ok_or_else(|| {
                        ContractError::InvalidArgument("invalid contract id".to_string())
                    })?;
                match get_contract_by_id(ctx.snapshot(), id) {
                    Some(state) => contract_to_item(&state),
                    None => Ok(StackItem::Null),
                }
            }
            "hasMethod" => {
                let hash = UInt160::from_bytes(&args[0].as_bytes().map_err(ContractError::Vm)?)?;
                let name = String::from_utf8(args[1].as_bytes().map_err(ContractError::Vm)?)
                    .map_err(|_| {
                        ContractError::InvalidArgument("non-UTF-8 method name".to_string())
                    })?;
                let parameter_count = args[2]
                    .as_int()
                    .map_err(ContractError::Vm)?
                    .to_usize()
                    .ok_or_else(|| {
                        ContractError::InvalidArgument("invalid parameter count".to_string())
                    })?;
                let found = get_contract(ctx.snapshot(), &hash)
                    .map(|state| state.manifest.method(&name, parameter_count).is_some())
                    .unwrap_or(false);
                Ok(StackItem::from_bool(found))
            }
            "getMinimumDeploymentFee" => Ok(StackItem::from_int(minimum_deployment_fee(
                ctx.snapshot(),
            ))),
            "setMinimumDeploymentFee" => {
                let fee = args[0]
                    .as_int()
                    .map_err(ContractError::Vm)?
                    .to_i64()
                    .filter(|f| *f >= 0)
                    .ok_or_else(|| {
                        ContractError::InvalidArgument("invalid deployment fee".to_string())
                    })?;
                if !ctx.check_committee()? {
                    return Err(ContractError::Unauthorized(
                        "committee witness required".to_string(),
                    ));
                }
                ctx.put_storage(ID, &[PREFIX_MIN_DEPLOY_FEE], fee.to_le_bytes().to_vec())?;
                Ok(StackItem::Null)
            }
            "deploy" => {
                let nef_bytes = args[0].as_bytes().map_err(ContractError::Vm)?;
                let manifest_bytes = args[1].as_bytes().map_err(ContractError::Vm)?;
                let data = args.get(2).cloned().unwrap_or(StackItem::Null);
                self.deploy(ctx, nef_bytes, manifest_bytes, data)
            }
            "update" => {
                let nef_bytes = args[0].as_bytes().map_err(ContractError::Vm)?;
                let manifest_bytes = args[1].as_bytes().map_err(ContractError::Vm)?;
                let mut state = Self::calling_contract(ctx)?;
                let nef = NefFile::from_array(&nef_bytes)?;
                nef.verify_checksum()?;
                let manifest = ContractManifest::from_json_bytes(&manifest_bytes)?;
                if manifest.name != state.manifest.name {
                    return Err(ContractError::InvalidArgument(
                        "updated manifest must keep the contract name".to_string(),
                    ));
                }
                state.nef = nef;
                state.manifest = manifest;
                state.update_counter += 1;
                write_contract(ctx.snapshot(), &state)?;
                ctx.notify(
                    *HASH,
                    "Update",
                    StackItem::new_array(vec![StackItem::from_bytes(state.hash.to_bytes())]),
                );
                Ok(StackItem::Null)
            }
            "destroy" => {
                let state = Self::calling_contract(ctx)?;
                {
                    let mut snapshot = ctx.snapshot().write();
                    snapshot.delete(&contract_key(&state.hash))?;
                    snapshot.delete(&id_key(state.id))?;
                }
                // Drop the contract's entire storage area.
                let keys: Vec<StorageKey> = ctx
                    .find_storage(state.id, &[])
                    .into_iter()
                    .map(|(key, _)| key)
                    .collect();
                {
                    let mut snapshot = ctx.snapshot().write();
                    for key in keys {
                        snapshot.delete(&key)?;
                    }
                }
                ctx.notify(
                    *HASH,
                    "Destroy",
                    StackItem::new_array(vec![StackItem::from_bytes(state.hash.to_bytes())]),
                );
                Ok(StackItem::Null)
            }
            other => Err(ContractError::MethodNotFound(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::MethodDescriptor;
    use neo3_persistence::{MemoryStore, Snapshot};
    use std::sync::Arc;

    fn sample_state(snapshot: &SnapshotHandle) -> ContractState {
        let nef = NefFile::new("test", vec![0x11, 0x40]).unwrap();
        let mut manifest = ContractManifest::new("Token");
        manifest.abi.methods.push(MethodDescriptor {
            name: "main".to_string(),
            parameters: vec![],
            offset: 0,
            return_type: "Integer".to_string(),
            safe: true,
        });
        let state = ContractState {
            id: next_available_id(snapshot).unwrap(),
            update_counter: 0,
            hash: Contract::contract_hash(&UInt160::zero(), nef.checksum, "Token"),
            nef,
            manifest,
        };
        write_contract(snapshot, &state).unwrap();
        state
    }

    #[test]
    fn contract_lookup_by_hash_and_id() {
        let snapshot = Snapshot::on_store(Arc::new(MemoryStore::new())).into_handle();
        let state = sample_state(&snapshot);
        assert_eq!(state.id, 1);

        let by_hash = get_contract(&snapshot, &state.hash).unwrap();
        assert_eq!(by_hash.manifest.name, "Token");
        let by_id = get_contract_by_id(&snapshot, state.id).unwrap();
        assert_eq!(by_id.hash, state.hash);
    }

    #[test]
    fn ids_are_sequential() {
        let snapshot = Snapshot::on_store(Arc::new(MemoryStore::new())).into_handle();
        assert_eq!(next_available_id(&snapshot).unwrap(), 1);
        assert_eq!(next_available_id(&snapshot).unwrap(), 2);
        assert_eq!(next_available_id(&snapshot).unwrap(), 3);
    }

    #[test]
    fn unknown_contract_is_none() {
        let snapshot = Snapshot::on_store(Arc::new(MemoryStore::new())).into_handle();
        assert!(get_contract(&snapshot, &UInt160::zero()).is_none());
        assert!(get_contract_by_id(&snapshot, 42).is_none());
    }
}
