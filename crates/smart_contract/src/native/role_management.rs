//! RoleManagement native contract: role-to-node designations by height.

use super::{native_hash, NativeCallContext, NativeContract, NativeMethod};
use crate::error::{ContractError, ContractResult};
use neo3_core::UInt160;
use neo3_cryptography::ECPoint;
use neo3_io::{BinaryWriter, MemoryReader};
use neo3_persistence::SnapshotHandle;
use neo3_vm::StackItem;
use num_traits::ToPrimitive;
use once_cell::sync::Lazy;

pub const ID: i32 = -8;
const NAME: &str = "RoleManagement";

static HASH: Lazy<UInt160> = Lazy::new(|| native_hash(NAME));

/// Designable node roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Role {
    StateValidator = 4,
    Oracle = 8,
    NeoFsAlphabetNode = 16,
    P2pNotary = 32,
}

impl Role {
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            4 => Some(Role::StateValidator),
            8 => Some(Role::Oracle),
            16 => Some(Role::NeoFsAlphabetNode),
            32 => Some(Role::P2pNotary),
            _ => None,
        }
    }
}

/// Max nodes in a single designation.
const MAX_NODES: usize = 32;

fn encode_nodes(nodes: &[ECPoint]) -> ContractResult<Vec<u8>> {
    let mut writer = BinaryWriter::new();
    writer.write_var_int(nodes.len() as u64)?;
    for node in nodes {
        writer.write_bytes(node.as_bytes())?;
    }
    Ok(writer.to_bytes())
}

fn decode_nodes(data: &[u8]) -> ContractResult<Vec<ECPoint>> {
    let mut reader = MemoryReader::new(data);
    let count = reader.read_var_int(MAX_NODES as u64)? as usize;
    let mut nodes = Vec::with_capacity(count);
    for _ in 0..count {
        let bytes = reader.read_bytes(33)?;
        nodes.push(ECPoint::from_bytes(&bytes)?);
    }
    Ok(nodes)
}

/// The newest designation for `role` at or below `index`.
pub fn get_designated_by_role(
    snapshot: &SnapshotHandle,
    role: Role,
    index: u32,
) -> ContractResult<Vec<ECPoint>> {
    let mut prefix = ID.to_le_bytes().to_vec();
    prefix.push(role as u8);
    let mut best: Option<(u32, Vec<u8>)> = None;
    for (key, item) in snapshot.read().find(&prefix) {
        // Key layout: [role][index BE].
        if key.key.len() != 5 {
            continue;
        }
        let at = u32::from_be_bytes(key.key[1..5].try_into().unwrap_or_default());
        if at <= index && best.as_ref().map(|(b, _)| at > *b).unwrap_or(true) {
            best = Some((at, item.value));
        }
    }
    match best {
        Some((_, value)) => decode_nodes(&value),
        None => Ok(Vec::new()),
    }
}

pub struct RoleManagement {
    methods: Vec<NativeMethod>,
}

impl RoleManagement {
    pub fn new() -> Self {
        Self {
            methods: vec![
                NativeMethod::safe("getDesignatedByRole", 1 << 15, 2),
                NativeMethod::unsafe_method("designateAsRole", 1 << 15, 2).returns_nothing(),
            ],
        }
    }
}

impl Default for RoleManagement {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeContract for RoleManagement {
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
            "getDesignatedByRole" => {
                let role_byte = args[0]
                    .as_int()
                    .map_err(ContractError::Vm)?
                    .to_u8()
                    .ok_or_else(|| ContractError::InvalidArgument("invalid role".to_string()))?;
                let role = Role::from_byte(role_byte)
                    .ok_or_else(|| ContractError::InvalidArgument("unknown role".to_string()))?;
                let index = args[1]
                    .as_int()
                    .map_err(ContractError::Vm)?
                    .to_u32()
                    .ok_or_else(|| {
                        ContractError::InvalidArgument("invalid index".to_string())
                    })?;
                let nodes = get_designated_by_role(ctx.snapshot(), role, index)?;
                Ok(StackItem::new_array(
                    nodes
                        .iter()
                        .map(|n| StackItem::from_bytes(n.to_bytes()))
                        .collect(),
                ))
            }
            "designateAsRole" => {
                let role_byte = args[0]
                    .as_int()
                    .map_err(ContractError::Vm)?
                    .to_u8()
                    .ok_or_else(|| ContractError::InvalidArgument("invalid role".to_string()))?;
                let role = Role::from_byte(role_byte)
                    .ok_or_else(|| ContractError::InvalidArgument("unknown role".to_string()))?;
                let nodes_item = args[1].as_array().map_err(ContractError::Vm)?;
                let nodes: ContractResult<Vec<ECPoint>> = nodes_item
                    .borrow()
                    .iter()
                    .map(|item| {
                        ECPoint::from_bytes(&item.as_bytes().map_err(ContractError::Vm)?)
                            .map_err(Into::into)
                    })
                    .collect();
                let mut nodes = nodes?;
                if nodes.is_empty() || nodes.len() > MAX_NODES {
                    return Err(ContractError::InvalidArgument(format!(
                        "invalid node count {}",
                        nodes.len()
                    )));
                }
                if !ctx.check_committee()? {
                    return Err(ContractError::Unauthorized(
                        "committee witness required".to_string(),
                    ));
                }
                nodes.sort();

                // Designations activate at the next block.
                let activation = ctx.persisting_block()?.header.index + 1;
                let mut key = vec![role as u8];
                key.extend_from_slice(&activation.to_be_bytes());
                ctx.put_storage(ID, &key, encode_nodes(&nodes)?)?;

                ctx.notify(
                    *HASH,
                    "Designation",
                    StackItem::new_array(vec![
                        StackItem::from_int(role as u8 as i64),
                        StackItem::from_int(ctx.persisting_block()?.header.index as i64),
                    ]),
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
    use neo3_persistence::{MemoryStore, Snapshot, StorageItem, StorageKey};
    use std::sync::Arc;

    fn put_designation(snapshot: &SnapshotHandle, role: Role, index: u32, nodes: &[ECPoint]) {
        let mut key = vec![role as u8];
        key.extend_from_slice(&index.to_be_bytes());
        snapshot
            .write()
            .put(
                StorageKey::new(ID, key),
                StorageItem::new(encode_nodes(nodes).unwrap()),
            )
            .unwrap();
    }

    #[test]
    fn newest_designation_at_or_below_wins() {
        let snapshot = Snapshot::on_store(Arc::new(MemoryStore::new())).into_handle();
        let settings = neo3_config::ProtocolSettings::private_net();
        let a = ECPoint::from_hex(&settings.standby_committee[0]).unwrap();
        let b = ECPoint::from_hex(&settings.standby_committee[1]).unwrap();

        put_designation(&snapshot, Role::Oracle, 10, &[a]);
        put_designation(&snapshot, Role::Oracle, 20, &[b]);

        assert!(get_designated_by_role(&snapshot, Role::Oracle, 5)
            .unwrap()
            .is_empty());
        assert_eq!(
            get_designated_by_role(&snapshot, Role::Oracle, 15).unwrap(),
            vec![a]
        );
        assert_eq!(
            get_designated_by_role(&snapshot, Role::Oracle, 25).unwrap(),
            vec![b]
        );
        // Other roles are unaffected.
        assert!(
            get_designated_by_role(&snapshot, Role::StateValidator, 25)
                .unwrap()
                .is_empty()
        );
    }
}
