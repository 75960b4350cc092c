//! CryptoLib native contract: hashes, curve checks and BLS12-381.

use super::{native_hash, NativeCallContext, NativeContract, NativeMethod};
use crate::error::{ContractError, ContractResult};
use neo3_bls12_381::Bls12381Point;
use neo3_core::UInt160;
use neo3_cryptography::{keccak256, murmur32, ripemd160, sha256, verify, Curve};
use neo3_vm::StackItem;
use num_traits::ToPrimitive;
use once_cell::sync::Lazy;
use std::cell::RefCell;

const ID: i32 = -3;
const NAME: &str = "CryptoLib";

static HASH: Lazy<UInt160> = Lazy::new(|| native_hash(NAME));

/// Named curve/hash combinations accepted by verifyWithECDsa.
const CURVE_SECP256K1_SHA256: i64 = 22;
const CURVE_SECP256R1_SHA256: i64 = 23;

pub struct CryptoLib {
    methods: Vec<NativeMethod>,
}

impl CryptoLib {
    pub fn new() -> Self {
        Self {
            methods: vec![
                NativeMethod::safe("sha256", 1 << 15, 1),
                NativeMethod::safe("ripemd160", 1 << 15, 1),
                NativeMethod::safe("keccak256", 1 << 15, 1),
                NativeMethod::safe("murmur32", 1 << 13, 2),
                NativeMethod::safe("verifyWithECDsa", 1 << 15, 4),
                NativeMethod::safe("bls12381Serialize", 1 << 19, 1),
                NativeMethod::safe("bls12381Deserialize", 1 << 19, 1),
                NativeMethod::safe("bls12381Equal", 1 << 5, 2),
                NativeMethod::safe("bls12381Add", 1 << 19, 2),
                NativeMethod::safe("bls12381Mul", 1 << 21, 3),
                NativeMethod::safe("bls12381Pairing", 1 << 23, 2),
            ],
        }
    }

    fn bls_point(item: &StackItem) -> ContractResult<Bls12381Point> {
        let handle = item
            .as_interface::<RefCell<Bls12381Point>>()
            .map_err(ContractError::Vm)?;
        let point = handle.borrow().clone();
        Ok(point)
    }

    fn bls_item(point: Bls12381Point) -> StackItem {
        StackItem::from_interface(RefCell::new(point))
    }
}

impl Default for CryptoLib {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeContract for CryptoLib {
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
        let bytes = |index: usize| -> ContractResult<Vec<u8>> {
            args.get(index)
                .ok_or_else(|| ContractError::InvalidArgument(format!("missing argument {index}")))?
                .as_bytes()
                .map_err(ContractError::Vm)
        };
        match method {
            "sha256" => Ok(StackItem::from_bytes(sha256(&bytes(0)?).to_vec())),
            "ripemd160" => Ok(StackItem::from_bytes(ripemd160(&bytes(0)?).to_vec())),
            "keccak256" => Ok(StackItem::from_bytes(keccak256(&bytes(0)?).to_vec())),
            "murmur32" => {
                let data = bytes(0)?;
                let seed = args[1]
                    .as_int()
                    .map_err(ContractError::Vm)?
                    .to_u32()
                    .ok_or_else(|| {
                        ContractError::InvalidArgument("invalid murmur seed".to_string())
                    })?;
                Ok(StackItem::from_bytes(
                    murmur32(&data, seed).to_le_bytes().to_vec(),
                ))
            }
            "verifyWithECDsa" => {
                let message = bytes(0)?;
                let public_key = bytes(1)?;
                let signature = bytes(2)?;
                let curve_id = args[3]
                    .as_int()
                    .map_err(ContractError::Vm)?
                    .to_i64()
                    .unwrap_or(-1);
                let curve = match curve_id {
                    CURVE_SECP256K1_SHA256 => Curve::Secp256k1,
                    CURVE_SECP256R1_SHA256 => Curve::Secp256r1,
                    other => {
                        return Err(ContractError::InvalidArgument(format!(
                            "unsupported curve id {other}"
                        )))
                    }
                };
                Ok(StackItem::from_bool(verify(
                    curve,
                    &message,
                    &signature,
                    &public_key,
                )))
            }
            "bls12381Serialize" => {
                let point = Self::bls_point(&args[0])?;
                let bytes = point
                    .serialize()
                    .map_err(|e| ContractError::InvalidArgument(e.to_string()))?;
                Ok(StackItem::from_bytes(bytes))
            }
            "bls12381Deserialize" => {
                let data = bytes(0)?;
                let point = Bls12381Point::deserialize(&data)
                    .map_err(|e| ContractError::InvalidArgument(e.to_string()))?;
                Ok(Self::bls_item(point))
            }
            "bls12381Equal" => {
                let a = Self::bls_point(&args[0])?;
                let b = Self::bls_point(&args[1])?;
                Ok(StackItem::from_bool(a.equals(&b)))
            }
            "bls12381Add" => {
                let a = Self::bls_point(&args[0])?;
                let b = Self::bls_point(&args[1])?;
                let sum = a
                    .add(&b)
                    .map_err(|e| ContractError::InvalidArgument(e.to_string()))?;
                Ok(Self::bls_item(sum))
            }
            "bls12381Mul" => {
                let point = Self::bls_point(&args[0])?;
                let scalar = bytes(1)?;
                let negate = args[2].as_bool().map_err(ContractError::Vm)?;
                let product = point
                    .mul(&scalar, negate)
                    .map_err(|e| ContractError::InvalidArgument(e.to_string()))?;
                Ok(Self::bls_item(product))
            }
            "bls12381Pairing" => {
                let g1 = Self::bls_point(&args[0])?;
                let g2 = Self::bls_point(&args[1])?;
                let gt = Bls12381Point::pairing(&g1, &g2)
                    .map_err(|e| ContractError::InvalidArgument(e.to_string()))?;
                Ok(Self::bls_item(gt))
            }
            other => Err(ContractError::MethodNotFound(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_engine::{ApplicationEngine, TriggerType};
    use crate::native::NativeRegistry;
    use neo3_config::ProtocolSettings;
    use neo3_persistence::{MemoryStore, Snapshot};
    use neo3_vm::{CallFlags, ScriptBuilder, VMState};
    use std::sync::Arc;

    #[test]
    fn sha256_via_contract_call() {
        let snapshot = Snapshot::on_store(Arc::new(MemoryStore::new())).into_handle();
        let natives = Arc::new(NativeRegistry::new());
        let crypto_hash = natives.by_name("CryptoLib").unwrap().hash();
        let mut engine = ApplicationEngine::create(
            TriggerType::Application,
            None,
            snapshot,
            None,
            Arc::new(ProtocolSettings::private_net()),
            natives,
            10_000_000_000,
        )
        .unwrap();

        let mut builder = ScriptBuilder::new();
        builder.emit_push_bytes(b"abc").unwrap();
        builder.emit_push_i64(1);
        builder.emit(neo3_vm::OpCode::PACK);
        builder.emit_push_i64(CallFlags::READ_ONLY.bits() as i64);
        builder.emit_push_string("sha256").unwrap();
        builder.emit_push_bytes(crypto_hash.as_bytes()).unwrap();
        builder.emit_syscall("System.Contract.Call");
        engine
            .load_script(builder.to_array(), CallFlags::ALL)
            .unwrap();
        assert_eq!(engine.execute(), VMState::HALT, "{:?}", engine.fault_message());
        assert_eq!(
            engine.result_stack()[0].as_bytes().unwrap(),
            sha256(b"abc").to_vec()
        );
    }
}
