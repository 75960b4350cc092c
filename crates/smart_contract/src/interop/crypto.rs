//! System.Crypto.* interop services.

use super::InteropDescriptor;
use crate::application_engine::HostState;
use neo3_cryptography::{verify, Curve};
use neo3_vm::{CallFlags, ExecutionEngine, StackItem, VmError, VmResult};

/// Price of a single signature check in datoshi.
pub const CHECKSIG_PRICE: i64 = 32768;

pub fn descriptors() -> Vec<InteropDescriptor> {
    vec![
        InteropDescriptor::new(
            "System.Crypto.CheckSig",
            CHECKSIG_PRICE,
            CallFlags::NONE,
            check_sig,
        ),
        // Priced per key inside the handler.
        InteropDescriptor::new(
            "System.Crypto.CheckMultisig",
            0,
            CallFlags::NONE,
            check_multisig,
        ),
    ]
}

/// The bytes a witness signature covers.
fn sign_data(host: &HostState) -> VmResult<Vec<u8>> {
    let container = host
        .container
        .as_ref()
        .ok_or_else(|| VmError::Syscall("no script container to verify".to_string()))?;
    let hash = container
        .hash()
        .map_err(|e| VmError::Syscall(e.to_string()))?;
    let mut data = Vec::with_capacity(36);
    data.extend_from_slice(&host.settings.network.to_le_bytes());
    data.extend_from_slice(hash.as_bytes());
    Ok(data)
}

fn check_sig(host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    let public_key = engine.pop_bytes()?;
    let signature = engine.pop_bytes()?;
    let message = sign_data(host)?;
    let valid = verify(Curve::Secp256r1, &message, &signature, &public_key);
    engine.push(StackItem::from_bool(valid))
}

/// Greedy m-of-n verification: signatures and keys are both in canonical
/// order, each signature consuming keys until it matches.
fn check_multisig(host: &mut HostState, engine: &mut ExecutionEngine) -> VmResult<()> {
    let keys_item = engine.pop()?;
    let keys: Vec<Vec<u8>> = match &keys_item {
        StackItem::Array(_) | StackItem::Struct(_) => keys_item
            .as_array()?
            .borrow()
            .iter()
            .map(|item| item.as_bytes())
            .collect::<VmResult<_>>()?,
        _ => {
            // Key-count form: n keys follow on the stack.
            let n = keys_item.as_usize()?;
            let mut keys = Vec::with_capacity(n);
            for _ in 0..n {
                keys.push(engine.pop_bytes()?);
            }
            // Script order pushes key_1 first, so the pops arrive
            // reversed.
            keys.reverse();
            keys
        }
    };

    let signatures_item = engine.pop()?;
    let signatures: Vec<Vec<u8>> = match &signatures_item {
        StackItem::Array(_) | StackItem::Struct(_) => signatures_item
            .as_array()?
            .borrow()
            .iter()
            .map(|item| item.as_bytes())
            .collect::<VmResult<_>>()?,
        _ => {
            let m = signatures_item.as_usize()?;
            let mut signatures = Vec::with_capacity(m);
            for _ in 0..m {
                signatures.push(engine.pop_bytes()?);
            }
            signatures.reverse();
            signatures
        }
    };

    if signatures.is_empty() || keys.is_empty() || signatures.len() > keys.len() {
        return Err(VmError::Syscall(format!(
            "invalid multisig shape: {} signatures, {} keys",
            signatures.len(),
            keys.len()
        )));
    }
    host.add_fee(CHECKSIG_PRICE * keys.len() as i64)?;

    let message = sign_data(host)?;
    let mut sig_index = 0usize;
    let mut key_index = 0usize;
    while sig_index < signatures.len() && key_index < keys.len() {
        if verify(
            Curve::Secp256r1,
            &message,
            &signatures[sig_index],
            &keys[key_index],
        ) {
            sig_index += 1;
        }
        key_index += 1;
        // Fewer keys left than signatures still unmatched: fail early.
        if signatures.len() - sig_index > keys.len() - key_index {
            break;
        }
    }
    engine.push(StackItem::from_bool(sig_index == signatures.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_engine::{ApplicationEngine, Container, TriggerType};
    use crate::contract::Contract;
    use crate::native::NativeRegistry;
    use neo3_config::ProtocolSettings;
    use neo3_core::{Signer, Transaction, UInt160, Witness};
    use neo3_cryptography::KeyPair;
    use neo3_persistence::{MemoryStore, Snapshot};
    use neo3_vm::{ScriptBuilder, VMState};
    use std::sync::Arc;

    fn test_transaction() -> Transaction {
        let mut tx = Transaction::new();
        tx.nonce = 7;
        tx.valid_until_block = 10;
        tx.signers = vec![Signer::called_by_entry(UInt160::from_script(b"a"))];
        tx.script = vec![0x11, 0x40];
        tx.witnesses = vec![Witness::empty()];
        tx
    }

    fn engine_with_container(tx: Transaction) -> ApplicationEngine {
        let snapshot = Snapshot::on_store(Arc::new(MemoryStore::new())).into_handle();
        ApplicationEngine::create(
            TriggerType::Verification,
            Some(Container::Transaction(Arc::new(tx))),
            snapshot,
            None,
            Arc::new(ProtocolSettings::private_net()),
            Arc::new(NativeRegistry::new()),
            1_000_000_000,
        )
        .unwrap()
    }

    #[test]
    fn checksig_accepts_valid_signature() {
        let key = KeyPair::generate();
        let tx = test_transaction();
        let settings = ProtocolSettings::private_net();
        let signature = key.sign(&tx.sign_data(settings.network).unwrap());

        let mut app = engine_with_container(tx);
        let mut builder = ScriptBuilder::new();
        builder.emit_push_bytes(&signature).unwrap();
        builder.emit_push_bytes(key.public_key().as_bytes()).unwrap();
        builder.emit_syscall("System.Crypto.CheckSig");
        app.load_script(builder.to_array(), CallFlags::NONE).unwrap();
        assert_eq!(app.execute(), VMState::HALT);
        assert!(app.result_stack()[0].as_bool().unwrap());
    }

    #[test]
    fn checksig_rejects_wrong_key() {
        let key = KeyPair::generate();
        let other = KeyPair::generate();
        let tx = test_transaction();
        let settings = ProtocolSettings::private_net();
        let signature = key.sign(&tx.sign_data(settings.network).unwrap());

        let mut app = engine_with_container(tx);
        let mut builder = ScriptBuilder::new();
        builder.emit_push_bytes(&signature).unwrap();
        builder
            .emit_push_bytes(other.public_key().as_bytes())
            .unwrap();
        builder.emit_syscall("System.Crypto.CheckSig");
        app.load_script(builder.to_array(), CallFlags::NONE).unwrap();
        assert_eq!(app.execute(), VMState::HALT);
        assert!(!app.result_stack()[0].as_bool().unwrap());
    }

    #[test]
    fn full_witness_verification_via_redeem_script() {
        let key = KeyPair::generate();
        let settings = Arc::new(ProtocolSettings::private_net());
        let tx = test_transaction();
        let signature = key.sign(&tx.sign_data(settings.network).unwrap());

        let verification = Contract::create_signature_redeem_script(&key.public_key());
        let mut invocation = ScriptBuilder::new();
        invocation.emit_push_bytes(&signature).unwrap();

        let snapshot = Snapshot::on_store(Arc::new(MemoryStore::new())).into_handle();
        let gas = ApplicationEngine::verify_witness(
            Container::Transaction(Arc::new(tx)),
            snapshot,
            settings,
            Arc::new(NativeRegistry::new()),
            &verification,
            &invocation.to_array(),
            50_000_000,
        )
        .unwrap();
        assert!(gas > 0);
    }

    #[test]
    fn multisig_two_of_three() {
        let keys: Vec<KeyPair> = (0..3).map(|_| KeyPair::generate()).collect();
        let settings = Arc::new(ProtocolSettings::private_net());
        let tx = test_transaction();
        let sign_data = tx.sign_data(settings.network).unwrap();

        let mut points: Vec<_> = keys.iter().map(|k| k.public_key()).collect();
        points.sort();
        // Sign with the first two keys in canonical order.
        let signers: Vec<&KeyPair> = points
            .iter()
            .take(2)
            .map(|p| keys.iter().find(|k| k.public_key() == *p).unwrap())
            .collect();

        let verification = Contract::create_multisig_redeem_script(2, &points).unwrap();
        let mut invocation = ScriptBuilder::new();
        for signer in &signers {
            invocation.emit_push_bytes(&signer.sign(&sign_data)).unwrap();
        }

        let snapshot = Snapshot::on_store(Arc::new(MemoryStore::new())).into_handle();
        ApplicationEngine::verify_witness(
            Container::Transaction(Arc::new(tx)),
            snapshot,
            settings,
            Arc::new(NativeRegistry::new()),
            &verification,
            &invocation.to_array(),
            100_000_000,
        )
        .unwrap();
    }
}
