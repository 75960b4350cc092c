//! Shared fixtures: a single-validator private chain whose standby key
//! is fixed, so blocks and transactions can be signed deterministically.

use neo3_config::ProtocolSettings;
use neo3_core::{Block, Header, Signer, Transaction, UInt160, Witness, WitnessScope};
use neo3_cryptography::KeyPair;
use neo3_ledger::{Blockchain, Mempool};
use neo3_persistence::MemoryStore;
use neo3_smart_contract::{Contract, NativeRegistry};
use neo3_vm::{OpCode, ScriptBuilder};
use std::sync::Arc;

pub fn validator_key() -> KeyPair {
    KeyPair::from_private_key(&[1u8; 32]).expect("fixed key is valid")
}

pub fn test_settings() -> Arc<ProtocolSettings> {
    let mut settings = ProtocolSettings::private_net();
    settings.standby_committee = vec![validator_key().public_key().to_hex()];
    settings.validators_count = 1;
    Arc::new(settings)
}

pub fn new_chain() -> (Arc<Blockchain>, Arc<ProtocolSettings>) {
    let settings = test_settings();
    let store = Arc::new(MemoryStore::new());
    let natives = Arc::new(NativeRegistry::new());
    let mempool = Arc::new(Mempool::new(1_000));
    let chain = Blockchain::new(settings.clone(), store, natives, mempool)
        .expect("genesis must persist");
    (Arc::new(chain), settings)
}

/// The 1-of-1 multisig account holding the genesis GAS distribution.
pub fn sender_account() -> UInt160 {
    Contract::multisig_contract_hash(1, &[validator_key().public_key()])
        .expect("one key is a valid set")
}

pub fn signed_transaction(
    settings: &ProtocolSettings,
    height: u32,
    nonce: u32,
    script: Vec<u8>,
) -> Transaction {
    let key = validator_key();
    let mut tx = Transaction::new();
    tx.nonce = nonce;
    tx.system_fee = 100_000_000;
    tx.network_fee = 100_000_000;
    tx.valid_until_block = height + 100;
    tx.signers = vec![Signer::new(sender_account(), WitnessScope::CALLED_BY_ENTRY)];
    tx.script = script;
    let signature = key.sign(&tx.sign_data(settings.network).unwrap());
    tx.witnesses = vec![multisig_witness(&signature)];
    tx
}

fn multisig_witness(signature: &[u8]) -> Witness {
    let key = validator_key();
    let mut invocation = ScriptBuilder::new();
    invocation.emit_push_bytes(signature).unwrap();
    let verification =
        Contract::create_multisig_redeem_script(1, &[key.public_key()]).unwrap();
    Witness::new(invocation.to_array(), verification)
}

/// Builds and signs the block following `parent`.
pub fn next_block(
    settings: &ProtocolSettings,
    parent: &Header,
    transactions: Vec<Transaction>,
) -> Block {
    let key = validator_key();
    let mut block = Block {
        header: Header {
            version: 0,
            prev_hash: parent.hash().unwrap(),
            merkle_root: Block::compute_merkle_root(&transactions).unwrap(),
            timestamp: parent.timestamp + settings.milliseconds_per_block,
            nonce: parent.nonce.wrapping_add(1),
            index: parent.index + 1,
            primary_index: 0,
            next_consensus: parent.next_consensus,
            witness: Witness::default(),
        },
        transactions,
    };
    let signature = key.sign(&block.header.sign_data(settings.network).unwrap());
    block.header.witness = multisig_witness(&signature);
    block
}

/// A script that pushes one value and returns.
pub fn halting_script() -> Vec<u8> {
    vec![OpCode::PUSH1 as u8, OpCode::RET as u8]
}

/// A script that throws immediately.
pub fn faulting_script() -> Vec<u8> {
    vec![OpCode::PUSH1 as u8, OpCode::THROW as u8]
}
