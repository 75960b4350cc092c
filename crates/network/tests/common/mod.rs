//! A single-validator chain fixture for end-to-end peer tests.

use neo3_config::ProtocolSettings;
use neo3_core::{Block, Header, Witness};
use neo3_cryptography::KeyPair;
use neo3_ledger::{Blockchain, Mempool};
use neo3_persistence::MemoryStore;
use neo3_smart_contract::{Contract, NativeRegistry};
use neo3_vm::ScriptBuilder;
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

pub fn new_chain(settings: &Arc<ProtocolSettings>) -> Arc<Blockchain> {
    let store = Arc::new(MemoryStore::new());
    let natives = Arc::new(NativeRegistry::new());
    let mempool = Arc::new(Mempool::new(1_000));
    Arc::new(
        Blockchain::new(settings.clone(), store, natives, mempool)
            .expect("genesis must persist"),
    )
}

/// Builds and signs the empty block following `parent`.
pub fn next_block(settings: &ProtocolSettings, parent: &Header) -> Block {
    let key = validator_key();
    let mut block = Block {
        header: Header {
            version: 0,
            prev_hash: parent.hash().unwrap(),
            merkle_root: Block::compute_merkle_root(&[]).unwrap(),
            timestamp: parent.timestamp + settings.milliseconds_per_block,
            nonce: parent.nonce.wrapping_add(1),
            index: parent.index + 1,
            primary_index: 0,
            next_consensus: parent.next_consensus,
            witness: Witness::default(),
        },
        transactions: Vec::new(),
    };
    let signature = key.sign(&block.header.sign_data(settings.network).unwrap());
    let mut invocation = ScriptBuilder::new();
    invocation.emit_push_bytes(&signature).unwrap();
    let verification =
        Contract::create_multisig_redeem_script(1, &[key.public_key()]).unwrap();
    block.header.witness = Witness::new(invocation.to_array(), verification);
    block
}

/// Extends `chain` by `count` empty blocks.
pub fn grow_chain(chain: &Blockchain, settings: &ProtocolSettings, count: u32) {
    for _ in 0..count {
        let parent = chain
            .get_block(&chain.best_block_hash())
            .expect("tip exists")
            .header;
        let block = next_block(settings, &parent);
        assert!(chain.on_new_block(block, None).unwrap().is_ok());
    }
}
