//! dBFT integration tests over a loopback transport.
//!
//! Each validator runs a real service against its own in-memory chain;
//! a router task copies broadcast payloads to every other validator and
//! feeds finalized blocks into all chains, the way the node's network
//! layer would.

use neo3_config::ProtocolSettings;
use neo3_consensus::{ConsensusInput, ConsensusOutput, DbftService};
use neo3_core::Block;
use neo3_cryptography::KeyPair;
use neo3_ledger::{Blockchain, LedgerEvent, Mempool};
use neo3_persistence::MemoryStore;
use neo3_smart_contract::NativeRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const VALIDATORS: usize = 4;
const BLOCK_MS: u64 = 400;

fn keys() -> Vec<KeyPair> {
    (0..VALIDATORS)
        .map(|i| KeyPair::from_private_key(&[i as u8 + 1; 32]).unwrap())
        .collect()
}

fn settings(keys: &[KeyPair]) -> Arc<ProtocolSettings> {
    let mut settings = ProtocolSettings::private_net();
    settings.standby_committee = keys.iter().map(|key| key.public_key().to_hex()).collect();
    settings.validators_count = keys.len() as u8;
    settings.milliseconds_per_block = BLOCK_MS;
    Arc::new(settings)
}

fn chain(settings: &Arc<ProtocolSettings>) -> Arc<Blockchain> {
    let store = Arc::new(MemoryStore::new());
    let natives = Arc::new(NativeRegistry::new());
    let mempool = Arc::new(Mempool::new(1_000));
    Arc::new(Blockchain::new(settings.clone(), store, natives, mempool).unwrap())
}

/// Spawns the validators and a router; `muted` validators have their
/// outbound traffic dropped, simulating a silent (crashed) node.
/// Returns a receiver yielding blocks as each chain commits them.
fn launch(
    muted: &[usize],
) -> (Vec<Arc<Blockchain>>, mpsc::UnboundedReceiver<(usize, Arc<Block>)>) {
    let keys = keys();
    let settings = settings(&keys);
    // The sort inside the validator-set derivation fixes who sits at
    // which index; align the key list with it.
    let mut sorted_keys = keys;
    sorted_keys.sort_by(|a, b| a.public_key().cmp(&b.public_key()));

    let chains: Vec<Arc<Blockchain>> = (0..VALIDATORS).map(|_| chain(&settings)).collect();
    let mut inboxes = Vec::new();
    let mut outboxes = Vec::new();
    for (index, key) in sorted_keys.iter().enumerate() {
        let (input_tx, input_rx) = mpsc::channel(1024);
        let (output_tx, output_rx) = mpsc::channel(1024);
        let service = DbftService::new(chains[index].clone(), key.clone(), input_rx, output_tx);
        tokio::spawn(service.run());
        inboxes.push(input_tx);
        outboxes.push(output_rx);
    }

    let (committed_tx, committed_rx) = mpsc::unbounded_channel();
    for (index, chain) in chains.iter().enumerate() {
        let mut events = chain.subscribe();
        let committed_tx = committed_tx.clone();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                if let LedgerEvent::BlockCommitted(block) = event {
                    let _ = committed_tx.send((index, block));
                }
            }
        });
    }

    for (index, mut outbox) in outboxes.into_iter().enumerate() {
        let inboxes = inboxes.clone();
        let chains = chains.clone();
        let muted = muted.contains(&index);
        tokio::spawn(async move {
            while let Some(output) = outbox.recv().await {
                if muted {
                    continue;
                }
                match output {
                    ConsensusOutput::Broadcast(payload) => {
                        for (peer, inbox) in inboxes.iter().enumerate() {
                            if peer != index {
                                let _ = inbox
                                    .send(ConsensusInput::Payload(payload.clone()))
                                    .await;
                            }
                        }
                    }
                    ConsensusOutput::BlockProduced(block) => {
                        for (peer, chain) in chains.iter().enumerate() {
                            let result = chain.on_new_block(block.clone(), None);
                            if let Ok(result) = result {
                                if result.is_ok() {
                                    let _ = inboxes[peer]
                                        .send(ConsensusInput::BlockCommitted(block.index()))
                                        .await;
                                }
                            }
                        }
                    }
                }
            }
        });
    }

    (chains, committed_rx)
}

async fn wait_for_height(
    committed: &mut mpsc::UnboundedReceiver<(usize, Arc<Block>)>,
    chains: &[Arc<Blockchain>],
    height: u32,
    deadline: Duration,
) -> Arc<Block> {
    let block = tokio::time::timeout(deadline, async {
        loop {
            let (_, block) = committed.recv().await.expect("event stream stays open");
            if block.index() == height {
                return block;
            }
        }
    })
    .await
    .expect("block must commit before the deadline");

    // Give the stragglers a moment, then require full agreement.
    tokio::time::sleep(Duration::from_millis(500)).await;
    for chain in chains {
        assert!(chain.height() >= height, "all chains commit the block");
        assert_eq!(
            chain.get_block_by_index(height).unwrap().hash().unwrap(),
            block.hash().unwrap(),
            "all chains agree on the block"
        );
    }
    block
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn four_validators_produce_a_block_at_view_zero() {
    let (chains, mut committed) = launch(&[]);
    let block = wait_for_height(&mut committed, &chains, 1, Duration::from_secs(15)).await;
    assert_eq!(block.header.primary_index, 1, "primary is (height - view) mod n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn silent_primary_forces_a_view_change() {
    // Height 1, view 0: the primary is validator (1 - 0) mod 4 = 1.
    // Muting it forces the three honest backups to change view; the
    // view-1 primary is validator (1 - 1) mod 4 = 0.
    let (chains, mut committed) = launch(&[1]);
    let block = wait_for_height(&mut committed, &chains, 1, Duration::from_secs(30)).await;
    assert_eq!(
        block.header.primary_index, 0,
        "the block is proposed by the view-1 primary"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn single_validator_network_produces_blocks_alone() {
    let key = vec![KeyPair::from_private_key(&[9u8; 32]).unwrap()];
    let settings = {
        let mut settings = ProtocolSettings::private_net();
        settings.standby_committee = vec![key[0].public_key().to_hex()];
        settings.validators_count = 1;
        settings.milliseconds_per_block = BLOCK_MS;
        Arc::new(settings)
    };
    let chain = chain(&settings);
    let (input_tx, input_rx) = mpsc::channel(64);
    let (output_tx, mut output_rx) = mpsc::channel(64);
    let service = DbftService::new(chain.clone(), key[0].clone(), input_rx, output_tx);
    tokio::spawn(service.run());

    let produced = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match output_rx.recv().await.expect("service stays alive") {
                ConsensusOutput::BlockProduced(block) => return block,
                ConsensusOutput::Broadcast(_) => continue,
            }
        }
    })
    .await
    .expect("a lone validator finalizes immediately");

    assert_eq!(produced.index(), 1);
    assert!(chain.on_new_block(produced, None).unwrap().is_ok());
    assert_eq!(chain.height(), 1);
    drop(input_tx);
}
