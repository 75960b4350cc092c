//! Two real nodes over loopback TCP: handshake, relay and block sync.

mod common;

use common::*;
use neo3_config::P2pConfig;
use neo3_network::PeerManager;
use std::sync::Arc;
use std::time::Duration;

fn config_for_tests() -> P2pConfig {
    P2pConfig {
        bind_address: "127.0.0.1".to_string(),
        // OS-assigned port keeps parallel tests from colliding.
        port: 0,
        ..P2pConfig::default()
    }
}

async fn wait_until<F>(what: &str, deadline: Duration, mut check: F)
where
    F: FnMut() -> bool,
{
    let result = tokio::time::timeout(deadline, async {
        loop {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for {what}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn peers_handshake_over_loopback() {
    let settings = test_settings();
    let (alice, _alice_events) =
        PeerManager::new(settings.clone(), config_for_tests(), new_chain(&settings));
    let (bob, _bob_events) =
        PeerManager::new(settings.clone(), config_for_tests(), new_chain(&settings));

    let alice_addr = alice.listen().await.unwrap();
    bob.listen().await.unwrap();
    bob.connect(alice_addr).await.unwrap();

    wait_until("both sides to register the peer", Duration::from_secs(10), || {
        alice.peer_count() == 1 && bob.peer_count() == 1
    })
    .await;

    let (_, user_agent, _) = bob.peer_list().pop().unwrap();
    assert!(user_agent.starts_with("/neo3-rs:"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn self_connection_is_dropped() {
    let settings = test_settings();
    let (node, _events) =
        PeerManager::new(settings.clone(), config_for_tests(), new_chain(&settings));
    let addr = node.listen().await.unwrap();
    // Dialing our own listener trips the nonce collision check.
    assert!(node.connect(addr).await.is_err());
    assert_eq!(node.peer_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lagging_node_syncs_blocks_from_a_peer() {
    let settings = test_settings();
    let ahead_chain = new_chain(&settings);
    grow_chain(&ahead_chain, &settings, 3);
    assert_eq!(ahead_chain.height(), 3);

    let (ahead, _ahead_events) =
        PeerManager::new(settings.clone(), config_for_tests(), ahead_chain.clone());
    let behind_chain = new_chain(&settings);
    let (behind, _behind_events) =
        PeerManager::new(settings.clone(), config_for_tests(), behind_chain.clone());

    let ahead_addr = ahead.listen().await.unwrap();
    behind.listen().await.unwrap();
    behind.connect(ahead_addr).await.unwrap();
    tokio::spawn(neo3_network::run_sync(behind.clone()));

    wait_until("the lagging node to reach height 3", Duration::from_secs(20), || {
        behind_chain.height() == 3
    })
    .await;
    assert_eq!(behind_chain.best_block_hash(), ahead_chain.best_block_hash());
}
