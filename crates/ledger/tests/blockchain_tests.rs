//! End-to-end import pipeline tests over an in-memory store.

mod common;

use common::*;
use neo3_core::UInt160;
use neo3_ledger::VerifyResult;
use neo3_smart_contract::native::{gas_token, ledger_contract};
use neo3_vm::{CallFlags, OpCode, ScriptBuilder};
use std::net::SocketAddr;

fn peer() -> SocketAddr {
    "127.0.0.1:20333".parse().unwrap()
}

#[test]
fn chain_of_five_blocks_commits_in_order() {
    let (chain, settings) = new_chain();
    let mut parent = chain
        .get_block(&chain.best_block_hash())
        .unwrap()
        .header;
    let mut hashes = Vec::new();

    for height in 1..=5u32 {
        let tx = signed_transaction(&settings, height - 1, height, halting_script());
        let tx_hash = tx.hash().unwrap();
        let block = next_block(&settings, &parent, vec![tx]);
        parent = block.header.clone();
        let result = chain.on_new_block(block, Some(peer())).unwrap();
        assert_eq!(result, VerifyResult::Succeed, "block {height}");
        hashes.push(tx_hash);
    }

    assert_eq!(chain.height(), 5);
    for (i, tx_hash) in hashes.iter().enumerate() {
        let state = chain.get_transaction(tx_hash).unwrap();
        assert_eq!(state.block_index, i as u32 + 1);
    }

    // Every block's prev_hash links to its predecessor.
    for height in 1..=5u32 {
        let block = chain.get_block_by_index(height).unwrap();
        let prev = chain.get_block_by_index(height - 1).unwrap();
        assert_eq!(block.header.prev_hash, prev.hash().unwrap());
    }

    // The stored tip matches the just-committed block.
    let snapshot = chain.snapshot();
    let (tip_hash, tip_index) = ledger_contract::current(&snapshot).unwrap();
    assert_eq!(tip_hash, chain.best_block_hash());
    assert_eq!(tip_index, 5);
}

#[test]
fn out_of_order_arrival_waits_for_the_predecessor() {
    let (chain, settings) = new_chain();
    let genesis = chain.get_block(&chain.best_block_hash()).unwrap().header;
    let block1 = next_block(&settings, &genesis, vec![]);
    let block2 = next_block(&settings, &block1.header, vec![]);

    let early = chain.on_new_block(block2, Some(peer())).unwrap();
    assert_eq!(early, VerifyResult::UnableToVerify);
    assert_eq!(chain.height(), 0, "height must not move before block 1");

    let result = chain.on_new_block(block1, Some(peer())).unwrap();
    assert_eq!(result, VerifyResult::Succeed);
    assert_eq!(chain.height(), 2, "cached block 2 commits without re-fetch");
}

#[test]
fn stale_blocks_are_dropped_silently() {
    let (chain, settings) = new_chain();
    let genesis = chain.get_block(&chain.best_block_hash()).unwrap().header;
    let block1 = next_block(&settings, &genesis, vec![]);
    assert!(chain.on_new_block(block1.clone(), None).unwrap().is_ok());
    assert_eq!(
        chain.on_new_block(block1, Some(peer())).unwrap(),
        VerifyResult::AlreadyExists
    );
}

#[test]
fn faulting_transaction_pays_only_consumed_gas_and_rolls_back() {
    let (chain, settings) = new_chain();
    let genesis = chain.get_block(&chain.best_block_hash()).unwrap().header;
    let sender = sender_account();
    let recipient = UInt160::from_bytes(&[7u8; 20]).unwrap();
    let amount: i64 = 12_345;

    // tx1 transfers GAS and halts; tx2 throws and faults.
    let mut builder = ScriptBuilder::new();
    builder.emit_push_null();
    builder.emit_push_i64(amount);
    builder.emit_push_bytes(recipient.as_bytes()).unwrap();
    builder.emit_push_bytes(sender.as_bytes()).unwrap();
    builder.emit_push_i64(4);
    builder.emit(OpCode::PACK);
    builder.emit_push_i64(CallFlags::ALL.bits() as i64);
    builder.emit_push_string("transfer").unwrap();
    builder
        .emit_push_bytes(gas_token::gas_hash().as_bytes())
        .unwrap();
    builder.emit_syscall("System.Contract.Call");
    let tx1 = signed_transaction(&settings, 0, 1, builder.to_array());
    let tx2 = signed_transaction(&settings, 0, 2, faulting_script());
    let (hash1, hash2) = (tx1.hash().unwrap(), tx2.hash().unwrap());
    let fees: Vec<i64> = [&tx1, &tx2].iter().map(|tx| tx.network_fee).collect();

    let snapshot = chain.snapshot();
    let sender_before = gas_token::balance_of(&snapshot, &sender);
    let supply_before = gas_token::total_supply(&snapshot);
    let primary_account =
        neo3_smart_contract::Contract::signature_contract_hash(&validator_key().public_key());
    let primary_before = gas_token::balance_of(&snapshot, &primary_account);

    let block = next_block(&settings, &genesis, vec![tx1, tx2]);
    assert!(chain.on_new_block(block, None).unwrap().is_ok());

    // Both transactions are committed, with their distinct outcomes.
    let state1 = chain.get_transaction(&hash1).unwrap();
    let state2 = chain.get_transaction(&hash2).unwrap();
    assert_eq!(state1.block_index, 1);
    assert_eq!(state2.block_index, 1);
    assert_eq!(state1.vm_state, 1, "tx1 halted");
    assert_eq!(state2.vm_state, 2, "tx2 faulted");

    let log1 = chain.application_log(&hash1).unwrap();
    let log2 = chain.application_log(&hash2).unwrap();
    assert_eq!(log1.vm_state, "HALT");
    assert_eq!(log2.vm_state, "FAULT");
    assert!(log2.exception.is_some());

    // tx1's transfer persisted; tx2 left no trace beyond its fees.
    let snapshot = chain.snapshot();
    assert_eq!(gas_token::balance_of(&snapshot, &recipient), amount);

    // Each transaction pays its full network fee but only the system
    // fee its execution consumed.
    let expected = sender_before
        - amount
        - fees.iter().sum::<i64>()
        - log1.gas_consumed
        - log2.gas_consumed;
    assert_eq!(gas_token::balance_of(&snapshot, &sender), expected);
    assert!(log1.gas_consumed > 0 && log1.gas_consumed <= 100_000_000);
    assert!(log2.gas_consumed > 0 && log2.gas_consumed <= 100_000_000);

    // No GAS appears or vanishes outside the three touched accounts:
    // the supply delta equals the sum of their balance deltas.
    let supply_delta = gas_token::total_supply(&snapshot) - supply_before;
    let sender_delta = gas_token::balance_of(&snapshot, &sender) - sender_before;
    let primary_delta = gas_token::balance_of(&snapshot, &primary_account) - primary_before;
    assert_eq!(supply_delta, sender_delta + amount + primary_delta);
}

#[test]
fn valid_until_block_window_is_inclusive() {
    let (chain, settings) = new_chain();
    let increment = settings.max_valid_until_block_increment;

    let mut at_limit = signed_transaction(&settings, 0, 1, halting_script());
    at_limit.valid_until_block = increment;
    let signature = validator_key().sign(&at_limit.sign_data(settings.network).unwrap());
    at_limit.witnesses = vec![{
        let mut invocation = ScriptBuilder::new();
        invocation.emit_push_bytes(&signature).unwrap();
        neo3_core::Witness::new(
            invocation.to_array(),
            neo3_smart_contract::Contract::create_multisig_redeem_script(
                1,
                &[validator_key().public_key()],
            )
            .unwrap(),
        )
    }];
    assert_eq!(
        chain.relay_transaction(at_limit).unwrap(),
        VerifyResult::Succeed
    );

    let mut past_limit = signed_transaction(&settings, 0, 2, halting_script());
    past_limit.valid_until_block = increment + 1;
    assert_eq!(
        chain.relay_transaction(past_limit).unwrap(),
        VerifyResult::Expired
    );
}

#[test]
fn peer_sending_two_blocks_for_one_height_is_flagged() {
    let (chain, settings) = new_chain();
    let genesis = chain.get_block(&chain.best_block_hash()).unwrap().header;
    let block1 = next_block(&settings, &genesis, vec![]);

    // Two distinct candidates for height 2 from the same peer.
    let mut block2a = next_block(&settings, &block1.header, vec![]);
    let mut block2b = next_block(&settings, &block1.header, vec![]);
    block2a.header.nonce = 100;
    block2b.header.nonce = 200;

    let mut events = chain.subscribe();
    assert_eq!(
        chain.on_new_block(block2a, Some(peer())).unwrap(),
        VerifyResult::UnableToVerify
    );
    assert_eq!(
        chain.on_new_block(block2b, Some(peer())).unwrap(),
        VerifyResult::Invalid
    );
    let mut saw_bad_peer = false;
    while let Ok(event) = events.try_recv() {
        if let neo3_ledger::LedgerEvent::BadPeer { peer: bad, height } = event {
            assert_eq!(bad, peer());
            assert_eq!(height, 2);
            saw_bad_peer = true;
        }
    }
    assert!(saw_bad_peer);
}

#[test]
fn committed_transactions_leave_the_mempool() {
    let (chain, settings) = new_chain();
    let genesis = chain.get_block(&chain.best_block_hash()).unwrap().header;
    let tx = signed_transaction(&settings, 0, 1, halting_script());
    let tx_hash = tx.hash().unwrap();

    assert!(chain.relay_transaction(tx.clone()).unwrap().is_ok());
    assert!(chain.mempool().contains(&tx_hash));
    assert_eq!(
        chain.relay_transaction(tx.clone()).unwrap(),
        VerifyResult::AlreadyInPool
    );

    let block = next_block(&settings, &genesis, vec![tx]);
    assert!(chain.on_new_block(block, None).unwrap().is_ok());
    assert!(!chain.mempool().contains(&tx_hash));
    assert_eq!(
        chain.relay_transaction(signed_transaction(&settings, 0, 1, halting_script()))
            .unwrap(),
        VerifyResult::AlreadyExists
    );
}
