// Copyright (C) 2015-2025 The Neo Project.
//
// verification.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Deterministic block and transaction verification.
//!
//! Checks run in a fixed order so every node rejects an invalid
//! inventory for the same reason: structure, header rules, witnesses,
//! then the per-transaction policy and fee rules.

use crate::verify_result::VerifyResult;
use neo3_config::ProtocolSettings;
use neo3_core::{Block, Header, Transaction, TransactionAttribute, UInt160};
use neo3_io::Serializable;
use neo3_persistence::SnapshotHandle;
use neo3_smart_contract::native::{
    gas_token, ledger_contract, neo_token, policy_contract, NativeRegistry,
};
use neo3_smart_contract::{ApplicationEngine, Container};
use std::collections::HashMap;
use std::sync::Arc;

/// Gas allowed for the consensus multi-signature witness of a block.
const BLOCK_WITNESS_GAS: i64 = 3_00000000;

/// Verifies a block against the committed parent. `parent` is the
/// current tip header; admission has already matched index and
/// prev_hash against it.
pub fn verify_block(
    block: &Block,
    parent: &Header,
    snapshot: &SnapshotHandle,
    settings: &Arc<ProtocolSettings>,
    natives: &Arc<NativeRegistry>,
) -> VerifyResult {
    if block.check_structure().is_err() {
        return VerifyResult::Invalid;
    }
    if block.header.timestamp <= parent.timestamp {
        return VerifyResult::Invalid;
    }
    if block.header.primary_index >= settings.validators_count {
        return VerifyResult::Invalid;
    }

    // The parent committed to the validator set allowed to sign this
    // block; the witness must answer for exactly that script.
    if block.header.witness.script_hash() != parent.next_consensus {
        return VerifyResult::InvalidWitness;
    }
    let container = Container::Block(Arc::new(block.clone()));
    if ApplicationEngine::verify_witness(
        container,
        snapshot.clone(),
        settings.clone(),
        natives.clone(),
        &block.header.witness.verification_script,
        &block.header.witness.invocation_script,
        BLOCK_WITNESS_GAS,
    )
    .is_err()
    {
        return VerifyResult::InvalidWitness;
    }

    // Each transaction verifies on its own, with in-block sender fees
    // counted so a sender cannot overspend across the block.
    let mut block_sender_fees: HashMap<UInt160, i64> = HashMap::new();
    for tx in &block.transactions {
        let Some(sender) = tx.sender() else {
            return VerifyResult::Invalid;
        };
        let extra = block_sender_fees.get(&sender).copied().unwrap_or(0);
        let result = verify_transaction(
            snapshot,
            settings,
            natives,
            &Arc::new(tx.clone()),
            parent.index,
            extra,
        );
        if !result.is_ok() {
            return result;
        }
        *block_sender_fees.entry(sender).or_insert(0) += tx.system_fee + tx.network_fee;
    }
    VerifyResult::Succeed
}

/// Verifies one transaction against `snapshot` at chain height
/// `height`. `extra_sender_fee` is what the sender already owes
/// elsewhere (pooled transactions, earlier in-block ones).
pub fn verify_transaction(
    snapshot: &SnapshotHandle,
    settings: &Arc<ProtocolSettings>,
    natives: &Arc<NativeRegistry>,
    tx: &Arc<Transaction>,
    height: u32,
    extra_sender_fee: i64,
) -> VerifyResult {
    if tx.check_structure().is_err() {
        return VerifyResult::Invalid;
    }
    let Ok(hash) = tx.hash() else {
        return VerifyResult::Invalid;
    };

    let max_increment = policy_contract::max_valid_until_block_increment(
        snapshot,
        settings.max_valid_until_block_increment,
    );
    if tx.valid_until_block <= height || tx.valid_until_block > height + max_increment {
        return VerifyResult::Expired;
    }

    if ledger_contract::contains_transaction(snapshot, &hash) {
        return VerifyResult::AlreadyExists;
    }

    for signer in &tx.signers {
        if policy_contract::is_blocked(snapshot, &signer.account) {
            return VerifyResult::PolicyFail;
        }
    }

    let sender = tx.sender().expect("structure check guarantees a signer");
    for attribute in &tx.attributes {
        match attribute {
            TransactionAttribute::HighPriority => {
                // Only the committee may jump the fee queue.
                match neo_token::committee_address(snapshot, settings) {
                    Ok(committee) if committee == sender => {}
                    _ => return VerifyResult::InvalidAttribute,
                }
            }
            TransactionAttribute::Conflicts { hash } => {
                if ledger_contract::contains_transaction(snapshot, hash) {
                    return VerifyResult::HasConflicts;
                }
            }
            TransactionAttribute::NotValidBefore { height: floor } => {
                if height + 1 < *floor {
                    return VerifyResult::InvalidAttribute;
                }
            }
            TransactionAttribute::OracleResponse { .. } => {}
        }
    }

    // The network fee pays for bytes, attributes and witness checking;
    // whatever those leave over must not go negative.
    let size_fee = tx.size() as i64 * policy_contract::fee_per_byte(snapshot);
    let mut remaining_fee = tx.network_fee - size_fee;
    for attribute in &tx.attributes {
        remaining_fee -=
            policy_contract::attribute_fee(snapshot, attribute.attribute_type() as u8);
    }
    if remaining_fee < 0 {
        return VerifyResult::InsufficientFunds;
    }

    let balance = gas_token::balance_of(snapshot, &sender);
    let owed = tx
        .system_fee
        .saturating_add(tx.network_fee)
        .saturating_add(extra_sender_fee);
    if balance < owed {
        return VerifyResult::InsufficientFunds;
    }

    for (signer, witness) in tx.signers.iter().zip(&tx.witnesses) {
        if witness.verification_script.is_empty()
            || witness.script_hash() != signer.account
        {
            return VerifyResult::InvalidWitness;
        }
        match ApplicationEngine::verify_witness(
            Container::Transaction(tx.clone()),
            snapshot.clone(),
            settings.clone(),
            natives.clone(),
            &witness.verification_script,
            &witness.invocation_script,
            remaining_fee,
        ) {
            Ok(gas_spent) => {
                remaining_fee -= gas_spent;
                if remaining_fee < 0 {
                    return VerifyResult::InsufficientFunds;
                }
            }
            Err(_) => return VerifyResult::InvalidWitness,
        }
    }

    VerifyResult::Succeed
}
