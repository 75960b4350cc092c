// Copyright (C) 2015-2025 The Neo Project.
//
// context.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Per-round consensus state.
//!
//! The context tracks one block height: the validator set, the current
//! view, the primary's proposal and everything the other validators
//! said about it. A view change resets the proposal but keeps the
//! change-view votes that caused it.

use crate::error::{ConsensusError, ConsensusResult};
use crate::messages::{ConsensusMessage, ConsensusPayload, SIGNATURE_SIZE};
use neo3_config::ProtocolSettings;
use neo3_core::{Block, Header, Transaction, UInt160, UInt256, Witness};
use neo3_cryptography::{verify, Curve, ECPoint, KeyPair};
use neo3_smart_contract::Contract;
use neo3_vm::ScriptBuilder;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// The proposal received from (or made by) the primary.
#[derive(Debug, Clone)]
pub struct Proposal {
    pub timestamp: u64,
    pub nonce: u64,
    pub transaction_hashes: Vec<UInt256>,
    /// Hash of the signed PrepareRequest payload; what backups agree on.
    pub preparation_hash: UInt256,
}

/// State for one `(block_index, view)` round of dBFT.
pub struct ConsensusContext {
    pub settings: Arc<ProtocolSettings>,
    pub validators: Vec<ECPoint>,
    /// This node's slot in `validators`, when it is one of them.
    pub my_index: Option<u8>,
    pub key: Option<KeyPair>,
    /// Height being produced.
    pub block_index: u32,
    pub prev_hash: UInt256,
    pub prev_timestamp: u64,
    pub view_number: u8,
    pub proposal: Option<Proposal>,
    /// Bodies of the proposed transactions, filled from the pool.
    pub transactions: HashMap<UInt256, Arc<Transaction>>,
    /// Validator → preparation hash it vouched for.
    pub preparations: HashMap<u8, UInt256>,
    /// Validator → block signature.
    pub commits: HashMap<u8, [u8; SIGNATURE_SIZE]>,
    /// Validator → view it wants to move to.
    pub change_views: HashMap<u8, u8>,
    /// Once a commit went out this node never changes view again.
    pub commit_sent: bool,
    pub block_sent: bool,
    /// Everything seen this round, replayed for recovering peers.
    pub known_payloads: Vec<ConsensusPayload>,
}

impl ConsensusContext {
    pub fn new(settings: Arc<ProtocolSettings>, key: Option<KeyPair>) -> Self {
        Self {
            settings,
            validators: Vec::new(),
            my_index: None,
            key,
            block_index: 0,
            prev_hash: UInt256::zero(),
            prev_timestamp: 0,
            view_number: 0,
            proposal: None,
            transactions: HashMap::new(),
            preparations: HashMap::new(),
            commits: HashMap::new(),
            change_views: HashMap::new(),
            commit_sent: false,
            block_sent: false,
            known_payloads: Vec::new(),
        }
    }

    pub fn validator_count(&self) -> usize {
        self.validators.len()
    }

    /// Byzantine tolerance: up to `f` of the validators may misbehave.
    pub fn f(&self) -> usize {
        (self.validator_count().saturating_sub(1)) / 3
    }

    /// Quorum: `2f + 1` matching votes decide each phase.
    pub fn m(&self) -> usize {
        self.validator_count() - self.f()
    }

    /// The proposer for `view` at the current height.
    pub fn primary_index(&self, view: u8) -> u8 {
        let n = self.validator_count() as i64;
        ((self.block_index as i64 - view as i64).rem_euclid(n)) as u8
    }

    pub fn is_primary(&self) -> bool {
        self.my_index == Some(self.primary_index(self.view_number))
    }

    /// View timers back off exponentially: `ms_per_block << view`.
    pub fn view_timeout(&self, view: u8) -> Duration {
        let base = self.settings.milliseconds_per_block;
        Duration::from_millis(base.saturating_mul(1u64 << view.min(16)))
    }

    /// Starts a round for `block_index` on top of the committed tip.
    pub fn reset(
        &mut self,
        block_index: u32,
        prev_hash: UInt256,
        prev_timestamp: u64,
        validators: Vec<ECPoint>,
    ) {
        self.my_index = self.key.as_ref().and_then(|key| {
            let public = key.public_key();
            validators
                .iter()
                .position(|candidate| *candidate == public)
                .map(|position| position as u8)
        });
        self.validators = validators;
        self.block_index = block_index;
        self.prev_hash = prev_hash;
        self.prev_timestamp = prev_timestamp;
        self.view_number = 0;
        self.clear_view_state();
        self.change_views.clear();
        self.known_payloads.clear();
    }

    /// Moves to `view`, discarding the dead proposal.
    pub fn advance_view(&mut self, view: u8) {
        self.view_number = view;
        self.clear_view_state();
    }

    fn clear_view_state(&mut self) {
        self.proposal = None;
        self.transactions.clear();
        self.preparations.clear();
        self.commits.clear();
        self.commit_sent = false;
        self.block_sent = false;
    }

    /// How many validators want a view newer than the current one.
    pub fn change_view_quorum(&self, view: u8) -> usize {
        self.change_views
            .values()
            .filter(|wanted| **wanted >= view)
            .count()
    }

    /// Whether every proposed transaction body is on hand.
    pub fn proposal_complete(&self) -> bool {
        match &self.proposal {
            Some(proposal) => proposal
                .transaction_hashes
                .iter()
                .all(|hash| self.transactions.contains_key(hash)),
            None => false,
        }
    }

    /// The header of the block under agreement.
    pub fn make_header(&self) -> ConsensusResult<Header> {
        let proposal = self
            .proposal
            .as_ref()
            .ok_or_else(|| ConsensusError::InvalidPayload("no proposal".to_string()))?;
        let transactions = self.ordered_transactions()?;
        Ok(Header {
            version: 0,
            prev_hash: self.prev_hash,
            merkle_root: Block::compute_merkle_root(&transactions)?,
            timestamp: proposal.timestamp,
            nonce: proposal.nonce,
            index: self.block_index,
            primary_index: self.primary_index(self.view_number),
            next_consensus: self.next_consensus()?,
            witness: Witness::default(),
        })
    }

    /// Assembles the finalized block once `m` valid commit signatures
    /// are in: the witness pushes the signatures in validator order
    /// over the validator multi-signature script.
    pub fn create_block(&self) -> ConsensusResult<Block> {
        let header = self.make_header()?;
        let sign_data = header.sign_data(self.settings.network)?;

        let mut valid: Vec<(u8, [u8; SIGNATURE_SIZE])> = self
            .commits
            .iter()
            .filter(|(index, signature)| {
                self.validators
                    .get(**index as usize)
                    .map(|key| {
                        verify(Curve::Secp256r1, &sign_data, &signature[..], key.as_bytes())
                    })
                    .unwrap_or(false)
            })
            .map(|(index, signature)| (*index, *signature))
            .collect();
        if valid.len() < self.m() {
            return Err(ConsensusError::InvalidPayload(format!(
                "{} valid commits, {} required",
                valid.len(),
                self.m()
            )));
        }
        valid.sort_by_key(|(index, _)| *index);
        valid.truncate(self.m());

        let mut invocation = ScriptBuilder::new();
        for (_, signature) in &valid {
            invocation
                .emit_push_bytes(signature)
                .map_err(|e| ConsensusError::InvalidPayload(e.to_string()))?;
        }
        let verification = Contract::create_multisig_redeem_script(self.m(), &self.validators)?;

        let mut block = Block {
            header,
            transactions: self.ordered_transactions()?,
        };
        block.header.witness = Witness::new(invocation.to_array(), verification);
        Ok(block)
    }

    /// The multi-signature address the next block's header commits to.
    pub fn next_consensus(&self) -> ConsensusResult<UInt160> {
        Ok(Contract::validators_address(&self.validators)?)
    }

    /// Proposal transactions in declared order.
    fn ordered_transactions(&self) -> ConsensusResult<Vec<Transaction>> {
        let proposal = self
            .proposal
            .as_ref()
            .ok_or_else(|| ConsensusError::InvalidPayload("no proposal".to_string()))?;
        proposal
            .transaction_hashes
            .iter()
            .map(|hash| {
                self.transactions
                    .get(hash)
                    .map(|tx| (**tx).clone())
                    .ok_or_else(|| {
                        ConsensusError::InvalidPayload(format!("missing transaction {hash}"))
                    })
            })
            .collect()
    }

    /// Records a validated payload for later recovery replay.
    pub fn remember(&mut self, payload: &ConsensusPayload) {
        if matches!(payload.message, ConsensusMessage::RecoveryMessage { .. })
            || matches!(payload.message, ConsensusMessage::RecoveryRequest { .. })
        {
            return;
        }
        if !self.known_payloads.contains(payload) {
            self.known_payloads.push(payload.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_with(n: usize, block_index: u32) -> ConsensusContext {
        let mut context = ConsensusContext::new(Arc::new(ProtocolSettings::private_net()), None);
        context.validators = (0..n)
            .map(|i| {
                KeyPair::from_private_key(&[i as u8 + 1; 32])
                    .unwrap()
                    .public_key()
            })
            .collect();
        context.block_index = block_index;
        context
    }

    #[test]
    fn quorum_thresholds_follow_the_validator_count() {
        let context = context_with(7, 1);
        assert_eq!(context.f(), 2);
        assert_eq!(context.m(), 5);
        let small = context_with(4, 1);
        assert_eq!(small.f(), 1);
        assert_eq!(small.m(), 3);
    }

    #[test]
    fn primary_rotates_backwards_with_the_view() {
        let context = context_with(4, 8);
        assert_eq!(context.primary_index(0), 0);
        assert_eq!(context.primary_index(1), 3);
        assert_eq!(context.primary_index(2), 2);
    }

    #[test]
    fn view_timeout_doubles_per_view() {
        let mut context = context_with(4, 1);
        context.settings = Arc::new(ProtocolSettings::private_net());
        let base = context.settings.milliseconds_per_block;
        assert_eq!(context.view_timeout(0), Duration::from_millis(base));
        assert_eq!(context.view_timeout(1), Duration::from_millis(base * 2));
        assert_eq!(context.view_timeout(3), Duration::from_millis(base * 8));
    }

    #[test]
    fn advancing_a_view_keeps_change_view_votes() {
        let mut context = context_with(4, 1);
        context.change_views.insert(0, 1);
        context.change_views.insert(2, 1);
        context.preparations.insert(0, UInt256::zero());
        context.advance_view(1);
        assert_eq!(context.change_views.len(), 2);
        assert!(context.preparations.is_empty());
        assert!(!context.commit_sent);
    }
}
