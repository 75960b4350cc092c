// Copyright (C) 2015-2025 The Neo Project.
//
// service.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! The dBFT service: a single task per node that turns consensus
//! payloads and timer ticks into block production.
//!
//! Inputs arrive on one channel (peer payloads, pool additions, commit
//! notifications); outputs leave on another (payload broadcasts,
//! finalized blocks). The node wires those to the network layer and
//! the import pipeline.

use crate::context::{ConsensusContext, Proposal};
use crate::error::{ConsensusError, ConsensusResult};
use crate::messages::{
    ChangeViewReason, ConsensusMessage, ConsensusPayload, SIGNATURE_SIZE,
};
use neo3_core::{Block, Transaction, UInt256};
use neo3_cryptography::KeyPair;
use neo3_ledger::Blockchain;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Poll interval while this node is not in the validator set.
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);
/// Bytes reserved in a proposal for the header and witness.
const BLOCK_OVERHEAD: usize = 1024;

/// What the service consumes.
pub enum ConsensusInput {
    /// A consensus payload relayed by a peer.
    Payload(ConsensusPayload),
    /// A transaction entered the local pool.
    TransactionAdded(Arc<Transaction>),
    /// The ledger committed a block at this height.
    BlockCommitted(u32),
}

/// What the service emits.
#[derive(Debug)]
pub enum ConsensusOutput {
    /// Relay this payload to every peer.
    Broadcast(ConsensusPayload),
    /// A finalized block, ready for the import pipeline.
    BlockProduced(Block),
}

/// One validator's dBFT engine.
pub struct DbftService {
    context: ConsensusContext,
    chain: Arc<Blockchain>,
    inbox: mpsc::Receiver<ConsensusInput>,
    outbox: mpsc::Sender<ConsensusOutput>,
    deadline: Instant,
    pending: Vec<ConsensusOutput>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

impl DbftService {
    pub fn new(
        chain: Arc<Blockchain>,
        key: KeyPair,
        inbox: mpsc::Receiver<ConsensusInput>,
        outbox: mpsc::Sender<ConsensusOutput>,
    ) -> Self {
        let context = ConsensusContext::new(chain.settings().clone(), Some(key));
        Self {
            context,
            chain,
            inbox,
            outbox,
            deadline: Instant::now() + IDLE_TIMEOUT,
            pending: Vec::new(),
        }
    }

    /// Runs until the input channel closes.
    pub async fn run(mut self) {
        if let Err(error) = self.start_round() {
            warn!(%error, "consensus failed to start");
            return;
        }
        self.flush().await;
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(self.deadline) => {
                    if let Err(error) = self.on_timeout() {
                        warn!(%error, "consensus timer handling failed");
                    }
                }
                input = self.inbox.recv() => match input {
                    Some(ConsensusInput::Payload(payload)) => {
                        if let Err(error) = self.on_payload(payload) {
                            debug!(%error, "consensus payload dropped");
                        }
                    }
                    Some(ConsensusInput::TransactionAdded(tx)) => {
                        if let Err(error) = self.on_transaction(tx) {
                            debug!(%error, "pool transaction ignored");
                        }
                    }
                    Some(ConsensusInput::BlockCommitted(height)) => {
                        if height >= self.context.block_index {
                            if let Err(error) = self.start_round() {
                                warn!(%error, "consensus round restart failed");
                            }
                        }
                    }
                    None => break,
                }
            }
            self.flush().await;
        }
    }

    async fn flush(&mut self) {
        for output in self.pending.drain(..) {
            if self.outbox.send(output).await.is_err() {
                return;
            }
        }
    }

    /// Opens the round for the block after the committed tip.
    fn start_round(&mut self) -> ConsensusResult<()> {
        let prev_hash = self.chain.best_block_hash();
        let tip = self
            .chain
            .get_header(&prev_hash)
            .ok_or_else(|| ConsensusError::InvalidPayload("tip header missing".to_string()))?;
        let validators = self.chain.next_block_validators()?;
        self.context
            .reset(tip.index + 1, prev_hash, tip.timestamp, validators);

        match self.context.my_index {
            Some(index) => {
                self.deadline = Instant::now() + self.context.view_timeout(0);
                info!(
                    height = self.context.block_index,
                    validator = index,
                    primary = self.context.is_primary(),
                    "consensus round started"
                );
                if self.context.is_primary() {
                    self.send_prepare_request()?;
                }
            }
            None => {
                self.deadline = Instant::now() + IDLE_TIMEOUT;
            }
        }
        Ok(())
    }

    fn my_index(&self) -> ConsensusResult<u8> {
        self.context
            .my_index
            .ok_or_else(|| ConsensusError::NotAValidator(self.context.validator_count()))
    }

    fn sign_payload(&self, message: ConsensusMessage) -> ConsensusResult<ConsensusPayload> {
        let key = self
            .context
            .key
            .as_ref()
            .ok_or_else(|| ConsensusError::NotAValidator(self.context.validator_count()))?;
        ConsensusPayload::sign(
            self.context.settings.network,
            self.my_index()?,
            self.context.block_index,
            self.context.view_number,
            message,
            key,
        )
    }

    fn broadcast(&mut self, payload: ConsensusPayload) {
        self.pending.push(ConsensusOutput::Broadcast(payload));
    }

    /// Primary: select transactions from the pool and declare the
    /// proposal.
    fn send_prepare_request(&mut self) -> ConsensusResult<()> {
        let my = self.my_index()?;
        let settings = self.context.settings.clone();
        let transactions = self.chain.mempool().select(
            settings.max_transactions_per_block as usize,
            neo3_config::MAX_BLOCK_SIZE - BLOCK_OVERHEAD,
        );
        let transaction_hashes: Vec<UInt256> = transactions
            .iter()
            .map(|tx| tx.hash())
            .collect::<Result<_, _>>()?;

        let timestamp = now_ms().max(self.context.prev_timestamp + 1);
        let nonce: u64 = rand::random();
        let payload = self.sign_payload(ConsensusMessage::PrepareRequest {
            timestamp,
            nonce,
            transaction_hashes: transaction_hashes.clone(),
        })?;
        let preparation_hash = payload.hash()?;

        self.context.proposal = Some(Proposal {
            timestamp,
            nonce,
            transaction_hashes: transaction_hashes.clone(),
            preparation_hash,
        });
        for (hash, tx) in transaction_hashes.iter().zip(transactions) {
            self.context.transactions.insert(*hash, tx);
        }
        self.context.preparations.insert(my, preparation_hash);
        self.context.remember(&payload);
        self.broadcast(payload);
        self.check_preparations()
    }

    /// Validates origin and signature, then dispatches by body.
    fn on_payload(&mut self, payload: ConsensusPayload) -> ConsensusResult<()> {
        if payload.block_index != self.context.block_index {
            return Ok(());
        }
        let index = payload.validator_index as usize;
        let Some(key) = self.context.validators.get(index) else {
            return Err(ConsensusError::InvalidPayload(format!(
                "validator index {index} out of range"
            )));
        };
        if !payload.verify_signature(self.context.settings.network, key)? {
            return Err(ConsensusError::InvalidPayload(
                "bad payload signature".to_string(),
            ));
        }
        if Some(payload.validator_index) == self.context.my_index {
            return Ok(());
        }

        match payload.message.clone() {
            ConsensusMessage::ChangeView {
                new_view_number, ..
            } => self.on_change_view(payload, new_view_number),
            ConsensusMessage::PrepareRequest { .. } => self.on_prepare_request(payload),
            ConsensusMessage::PrepareResponse { preparation_hash } => {
                self.on_prepare_response(payload, preparation_hash)
            }
            ConsensusMessage::Commit { signature } => self.on_commit(payload, signature),
            ConsensusMessage::RecoveryRequest { .. } => self.on_recovery_request(),
            ConsensusMessage::RecoveryMessage { payloads } => {
                self.on_recovery_message(payloads)
            }
        }
    }

    fn on_change_view(
        &mut self,
        payload: ConsensusPayload,
        new_view: u8,
    ) -> ConsensusResult<()> {
        if new_view <= self.context.view_number {
            return Ok(());
        }
        self.context
            .change_views
            .insert(payload.validator_index, new_view);
        self.context.remember(&payload);
        self.try_advance_view(new_view)
    }

    fn try_advance_view(&mut self, view: u8) -> ConsensusResult<()> {
        // Commit is a point of no return; recovery is the only way out.
        if self.context.commit_sent {
            return Ok(());
        }
        if view <= self.context.view_number {
            return Ok(());
        }
        if self.context.change_view_quorum(view) < self.context.m() {
            return Ok(());
        }
        self.context.advance_view(view);
        self.deadline = Instant::now() + self.context.view_timeout(view);
        info!(
            height = self.context.block_index,
            view, "view changed"
        );
        if self.context.is_primary() {
            self.send_prepare_request()?;
        }
        Ok(())
    }

    fn on_prepare_request(&mut self, payload: ConsensusPayload) -> ConsensusResult<()> {
        if payload.view_number != self.context.view_number
            || payload.validator_index != self.context.primary_index(self.context.view_number)
            || self.context.proposal.is_some()
        {
            return Ok(());
        }
        let ConsensusMessage::PrepareRequest {
            timestamp,
            nonce,
            transaction_hashes,
        } = payload.message.clone()
        else {
            return Ok(());
        };
        if timestamp <= self.context.prev_timestamp {
            return Err(ConsensusError::InvalidPayload(
                "proposal timestamp not after parent".to_string(),
            ));
        }
        if transaction_hashes.len()
            > self.context.settings.max_transactions_per_block as usize
        {
            return Err(ConsensusError::InvalidPayload(
                "proposal exceeds transaction limit".to_string(),
            ));
        }

        let preparation_hash = payload.hash()?;
        self.context
            .preparations
            .insert(payload.validator_index, preparation_hash);
        self.context.proposal = Some(Proposal {
            timestamp,
            nonce,
            transaction_hashes: transaction_hashes.clone(),
            preparation_hash,
        });
        for hash in &transaction_hashes {
            if let Some(tx) = self.chain.mempool().get(hash) {
                self.context.transactions.insert(*hash, tx);
            }
        }
        self.context.remember(&payload);
        self.respond_if_ready()
    }

    /// Once every proposed body is on hand, agree to the proposal and
    /// see whether the quorum is already there.
    fn respond_if_ready(&mut self) -> ConsensusResult<()> {
        if !self.context.proposal_complete() {
            return Ok(());
        }
        let my = self.my_index()?;
        let preparation_hash = self
            .context
            .proposal
            .as_ref()
            .map(|proposal| proposal.preparation_hash)
            .expect("proposal checked above");
        if !self.context.is_primary() && !self.context.preparations.contains_key(&my) {
            let response = self.sign_payload(ConsensusMessage::PrepareResponse {
                preparation_hash,
            })?;
            self.context.preparations.insert(my, preparation_hash);
            self.context.remember(&response);
            self.broadcast(response);
        }
        self.check_preparations()
    }

    fn on_prepare_response(
        &mut self,
        payload: ConsensusPayload,
        preparation_hash: UInt256,
    ) -> ConsensusResult<()> {
        if payload.view_number != self.context.view_number {
            return Ok(());
        }
        let Some(proposal) = &self.context.proposal else {
            return Ok(());
        };
        if proposal.preparation_hash != preparation_hash {
            return Ok(());
        }
        self.context
            .preparations
            .insert(payload.validator_index, preparation_hash);
        self.context.remember(&payload);
        self.check_preparations()
    }

    /// 2f+1 matching preparations lock this node into the proposal: it
    /// signs the block and can no longer change view.
    fn check_preparations(&mut self) -> ConsensusResult<()> {
        if self.context.commit_sent || !self.context.proposal_complete() {
            return Ok(());
        }
        let Some(proposal) = &self.context.proposal else {
            return Ok(());
        };
        let preparation_hash = proposal.preparation_hash;
        let agreeing = self
            .context
            .preparations
            .values()
            .filter(|hash| **hash == preparation_hash)
            .count();
        if agreeing < self.context.m() {
            return Ok(());
        }

        let my = self.my_index()?;
        let header = self.context.make_header()?;
        let key = self
            .context
            .key
            .as_ref()
            .ok_or_else(|| ConsensusError::NotAValidator(self.context.validator_count()))?;
        let signature: [u8; SIGNATURE_SIZE] =
            key.sign(&header.sign_data(self.context.settings.network)?);
        let payload = self.sign_payload(ConsensusMessage::Commit { signature })?;
        self.context.commits.insert(my, signature);
        self.context.commit_sent = true;
        self.context.remember(&payload);
        self.broadcast(payload);
        debug!(height = self.context.block_index, "commit sent");
        self.check_commits()
    }

    fn on_commit(
        &mut self,
        payload: ConsensusPayload,
        signature: [u8; SIGNATURE_SIZE],
    ) -> ConsensusResult<()> {
        if payload.view_number != self.context.view_number {
            return Ok(());
        }
        self.context
            .commits
            .insert(payload.validator_index, signature);
        self.context.remember(&payload);
        self.check_commits()
    }

    /// 2f+1 commit signatures finalize the block; every honest node
    /// assembles the identical witness.
    fn check_commits(&mut self) -> ConsensusResult<()> {
        if self.context.block_sent
            || !self.context.proposal_complete()
            || self.context.commits.len() < self.context.m()
        {
            return Ok(());
        }
        match self.context.create_block() {
            Ok(block) => {
                self.context.block_sent = true;
                info!(
                    height = block.index(),
                    view = self.context.view_number,
                    transactions = block.transactions.len(),
                    "block finalized"
                );
                self.pending.push(ConsensusOutput::BlockProduced(block));
                Ok(())
            }
            // Not enough valid signatures yet; wait for more commits.
            Err(_) => Ok(()),
        }
    }

    fn on_transaction(&mut self, transaction: Arc<Transaction>) -> ConsensusResult<()> {
        let Some(proposal) = &self.context.proposal else {
            return Ok(());
        };
        let hash = transaction.hash()?;
        if !proposal.transaction_hashes.contains(&hash) {
            return Ok(());
        }
        self.context.transactions.insert(hash, transaction);
        self.respond_if_ready()
    }

    fn on_recovery_request(&mut self) -> ConsensusResult<()> {
        if self.context.my_index.is_none() || self.context.known_payloads.is_empty() {
            return Ok(());
        }
        let payloads = self.context.known_payloads.clone();
        let recovery = self.sign_payload(ConsensusMessage::RecoveryMessage { payloads })?;
        self.broadcast(recovery);
        Ok(())
    }

    fn on_recovery_message(
        &mut self,
        payloads: Vec<ConsensusPayload>,
    ) -> ConsensusResult<()> {
        for payload in payloads {
            // Each bundled payload is validated on its own; a bad one
            // does not poison the rest.
            if let Err(error) = self.on_payload(payload) {
                debug!(%error, "recovered payload dropped");
            }
        }
        Ok(())
    }

    /// The view timer fired: ask for a view change, or for recovery if
    /// this node is already locked into a commit.
    fn on_timeout(&mut self) -> ConsensusResult<()> {
        if self.context.my_index.is_none() {
            self.deadline = Instant::now() + IDLE_TIMEOUT;
            return self.start_round();
        }
        if self.context.commit_sent || self.context.block_sent {
            let request = self.sign_payload(ConsensusMessage::RecoveryRequest {
                timestamp: now_ms(),
            })?;
            self.broadcast(request);
            self.deadline =
                Instant::now() + self.context.view_timeout(self.context.view_number);
            return Ok(());
        }

        let my = self.my_index()?;
        let new_view = self.context.view_number + 1;
        let payload = self.sign_payload(ConsensusMessage::ChangeView {
            new_view_number: new_view,
            timestamp: now_ms(),
            reason: ChangeViewReason::Timeout,
        })?;
        self.context.change_views.insert(my, new_view);
        self.context.remember(&payload);
        self.broadcast(payload);
        self.deadline = Instant::now() + self.context.view_timeout(new_view);
        debug!(
            height = self.context.block_index,
            new_view, "view change requested"
        );
        self.try_advance_view(new_view)
    }
}
