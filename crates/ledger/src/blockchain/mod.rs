// Copyright (C) 2015-2025 The Neo Project.
//
// mod.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! The block import pipeline.
//!
//! A received block moves `Received → Cached → Verifying → Persisting →
//! Committed`. Blocks arriving ahead of their predecessor wait in a
//! bounded per-height cache; once a block commits, cached successors
//! are promoted without re-fetching.

pub mod persist;
pub mod verification;

use crate::error::{LedgerError, LedgerResult};
use crate::genesis::genesis_block;
use crate::header_cache::HeaderCache;
use crate::mempool::{Mempool, PooledTransaction, RemovalReason};
use crate::verify_result::VerifyResult;
use lru::LruCache;
use neo3_config::ProtocolSettings;
use neo3_core::{Block, Header, Transaction, UInt256};
use neo3_cryptography::ECPoint;
use neo3_persistence::{Snapshot, SnapshotHandle, Store};
use neo3_smart_contract::native::{ledger_contract, neo_token, NativeRegistry};
use neo3_smart_contract::ApplicationExecuted;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Heights the unverified cache may hold before evicting.
const MAX_UNVERIFIED_HEIGHTS: usize = 100;
/// Distinct candidate blocks kept per height.
const MAX_BLOCKS_PER_HEIGHT: usize = 4;
/// Application logs kept in memory for RPC.
const APP_LOG_CAPACITY: usize = 10_000;
/// Event channel depth; slow listeners lose the oldest events.
const EVENT_CHANNEL_CAPACITY: usize = 1_024;

/// What the import pipeline announces to the rest of the node.
#[derive(Debug, Clone)]
pub enum LedgerEvent {
    BlockCommitted(Arc<Block>),
    TransactionAdded(Arc<Transaction>),
    TransactionRemoved {
        hash: UInt256,
        reason: RemovalReason,
    },
    /// A peer sent two different blocks for one height.
    BadPeer {
        peer: SocketAddr,
        height: u32,
    },
}

/// Candidate blocks for a height the chain has not reached yet.
#[derive(Default)]
struct UnverifiedEntry {
    blocks: Vec<Arc<Block>>,
    /// Which block each peer vouched for; a second, different one is
    /// misbehavior.
    senders: HashMap<SocketAddr, UInt256>,
}

/// The chain: committed state plus the import machinery over it.
pub struct Blockchain {
    settings: Arc<ProtocolSettings>,
    store: Arc<dyn Store>,
    natives: Arc<NativeRegistry>,
    mempool: Arc<Mempool>,
    header_cache: HeaderCache,
    /// `(hash, index)` of the committed tip.
    tip: RwLock<(UInt256, u32)>,
    /// Locally relayed blocks awaiting their predecessor, by hash.
    block_cache: Mutex<HashMap<UInt256, Arc<Block>>>,
    /// Peer-supplied blocks ahead of the tip, by height.
    unverified: Mutex<BTreeMap<u32, UnverifiedEntry>>,
    /// Serializes the whole verify-persist-commit sequence.
    persist_lock: Mutex<()>,
    app_logs: Mutex<LruCache<UInt256, Arc<ApplicationExecuted>>>,
    events: broadcast::Sender<LedgerEvent>,
}

impl Blockchain {
    /// Opens the chain over `store`, creating and persisting the
    /// genesis block on first use.
    pub fn new(
        settings: Arc<ProtocolSettings>,
        store: Arc<dyn Store>,
        natives: Arc<NativeRegistry>,
        mempool: Arc<Mempool>,
    ) -> LedgerResult<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let chain = Self {
            settings,
            store,
            natives,
            mempool,
            header_cache: HeaderCache::new(),
            tip: RwLock::new((UInt256::zero(), 0)),
            block_cache: Mutex::new(HashMap::new()),
            unverified: Mutex::new(BTreeMap::new()),
            persist_lock: Mutex::new(()),
            app_logs: Mutex::new(LruCache::new(
                NonZeroUsize::new(APP_LOG_CAPACITY).expect("capacity is nonzero"),
            )),
            events,
        };

        match ledger_contract::current(&chain.snapshot()) {
            Some(tip) => {
                *chain.tip.write() = tip;
                tracing::info!(height = tip.1, hash = %tip.0, "chain opened");
            }
            None => {
                let genesis = Arc::new(genesis_block(&chain.settings)?);
                let _guard = chain.persist_lock.lock();
                chain.commit_block(genesis.clone())?;
                tracing::info!(hash = %genesis.hash()?, "genesis committed");
            }
        }
        Ok(chain)
    }

    /// A fresh read view of the committed state.
    pub fn snapshot(&self) -> SnapshotHandle {
        Snapshot::on_store(self.store.clone()).into_handle()
    }

    pub fn settings(&self) -> &Arc<ProtocolSettings> {
        &self.settings
    }

    pub fn natives(&self) -> &Arc<NativeRegistry> {
        &self.natives
    }

    pub fn mempool(&self) -> &Arc<Mempool> {
        &self.mempool
    }

    pub fn header_cache(&self) -> &HeaderCache {
        &self.header_cache
    }

    /// Height of the committed tip.
    pub fn height(&self) -> u32 {
        self.tip.read().1
    }

    /// Hash of the committed tip.
    pub fn best_block_hash(&self) -> UInt256 {
        self.tip.read().0
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    pub fn get_block_hash(&self, index: u32) -> Option<UInt256> {
        ledger_contract::get_block_hash(&self.snapshot(), index)
    }

    pub fn get_block(&self, hash: &UInt256) -> Option<Block> {
        ledger_contract::get_block(&self.snapshot(), hash)
    }

    pub fn get_block_by_index(&self, index: u32) -> Option<Block> {
        let snapshot = self.snapshot();
        let hash = ledger_contract::get_block_hash(&snapshot, index)?;
        ledger_contract::get_block(&snapshot, &hash)
    }

    pub fn get_header(&self, hash: &UInt256) -> Option<Header> {
        self.get_block(hash).map(|block| block.header)
    }

    /// A committed transaction with its block index and execution state.
    pub fn get_transaction(&self, hash: &UInt256) -> Option<ledger_contract::TransactionState> {
        ledger_contract::get_transaction_state(&self.snapshot(), hash)
    }

    pub fn contains_transaction(&self, hash: &UInt256) -> bool {
        ledger_contract::contains_transaction(&self.snapshot(), hash)
    }

    /// The stored execution transcript of a recently committed
    /// transaction.
    pub fn application_log(&self, hash: &UInt256) -> Option<Arc<ApplicationExecuted>> {
        self.app_logs.lock().get(hash).cloned()
    }

    /// The validator set signing the next block.
    pub fn next_block_validators(&self) -> LedgerResult<Vec<ECPoint>> {
        Ok(neo_token::next_block_validators(
            &self.snapshot(),
            &self.settings,
        )?)
    }

    /// Admits a block from a peer or a local producer. Returns how the
    /// block was handled; `Err` is reserved for fatal persistence
    /// failures after verification.
    pub fn on_new_block(
        &self,
        block: Block,
        from: Option<SocketAddr>,
    ) -> LedgerResult<VerifyResult> {
        let hash = block.hash()?;
        let block = Arc::new(block);
        let index = block.index();

        if index <= self.height() {
            return Ok(VerifyResult::AlreadyExists);
        }

        if index == self.height() + 1 && block.header.prev_hash == self.best_block_hash() {
            let guard = self.persist_lock.lock();
            // The tip may have advanced while waiting for the lock.
            if index != self.height() + 1 || block.header.prev_hash != self.best_block_hash() {
                drop(guard);
                return Ok(VerifyResult::AlreadyExists);
            }
            let result = self.verify_and_commit(&block)?;
            if !result.is_ok() {
                if let Some(peer) = from {
                    let _ = self.events.send(LedgerEvent::BadPeer {
                        peer,
                        height: index,
                    });
                }
                return Ok(result);
            }
            self.promote_cached()?;
            return Ok(VerifyResult::Succeed);
        }

        self.cache_ahead(block, hash, from)
    }

    /// Relays a transaction into the memory pool.
    pub fn relay_transaction(&self, transaction: Transaction) -> LedgerResult<VerifyResult> {
        let hash = transaction.hash()?;
        if self.mempool.contains(&hash) {
            return Ok(VerifyResult::AlreadyInPool);
        }
        let snapshot = self.snapshot();
        if ledger_contract::contains_transaction(&snapshot, &hash) {
            return Ok(VerifyResult::AlreadyExists);
        }
        let transaction = Arc::new(transaction);
        let sender = match transaction.sender() {
            Some(sender) => sender,
            None => return Ok(VerifyResult::Invalid),
        };
        let result = verification::verify_transaction(
            &snapshot,
            &self.settings,
            &self.natives,
            &transaction,
            self.height(),
            self.mempool.sender_fee(&sender),
        );
        if !result.is_ok() {
            return Ok(result);
        }
        let pooled = PooledTransaction::new(transaction.clone())?;
        let (result, evicted) = self.mempool.try_add(pooled);
        for (item, reason) in evicted {
            let _ = self.events.send(LedgerEvent::TransactionRemoved {
                hash: item.hash,
                reason,
            });
        }
        if result.is_ok() {
            let _ = self
                .events
                .send(LedgerEvent::TransactionAdded(transaction));
        }
        Ok(result)
    }

    /// Verifies against the current tip and, on success, persists.
    /// Caller holds the persist lock.
    fn verify_and_commit(&self, block: &Arc<Block>) -> LedgerResult<VerifyResult> {
        let parent = self
            .get_block(&self.best_block_hash())
            .map(|parent| parent.header)
            .ok_or_else(|| LedgerError::InvalidBlock("tip block missing".to_string()))?;
        let snapshot = self.snapshot();
        let result = verification::verify_block(
            block,
            &parent,
            &snapshot,
            &self.settings,
            &self.natives,
        );
        if !result.is_ok() {
            tracing::warn!(index = block.index(), %result, "block rejected");
            return Ok(result);
        }
        self.commit_block(block.clone())?;
        Ok(VerifyResult::Succeed)
    }

    /// Persists a verified block and publishes the aftermath. Caller
    /// holds the persist lock.
    fn commit_block(&self, block: Arc<Block>) -> LedgerResult<()> {
        let logs = self.persist_block(&block)?;
        let hash = block.hash()?;
        *self.tip.write() = (hash, block.index());

        {
            let mut app_logs = self.app_logs.lock();
            for log in &logs {
                if let Some(tx_hash) = log.tx_hash {
                    app_logs.put(tx_hash, log.clone());
                }
            }
        }

        let confirmed: Vec<UInt256> = block
            .transactions
            .iter()
            .map(|tx| tx.hash())
            .collect::<Result<_, _>>()?;
        for (item, reason) in self.mempool.remove_confirmed(&confirmed) {
            let _ = self.events.send(LedgerEvent::TransactionRemoved {
                hash: item.hash,
                reason,
            });
        }

        // What survived the block must still verify against the new
        // state.
        let snapshot = self.snapshot();
        let height = block.index();
        let sender_fees = self.mempool.sender_fees();
        let removed = self.mempool.retain(|item| {
            let own_fee = item.transaction.system_fee + item.transaction.network_fee;
            let extra = sender_fees.get(&item.sender).copied().unwrap_or(0) - own_fee;
            match verification::verify_transaction(
                &snapshot,
                &self.settings,
                &self.natives,
                &item.transaction,
                height,
                extra,
            ) {
                VerifyResult::Succeed => None,
                VerifyResult::Expired => Some(RemovalReason::Expired),
                VerifyResult::InsufficientFunds => Some(RemovalReason::InsufficientFunds),
                VerifyResult::AlreadyExists | VerifyResult::HasConflicts => {
                    Some(RemovalReason::Conflict)
                }
                _ => Some(RemovalReason::Invalid),
            }
        });
        for (item, reason) in removed {
            let _ = self.events.send(LedgerEvent::TransactionRemoved {
                hash: item.hash,
                reason,
            });
        }

        tracing::info!(
            height = block.index(),
            %hash,
            transactions = block.transactions.len(),
            "block committed"
        );
        let _ = self.events.send(LedgerEvent::BlockCommitted(block));
        Ok(())
    }

    /// Stores a block that cannot be verified yet. Peer-supplied blocks
    /// go into the per-height cache; local ones wait keyed by hash.
    fn cache_ahead(
        &self,
        block: Arc<Block>,
        hash: UInt256,
        from: Option<SocketAddr>,
    ) -> LedgerResult<VerifyResult> {
        match from {
            Some(peer) => {
                let height = block.index();
                let mut cache = self.unverified.lock();
                let entry = cache.entry(height).or_default();
                let conflicting = matches!(
                    entry.senders.get(&peer),
                    Some(vouched) if *vouched != hash
                );
                if !conflicting {
                    entry.senders.insert(peer, hash);
                    if entry.blocks.len() < MAX_BLOCKS_PER_HEIGHT
                        && !entry
                            .blocks
                            .iter()
                            .any(|cached| cached.hash().ok() == Some(hash))
                    {
                        entry.blocks.push(block);
                    }
                    while cache.len() > MAX_UNVERIFIED_HEIGHTS {
                        let lowest = *cache.keys().next().expect("cache is nonempty");
                        cache.remove(&lowest);
                    }
                }
                drop(cache);
                if conflicting {
                    let _ = self.events.send(LedgerEvent::BadPeer { peer, height });
                    return Ok(VerifyResult::Invalid);
                }
            }
            None => {
                self.block_cache.lock().insert(hash, block);
            }
        }
        Ok(VerifyResult::UnableToVerify)
    }

    /// After a commit, drains every cached block that now extends the
    /// tip. Caller holds the persist lock.
    fn promote_cached(&self) -> LedgerResult<()> {
        loop {
            let next_index = self.height() + 1;
            let tip_hash = self.best_block_hash();

            let mut candidate: Option<Arc<Block>> = None;
            {
                let mut cache = self.unverified.lock();
                // Heights at or below the tip are dead weight either way.
                let stale: Vec<u32> = cache
                    .keys()
                    .copied()
                    .take_while(|height| *height < next_index)
                    .collect();
                for height in stale {
                    cache.remove(&height);
                }
                if let Some(entry) = cache.get_mut(&next_index) {
                    if let Some(position) = entry
                        .blocks
                        .iter()
                        .position(|block| block.header.prev_hash == tip_hash)
                    {
                        candidate = Some(entry.blocks.remove(position));
                    }
                    if entry.blocks.is_empty() {
                        cache.remove(&next_index);
                    }
                }
            }
            if candidate.is_none() {
                let mut local = self.block_cache.lock();
                let key = local
                    .iter()
                    .find(|(_, block)| {
                        block.index() == next_index && block.header.prev_hash == tip_hash
                    })
                    .map(|(hash, _)| *hash);
                if let Some(hash) = key {
                    candidate = local.remove(&hash);
                }
            }

            let Some(block) = candidate else {
                return Ok(());
            };
            let result = self.verify_and_commit(&block)?;
            if !result.is_ok() {
                // A bad cached block does not stop siblings from being
                // tried on the next pass.
                continue;
            }
        }
    }
}
