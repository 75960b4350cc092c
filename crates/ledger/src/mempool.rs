// Copyright (C) 2015-2025 The Neo Project.
//
// mempool.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! The memory pool of unconfirmed transactions.
//!
//! Transactions are ordered by `(high priority, fee per byte, network
//! fee)` descending; the pool is capacity-bounded, tracks the cumulative
//! fees each sender owes, and resolves Conflicts attributes so at most
//! one side of a conflict pair is ever pooled.

use crate::error::LedgerResult;
use crate::verify_result::VerifyResult;
use neo3_core::{Transaction, TransactionAttribute, TransactionAttributeType, UInt160, UInt256};
use neo3_io::Serializable;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Why a transaction left the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// It was committed in a block.
    Confirmed,
    /// Its `valid_until_block` passed.
    Expired,
    /// Evicted to make room for a better-paying transaction.
    LowPriority,
    /// A conflicting transaction displaced it or was committed.
    Conflict,
    /// The sender can no longer cover the pooled fees.
    InsufficientFunds,
    /// It no longer verifies against the current state.
    Invalid,
}

/// A verified transaction waiting for a block.
#[derive(Clone)]
pub struct PooledTransaction {
    pub transaction: Arc<Transaction>,
    pub hash: UInt256,
    pub sender: UInt160,
    pub fee_per_byte: i64,
    pub high_priority: bool,
}

impl PooledTransaction {
    pub fn new(transaction: Arc<Transaction>) -> LedgerResult<Self> {
        let hash = transaction.hash()?;
        let sender = transaction.sender().unwrap_or_else(UInt160::zero);
        Ok(Self {
            hash,
            sender,
            fee_per_byte: transaction.fee_per_byte(),
            high_priority: transaction.has_attribute(TransactionAttributeType::HighPriority),
            transaction,
        })
    }

    /// Hashes this transaction declares a conflict with.
    fn conflict_hashes(&self) -> impl Iterator<Item = UInt256> + '_ {
        self.transaction.attributes.iter().filter_map(|attr| match attr {
            TransactionAttribute::Conflicts { hash } => Some(*hash),
            _ => None,
        })
    }

    fn total_fee(&self) -> i64 {
        self.transaction.system_fee + self.transaction.network_fee
    }
}

/// Sort key; `BTreeSet` iteration in reverse yields best-first.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone)]
struct PoolKey {
    high_priority: bool,
    fee_per_byte: i64,
    network_fee: i64,
    hash: UInt256,
}

impl PoolKey {
    fn of(item: &PooledTransaction) -> Self {
        Self {
            high_priority: item.high_priority,
            fee_per_byte: item.fee_per_byte,
            network_fee: item.transaction.network_fee,
            hash: item.hash,
        }
    }
}

#[derive(Default)]
struct PoolInner {
    verified: HashMap<UInt256, PooledTransaction>,
    sorted: BTreeSet<PoolKey>,
    sender_fees: HashMap<UInt160, i64>,
    /// Conflict target hash → pooled transactions declaring it.
    conflicts: HashMap<UInt256, HashSet<UInt256>>,
}

impl PoolInner {
    fn insert(&mut self, item: PooledTransaction) {
        self.sorted.insert(PoolKey::of(&item));
        *self.sender_fees.entry(item.sender).or_insert(0) += item.total_fee();
        for target in item.conflict_hashes() {
            self.conflicts.entry(target).or_default().insert(item.hash);
        }
        self.verified.insert(item.hash, item);
    }

    fn remove(&mut self, hash: &UInt256) -> Option<PooledTransaction> {
        let item = self.verified.remove(hash)?;
        self.sorted.remove(&PoolKey::of(&item));
        if let Some(fee) = self.sender_fees.get_mut(&item.sender) {
            *fee -= item.total_fee();
            if *fee <= 0 {
                self.sender_fees.remove(&item.sender);
            }
        }
        for target in item.conflict_hashes() {
            if let Some(set) = self.conflicts.get_mut(&target) {
                set.remove(&item.hash);
                if set.is_empty() {
                    self.conflicts.remove(&target);
                }
            }
        }
        Some(item)
    }
}

/// Capacity-bounded, fee-ordered pool of verified transactions.
pub struct Mempool {
    capacity: usize,
    inner: RwLock<PoolInner>,
}

impl Mempool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: RwLock::new(PoolInner::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn count(&self) -> usize {
        self.inner.read().verified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().verified.is_empty()
    }

    pub fn contains(&self, hash: &UInt256) -> bool {
        self.inner.read().verified.contains_key(hash)
    }

    pub fn get(&self, hash: &UInt256) -> Option<Arc<Transaction>> {
        self.inner
            .read()
            .verified
            .get(hash)
            .map(|item| item.transaction.clone())
    }

    /// All pooled hashes, best-paying first.
    pub fn hashes(&self) -> Vec<UInt256> {
        let inner = self.inner.read();
        inner.sorted.iter().rev().map(|key| key.hash).collect()
    }

    /// Cumulative system + network fees the sender has pooled.
    pub fn sender_fee(&self, sender: &UInt160) -> i64 {
        self.inner
            .read()
            .sender_fees
            .get(sender)
            .copied()
            .unwrap_or(0)
    }

    /// A copy of every sender's pooled fee total.
    pub fn sender_fees(&self) -> HashMap<UInt160, i64> {
        self.inner.read().sender_fees.clone()
    }

    /// Drains the best transactions for a block proposal, bounded by
    /// count and by the encoded bytes remaining in the block.
    pub fn select(&self, max_count: usize, max_bytes: usize) -> Vec<Arc<Transaction>> {
        let inner = self.inner.read();
        let mut picked = Vec::new();
        let mut used_bytes = 0usize;
        let mut excluded: HashSet<UInt256> = HashSet::new();
        for key in inner.sorted.iter().rev() {
            if picked.len() == max_count {
                break;
            }
            let item = &inner.verified[&key.hash];
            if excluded.contains(&item.hash) {
                continue;
            }
            let size = item.transaction.size();
            if used_bytes + size > max_bytes {
                continue;
            }
            // A selected transaction shuts out the conflicts it declares.
            for target in item.conflict_hashes() {
                excluded.insert(target);
            }
            used_bytes += size;
            picked.push(item.transaction.clone());
        }
        picked
    }

    /// Admits a pre-verified transaction, resolving conflicts and
    /// capacity. When the pool is full the newcomer may only displace a
    /// strictly lower fee-per-byte transaction of the same sender.
    pub fn try_add(&self, item: PooledTransaction) -> (VerifyResult, Vec<(PooledTransaction, RemovalReason)>) {
        let mut inner = self.inner.write();
        let mut evicted = Vec::new();

        if inner.verified.contains_key(&item.hash) {
            return (VerifyResult::AlreadyInPool, evicted);
        }

        // A pooled transaction already claims to conflict with this one.
        if inner.conflicts.contains_key(&item.hash) {
            return (VerifyResult::HasConflicts, evicted);
        }

        // This one claims conflicts with pooled transactions: it has to
        // outbid every one of them to displace them.
        let targets: Vec<UInt256> = item
            .conflict_hashes()
            .filter(|hash| inner.verified.contains_key(hash))
            .collect();
        for target in &targets {
            if inner.verified[target].fee_per_byte >= item.fee_per_byte {
                return (VerifyResult::HasConflicts, evicted);
            }
        }
        for target in targets {
            if let Some(removed) = inner.remove(&target) {
                evicted.push((removed, RemovalReason::Conflict));
            }
        }

        if inner.verified.len() >= self.capacity {
            let victim = inner
                .sorted
                .iter()
                .find(|key| {
                    inner.verified[&key.hash].sender == item.sender
                        && key.fee_per_byte < item.fee_per_byte
                })
                .map(|key| key.hash);
            match victim {
                Some(hash) => {
                    if let Some(removed) = inner.remove(&hash) {
                        evicted.push((removed, RemovalReason::LowPriority));
                    }
                }
                None => return (VerifyResult::OutOfMemory, evicted),
            }
        }

        inner.insert(item);
        (VerifyResult::Succeed, evicted)
    }

    /// Drops transactions confirmed by a block, including any pooled
    /// transaction conflicting with a confirmed hash.
    pub fn remove_confirmed(&self, hashes: &[UInt256]) -> Vec<(PooledTransaction, RemovalReason)> {
        let mut inner = self.inner.write();
        let mut removed = Vec::new();
        for hash in hashes {
            if let Some(item) = inner.remove(hash) {
                removed.push((item, RemovalReason::Confirmed));
            }
            // Losers of the conflict pair go too.
            if let Some(declarers) = inner.conflicts.get(hash).cloned() {
                for declarer in declarers {
                    if let Some(item) = inner.remove(&declarer) {
                        removed.push((item, RemovalReason::Conflict));
                    }
                }
            }
        }
        removed
    }

    /// Re-checks every pooled transaction after a commit and drops the
    /// ones the callback rejects.
    pub fn retain<F>(&self, mut still_valid: F) -> Vec<(PooledTransaction, RemovalReason)>
    where
        F: FnMut(&PooledTransaction) -> Option<RemovalReason>,
    {
        let mut inner = self.inner.write();
        let hashes: Vec<UInt256> = inner.verified.keys().copied().collect();
        let mut removed = Vec::new();
        for hash in hashes {
            let reason = {
                let item = &inner.verified[&hash];
                still_valid(item)
            };
            if let Some(reason) = reason {
                if let Some(item) = inner.remove(&hash) {
                    removed.push((item, reason));
                }
            }
        }
        removed
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        *inner = PoolInner::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo3_core::{Signer, WitnessScope};

    fn tx(nonce: u32, sender_byte: u8, network_fee: i64) -> PooledTransaction {
        let mut tx = Transaction::new();
        tx.nonce = nonce;
        tx.network_fee = network_fee;
        tx.valid_until_block = 100;
        tx.script = vec![0x11];
        tx.signers = vec![Signer::new(
            UInt160::from_bytes(&[sender_byte; 20]).unwrap(),
            WitnessScope::CALLED_BY_ENTRY,
        )];
        tx.witnesses = vec![Default::default()];
        PooledTransaction::new(Arc::new(tx)).unwrap()
    }

    #[test]
    fn orders_by_fee_per_byte() {
        let pool = Mempool::new(16);
        let cheap = tx(1, 1, 1_000);
        let rich = tx(2, 1, 9_000_000);
        pool.try_add(cheap.clone());
        pool.try_add(rich.clone());
        assert_eq!(pool.hashes(), vec![rich.hash, cheap.hash]);
    }

    #[test]
    fn duplicate_is_reported() {
        let pool = Mempool::new(16);
        let item = tx(1, 1, 1_000);
        assert!(pool.try_add(item.clone()).0.is_ok());
        assert_eq!(pool.try_add(item).0, VerifyResult::AlreadyInPool);
    }

    #[test]
    fn full_pool_rejects_unless_same_sender_pays_less() {
        let pool = Mempool::new(1);
        let pooled = tx(1, 1, 1_000);
        assert!(pool.try_add(pooled.clone()).0.is_ok());

        // Different sender cannot displace anything.
        let stranger = tx(2, 2, 9_000_000);
        assert_eq!(pool.try_add(stranger).0, VerifyResult::OutOfMemory);

        // Same sender with an equal fee cannot either.
        let equal = tx(3, 1, 1_000);
        assert_eq!(pool.try_add(equal).0, VerifyResult::OutOfMemory);

        // Same sender paying strictly more evicts the old one.
        let better = tx(4, 1, 50_000);
        let (result, evicted) = pool.try_add(better.clone());
        assert!(result.is_ok());
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].0.hash, pooled.hash);
        assert_eq!(evicted[0].1, RemovalReason::LowPriority);
        assert_eq!(pool.count(), 1);
        assert!(pool.contains(&better.hash));
    }

    #[test]
    fn sender_fees_accumulate_and_release() {
        let pool = Mempool::new(16);
        let a = tx(1, 1, 1_000);
        let b = tx(2, 1, 2_000);
        let sender = a.sender;
        pool.try_add(a.clone());
        pool.try_add(b.clone());
        assert_eq!(pool.sender_fee(&sender), 3_000);
        pool.remove_confirmed(&[a.hash]);
        assert_eq!(pool.sender_fee(&sender), 2_000);
    }

    #[test]
    fn conflict_attribute_displaces_only_when_outbid() {
        let pool = Mempool::new(16);
        let target = tx(1, 1, 5_000);
        pool.try_add(target.clone());

        let mut cheap = Transaction::new();
        cheap.nonce = 9;
        cheap.network_fee = 1_000;
        cheap.valid_until_block = 100;
        cheap.script = vec![0x11];
        cheap.signers = vec![Signer::new(
            UInt160::from_bytes(&[2; 20]).unwrap(),
            WitnessScope::CALLED_BY_ENTRY,
        )];
        cheap.attributes = vec![TransactionAttribute::Conflicts { hash: target.hash }];
        cheap.witnesses = vec![Default::default()];
        let cheap = PooledTransaction::new(Arc::new(cheap)).unwrap();
        assert_eq!(pool.try_add(cheap).0, VerifyResult::HasConflicts);

        let mut rich = Transaction::new();
        rich.nonce = 10;
        rich.network_fee = 90_000_000;
        rich.valid_until_block = 100;
        rich.script = vec![0x11];
        rich.signers = vec![Signer::new(
            UInt160::from_bytes(&[2; 20]).unwrap(),
            WitnessScope::CALLED_BY_ENTRY,
        )];
        rich.attributes = vec![TransactionAttribute::Conflicts { hash: target.hash }];
        rich.witnesses = vec![Default::default()];
        let rich = PooledTransaction::new(Arc::new(rich)).unwrap();
        let (result, evicted) = pool.try_add(rich);
        assert!(result.is_ok());
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].1, RemovalReason::Conflict);
        assert!(!pool.contains(&target.hash));
    }

    #[test]
    fn selection_honors_count_and_size_bounds() {
        let pool = Mempool::new(16);
        for nonce in 0..8 {
            pool.try_add(tx(nonce, 1, 1_000 + nonce as i64));
        }
        let all = pool.select(512, usize::MAX);
        assert_eq!(all.len(), 8);
        let capped = pool.select(3, usize::MAX);
        assert_eq!(capped.len(), 3);
        // Best-paying first.
        assert!(capped[0].network_fee >= capped[1].network_fee);
        let none = pool.select(512, 8);
        assert!(none.is_empty());
    }
}
