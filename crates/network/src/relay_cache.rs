// Copyright (C) 2015-2025 The Neo Project.
//
// relay_cache.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Tracking of which inventories a peer already knows.
//!
//! Per peer: a bloom filter of everything the peer has mentioned or
//! been sent (cheap, false positives only suppress a redundant relay)
//! plus a small exact LRU for the hot set. Never offer an inventory
//! the peer is known to have.

use lru::LruCache;
use neo3_core::UInt256;
use neo3_cryptography::BloomFilter;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// Bits in the per-peer bloom filter.
const BLOOM_BITS: usize = 32_768;
/// Hash functions in the bloom filter.
const BLOOM_K: u32 = 7;
/// Exact recent-hash window per peer.
const EXACT_CAPACITY: usize = 1_024;

/// Hashes one peer is known to have seen.
pub struct KnownHashes {
    bloom: Mutex<BloomFilter>,
    exact: Mutex<LruCache<UInt256, ()>>,
}

impl KnownHashes {
    pub fn new(tweak: u32) -> Self {
        Self {
            bloom: Mutex::new(BloomFilter::new(BLOOM_BITS, BLOOM_K, tweak)),
            exact: Mutex::new(LruCache::new(
                NonZeroUsize::new(EXACT_CAPACITY).expect("capacity is nonzero"),
            )),
        }
    }

    /// Records that the peer knows `hash`.
    pub fn insert(&self, hash: &UInt256) {
        self.bloom.lock().add(hash.as_bytes());
        self.exact.lock().put(*hash, ());
    }

    /// Whether the peer (probably) knows `hash` already.
    pub fn contains(&self, hash: &UInt256) -> bool {
        if self.exact.lock().contains(hash) {
            return true;
        }
        self.bloom.lock().contains(hash.as_bytes())
    }

    /// Filters `hashes` down to what the peer still needs.
    pub fn unknown<'a>(&self, hashes: &'a [UInt256]) -> Vec<UInt256> {
        hashes
            .iter()
            .filter(|hash| !self.contains(hash))
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(byte: u8) -> UInt256 {
        UInt256::from_bytes(&[byte; 32]).unwrap()
    }

    #[test]
    fn inserted_hashes_are_known() {
        let known = KnownHashes::new(7);
        known.insert(&hash(1));
        assert!(known.contains(&hash(1)));
        assert!(!known.contains(&hash(2)));
    }

    #[test]
    fn unknown_filters_out_seen_hashes() {
        let known = KnownHashes::new(7);
        known.insert(&hash(1));
        known.insert(&hash(3));
        let wanted = known.unknown(&[hash(1), hash(2), hash(3), hash(4)]);
        assert_eq!(wanted, vec![hash(2), hash(4)]);
    }

    #[test]
    fn bloom_retains_hashes_past_the_exact_window() {
        let known = KnownHashes::new(7);
        for i in 0..=255u8 {
            for j in 0..8u8 {
                let mut bytes = [i; 32];
                bytes[0] = j;
                known.insert(&UInt256::from_bytes(&bytes).unwrap());
            }
        }
        // Far more than EXACT_CAPACITY inserts later, the first hash is
        // still remembered through the bloom side.
        let mut first = [0u8; 32];
        first[0] = 0;
        assert!(known.contains(&UInt256::from_bytes(&first).unwrap()));
    }
}
