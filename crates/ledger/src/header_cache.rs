// Copyright (C) 2015-2025 The Neo Project.
//
// header_cache.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Bounded FIFO of verified headers that are ahead of the committed tip.
//!
//! Header-first sync stores the chain of headers here while the block
//! bodies are still in flight; the import pipeline drains it from the
//! front as bodies arrive.

use neo3_core::Header;
use parking_lot::RwLock;
use std::collections::VecDeque;

/// Upper bound on cached headers.
const MAX_HEADERS: usize = 10_000;

#[derive(Default)]
pub struct HeaderCache {
    headers: RwLock<VecDeque<Header>>,
}

impl HeaderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.headers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.read().is_empty()
    }

    pub fn full(&self) -> bool {
        self.headers.read().len() >= MAX_HEADERS
    }

    /// The highest cached header, if any.
    pub fn last(&self) -> Option<Header> {
        self.headers.read().back().cloned()
    }

    /// Appends a header. Rejects gaps, duplicates and overflow.
    pub fn add(&self, header: Header) -> bool {
        let mut headers = self.headers.write();
        if headers.len() >= MAX_HEADERS {
            return false;
        }
        if let Some(last) = headers.back() {
            if header.index != last.index + 1 {
                return false;
            }
        }
        headers.push_back(header);
        true
    }

    /// Pops the lowest cached header.
    pub fn try_remove_first(&self) -> Option<Header> {
        self.headers.write().pop_front()
    }

    pub fn clear(&self) {
        self.headers.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo3_core::{UInt160, UInt256, Witness};

    fn header(index: u32) -> Header {
        Header {
            version: 0,
            prev_hash: UInt256::zero(),
            merkle_root: UInt256::zero(),
            timestamp: index as u64,
            nonce: 0,
            index,
            primary_index: 0,
            next_consensus: UInt160::zero(),
            witness: Witness::default(),
        }
    }

    #[test]
    fn appends_in_order_only() {
        let cache = HeaderCache::new();
        assert!(cache.add(header(5)));
        assert!(cache.add(header(6)));
        assert!(!cache.add(header(8)), "gap must be rejected");
        assert_eq!(cache.count(), 2);
        assert_eq!(cache.last().unwrap().index, 6);
    }

    #[test]
    fn drains_from_the_front() {
        let cache = HeaderCache::new();
        cache.add(header(1));
        cache.add(header(2));
        assert_eq!(cache.try_remove_first().unwrap().index, 1);
        assert_eq!(cache.try_remove_first().unwrap().index, 2);
        assert!(cache.try_remove_first().is_none());
    }
}
