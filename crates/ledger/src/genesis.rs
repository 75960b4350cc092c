// Copyright (C) 2015-2025 The Neo Project.
//
// genesis.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Deterministic genesis block construction.

use crate::error::LedgerResult;
use neo3_config::ProtocolSettings;
use neo3_core::{Block, Header, UInt256, Witness};
use neo3_cryptography::ECPoint;
use neo3_smart_contract::Contract;
use neo3_vm::OpCode;

/// Millisecond timestamp baked into every network's block zero.
pub const GENESIS_TIMESTAMP_MS: u64 = 1_468_595_301_000;

/// Nonce baked into block zero.
pub const GENESIS_NONCE: u64 = 2_083_236_893;

/// Builds block zero for the configured network. The block carries no
/// transactions; the initial token state is written by the native
/// `initialize` hooks when it persists.
pub fn genesis_block(settings: &ProtocolSettings) -> LedgerResult<Block> {
    let validators: Vec<ECPoint> = settings
        .standby_validators()
        .iter()
        .map(|hex| ECPoint::from_hex(hex))
        .collect::<Result<_, _>>()?;
    let next_consensus = Contract::validators_address(&validators)?;

    Ok(Block {
        header: Header {
            version: 0,
            prev_hash: UInt256::zero(),
            merkle_root: UInt256::zero(),
            timestamp: GENESIS_TIMESTAMP_MS,
            nonce: GENESIS_NONCE,
            index: 0,
            primary_index: 0,
            next_consensus,
            witness: Witness::new(Vec::new(), vec![OpCode::PUSH1 as u8]),
        },
        transactions: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn genesis_is_deterministic() {
        let settings = Arc::new(ProtocolSettings::mainnet());
        let a = genesis_block(&settings).unwrap();
        let b = genesis_block(&settings).unwrap();
        assert_eq!(a.hash().unwrap(), b.hash().unwrap());
        assert_eq!(a.index(), 0);
        assert!(a.transactions.is_empty());
        assert!(a.header.prev_hash.is_zero());
    }

    #[test]
    fn consensus_address_follows_the_validator_set() {
        let mainnet = genesis_block(&ProtocolSettings::mainnet()).unwrap();
        let mut small = ProtocolSettings::mainnet();
        small.validators_count = 1;
        let single = genesis_block(&small).unwrap();
        assert_eq!(mainnet.header.timestamp, single.header.timestamp);
        assert_ne!(mainnet.header.next_consensus, single.header.next_consensus);
        assert_ne!(mainnet.hash().unwrap(), single.hash().unwrap());
    }
}
