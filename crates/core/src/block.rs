// Copyright (C) 2015-2025 The Neo Project.
//
// block.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Blocks: a header plus an ordered transaction list.

use crate::error::{CoreError, CoreResult};
use crate::header::Header;
use crate::transaction::Transaction;
use crate::uint256::UInt256;
use neo3_config::{MAX_BLOCK_SIZE, MAX_TRANSACTIONS_PER_BLOCK};
use neo3_cryptography::MerkleTree;
use neo3_io::{helper, BinaryWriter, IoError, IoResult, MemoryReader, Serializable};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A full block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// The block hash, which is the header hash.
    pub fn hash(&self) -> CoreResult<UInt256> {
        self.header.hash()
    }

    /// The block height.
    pub fn index(&self) -> u32 {
        self.header.index
    }

    /// Computes the Merkle root over the transaction hashes.
    pub fn compute_merkle_root(transactions: &[Transaction]) -> CoreResult<UInt256> {
        let leaves: CoreResult<Vec<[u8; 32]>> = transactions
            .iter()
            .map(|tx| tx.hash().map(|h| *h.as_bytes()))
            .collect();
        Ok(UInt256::from(MerkleTree::compute_root(&leaves?)))
    }

    /// Checks the header's Merkle root against the transaction list.
    pub fn verify_merkle_root(&self) -> CoreResult<()> {
        let computed = Self::compute_merkle_root(&self.transactions)?;
        if computed != self.header.merkle_root {
            return Err(CoreError::InvalidData(format!(
                "merkle root mismatch: header {} computed {}",
                self.header.merkle_root, computed
            )));
        }
        Ok(())
    }

    /// Structural validity: counts, sizes, merkle root, duplicates.
    pub fn check_structure(&self) -> CoreResult<()> {
        if self.transactions.len() > MAX_TRANSACTIONS_PER_BLOCK {
            return Err(CoreError::InvalidData(format!(
                "block carries {} transactions",
                self.transactions.len()
            )));
        }
        if self.size() > MAX_BLOCK_SIZE {
            return Err(CoreError::InvalidData(format!(
                "block size {} exceeds maximum",
                self.size()
            )));
        }
        let mut seen = HashSet::new();
        for tx in &self.transactions {
            if !seen.insert(tx.hash()?) {
                return Err(CoreError::InvalidData(
                    "duplicate transaction in block".to_string(),
                ));
            }
        }
        self.verify_merkle_root()
    }
}

impl Serializable for Block {
    fn size(&self) -> usize {
        self.header.size() + helper::get_array_size(&self.transactions)
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        Serializable::serialize(&self.header, writer)?;
        helper::serialize_array(&self.transactions, writer)
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        let header = <Header as Serializable>::deserialize(reader)?;
        let transactions: Vec<Transaction> =
            helper::deserialize_array(reader, MAX_TRANSACTIONS_PER_BLOCK)?;
        let block = Self {
            header,
            transactions,
        };
        block
            .verify_merkle_root()
            .map_err(|e| IoError::invalid_data("block", &e.to_string()))?;
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::Signer;
    use crate::uint160::UInt160;
    use crate::witness::Witness;
    use neo3_io::SerializableExt;

    fn transaction(nonce: u32) -> Transaction {
        let mut tx = Transaction::new();
        tx.nonce = nonce;
        tx.valid_until_block = 100;
        tx.signers = vec![Signer::called_by_entry(UInt160::from_script(b"account"))];
        tx.script = vec![0x11, 0x40];
        tx.witnesses = vec![Witness::empty()];
        tx
    }

    fn sample_block() -> Block {
        let transactions = vec![transaction(1), transaction(2)];
        let merkle_root = Block::compute_merkle_root(&transactions).unwrap();
        Block {
            header: Header {
                version: 0,
                prev_hash: UInt256::from([3u8; 32]),
                merkle_root,
                timestamp: 1_627_000_000_123,
                nonce: 42,
                index: 9,
                primary_index: 0,
                next_consensus: UInt160::from_script(b"validators"),
                witness: Witness::new(vec![0x00], vec![0x51]),
            },
            transactions,
        }
    }

    #[test]
    fn round_trip() {
        let block = sample_block();
        let bytes = block.to_array().unwrap();
        assert_eq!(bytes.len(), block.size());
        assert_eq!(Block::from_array(&bytes).unwrap(), block);
    }

    #[test]
    fn merkle_root_mismatch_is_rejected() {
        let mut block = sample_block();
        block.header.merkle_root = UInt256::zero();
        let mut writer = BinaryWriter::new();
        block.header.serialize(&mut writer).unwrap();
        helper::serialize_array(&block.transactions, &mut writer).unwrap();
        assert!(Block::from_array(&writer.to_bytes()).is_err());
    }

    #[test]
    fn duplicate_transactions_fail_structure_check() {
        let transactions = vec![transaction(1), transaction(1)];
        let merkle_root = Block::compute_merkle_root(&transactions).unwrap();
        let mut block = sample_block();
        block.transactions = transactions;
        block.header.merkle_root = merkle_root;
        assert!(block.check_structure().is_err());
    }

    #[test]
    fn empty_block_merkle_root_is_zero() {
        assert_eq!(
            Block::compute_merkle_root(&[]).unwrap(),
            UInt256::zero()
        );
    }

    #[test]
    fn block_hash_equals_header_hash() {
        let block = sample_block();
        assert_eq!(block.hash().unwrap(), block.header.hash().unwrap());
    }
}
