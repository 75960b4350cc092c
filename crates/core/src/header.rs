// Copyright (C) 2015-2025 The Neo Project.
//
// header.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Block headers.

use crate::error::CoreResult;
use crate::uint160::UInt160;
use crate::uint256::UInt256;
use crate::witness::Witness;
use neo3_cryptography::sha256;
use neo3_io::{BinaryWriter, IoError, IoResult, MemoryReader, Serializable};
use serde::{Deserialize, Serialize};

/// A block header.
///
/// The hash covers the eight fixed fields in declared order and excludes
/// the witness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub version: u32,
    pub prev_hash: UInt256,
    pub merkle_root: UInt256,
    /// Millisecond Unix time; strictly greater than the parent's.
    pub timestamp: u64,
    pub nonce: u64,
    pub index: u32,
    pub primary_index: u8,
    /// Script hash of the next round's validator multi-signature contract.
    pub next_consensus: UInt160,
    pub witness: Witness,
}

impl Header {
    /// Serializes the hashed portion: everything except the witness.
    pub fn serialize_unsigned(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_u32(self.version)?;
        Serializable::serialize(&self.prev_hash, writer)?;
        Serializable::serialize(&self.merkle_root, writer)?;
        writer.write_u64(self.timestamp)?;
        writer.write_u64(self.nonce)?;
        writer.write_u32(self.index)?;
        writer.write_byte(self.primary_index)?;
        Serializable::serialize(&self.next_consensus, writer)
    }

    /// The header (and block) hash.
    pub fn hash(&self) -> CoreResult<UInt256> {
        let mut writer = BinaryWriter::with_capacity(105);
        self.serialize_unsigned(&mut writer)?;
        Ok(UInt256::from(sha256(writer.as_slice())))
    }

    /// The bytes the block witness signs.
    pub fn sign_data(&self, network: u32) -> CoreResult<Vec<u8>> {
        let mut data = Vec::with_capacity(4 + 32);
        data.extend_from_slice(&network.to_le_bytes());
        data.extend_from_slice(self.hash()?.as_bytes());
        Ok(data)
    }
}

impl Serializable for Header {
    fn size(&self) -> usize {
        4 + 32 + 32 + 8 + 8 + 4 + 1 + 20 + 1 + self.witness.size()
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        self.serialize_unsigned(writer)?;
        // Exactly one witness, written as a length-one array.
        writer.write_var_int(1)?;
        Serializable::serialize(&self.witness, writer)
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        let version = reader.read_u32()?;
        if version > 0 {
            return Err(IoError::invalid_data("header version", &version.to_string()));
        }
        let prev_hash = <UInt256 as Serializable>::deserialize(reader)?;
        let merkle_root = <UInt256 as Serializable>::deserialize(reader)?;
        let timestamp = reader.read_u64()?;
        let nonce = reader.read_u64()?;
        let index = reader.read_u32()?;
        let primary_index = reader.read_byte()?;
        let next_consensus = <UInt160 as Serializable>::deserialize(reader)?;
        let witness_count = reader.read_var_int(1)?;
        if witness_count != 1 {
            return Err(IoError::invalid_data(
                "header witness count",
                &witness_count.to_string(),
            ));
        }
        let witness = <Witness as Serializable>::deserialize(reader)?;
        Ok(Self {
            version,
            prev_hash,
            merkle_root,
            timestamp,
            nonce,
            index,
            primary_index,
            next_consensus,
            witness,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo3_io::SerializableExt;

    pub(crate) fn sample_header() -> Header {
        Header {
            version: 0,
            prev_hash: UInt256::from([1u8; 32]),
            merkle_root: UInt256::from([2u8; 32]),
            timestamp: 1_468_595_301_000,
            nonce: 0x0123_4567_89ab_cdef,
            index: 7,
            primary_index: 2,
            next_consensus: UInt160::from_script(b"validators"),
            witness: Witness::new(vec![0x01], vec![0x51]),
        }
    }

    #[test]
    fn round_trip() {
        let header = sample_header();
        let bytes = header.to_array().unwrap();
        assert_eq!(bytes.len(), header.size());
        assert_eq!(Header::from_array(&bytes).unwrap(), header);
    }

    #[test]
    fn hash_excludes_witness() {
        let header = sample_header();
        let mut other = header.clone();
        other.witness = Witness::empty();
        assert_eq!(header.hash().unwrap(), other.hash().unwrap());
    }

    #[test]
    fn hash_covers_every_fixed_field() {
        let header = sample_header();
        let base = header.hash().unwrap();

        let mut changed = header.clone();
        changed.timestamp += 1;
        assert_ne!(changed.hash().unwrap(), base);

        let mut changed = header.clone();
        changed.primary_index = 3;
        assert_ne!(changed.hash().unwrap(), base);

        let mut changed = header;
        changed.index += 1;
        assert_ne!(changed.hash().unwrap(), base);
    }

    #[test]
    fn rejects_multiple_witnesses() {
        let header = sample_header();
        let mut writer = BinaryWriter::new();
        header.serialize_unsigned(&mut writer).unwrap();
        writer.write_var_int(2).unwrap();
        header.witness.serialize(&mut writer).unwrap();
        header.witness.serialize(&mut writer).unwrap();
        assert!(Header::from_array(&writer.to_bytes()).is_err());
    }
}
