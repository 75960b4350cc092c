// Copyright (C) 2015-2025 The Neo Project.
//
// transaction.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! The account-based N3 transaction and its attributes.

use crate::error::{CoreError, CoreResult};
use crate::signer::Signer;
use crate::uint160::UInt160;
use crate::uint256::UInt256;
use crate::witness::Witness;
use neo3_config::MAX_SCRIPT_SIZE;
use neo3_cryptography::sha256;
use neo3_io::{helper, BinaryWriter, IoError, IoResult, MemoryReader, Serializable};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Maximum size of a transaction in bytes.
pub const MAX_TRANSACTION_SIZE: usize = 102_400;
/// Maximum number of attributes per transaction.
pub const MAX_TRANSACTION_ATTRIBUTES: usize = 16;
/// Maximum number of signers per transaction.
pub const MAX_SIGNERS: usize = 16;
/// Size of the fixed transaction header fields.
pub const HEADER_SIZE: usize = 1 + 4 + 8 + 8 + 4;

/// Result codes carried by an Oracle response attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum OracleResponseCode {
    Success = 0x00,
    ProtocolNotSupported = 0x10,
    ConsensusUnreachable = 0x12,
    NotFound = 0x14,
    Timeout = 0x16,
    Forbidden = 0x18,
    ResponseTooLarge = 0x1a,
    InsufficientFunds = 0x1c,
    ContentTypeNotSupported = 0x1f,
    Error = 0xff,
}

impl OracleResponseCode {
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Success),
            0x10 => Some(Self::ProtocolNotSupported),
            0x12 => Some(Self::ConsensusUnreachable),
            0x14 => Some(Self::NotFound),
            0x16 => Some(Self::Timeout),
            0x18 => Some(Self::Forbidden),
            0x1a => Some(Self::ResponseTooLarge),
            0x1c => Some(Self::InsufficientFunds),
            0x1f => Some(Self::ContentTypeNotSupported),
            0xff => Some(Self::Error),
            _ => None,
        }
    }
}

/// Wire tags for transaction attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransactionAttributeType {
    HighPriority = 0x01,
    OracleResponse = 0x11,
    NotValidBefore = 0x20,
    Conflicts = 0x21,
}

/// Optional transaction metadata checked during verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransactionAttribute {
    /// Orders the transaction ahead of fee-sorted ones; committee only.
    HighPriority,
    /// Attached by the Oracle service to response transactions.
    OracleResponse {
        id: u64,
        code: OracleResponseCode,
        result: Vec<u8>,
    },
    /// The transaction is invalid before the given height.
    NotValidBefore { height: u32 },
    /// The transaction conflicts with another; only one can be committed.
    Conflicts { hash: UInt256 },
}

/// Maximum size of an oracle response result.
const MAX_ORACLE_RESULT_SIZE: usize = 0xffff;

impl TransactionAttribute {
    /// The wire tag of this attribute.
    pub fn attribute_type(&self) -> TransactionAttributeType {
        match self {
            TransactionAttribute::HighPriority => TransactionAttributeType::HighPriority,
            TransactionAttribute::OracleResponse { .. } => {
                TransactionAttributeType::OracleResponse
            }
            TransactionAttribute::NotValidBefore { .. } => {
                TransactionAttributeType::NotValidBefore
            }
            TransactionAttribute::Conflicts { .. } => TransactionAttributeType::Conflicts,
        }
    }

    /// Whether several attributes of this type may coexist in one
    /// transaction.
    pub fn allow_multiple(&self) -> bool {
        matches!(self, TransactionAttribute::Conflicts { .. })
    }
}

impl Serializable for TransactionAttribute {
    fn size(&self) -> usize {
        1 + match self {
            TransactionAttribute::HighPriority => 0,
            TransactionAttribute::OracleResponse { result, .. } => {
                8 + 1 + helper::get_var_bytes_size(result)
            }
            TransactionAttribute::NotValidBefore { .. } => 4,
            TransactionAttribute::Conflicts { .. } => 32,
        }
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_byte(self.attribute_type() as u8)?;
        match self {
            TransactionAttribute::HighPriority => Ok(()),
            TransactionAttribute::OracleResponse { id, code, result } => {
                writer.write_u64(*id)?;
                writer.write_byte(*code as u8)?;
                writer.write_var_bytes(result)
            }
            TransactionAttribute::NotValidBefore { height } => writer.write_u32(*height),
            TransactionAttribute::Conflicts { hash } => Serializable::serialize(hash, writer),
        }
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        match reader.read_byte()? {
            0x01 => Ok(TransactionAttribute::HighPriority),
            0x11 => {
                let id = reader.read_u64()?;
                let code_byte = reader.read_byte()?;
                let code = OracleResponseCode::from_byte(code_byte).ok_or_else(|| {
                    IoError::invalid_data("oracle response code", &code_byte.to_string())
                })?;
                let result = reader.read_var_bytes(MAX_ORACLE_RESULT_SIZE)?;
                Ok(TransactionAttribute::OracleResponse { id, code, result })
            }
            0x20 => Ok(TransactionAttribute::NotValidBefore {
                height: reader.read_u32()?,
            }),
            0x21 => Ok(TransactionAttribute::Conflicts {
                hash: <UInt256 as Serializable>::deserialize(reader)?,
            }),
            other => Err(IoError::invalid_data(
                "transaction attribute type",
                &format!("0x{other:02x}"),
            )),
        }
    }
}

/// The account-based Neo N3 transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u8,
    pub nonce: u32,
    /// Gas consumed by execution, in datoshi; burned entirely.
    pub system_fee: i64,
    /// Gas paying for size and verification, in datoshi; paid to validators.
    pub network_fee: i64,
    pub valid_until_block: u32,
    pub signers: Vec<Signer>,
    pub attributes: Vec<TransactionAttribute>,
    pub script: Vec<u8>,
    pub witnesses: Vec<Witness>,
    #[serde(skip)]
    hash_cache: OnceCell<UInt256>,
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.nonce == other.nonce
            && self.system_fee == other.system_fee
            && self.network_fee == other.network_fee
            && self.valid_until_block == other.valid_until_block
            && self.signers == other.signers
            && self.attributes == other.attributes
            && self.script == other.script
            && self.witnesses == other.witnesses
    }
}

impl Transaction {
    /// Creates an unsigned transaction with defaults.
    pub fn new() -> Self {
        Self {
            version: 0,
            nonce: 0,
            system_fee: 0,
            network_fee: 0,
            valid_until_block: 0,
            signers: Vec::new(),
            attributes: Vec::new(),
            script: Vec::new(),
            witnesses: Vec::new(),
            hash_cache: OnceCell::new(),
        }
    }

    /// The transaction hash: SHA-256 of the unsigned serialization.
    pub fn hash(&self) -> CoreResult<UInt256> {
        if let Some(hash) = self.hash_cache.get() {
            return Ok(*hash);
        }
        let mut writer = BinaryWriter::with_capacity(self.size());
        self.serialize_unsigned(&mut writer)?;
        let hash = UInt256::from(sha256(writer.as_slice()));
        let _ = self.hash_cache.set(hash);
        Ok(hash)
    }

    /// The bytes signed by each witness: network magic followed by the hash.
    pub fn sign_data(&self, network: u32) -> CoreResult<Vec<u8>> {
        let mut data = Vec::with_capacity(4 + 32);
        data.extend_from_slice(&network.to_le_bytes());
        data.extend_from_slice(self.hash()?.as_bytes());
        Ok(data)
    }

    /// The first signer pays the fees.
    pub fn sender(&self) -> Option<UInt160> {
        self.signers.first().map(|s| s.account)
    }

    /// Network fee per encoded byte, the mempool priority measure.
    pub fn fee_per_byte(&self) -> i64 {
        let size = self.size() as i64;
        if size == 0 {
            0
        } else {
            self.network_fee / size
        }
    }

    /// Whether the transaction carries an attribute of the given type.
    pub fn has_attribute(&self, kind: TransactionAttributeType) -> bool {
        self.attributes.iter().any(|a| a.attribute_type() == kind)
    }

    /// Serializes everything but the witnesses.
    pub fn serialize_unsigned(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_byte(self.version)?;
        writer.write_u32(self.nonce)?;
        writer.write_i64(self.system_fee)?;
        writer.write_i64(self.network_fee)?;
        writer.write_u32(self.valid_until_block)?;
        helper::serialize_array(&self.signers, writer)?;
        helper::serialize_array(&self.attributes, writer)?;
        writer.write_var_bytes(&self.script)
    }

    /// Structural checks shared by deserialization and mempool admission.
    pub fn check_structure(&self) -> CoreResult<()> {
        if self.version != 0 {
            return Err(CoreError::InvalidFormat(format!(
                "unsupported transaction version {}",
                self.version
            )));
        }
        if self.system_fee < 0 || self.network_fee < 0 {
            return Err(CoreError::InvalidData("negative fee".to_string()));
        }
        if self.signers.is_empty() || self.signers.len() > MAX_SIGNERS {
            return Err(CoreError::InvalidData(format!(
                "invalid signer count {}",
                self.signers.len()
            )));
        }
        let mut accounts = HashSet::new();
        for signer in &self.signers {
            signer.validate()?;
            if !accounts.insert(signer.account) {
                return Err(CoreError::InvalidData(format!(
                    "duplicate signer account {}",
                    signer.account
                )));
            }
        }
        if self.attributes.len() > MAX_TRANSACTION_ATTRIBUTES {
            return Err(CoreError::InvalidData("too many attributes".to_string()));
        }
        let mut seen = HashSet::new();
        for attribute in &self.attributes {
            if !attribute.allow_multiple() && !seen.insert(attribute.attribute_type()) {
                return Err(CoreError::InvalidData(format!(
                    "duplicate attribute {:?}",
                    attribute.attribute_type()
                )));
            }
        }
        if self.script.is_empty() || self.script.len() > MAX_SCRIPT_SIZE {
            return Err(CoreError::InvalidData(format!(
                "invalid script length {}",
                self.script.len()
            )));
        }
        if self.witnesses.len() != self.signers.len() {
            return Err(CoreError::InvalidData(format!(
                "witness count {} does not match signer count {}",
                self.witnesses.len(),
                self.signers.len()
            )));
        }
        if self.size() > MAX_TRANSACTION_SIZE {
            return Err(CoreError::InvalidData("transaction too large".to_string()));
        }
        Ok(())
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializable for Transaction {
    fn size(&self) -> usize {
        HEADER_SIZE
            + helper::get_array_size(&self.signers)
            + helper::get_array_size(&self.attributes)
            + helper::get_var_bytes_size(&self.script)
            + helper::get_array_size(&self.witnesses)
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        self.serialize_unsigned(writer)?;
        helper::serialize_array(&self.witnesses, writer)
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        let version = reader.read_byte()?;
        let nonce = reader.read_u32()?;
        let system_fee = reader.read_i64()?;
        let network_fee = reader.read_i64()?;
        let valid_until_block = reader.read_u32()?;
        let signers: Vec<Signer> = helper::deserialize_array(reader, MAX_SIGNERS)?;
        let attributes: Vec<TransactionAttribute> =
            helper::deserialize_array(reader, MAX_TRANSACTION_ATTRIBUTES)?;
        let script = reader.read_var_bytes(MAX_SCRIPT_SIZE)?;
        let witnesses: Vec<Witness> = helper::deserialize_array(reader, MAX_SIGNERS)?;

        let transaction = Self {
            version,
            nonce,
            system_fee,
            network_fee,
            valid_until_block,
            signers,
            attributes,
            script,
            witnesses,
            hash_cache: OnceCell::new(),
        };
        transaction
            .check_structure()
            .map_err(|e| IoError::invalid_data("transaction", &e.to_string()))?;
        Ok(transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::witness_scope::WitnessScope;
    use neo3_io::SerializableExt;

    fn sample_transaction() -> Transaction {
        let mut tx = Transaction::new();
        tx.nonce = 0x2d06_1a3e;
        tx.system_fee = 1_000_000;
        tx.network_fee = 230_000;
        tx.valid_until_block = 100;
        tx.signers = vec![Signer::called_by_entry(UInt160::from_script(b"sender"))];
        tx.script = vec![0x11, 0x40]; // PUSH1 RET
        tx.witnesses = vec![Witness::new(vec![0x0c], vec![0x41])];
        tx
    }

    #[test]
    fn round_trip() {
        let tx = sample_transaction();
        let bytes = tx.to_array().unwrap();
        assert_eq!(bytes.len(), tx.size());
        let parsed = Transaction::from_array(&bytes).unwrap();
        assert_eq!(parsed, tx);
        assert_eq!(parsed.hash().unwrap(), tx.hash().unwrap());
    }

    #[test]
    fn hash_ignores_witnesses() {
        let tx = sample_transaction();
        let mut stripped = tx.clone();
        stripped.witnesses = vec![Witness::empty()];
        assert_eq!(tx.hash().unwrap(), stripped.hash().unwrap());
    }

    #[test]
    fn hash_changes_with_nonce() {
        let tx = sample_transaction();
        let mut other = sample_transaction();
        other.nonce += 1;
        assert_ne!(tx.hash().unwrap(), other.hash().unwrap());
    }

    #[test]
    fn duplicate_signers_are_rejected() {
        let mut tx = sample_transaction();
        tx.signers.push(tx.signers[0].clone());
        tx.witnesses.push(Witness::empty());
        assert!(tx.check_structure().is_err());
    }

    #[test]
    fn duplicate_high_priority_is_rejected() {
        let mut tx = sample_transaction();
        tx.attributes = vec![
            TransactionAttribute::HighPriority,
            TransactionAttribute::HighPriority,
        ];
        assert!(tx.check_structure().is_err());
    }

    #[test]
    fn multiple_conflicts_attributes_are_allowed() {
        let mut tx = sample_transaction();
        tx.attributes = vec![
            TransactionAttribute::Conflicts {
                hash: UInt256::zero(),
            },
            TransactionAttribute::Conflicts {
                hash: UInt256::from([1u8; 32]),
            },
        ];
        assert!(tx.check_structure().is_ok());
    }

    #[test]
    fn witness_count_must_match_signers() {
        let mut tx = sample_transaction();
        tx.witnesses.clear();
        assert!(tx.check_structure().is_err());
    }

    #[test]
    fn sign_data_prepends_network_magic() {
        let tx = sample_transaction();
        let data = tx.sign_data(0x334f454e).unwrap();
        assert_eq!(&data[..4], &0x334f454eu32.to_le_bytes());
        assert_eq!(&data[4..], tx.hash().unwrap().as_bytes());
    }

    #[test]
    fn global_scope_signer_accepted() {
        let mut tx = sample_transaction();
        tx.signers = vec![Signer::new(UInt160::zero(), WitnessScope::GLOBAL)];
        assert!(tx.check_structure().is_ok());
    }

    #[test]
    fn attribute_round_trips() {
        for attribute in [
            TransactionAttribute::HighPriority,
            TransactionAttribute::OracleResponse {
                id: 7,
                code: OracleResponseCode::Success,
                result: vec![1, 2, 3],
            },
            TransactionAttribute::NotValidBefore { height: 42 },
            TransactionAttribute::Conflicts {
                hash: UInt256::from([9u8; 32]),
            },
        ] {
            let bytes = attribute.to_array().unwrap();
            assert_eq!(bytes.len(), attribute.size());
            assert_eq!(TransactionAttribute::from_array(&bytes).unwrap(), attribute);
        }
    }
}
