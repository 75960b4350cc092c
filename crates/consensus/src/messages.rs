// Copyright (C) 2015-2025 The Neo Project.
//
// messages.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! dBFT message types and their canonical wire encoding.
//!
//! Every payload carries `(validator_index, block_index, view_number)`
//! and a signature by the validator's consensus key over the network
//! magic followed by the unsigned encoding.

use crate::error::{ConsensusError, ConsensusResult};
use neo3_core::UInt256;
use neo3_cryptography::{hash256, verify, Curve, ECPoint, KeyPair};
use neo3_io::{helper, BinaryWriter, IoError, IoResult, MemoryReader, Serializable};

/// Upper bound on transaction hashes in one prepare request.
const MAX_PROPOSAL_HASHES: usize = 512;
/// Upper bound on payloads bundled into one recovery message.
const MAX_RECOVERY_PAYLOADS: usize = 256;
/// ECDSA signature width.
pub const SIGNATURE_SIZE: usize = 64;

/// Wire tags for consensus message bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConsensusMessageType {
    ChangeView = 0x00,
    PrepareRequest = 0x20,
    PrepareResponse = 0x21,
    Commit = 0x30,
    RecoveryRequest = 0x40,
    RecoveryMessage = 0x41,
}

impl ConsensusMessageType {
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::ChangeView),
            0x20 => Some(Self::PrepareRequest),
            0x21 => Some(Self::PrepareResponse),
            0x30 => Some(Self::Commit),
            0x40 => Some(Self::RecoveryRequest),
            0x41 => Some(Self::RecoveryMessage),
            _ => None,
        }
    }
}

/// Why a validator asked to leave the current view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChangeViewReason {
    Timeout = 0x00,
    ChangeAgreement = 0x01,
    TxNotFound = 0x02,
    TxRejectedByPolicy = 0x03,
    TxInvalid = 0x04,
    BlockRejectedByPolicy = 0x05,
}

impl ChangeViewReason {
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Timeout),
            0x01 => Some(Self::ChangeAgreement),
            0x02 => Some(Self::TxNotFound),
            0x03 => Some(Self::TxRejectedByPolicy),
            0x04 => Some(Self::TxInvalid),
            0x05 => Some(Self::BlockRejectedByPolicy),
            _ => None,
        }
    }
}

/// The body of a consensus payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsensusMessage {
    ChangeView {
        new_view_number: u8,
        timestamp: u64,
        reason: ChangeViewReason,
    },
    /// Sent by the primary: declares the proposed block by content.
    PrepareRequest {
        timestamp: u64,
        nonce: u64,
        transaction_hashes: Vec<UInt256>,
    },
    /// Sent by backups agreeing to the primary's proposal.
    PrepareResponse { preparation_hash: UInt256 },
    /// Signature over the finalized block header.
    Commit { signature: [u8; SIGNATURE_SIZE] },
    RecoveryRequest { timestamp: u64 },
    /// Every payload the responder knows for the requested round.
    RecoveryMessage { payloads: Vec<ConsensusPayload> },
}

impl ConsensusMessage {
    pub fn message_type(&self) -> ConsensusMessageType {
        match self {
            ConsensusMessage::ChangeView { .. } => ConsensusMessageType::ChangeView,
            ConsensusMessage::PrepareRequest { .. } => ConsensusMessageType::PrepareRequest,
            ConsensusMessage::PrepareResponse { .. } => ConsensusMessageType::PrepareResponse,
            ConsensusMessage::Commit { .. } => ConsensusMessageType::Commit,
            ConsensusMessage::RecoveryRequest { .. } => ConsensusMessageType::RecoveryRequest,
            ConsensusMessage::RecoveryMessage { .. } => ConsensusMessageType::RecoveryMessage,
        }
    }

    fn body_size(&self) -> usize {
        match self {
            ConsensusMessage::ChangeView { .. } => 1 + 8 + 1,
            ConsensusMessage::PrepareRequest {
                transaction_hashes, ..
            } => 8 + 8 + helper::get_var_size(transaction_hashes.len() as u64) + 32 * transaction_hashes.len(),
            ConsensusMessage::PrepareResponse { .. } => 32,
            ConsensusMessage::Commit { .. } => SIGNATURE_SIZE,
            ConsensusMessage::RecoveryRequest { .. } => 8,
            ConsensusMessage::RecoveryMessage { payloads } => helper::get_array_size(payloads),
        }
    }

    fn serialize_body(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        match self {
            ConsensusMessage::ChangeView {
                new_view_number,
                timestamp,
                reason,
            } => {
                writer.write_byte(*new_view_number)?;
                writer.write_u64(*timestamp)?;
                writer.write_byte(*reason as u8)
            }
            ConsensusMessage::PrepareRequest {
                timestamp,
                nonce,
                transaction_hashes,
            } => {
                writer.write_u64(*timestamp)?;
                writer.write_u64(*nonce)?;
                writer.write_var_int(transaction_hashes.len() as u64)?;
                for hash in transaction_hashes {
                    writer.write_bytes(hash.as_bytes())?;
                }
                Ok(())
            }
            ConsensusMessage::PrepareResponse { preparation_hash } => {
                writer.write_bytes(preparation_hash.as_bytes())
            }
            ConsensusMessage::Commit { signature } => writer.write_bytes(signature),
            ConsensusMessage::RecoveryRequest { timestamp } => writer.write_u64(*timestamp),
            ConsensusMessage::RecoveryMessage { payloads } => {
                helper::serialize_array(payloads, writer)
            }
        }
    }

    fn deserialize_body(
        reader: &mut MemoryReader<'_>,
        message_type: ConsensusMessageType,
    ) -> IoResult<Self> {
        match message_type {
            ConsensusMessageType::ChangeView => Ok(ConsensusMessage::ChangeView {
                new_view_number: reader.read_byte()?,
                timestamp: reader.read_u64()?,
                reason: ChangeViewReason::from_byte(reader.read_byte()?).ok_or_else(|| {
                    IoError::invalid_data("change view", "unknown reason byte")
                })?,
            }),
            ConsensusMessageType::PrepareRequest => {
                let timestamp = reader.read_u64()?;
                let nonce = reader.read_u64()?;
                let count = reader.read_var_int(MAX_PROPOSAL_HASHES as u64)? as usize;
                let mut transaction_hashes = Vec::with_capacity(count);
                for _ in 0..count {
                    let bytes = reader.read_bytes(32)?;
                    transaction_hashes.push(
                        UInt256::from_bytes(&bytes)
                            .map_err(|e| IoError::invalid_data("hash", &e.to_string()))?,
                    );
                }
                Ok(ConsensusMessage::PrepareRequest {
                    timestamp,
                    nonce,
                    transaction_hashes,
                })
            }
            ConsensusMessageType::PrepareResponse => {
                let bytes = reader.read_bytes(32)?;
                Ok(ConsensusMessage::PrepareResponse {
                    preparation_hash: UInt256::from_bytes(&bytes)
                        .map_err(|e| IoError::invalid_data("hash", &e.to_string()))?,
                })
            }
            ConsensusMessageType::Commit => {
                let bytes = reader.read_bytes(SIGNATURE_SIZE)?;
                let mut signature = [0u8; SIGNATURE_SIZE];
                signature.copy_from_slice(&bytes);
                Ok(ConsensusMessage::Commit { signature })
            }
            ConsensusMessageType::RecoveryRequest => Ok(ConsensusMessage::RecoveryRequest {
                timestamp: reader.read_u64()?,
            }),
            ConsensusMessageType::RecoveryMessage => {
                let payloads: Vec<ConsensusPayload> =
                    helper::deserialize_array(reader, MAX_RECOVERY_PAYLOADS)?;
                // A recovery bundle must not nest further bundles.
                if payloads.iter().any(|payload| {
                    matches!(payload.message, ConsensusMessage::RecoveryMessage { .. })
                }) {
                    return Err(IoError::invalid_data("recovery", "nested recovery message"));
                }
                Ok(ConsensusMessage::RecoveryMessage { payloads })
            }
        }
    }
}

/// A signed consensus message as it travels between validators.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusPayload {
    pub validator_index: u8,
    pub block_index: u32,
    pub view_number: u8,
    pub message: ConsensusMessage,
    pub signature: [u8; SIGNATURE_SIZE],
}

impl ConsensusPayload {
    /// Builds and signs a payload with the validator's consensus key.
    pub fn sign(
        network: u32,
        validator_index: u8,
        block_index: u32,
        view_number: u8,
        message: ConsensusMessage,
        key: &KeyPair,
    ) -> ConsensusResult<Self> {
        let mut payload = Self {
            validator_index,
            block_index,
            view_number,
            message,
            signature: [0u8; SIGNATURE_SIZE],
        };
        payload.signature = key.sign(&payload.sign_data(network)?);
        Ok(payload)
    }

    /// The bytes the signature covers: magic plus unsigned encoding.
    pub fn sign_data(&self, network: u32) -> ConsensusResult<Vec<u8>> {
        let mut writer = BinaryWriter::new();
        writer.write_u32(network)?;
        self.serialize_unsigned(&mut writer)?;
        Ok(writer.to_bytes())
    }

    /// Checks the signature against the claimed validator's key.
    pub fn verify_signature(&self, network: u32, key: &ECPoint) -> ConsensusResult<bool> {
        let data = self.sign_data(network)?;
        Ok(verify(
            Curve::Secp256r1,
            &data,
            &self.signature,
            key.as_bytes(),
        ))
    }

    /// The identity of this payload, used as the preparation hash.
    pub fn hash(&self) -> ConsensusResult<UInt256> {
        let mut writer = BinaryWriter::new();
        self.serialize(&mut writer)?;
        Ok(UInt256::from(hash256(&writer.to_bytes())))
    }

    fn serialize_unsigned(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_byte(self.message.message_type() as u8)?;
        writer.write_byte(self.validator_index)?;
        writer.write_u32(self.block_index)?;
        writer.write_byte(self.view_number)?;
        self.message.serialize_body(writer)
    }

    /// Decodes a payload, rejecting unknown message tags.
    pub fn from_bytes(data: &[u8]) -> ConsensusResult<Self> {
        let mut reader = MemoryReader::new(data);
        let payload = Self::deserialize(&mut reader)?;
        if reader.remaining() != 0 {
            return Err(ConsensusError::InvalidPayload(
                "trailing bytes after payload".to_string(),
            ));
        }
        Ok(payload)
    }

    pub fn to_bytes(&self) -> ConsensusResult<Vec<u8>> {
        let mut writer = BinaryWriter::new();
        self.serialize(&mut writer)?;
        Ok(writer.to_bytes())
    }
}

impl Serializable for ConsensusPayload {
    fn size(&self) -> usize {
        1 + 1 + 4 + 1 + self.message.body_size() + SIGNATURE_SIZE
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        self.serialize_unsigned(writer)?;
        writer.write_bytes(&self.signature)
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        let type_byte = reader.read_byte()?;
        let message_type = ConsensusMessageType::from_byte(type_byte)
            .ok_or_else(|| IoError::invalid_data("consensus message", "unknown type byte"))?;
        let validator_index = reader.read_byte()?;
        let block_index = reader.read_u32()?;
        let view_number = reader.read_byte()?;
        let message = ConsensusMessage::deserialize_body(reader, message_type)?;
        let signature_bytes = reader.read_bytes(SIGNATURE_SIZE)?;
        let mut signature = [0u8; SIGNATURE_SIZE];
        signature.copy_from_slice(&signature_bytes);
        Ok(Self {
            validator_index,
            block_index,
            view_number,
            message,
            signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo3_io::SerializableExt;

    fn key() -> KeyPair {
        KeyPair::from_private_key(&[3u8; 32]).unwrap()
    }

    #[test]
    fn payload_round_trips() {
        let payload = ConsensusPayload::sign(
            0x4e454f00,
            2,
            7,
            1,
            ConsensusMessage::PrepareRequest {
                timestamp: 1_700_000_000_000,
                nonce: 42,
                transaction_hashes: vec![UInt256::from_bytes(&[9u8; 32]).unwrap()],
            },
            &key(),
        )
        .unwrap();
        let decoded = ConsensusPayload::from_bytes(&payload.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, payload);
        assert_eq!(decoded.size(), payload.to_bytes().unwrap().len());
    }

    #[test]
    fn signature_binds_the_network_magic() {
        let payload = ConsensusPayload::sign(
            1,
            0,
            1,
            0,
            ConsensusMessage::RecoveryRequest { timestamp: 5 },
            &key(),
        )
        .unwrap();
        assert!(payload.verify_signature(1, &key().public_key()).unwrap());
        assert!(!payload.verify_signature(2, &key().public_key()).unwrap());
    }

    #[test]
    fn tampered_view_number_breaks_the_signature() {
        let mut payload = ConsensusPayload::sign(
            1,
            0,
            1,
            0,
            ConsensusMessage::PrepareResponse {
                preparation_hash: UInt256::zero(),
            },
            &key(),
        )
        .unwrap();
        payload.view_number = 3;
        assert!(!payload.verify_signature(1, &key().public_key()).unwrap());
    }

    #[test]
    fn nested_recovery_messages_are_rejected() {
        let inner = ConsensusPayload::sign(
            1,
            0,
            1,
            0,
            ConsensusMessage::RecoveryMessage { payloads: vec![] },
            &key(),
        )
        .unwrap();
        let outer = ConsensusPayload::sign(
            1,
            0,
            1,
            0,
            ConsensusMessage::RecoveryMessage {
                payloads: vec![inner],
            },
            &key(),
        )
        .unwrap();
        assert!(ConsensusPayload::from_bytes(&outer.to_bytes().unwrap()).is_err());
    }

    #[test]
    fn commit_carries_a_fixed_width_signature() {
        let payload = ConsensusPayload::sign(
            1,
            3,
            9,
            0,
            ConsensusMessage::Commit {
                signature: [0xAB; SIGNATURE_SIZE],
            },
            &key(),
        )
        .unwrap();
        let decoded = ConsensusPayload::from_bytes(&payload.to_bytes().unwrap()).unwrap();
        match decoded.message {
            ConsensusMessage::Commit { signature } => {
                assert_eq!(signature, [0xAB; SIGNATURE_SIZE])
            }
            _ => panic!("wrong message type"),
        }
    }
}
