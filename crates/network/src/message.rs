// Copyright (C) 2015-2025 The Neo Project.
//
// message.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Wire message framing.
//!
//! Every message is `magic:u32 | command:u8 | payload_length:u32 |
//! payload`, all integers little-endian. The magic separates networks;
//! a frame with the wrong magic or an oversized length drops the
//! connection.

use crate::error::{NetworkError, NetworkResult};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Hard cap on a single payload: 32 MiB.
pub const PAYLOAD_MAX_SIZE: usize = 0x0200_0000;
/// Fixed frame header width: magic, command, payload length.
pub const HEADER_SIZE: usize = 4 + 1 + 4;

/// Command codes of the peer protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageCommand {
    Version = 0x00,
    Verack = 0x01,
    GetAddr = 0x10,
    Addr = 0x11,
    Ping = 0x18,
    Pong = 0x19,
    GetHeaders = 0x20,
    Headers = 0x21,
    GetBlocks = 0x24,
    Mempool = 0x25,
    Inv = 0x27,
    GetData = 0x28,
    GetBlockByIndex = 0x29,
    NotFound = 0x2a,
    Transaction = 0x2b,
    Block = 0x2c,
    Consensus = 0x2d,
    Reject = 0x2f,
    FilterLoad = 0x30,
    FilterAdd = 0x31,
    FilterClear = 0x32,
    MerkleBlock = 0x38,
    Alert = 0x40,
}

impl MessageCommand {
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Version),
            0x01 => Some(Self::Verack),
            0x10 => Some(Self::GetAddr),
            0x11 => Some(Self::Addr),
            0x18 => Some(Self::Ping),
            0x19 => Some(Self::Pong),
            0x20 => Some(Self::GetHeaders),
            0x21 => Some(Self::Headers),
            0x24 => Some(Self::GetBlocks),
            0x25 => Some(Self::Mempool),
            0x27 => Some(Self::Inv),
            0x28 => Some(Self::GetData),
            0x29 => Some(Self::GetBlockByIndex),
            0x2a => Some(Self::NotFound),
            0x2b => Some(Self::Transaction),
            0x2c => Some(Self::Block),
            0x2d => Some(Self::Consensus),
            0x2f => Some(Self::Reject),
            0x30 => Some(Self::FilterLoad),
            0x31 => Some(Self::FilterAdd),
            0x32 => Some(Self::FilterClear),
            0x38 => Some(Self::MerkleBlock),
            0x40 => Some(Self::Alert),
            _ => None,
        }
    }
}

/// A framed message: command plus raw payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub command: MessageCommand,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(command: MessageCommand, payload: Vec<u8>) -> Self {
        Self { command, payload }
    }

    /// A message with no payload (verack, getaddr, mempool, ...).
    pub fn bare(command: MessageCommand) -> Self {
        Self::new(command, Vec::new())
    }

    /// Frames the message for `magic`.
    pub fn encode(&self, magic: u32) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        out.extend_from_slice(&magic.to_le_bytes());
        out.push(self.command as u8);
        out.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    /// Decodes one frame, checking magic and the payload bound.
    pub fn decode(data: &[u8], expected_magic: u32) -> NetworkResult<(Self, usize)> {
        if data.len() < HEADER_SIZE {
            return Err(NetworkError::OversizedPayload(0));
        }
        let magic = u32::from_le_bytes(data[0..4].try_into().expect("4 bytes"));
        if magic != expected_magic {
            return Err(NetworkError::WrongMagic {
                got: magic,
                expected: expected_magic,
            });
        }
        let command = MessageCommand::from_byte(data[4]).ok_or(NetworkError::InvalidMessage {
            peer: ([0, 0, 0, 0], 0).into(),
            reason: format!("unknown command {:#04x}", data[4]),
        })?;
        let length = u32::from_le_bytes(data[5..9].try_into().expect("4 bytes")) as usize;
        if length > PAYLOAD_MAX_SIZE {
            return Err(NetworkError::OversizedPayload(length));
        }
        if data.len() < HEADER_SIZE + length {
            return Err(NetworkError::OversizedPayload(length));
        }
        let payload = data[HEADER_SIZE..HEADER_SIZE + length].to_vec();
        Ok((Self { command, payload }, HEADER_SIZE + length))
    }

    /// Reads one frame from an async stream.
    pub async fn read_from<R>(reader: &mut R, expected_magic: u32) -> NetworkResult<Self>
    where
        R: tokio::io::AsyncRead + Unpin,
    {
        let mut header = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header).await?;
        let magic = u32::from_le_bytes(header[0..4].try_into().expect("4 bytes"));
        if magic != expected_magic {
            return Err(NetworkError::WrongMagic {
                got: magic,
                expected: expected_magic,
            });
        }
        let command =
            MessageCommand::from_byte(header[4]).ok_or(NetworkError::InvalidMessage {
                peer: ([0, 0, 0, 0], 0).into(),
                reason: format!("unknown command {:#04x}", header[4]),
            })?;
        let length = u32::from_le_bytes(header[5..9].try_into().expect("4 bytes")) as usize;
        if length > PAYLOAD_MAX_SIZE {
            return Err(NetworkError::OversizedPayload(length));
        }
        let mut payload = vec![0u8; length];
        reader.read_exact(&mut payload).await?;
        Ok(Self { command, payload })
    }

    /// Writes the frame to an async stream.
    pub async fn write_to<W>(&self, writer: &mut W, magic: u32) -> NetworkResult<()>
    where
        W: tokio::io::AsyncWrite + Unpin,
    {
        writer.write_all(&self.encode(magic)).await?;
        writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAGIC: u32 = 0x334F454E;

    #[test]
    fn frame_round_trips() {
        let message = Message::new(MessageCommand::Ping, vec![1, 2, 3, 4]);
        let framed = message.encode(MAGIC);
        let (decoded, consumed) = Message::decode(&framed, MAGIC).unwrap();
        assert_eq!(decoded, message);
        assert_eq!(consumed, framed.len());
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let framed = Message::bare(MessageCommand::Verack).encode(MAGIC);
        let error = Message::decode(&framed, 0x3454334E).unwrap_err();
        assert!(matches!(error, NetworkError::WrongMagic { .. }));
    }

    #[test]
    fn oversized_length_is_rejected() {
        let mut framed = Message::bare(MessageCommand::Block).encode(MAGIC);
        framed[5..9].copy_from_slice(&(PAYLOAD_MAX_SIZE as u32 + 1).to_le_bytes());
        assert!(matches!(
            Message::decode(&framed, MAGIC).unwrap_err(),
            NetworkError::OversizedPayload(_)
        ));
    }

    #[test]
    fn unknown_command_is_rejected() {
        let mut framed = Message::bare(MessageCommand::Verack).encode(MAGIC);
        framed[4] = 0xEE;
        assert!(Message::decode(&framed, MAGIC).is_err());
    }

    #[tokio::test]
    async fn async_framing_round_trips() {
        let message = Message::new(MessageCommand::Inv, vec![9; 40]);
        let (mut client, mut server) = tokio::io::duplex(4096);
        message.write_to(&mut client, MAGIC).await.unwrap();
        let received = Message::read_from(&mut server, MAGIC).await.unwrap();
        assert_eq!(received, message);
    }
}
