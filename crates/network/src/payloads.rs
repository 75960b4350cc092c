// Copyright (C) 2015-2025 The Neo Project.
//
// payloads.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Typed message payloads of the peer protocol.

use neo3_core::{Header, UInt256};
use neo3_io::{helper, BinaryWriter, IoError, IoResult, MemoryReader, Serializable};

/// Protocol version spoken by this implementation.
pub const PROTOCOL_VERSION: u32 = 0;
/// Most hashes a single inv/getdata/notfound may carry.
pub const MAX_INV_HASHES: usize = 500;
/// Most addresses a single addr message may carry.
pub const MAX_ADDR_COUNT: usize = 200;
/// Most headers a single headers message may carry.
pub const MAX_HEADERS_COUNT: usize = 2_000;
/// Longest allowed user agent string.
const MAX_USER_AGENT: usize = 1_024;

/// Capability bits advertised in a version payload.
pub mod capabilities {
    /// Serves full blocks and transactions.
    pub const FULL_NODE: u64 = 0x01;
    /// Accepts relayed transactions.
    pub const TCP_SERVER: u64 = 0x02;
}

/// The handshake opener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionPayload {
    pub magic: u32,
    pub version: u32,
    pub capabilities: u64,
    pub timestamp: u64,
    pub port: u16,
    /// Random per-process value; a collision means we dialed ourselves.
    pub nonce: u32,
    pub user_agent: String,
    pub start_height: u32,
    pub relay: bool,
}

impl Serializable for VersionPayload {
    fn size(&self) -> usize {
        4 + 4 + 8 + 8 + 2 + 4 + helper::get_var_bytes_size(self.user_agent.as_bytes()) + 4 + 1
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_u32(self.magic)?;
        writer.write_u32(self.version)?;
        writer.write_u64(self.capabilities)?;
        writer.write_u64(self.timestamp)?;
        writer.write_u16(self.port)?;
        writer.write_u32(self.nonce)?;
        writer.write_var_string(&self.user_agent)?;
        writer.write_u32(self.start_height)?;
        writer.write_bool(self.relay)
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        Ok(Self {
            magic: reader.read_u32()?,
            version: reader.read_u32()?,
            capabilities: reader.read_u64()?,
            timestamp: reader.read_u64()?,
            port: reader.read_u16()?,
            nonce: reader.read_u32()?,
            user_agent: reader.read_var_string(MAX_USER_AGENT)?,
            start_height: reader.read_u32()?,
            relay: reader.read_bool()?,
        })
    }
}

/// What an inventory announcement refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum InventoryType {
    Transaction = 0x2b,
    Block = 0x2c,
    Consensus = 0x2d,
}

impl InventoryType {
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0x2b => Some(Self::Transaction),
            0x2c => Some(Self::Block),
            0x2d => Some(Self::Consensus),
            _ => None,
        }
    }
}

/// Shared by `inv`, `getdata` and `notfound`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvPayload {
    pub inv_type: InventoryType,
    pub hashes: Vec<UInt256>,
}

impl InvPayload {
    pub fn new(inv_type: InventoryType, hashes: Vec<UInt256>) -> Self {
        Self { inv_type, hashes }
    }
}

impl Serializable for InvPayload {
    fn size(&self) -> usize {
        1 + helper::get_var_size(self.hashes.len() as u64) + 32 * self.hashes.len()
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_byte(self.inv_type as u8)?;
        writer.write_var_int(self.hashes.len() as u64)?;
        for hash in &self.hashes {
            writer.write_bytes(hash.as_bytes())?;
        }
        Ok(())
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        let inv_type = InventoryType::from_byte(reader.read_byte()?)
            .ok_or_else(|| IoError::invalid_data("inventory", "unknown type"))?;
        let count = reader.read_var_int(MAX_INV_HASHES as u64)? as usize;
        let mut hashes = Vec::with_capacity(count);
        for _ in 0..count {
            let bytes = reader.read_bytes(32)?;
            hashes.push(
                UInt256::from_bytes(&bytes)
                    .map_err(|e| IoError::invalid_data("hash", &e.to_string()))?,
            );
        }
        Ok(Self { inv_type, hashes })
    }
}

/// Keep-alive carrying the sender's chain height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingPayload {
    pub last_block_index: u32,
    pub timestamp: u64,
    pub nonce: u32,
}

impl Serializable for PingPayload {
    fn size(&self) -> usize {
        4 + 8 + 4
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_u32(self.last_block_index)?;
        writer.write_u64(self.timestamp)?;
        writer.write_u32(self.nonce)
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        Ok(Self {
            last_block_index: reader.read_u32()?,
            timestamp: reader.read_u64()?,
            nonce: reader.read_u32()?,
        })
    }
}

/// One advertised peer endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkAddress {
    pub timestamp: u64,
    pub capabilities: u64,
    /// IPv6, with IPv4 mapped into `::ffff:a.b.c.d`.
    pub address: [u8; 16],
    pub port: u16,
}

impl Serializable for NetworkAddress {
    fn size(&self) -> usize {
        8 + 8 + 16 + 2
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_u64(self.timestamp)?;
        writer.write_u64(self.capabilities)?;
        writer.write_bytes(&self.address)?;
        writer.write_u16(self.port)
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        Ok(Self {
            timestamp: reader.read_u64()?,
            capabilities: reader.read_u64()?,
            address: reader.read_array::<16>()?,
            port: reader.read_u16()?,
        })
    }
}

/// Answer to `getaddr`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AddrPayload {
    pub addresses: Vec<NetworkAddress>,
}

impl Serializable for AddrPayload {
    fn size(&self) -> usize {
        helper::get_array_size(&self.addresses)
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        helper::serialize_array(&self.addresses, writer)
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        Ok(Self {
            addresses: helper::deserialize_array(reader, MAX_ADDR_COUNT)?,
        })
    }
}

/// Request for block hashes starting after a known one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetBlocksPayload {
    pub hash_start: UInt256,
    /// `-1` means "as many as allowed".
    pub count: i16,
}

impl Serializable for GetBlocksPayload {
    fn size(&self) -> usize {
        32 + 2
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_bytes(self.hash_start.as_bytes())?;
        writer.write_i16(self.count)
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        let bytes = reader.read_bytes(32)?;
        Ok(Self {
            hash_start: UInt256::from_bytes(&bytes)
                .map_err(|e| IoError::invalid_data("hash", &e.to_string()))?,
            count: reader.read_i16()?,
        })
    }
}

/// Request for full blocks by height range; the sync scheduler's tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetBlockByIndexPayload {
    pub index_start: u32,
    /// `-1` means "up to the protocol maximum".
    pub count: i16,
}

impl Serializable for GetBlockByIndexPayload {
    fn size(&self) -> usize {
        4 + 2
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_u32(self.index_start)?;
        writer.write_i16(self.count)
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        Ok(Self {
            index_start: reader.read_u32()?,
            count: reader.read_i16()?,
        })
    }
}

/// Answer to `getheaders`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HeadersPayload {
    pub headers: Vec<Header>,
}

impl Serializable for HeadersPayload {
    fn size(&self) -> usize {
        helper::get_array_size(&self.headers)
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        helper::serialize_array(&self.headers, writer)
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        Ok(Self {
            headers: helper::deserialize_array(reader, MAX_HEADERS_COUNT)?,
        })
    }
}

/// Bloom filter installed by light clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterLoadPayload {
    pub filter: Vec<u8>,
    pub k: u8,
    pub tweak: u32,
}

impl Serializable for FilterLoadPayload {
    fn size(&self) -> usize {
        helper::get_var_bytes_size(&self.filter) + 1 + 4
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_var_bytes(&self.filter)?;
        writer.write_byte(self.k)?;
        writer.write_u32(self.tweak)
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        Ok(Self {
            filter: reader.read_var_bytes(36_000)?,
            k: reader.read_byte()?,
            tweak: reader.read_u32()?,
        })
    }
}

/// Element added to an installed bloom filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterAddPayload {
    pub data: Vec<u8>,
}

impl Serializable for FilterAddPayload {
    fn size(&self) -> usize {
        helper::get_var_bytes_size(&self.data)
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_var_bytes(&self.data)
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        Ok(Self {
            data: reader.read_var_bytes(520)?,
        })
    }
}
