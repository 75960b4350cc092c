//! Storage keys: a contract id plus raw key bytes.

use neo3_io::{BinaryWriter, IoResult, MemoryReader, Serializable};
use std::cmp::Ordering;

/// A key into contract storage.
///
/// Native contracts use fixed negative ids; deployed contracts receive
/// sequential non-negative ids from ContractManagement. The wire form is
/// the 4-byte little-endian id followed by the key bytes, and keys order
/// by that encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    pub id: i32,
    pub key: Vec<u8>,
}

impl StorageKey {
    pub fn new(id: i32, key: Vec<u8>) -> Self {
        Self { id, key }
    }

    /// A key made of a one-byte prefix followed by `suffix`.
    pub fn with_prefix(id: i32, prefix: u8, suffix: &[u8]) -> Self {
        let mut key = Vec::with_capacity(1 + suffix.len());
        key.push(prefix);
        key.extend_from_slice(suffix);
        Self { id, key }
    }

    /// The wire encoding: 4-byte LE id then the key bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.key.len());
        out.extend_from_slice(&self.id.to_le_bytes());
        out.extend_from_slice(&self.key);
        out
    }

    /// Parses the wire encoding.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 4 {
            return None;
        }
        let id = i32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        Some(Self {
            id,
            key: data[4..].to_vec(),
        })
    }
}

impl Ord for StorageKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // Order by the encoded bytes so in-memory maps and the durable
        // store iterate identically.
        self.to_bytes().cmp(&other.to_bytes())
    }
}

impl PartialOrd for StorageKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serializable for StorageKey {
    fn size(&self) -> usize {
        4 + self.key.len()
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_i32(self.id)?;
        writer.write_bytes(&self.key)
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        let id = reader.read_i32()?;
        let key = reader.read_bytes(reader.remaining())?;
        Ok(Self { id, key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_round_trip() {
        let key = StorageKey::new(-5, vec![0x14, 0xAA, 0xBB]);
        let bytes = key.to_bytes();
        assert_eq!(bytes.len(), 7);
        assert_eq!(StorageKey::from_bytes(&bytes).unwrap(), key);
    }

    #[test]
    fn negative_id_encodes_little_endian() {
        let key = StorageKey::new(-1, vec![]);
        assert_eq!(key.to_bytes(), vec![0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn too_short_input_rejected() {
        assert!(StorageKey::from_bytes(&[0x01, 0x02]).is_none());
    }

    #[test]
    fn ordering_follows_encoded_bytes() {
        let a = StorageKey::new(1, vec![0x00]);
        let b = StorageKey::new(1, vec![0x01]);
        assert!(a < b);
        // Same id groups together regardless of sign interpretation.
        let c = StorageKey::new(1, vec![]);
        assert!(c < a);
    }

    #[test]
    fn prefix_constructor() {
        let key = StorageKey::with_prefix(7, 0x0B, &[1, 2]);
        assert_eq!(key.key, vec![0x0B, 1, 2]);
    }
}
