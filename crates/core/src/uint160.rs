// Copyright (C) 2015-2025 The Neo Project.
//
// uint160.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Implementation of UInt160, a 160-bit unsigned integer.

use crate::error::{CoreError, CoreResult};
use neo3_cryptography::{base58check_decode, base58check_encode, hash160};
use neo3_io::{BinaryWriter, IoResult, MemoryReader, Serializable};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// The length of UInt160 values in bytes.
pub const UINT160_SIZE: usize = 20;

/// A 160-bit unsigned integer, used for account and contract script hashes.
///
/// Stored and serialized little-endian; displayed big-endian with a `0x`
/// prefix, matching the form RPC clients expect.
#[derive(Clone, Copy, Default, Eq, PartialEq, Hash)]
pub struct UInt160([u8; UINT160_SIZE]);

impl UInt160 {
    /// Returns the zero value.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Checks whether every byte is zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Creates a UInt160 from a little-endian byte slice.
    pub fn from_bytes(value: &[u8]) -> CoreResult<Self> {
        if value.len() != UINT160_SIZE {
            return Err(CoreError::InvalidFormat(format!(
                "invalid UInt160 length: {}",
                value.len()
            )));
        }
        let mut out = [0u8; UINT160_SIZE];
        out.copy_from_slice(value);
        Ok(Self(out))
    }

    /// The script hash of the given verification script.
    pub fn from_script(script: &[u8]) -> Self {
        Self(hash160(script))
    }

    /// The little-endian bytes.
    pub fn as_bytes(&self) -> &[u8; UINT160_SIZE] {
        &self.0
    }

    /// The little-endian bytes as a vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Parses the big-endian `0x…` hex form.
    pub fn from_hex(hex_str: &str) -> CoreResult<Self> {
        let trimmed = hex_str.trim_start_matches("0x");
        let mut bytes = hex::decode(trimmed)
            .map_err(|e| CoreError::InvalidFormat(format!("invalid hex: {e}")))?;
        if bytes.len() != UINT160_SIZE {
            return Err(CoreError::InvalidFormat(format!(
                "invalid UInt160 hex length: {}",
                bytes.len()
            )));
        }
        bytes.reverse();
        Self::from_bytes(&bytes)
    }

    /// The big-endian `0x…` hex form.
    pub fn to_hex(&self) -> String {
        let mut bytes = self.0;
        bytes.reverse();
        format!("0x{}", hex::encode(bytes))
    }

    /// Encodes the hash as a Base58Check address with the given version.
    pub fn to_address(&self, version: u8) -> String {
        let mut data = Vec::with_capacity(UINT160_SIZE + 1);
        data.push(version);
        data.extend_from_slice(&self.0);
        base58check_encode(&data)
    }

    /// Decodes a Base58Check address, checking the version byte.
    pub fn from_address(address: &str, version: u8) -> CoreResult<Self> {
        let data = base58check_decode(address)?;
        if data.len() != UINT160_SIZE + 1 {
            return Err(CoreError::InvalidFormat(format!(
                "invalid address payload length: {}",
                data.len()
            )));
        }
        if data[0] != version {
            return Err(CoreError::InvalidFormat(format!(
                "address version 0x{:02x} does not match expected 0x{version:02x}",
                data[0]
            )));
        }
        Self::from_bytes(&data[1..])
    }
}

impl Ord for UInt160 {
    fn cmp(&self, other: &Self) -> Ordering {
        // Numeric order: most significant byte is the last one.
        self.0.iter().rev().cmp(other.0.iter().rev())
    }
}

impl PartialOrd for UInt160 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serializable for UInt160 {
    fn size(&self) -> usize {
        UINT160_SIZE
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_bytes(&self.0)
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        Ok(Self(reader.read_array::<UINT160_SIZE>()?))
    }
}

impl fmt::Debug for UInt160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UInt160({})", self.to_hex())
    }
}

impl fmt::Display for UInt160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for UInt160 {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; UINT160_SIZE]> for UInt160 {
    fn from(bytes: [u8; UINT160_SIZE]) -> Self {
        Self(bytes)
    }
}

impl Serialize for UInt160 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for UInt160 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_hex(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo3_io::SerializableExt;

    #[test]
    fn hex_display_reverses_wire_order() {
        let mut bytes = [0u8; 20];
        bytes[0] = 0x01;
        bytes[19] = 0xff;
        let value = UInt160::from(bytes);
        assert_eq!(
            value.to_hex(),
            "0xff00000000000000000000000000000000000001"
        );
        assert_eq!(UInt160::from_hex(&value.to_hex()).unwrap(), value);
    }

    #[test]
    fn serialization_round_trip() {
        let value = UInt160::from_script(b"verification script");
        let bytes = value.to_array().unwrap();
        assert_eq!(bytes.len(), UINT160_SIZE);
        assert_eq!(UInt160::from_array(&bytes).unwrap(), value);
    }

    #[test]
    fn address_round_trip() {
        let value = UInt160::from_script(&[0x51]);
        let address = value.to_address(0x35);
        assert_eq!(UInt160::from_address(&address, 0x35).unwrap(), value);
        assert!(UInt160::from_address(&address, 0x17).is_err());
    }

    #[test]
    fn ordering_is_numeric() {
        let mut low = [0u8; 20];
        low[19] = 1; // most significant byte
        let mut high = [0xffu8; 20];
        high[19] = 2;
        assert!(UInt160::from(low) < UInt160::from(high));
        assert!(UInt160::zero() < UInt160::from(low));
    }

    #[test]
    fn rejects_bad_lengths() {
        assert!(UInt160::from_bytes(&[0u8; 19]).is_err());
        assert!(UInt160::from_hex("0x1234").is_err());
    }

    proptest::proptest! {
        #[test]
        fn hex_round_trip(bytes in proptest::array::uniform20(
            proptest::prelude::any::<u8>(),
        )) {
            let value = UInt160::from(bytes);
            proptest::prop_assert_eq!(
                UInt160::from_hex(&value.to_hex()).unwrap(),
                value
            );
        }

        #[test]
        fn address_round_trip_any_account(bytes in proptest::array::uniform20(
            proptest::prelude::any::<u8>(),
        )) {
            let value = UInt160::from(bytes);
            let address = value.to_address(0x35);
            proptest::prop_assert_eq!(
                UInt160::from_address(&address, 0x35).unwrap(),
                value
            );
        }
    }
}
