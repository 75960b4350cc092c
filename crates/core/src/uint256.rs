// Copyright (C) 2015-2025 The Neo Project.
//
// uint256.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Implementation of UInt256, a 256-bit unsigned integer.

use crate::error::{CoreError, CoreResult};
use neo3_io::{BinaryWriter, IoResult, MemoryReader, Serializable};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// The length of UInt256 values in bytes.
pub const UINT256_SIZE: usize = 32;

/// A 256-bit unsigned integer, used for block and transaction hashes.
///
/// Stored and serialized little-endian; displayed big-endian with a `0x`
/// prefix.
#[derive(Clone, Copy, Default, Eq, PartialEq, Hash)]
pub struct UInt256([u8; UINT256_SIZE]);

impl UInt256 {
    /// Returns the zero value.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Checks whether every byte is zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Creates a UInt256 from a little-endian byte slice.
    pub fn from_bytes(value: &[u8]) -> CoreResult<Self> {
        if value.len() != UINT256_SIZE {
            return Err(CoreError::InvalidFormat(format!(
                "invalid UInt256 length: {}",
                value.len()
            )));
        }
        let mut out = [0u8; UINT256_SIZE];
        out.copy_from_slice(value);
        Ok(Self(out))
    }

    /// The little-endian bytes.
    pub fn as_bytes(&self) -> &[u8; UINT256_SIZE] {
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
        if bytes.len() != UINT256_SIZE {
            return Err(CoreError::InvalidFormat(format!(
                "invalid UInt256 hex length: {}",
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
}

impl Ord for UInt256 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.iter().rev().cmp(other.0.iter().rev())
    }
}

impl PartialOrd for UInt256 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serializable for UInt256 {
    fn size(&self) -> usize {
        UINT256_SIZE
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_bytes(&self.0)
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        Ok(Self(reader.read_array::<UINT256_SIZE>()?))
    }
}

impl fmt::Debug for UInt256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UInt256({})", self.to_hex())
    }
}

impl fmt::Display for UInt256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for UInt256 {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; UINT256_SIZE]> for UInt256 {
    fn from(bytes: [u8; UINT256_SIZE]) -> Self {
        Self(bytes)
    }
}

impl Serialize for UInt256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for UInt256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_hex(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo3_io::SerializableExt;
    use proptest::prelude::*;

    #[test]
    fn zero_is_zero() {
        assert!(UInt256::zero().is_zero());
        assert_eq!(
            UInt256::zero().to_hex(),
            format!("0x{}", "00".repeat(32))
        );
    }

    proptest! {
        #[test]
        fn hex_round_trip(bytes in proptest::array::uniform32(any::<u8>())) {
            let value = UInt256::from(bytes);
            prop_assert_eq!(UInt256::from_hex(&value.to_hex()).unwrap(), value);
        }

        #[test]
        fn wire_round_trip(bytes in proptest::array::uniform32(any::<u8>())) {
            let value = UInt256::from(bytes);
            let encoded = value.to_array().unwrap();
            prop_assert_eq!(UInt256::from_array(&encoded).unwrap(), value);
        }
    }
}
