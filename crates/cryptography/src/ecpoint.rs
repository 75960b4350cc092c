//! Compressed elliptic-curve points over secp256r1.

use crate::error::{CryptoError, CryptoResult};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::PublicKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// The length of a compressed point in bytes.
pub const EC_POINT_SIZE: usize = 33;

/// A validated compressed secp256r1 public key.
///
/// Stored in its 33-byte SEC1 compressed form. Ordering compares the X
/// coordinate first, then the parity prefix, matching the order used when
/// assembling multi-signature scripts.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ECPoint {
    bytes: [u8; EC_POINT_SIZE],
}

impl ECPoint {
    /// Parses and validates a compressed point.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != EC_POINT_SIZE {
            return Err(CryptoError::InvalidLength {
                expected: EC_POINT_SIZE,
                actual: bytes.len(),
            });
        }
        if bytes[0] != 0x02 && bytes[0] != 0x03 {
            return Err(CryptoError::InvalidKey(format!(
                "invalid compression prefix 0x{:02x}",
                bytes[0]
            )));
        }
        PublicKey::from_sec1_bytes(bytes)
            .map_err(|_| CryptoError::InvalidKey("point not on curve".to_string()))?;
        let mut out = [0u8; EC_POINT_SIZE];
        out.copy_from_slice(bytes);
        Ok(Self { bytes: out })
    }

    /// Builds a point from an already-validated public key.
    pub fn from_public_key(key: &PublicKey) -> Self {
        let encoded = key.to_encoded_point(true);
        let mut out = [0u8; EC_POINT_SIZE];
        out.copy_from_slice(encoded.as_bytes());
        Self { bytes: out }
    }

    /// Parses a point from a hex string.
    pub fn from_hex(hex_str: &str) -> CryptoResult<Self> {
        let bytes = hex::decode(hex_str.trim_start_matches("0x"))
            .map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// The compressed encoding.
    pub fn as_bytes(&self) -> &[u8; EC_POINT_SIZE] {
        &self.bytes
    }

    /// The compressed encoding as a vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }

    /// The underlying p256 public key.
    pub fn to_public_key(&self) -> CryptoResult<PublicKey> {
        PublicKey::from_sec1_bytes(&self.bytes)
            .map_err(|_| CryptoError::InvalidKey("point not on curve".to_string()))
    }

    /// The hex form used in JSON and config files.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl Ord for ECPoint {
    fn cmp(&self, other: &Self) -> Ordering {
        // X coordinate first, parity prefix as the tiebreaker.
        self.bytes[1..]
            .cmp(&other.bytes[1..])
            .then(self.bytes[0].cmp(&other.bytes[0]))
    }
}

impl PartialOrd for ECPoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for ECPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ECPoint({})", self.to_hex())
    }
}

impl fmt::Display for ECPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for ECPoint {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for ECPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ECPoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_hex(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecdsa::KeyPair;

    #[test]
    fn rejects_wrong_length_and_prefix() {
        assert!(ECPoint::from_bytes(&[0u8; 32]).is_err());
        let mut bytes = [0u8; 33];
        bytes[0] = 0x04;
        assert!(ECPoint::from_bytes(&bytes).is_err());
    }

    #[test]
    fn rejects_point_off_curve() {
        let mut bytes = [0xFFu8; 33];
        bytes[0] = 0x02;
        assert!(ECPoint::from_bytes(&bytes).is_err());
    }

    #[test]
    fn hex_round_trip() {
        let key = KeyPair::generate();
        let point = key.public_key();
        let parsed = ECPoint::from_hex(&point.to_hex()).unwrap();
        assert_eq!(parsed, point);
    }

    #[test]
    fn ordering_compares_x_coordinate_first() {
        let mut points: Vec<ECPoint> = (0..8).map(|_| KeyPair::generate().public_key()).collect();
        points.sort();
        for pair in points.windows(2) {
            assert!(pair[0].as_bytes()[1..] <= pair[1].as_bytes()[1..]);
        }
    }
}
