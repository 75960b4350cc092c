// Copyright (C) 2015-2025 The Neo Project.
//
// lib.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! BLS12-381 point operations for the Neo blockchain.
//!
//! Wraps the `bls12_381` crate with the operation set CryptoLib exposes:
//! compressed (de)serialization for G1/G2, point addition, scalar
//! multiplication, equality and pairing. Pairing results (Gt) stay
//! in-memory handles; the underlying library has no public Gt encoding.

use bls12_381::{pairing, G1Affine, G1Projective, G2Affine, G2Projective, Gt, Scalar};
use group::Group;
use thiserror::Error;

/// Compressed G1 encoding length.
pub const G1_COMPRESSED_SIZE: usize = 48;
/// Compressed G2 encoding length.
pub const G2_COMPRESSED_SIZE: usize = 96;

/// BLS12-381 operation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlsError {
    #[error("Invalid point encoding of {0} bytes")]
    InvalidEncoding(usize),

    #[error("Invalid scalar encoding")]
    InvalidScalar,

    #[error("Operands belong to different groups")]
    GroupMismatch,

    #[error("Gt elements have no byte encoding")]
    GtNotSerializable,
}

/// Result type for BLS operations
pub type BlsResult<T> = Result<T, BlsError>;

/// A point in one of the three BLS12-381 groups.
#[derive(Clone, Debug)]
pub enum Bls12381Point {
    G1(G1Affine),
    G2(G2Affine),
    Gt(Gt),
}

impl Bls12381Point {
    /// Deserializes a compressed point; the group is selected by length
    /// (48 bytes: G1, 96 bytes: G2).
    pub fn deserialize(data: &[u8]) -> BlsResult<Self> {
        match data.len() {
            G1_COMPRESSED_SIZE => {
                let mut bytes = [0u8; G1_COMPRESSED_SIZE];
                bytes.copy_from_slice(data);
                let point = G1Affine::from_compressed(&bytes);
                if point.is_some().into() {
                    Ok(Bls12381Point::G1(point.unwrap()))
                } else {
                    Err(BlsError::InvalidEncoding(data.len()))
                }
            }
            G2_COMPRESSED_SIZE => {
                let mut bytes = [0u8; G2_COMPRESSED_SIZE];
                bytes.copy_from_slice(data);
                let point = G2Affine::from_compressed(&bytes);
                if point.is_some().into() {
                    Ok(Bls12381Point::G2(point.unwrap()))
                } else {
                    Err(BlsError::InvalidEncoding(data.len()))
                }
            }
            other => Err(BlsError::InvalidEncoding(other)),
        }
    }

    /// Serializes the point in compressed form.
    pub fn serialize(&self) -> BlsResult<Vec<u8>> {
        match self {
            Bls12381Point::G1(p) => Ok(p.to_compressed().to_vec()),
            Bls12381Point::G2(p) => Ok(p.to_compressed().to_vec()),
            Bls12381Point::Gt(_) => Err(BlsError::GtNotSerializable),
        }
    }

    /// Group equality; points in different groups are never equal.
    pub fn equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Bls12381Point::G1(a), Bls12381Point::G1(b)) => a == b,
            (Bls12381Point::G2(a), Bls12381Point::G2(b)) => a == b,
            (Bls12381Point::Gt(a), Bls12381Point::Gt(b)) => a == b,
            _ => false,
        }
    }

    /// Adds two points of the same group.
    pub fn add(&self, other: &Self) -> BlsResult<Self> {
        match (self, other) {
            (Bls12381Point::G1(a), Bls12381Point::G1(b)) => {
                Ok(Bls12381Point::G1((G1Projective::from(a) + b).into()))
            }
            (Bls12381Point::G2(a), Bls12381Point::G2(b)) => {
                Ok(Bls12381Point::G2((G2Projective::from(a) + b).into()))
            }
            (Bls12381Point::Gt(a), Bls12381Point::Gt(b)) => Ok(Bls12381Point::Gt(a + b)),
            _ => Err(BlsError::GroupMismatch),
        }
    }

    /// Multiplies the point by a 32-byte little-endian scalar, optionally
    /// negated.
    pub fn mul(&self, scalar_le: &[u8], negate: bool) -> BlsResult<Self> {
        if scalar_le.len() != 32 {
            return Err(BlsError::InvalidScalar);
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(scalar_le);
        let scalar = Scalar::from_bytes(&bytes);
        if bool::from(scalar.is_none()) {
            return Err(BlsError::InvalidScalar);
        }
        let mut scalar = scalar.unwrap();
        if negate {
            scalar = -scalar;
        }
        Ok(match self {
            Bls12381Point::G1(p) => Bls12381Point::G1((G1Projective::from(p) * scalar).into()),
            Bls12381Point::G2(p) => Bls12381Point::G2((G2Projective::from(p) * scalar).into()),
            Bls12381Point::Gt(p) => Bls12381Point::Gt(p * scalar),
        })
    }

    /// Pairs a G1 point with a G2 point.
    pub fn pairing(g1: &Self, g2: &Self) -> BlsResult<Self> {
        match (g1, g2) {
            (Bls12381Point::G1(a), Bls12381Point::G2(b)) => Ok(Bls12381Point::Gt(pairing(a, b))),
            _ => Err(BlsError::GroupMismatch),
        }
    }

    /// The identity element of the same group as `self`.
    pub fn identity_like(&self) -> Self {
        match self {
            Bls12381Point::G1(_) => Bls12381Point::G1(G1Affine::identity()),
            Bls12381Point::G2(_) => Bls12381Point::G2(G2Affine::identity()),
            Bls12381Point::Gt(_) => Bls12381Point::Gt(Gt::identity()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn g1() -> Bls12381Point {
        Bls12381Point::G1(G1Affine::generator())
    }

    fn g2() -> Bls12381Point {
        Bls12381Point::G2(G2Affine::generator())
    }

    fn scalar_le(n: u64) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&n.to_le_bytes());
        bytes
    }

    #[test]
    fn generator_round_trips_through_compression() {
        for point in [g1(), g2()] {
            let bytes = point.serialize().unwrap();
            let parsed = Bls12381Point::deserialize(&bytes).unwrap();
            assert!(parsed.equals(&point));
        }
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(matches!(
            Bls12381Point::deserialize(&[0u8; 47]),
            Err(BlsError::InvalidEncoding(47))
        ));
    }

    #[test]
    fn rejects_garbage_encoding() {
        assert!(Bls12381Point::deserialize(&[0xAAu8; 48]).is_err());
    }

    #[test]
    fn add_matches_scalar_double() {
        let doubled = g1().add(&g1()).unwrap();
        let times_two = g1().mul(&scalar_le(2), false).unwrap();
        assert!(doubled.equals(&times_two));
    }

    #[test]
    fn mul_negate_gives_inverse() {
        let p = g1().mul(&scalar_le(5), false).unwrap();
        let n = g1().mul(&scalar_le(5), true).unwrap();
        let sum = p.add(&n).unwrap();
        assert!(sum.equals(&Bls12381Point::G1(G1Affine::identity())));
    }

    #[test]
    fn pairing_is_bilinear() {
        // e(2*G1, G2) == e(G1, G2)^2 == e(G1, 2*G2)
        let left =
            Bls12381Point::pairing(&g1().mul(&scalar_le(2), false).unwrap(), &g2()).unwrap();
        let right =
            Bls12381Point::pairing(&g1(), &g2().mul(&scalar_le(2), false).unwrap()).unwrap();
        assert!(left.equals(&right));
    }

    #[test]
    fn cross_group_operations_are_rejected() {
        assert!(matches!(g1().add(&g2()), Err(BlsError::GroupMismatch)));
        assert!(matches!(
            Bls12381Point::pairing(&g2(), &g1()),
            Err(BlsError::GroupMismatch)
        ));
    }
}
