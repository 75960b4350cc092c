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

//! # Neo Cryptography
//!
//! Deterministic wrappers over the standard primitives used throughout the
//! node: SHA-256, RIPEMD-160 and their Neo compositions, ECDSA over
//! secp256r1 and secp256k1, Base58Check, Merkle trees, MurmurHash3 and the
//! bloom filter used by the relay layer.

pub mod base58;
pub mod bloom_filter;
pub mod ecdsa;
pub mod ecpoint;
pub mod error;
pub mod hash;
pub mod merkle_tree;
pub mod murmur;

pub use base58::{base58check_decode, base58check_encode};
pub use bloom_filter::BloomFilter;
pub use ecdsa::{sign, verify, Curve, KeyPair, SIGNATURE_SIZE};
pub use ecpoint::{ECPoint, EC_POINT_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use hash::{hash160, hash256, keccak256, ripemd160, sha256};
pub use merkle_tree::MerkleTree;
pub use murmur::murmur32;
