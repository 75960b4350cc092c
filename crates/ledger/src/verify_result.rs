// Copyright (C) 2015-2025 The Neo Project.
//
// verify_result.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! The outcome of admitting an inventory into the chain or the pool.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a block or transaction was accepted or turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerifyResult {
    /// The inventory passed every check.
    Succeed,
    /// An inventory with the same hash is already committed.
    AlreadyExists,
    /// The transaction is already waiting in the memory pool.
    AlreadyInPool,
    /// The memory pool is full and nothing cheaper could be evicted.
    OutOfMemory,
    /// The predecessor is missing, so the block was cached instead.
    UnableToVerify,
    /// Structural or header rules were violated.
    Invalid,
    /// The script is malformed or oversized.
    InvalidScript,
    /// An attribute is malformed or not allowed for the sender.
    InvalidAttribute,
    /// A signature failed to verify.
    InvalidSignature,
    /// A witness does not match its signer or its script faulted.
    InvalidWitness,
    /// The encoded size exceeds a protocol limit.
    OverSize,
    /// `valid_until_block` is outside the acceptance window.
    Expired,
    /// The sender cannot cover the declared fees.
    InsufficientFunds,
    /// A Policy rule (blocked account, fee floor) rejected it.
    PolicyFail,
    /// It conflicts with a committed or pooled transaction.
    HasConflicts,
    /// Rejected for an unclassified reason.
    Unknown,
}

impl VerifyResult {
    /// Whether the inventory was accepted.
    pub fn is_ok(&self) -> bool {
        matches!(self, VerifyResult::Succeed)
    }
}

impl Default for VerifyResult {
    fn default() -> Self {
        VerifyResult::Unknown
    }
}

impl fmt::Display for VerifyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            VerifyResult::Succeed => "succeed",
            VerifyResult::AlreadyExists => "already exists",
            VerifyResult::AlreadyInPool => "already in pool",
            VerifyResult::OutOfMemory => "memory pool full",
            VerifyResult::UnableToVerify => "unable to verify",
            VerifyResult::Invalid => "invalid",
            VerifyResult::InvalidScript => "invalid script",
            VerifyResult::InvalidAttribute => "invalid attribute",
            VerifyResult::InvalidSignature => "invalid signature",
            VerifyResult::InvalidWitness => "invalid witness",
            VerifyResult::OverSize => "over size",
            VerifyResult::Expired => "expired",
            VerifyResult::InsufficientFunds => "insufficient funds",
            VerifyResult::PolicyFail => "policy failure",
            VerifyResult::HasConflicts => "has conflicts",
            VerifyResult::Unknown => "unknown",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_succeed_is_ok() {
        assert!(VerifyResult::Succeed.is_ok());
        assert!(!VerifyResult::Invalid.is_ok());
        assert!(!VerifyResult::AlreadyInPool.is_ok());
    }
}
