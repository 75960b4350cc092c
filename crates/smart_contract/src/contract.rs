// Copyright (C) 2015-2025 The Neo Project.
//
// contract.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Verification-script helpers and deterministic contract-hash
//! derivation.

use crate::error::{ContractError, ContractResult};
use neo3_core::UInt160;
use neo3_cryptography::ECPoint;
use neo3_vm::{syscall_hash, OpCode, ScriptBuilder};

/// Script-construction helpers shared by witness verification, the
/// consensus layer and the native registry.
pub struct Contract;

impl Contract {
    /// The verification script for a single signature:
    /// `PUSHDATA1 <key> SYSCALL System.Crypto.CheckSig`.
    pub fn create_signature_redeem_script(key: &ECPoint) -> Vec<u8> {
        let mut builder = ScriptBuilder::new();
        builder
            .emit_push_bytes(key.as_bytes())
            .expect("33 bytes always fit");
        builder.emit_syscall("System.Crypto.CheckSig");
        builder.to_array()
    }

    /// The m-of-n multi-signature verification script. Keys are sorted
    /// canonically; signatures must arrive in the same order.
    pub fn create_multisig_redeem_script(
        m: usize,
        keys: &[ECPoint],
    ) -> ContractResult<Vec<u8>> {
        if m == 0 || m > keys.len() || keys.len() > 1024 {
            return Err(ContractError::InvalidArgument(format!(
                "invalid multisig parameters: m={m}, n={}",
                keys.len()
            )));
        }
        let mut sorted = keys.to_vec();
        sorted.sort();
        let mut builder = ScriptBuilder::new();
        builder.emit_push_i64(m as i64);
        for key in &sorted {
            builder
                .emit_push_bytes(key.as_bytes())
                .expect("33 bytes always fit");
        }
        builder.emit_push_i64(sorted.len() as i64);
        builder.emit_syscall("System.Crypto.CheckMultisig");
        Ok(builder.to_array())
    }

    /// The script hash of a single-signature account.
    pub fn signature_contract_hash(key: &ECPoint) -> UInt160 {
        UInt160::from_script(&Self::create_signature_redeem_script(key))
    }

    /// The script hash of an m-of-n multi-signature account.
    pub fn multisig_contract_hash(m: usize, keys: &[ECPoint]) -> ContractResult<UInt160> {
        Ok(UInt160::from_script(&Self::create_multisig_redeem_script(
            m, keys,
        )?))
    }

    /// The script hash shared by a committee or validator set:
    /// majority-of-n for committees, 2f+1-of-n for validators.
    pub fn committee_address(keys: &[ECPoint]) -> ContractResult<UInt160> {
        let m = keys.len() - (keys.len() - 1) / 2;
        Self::multisig_contract_hash(m, keys)
    }

    /// The validator multi-signature address used for `next_consensus`.
    pub fn validators_address(keys: &[ECPoint]) -> ContractResult<UInt160> {
        let m = keys.len() - (keys.len() - 1) / 3;
        Self::multisig_contract_hash(m, keys)
    }

    /// Deterministic deployed-contract hash: derived from the deploying
    /// sender, the NEF checksum and the manifest name.
    pub fn contract_hash(sender: &UInt160, nef_checksum: u32, name: &str) -> UInt160 {
        let mut builder = ScriptBuilder::new();
        builder.emit(OpCode::ABORT);
        builder
            .emit_push_bytes(sender.as_bytes())
            .expect("20 bytes always fit");
        builder.emit_push_i64(nef_checksum as i64);
        builder
            .emit_push_string(name)
            .expect("name length validated by manifest");
        UInt160::from_script(&builder.to_array())
    }

    /// Whether `script` has the exact single-signature shape.
    pub fn is_signature_contract(script: &[u8]) -> bool {
        script.len() == 40
            && script[0] == OpCode::PUSHDATA1 as u8
            && script[1] == 33
            && script[35] == OpCode::SYSCALL as u8
            && script[36..40] == syscall_hash("System.Crypto.CheckSig").to_le_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo3_cryptography::KeyPair;

    #[test]
    fn signature_script_shape() {
        let key = KeyPair::generate().public_key();
        let script = Contract::create_signature_redeem_script(&key);
        assert_eq!(script.len(), 40);
        assert!(Contract::is_signature_contract(&script));
    }

    #[test]
    fn multisig_script_is_key_order_independent() {
        let a = KeyPair::generate().public_key();
        let b = KeyPair::generate().public_key();
        let ab = Contract::create_multisig_redeem_script(2, &[a, b]).unwrap();
        let ba = Contract::create_multisig_redeem_script(2, &[b, a]).unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn multisig_rejects_bad_threshold() {
        let a = KeyPair::generate().public_key();
        assert!(Contract::create_multisig_redeem_script(0, &[a]).is_err());
        assert!(Contract::create_multisig_redeem_script(2, &[a]).is_err());
    }

    #[test]
    fn contract_hash_depends_on_all_inputs() {
        let sender = UInt160::zero();
        let base = Contract::contract_hash(&sender, 1, "Token");
        assert_ne!(base, Contract::contract_hash(&sender, 2, "Token"));
        assert_ne!(base, Contract::contract_hash(&sender, 1, "Other"));
        assert_ne!(
            base,
            Contract::contract_hash(&UInt160::from_script(&[1]), 1, "Token")
        );
    }

    #[test]
    fn validator_threshold_is_two_thirds_plus_one() {
        let keys: Vec<ECPoint> = (0..7).map(|_| KeyPair::generate().public_key()).collect();
        // 7 validators tolerate f=2, so m = 7 - 2 = 5.
        let script = Contract::create_multisig_redeem_script(5, &keys).unwrap();
        let address = Contract::validators_address(&keys).unwrap();
        assert_eq!(address, UInt160::from_script(&script));
    }
}
