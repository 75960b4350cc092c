// Copyright (C) 2015-2025 The Neo Project.
//
// signer.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Transaction signers with witness scopes.

use crate::error::CoreError;
use crate::uint160::UInt160;
use crate::witness_rule::WitnessRule;
use crate::witness_scope::WitnessScope;
use neo3_cryptography::{ECPoint, EC_POINT_SIZE};
use neo3_io::{helper, BinaryWriter, IoError, IoResult, MemoryReader, Serializable};
use serde::{Deserialize, Serialize};

/// Maximum number of allowed contracts, groups or rules per signer.
pub const MAX_SUB_ITEMS: usize = 16;

/// An account authorizing a transaction, together with the scope its
/// witness is valid in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signer {
    /// The account whose witness must be present.
    pub account: UInt160,
    /// Where the witness applies.
    pub scopes: WitnessScope,
    /// Contracts covered when `CUSTOM_CONTRACTS` is set.
    pub allowed_contracts: Vec<UInt160>,
    /// Manifest groups covered when `CUSTOM_GROUPS` is set.
    pub allowed_groups: Vec<ECPoint>,
    /// Rule tree evaluated when `WITNESS_RULES` is set.
    pub rules: Vec<WitnessRule>,
}

impl Signer {
    /// A signer with no extra grants.
    pub fn new(account: UInt160, scopes: WitnessScope) -> Self {
        Self {
            account,
            scopes,
            allowed_contracts: Vec::new(),
            allowed_groups: Vec::new(),
            rules: Vec::new(),
        }
    }

    /// A signer with the `CalledByEntry` scope, the common case.
    pub fn called_by_entry(account: UInt160) -> Self {
        Self::new(account, WitnessScope::CALLED_BY_ENTRY)
    }

    /// A signer with the `Global` scope.
    pub fn global(account: UInt160) -> Self {
        Self::new(account, WitnessScope::GLOBAL)
    }

    /// Validates sub-field presence against the scope bits.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.scopes.has_flag(WitnessScope::GLOBAL)
            && self.scopes != WitnessScope::GLOBAL
        {
            return Err(CoreError::InvalidData(
                "Global scope cannot be combined with other scopes".to_string(),
            ));
        }
        if !self.scopes.has_flag(WitnessScope::CUSTOM_CONTRACTS)
            && !self.allowed_contracts.is_empty()
        {
            return Err(CoreError::InvalidData(
                "allowed_contracts present without CustomContracts scope".to_string(),
            ));
        }
        if !self.scopes.has_flag(WitnessScope::CUSTOM_GROUPS) && !self.allowed_groups.is_empty() {
            return Err(CoreError::InvalidData(
                "allowed_groups present without CustomGroups scope".to_string(),
            ));
        }
        if !self.scopes.has_flag(WitnessScope::WITNESS_RULES) && !self.rules.is_empty() {
            return Err(CoreError::InvalidData(
                "rules present without WitnessRules scope".to_string(),
            ));
        }
        for rule in &self.rules {
            rule.validate()?;
        }
        Ok(())
    }
}

impl Serializable for Signer {
    fn size(&self) -> usize {
        let mut size = 20 + 1;
        if self.scopes.has_flag(WitnessScope::CUSTOM_CONTRACTS) {
            size += helper::get_array_size(&self.allowed_contracts);
        }
        if self.scopes.has_flag(WitnessScope::CUSTOM_GROUPS) {
            size += helper::get_var_size(self.allowed_groups.len() as u64)
                + self.allowed_groups.len() * EC_POINT_SIZE;
        }
        if self.scopes.has_flag(WitnessScope::WITNESS_RULES) {
            size += helper::get_array_size(&self.rules);
        }
        size
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        Serializable::serialize(&self.account, writer)?;
        writer.write_byte(self.scopes.bits())?;
        if self.scopes.has_flag(WitnessScope::CUSTOM_CONTRACTS) {
            helper::serialize_array(&self.allowed_contracts, writer)?;
        }
        if self.scopes.has_flag(WitnessScope::CUSTOM_GROUPS) {
            writer.write_var_int(self.allowed_groups.len() as u64)?;
            for group in &self.allowed_groups {
                writer.write_bytes(group.as_bytes())?;
            }
        }
        if self.scopes.has_flag(WitnessScope::WITNESS_RULES) {
            helper::serialize_array(&self.rules, writer)?;
        }
        Ok(())
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        let account = <UInt160 as Serializable>::deserialize(reader)?;
        let scopes = WitnessScope::from_byte(reader.read_byte()?)
            .map_err(|e| IoError::invalid_data("witness scope", &e.to_string()))?;

        let allowed_contracts = if scopes.has_flag(WitnessScope::CUSTOM_CONTRACTS) {
            helper::deserialize_array(reader, MAX_SUB_ITEMS)?
        } else {
            Vec::new()
        };
        let allowed_groups = if scopes.has_flag(WitnessScope::CUSTOM_GROUPS) {
            let count = reader.read_var_int(MAX_SUB_ITEMS as u64)? as usize;
            let mut groups = Vec::with_capacity(count);
            for _ in 0..count {
                let bytes = reader.read_bytes(EC_POINT_SIZE)?;
                groups.push(
                    ECPoint::from_bytes(&bytes)
                        .map_err(|e| IoError::invalid_data("signer group", &e.to_string()))?,
                );
            }
            groups
        } else {
            Vec::new()
        };
        let rules = if scopes.has_flag(WitnessScope::WITNESS_RULES) {
            helper::deserialize_array(reader, MAX_SUB_ITEMS)?
        } else {
            Vec::new()
        };

        Ok(Self {
            account,
            scopes,
            allowed_contracts,
            allowed_groups,
            rules,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::witness_rule::{WitnessCondition, WitnessRuleAction};
    use neo3_io::SerializableExt;

    #[test]
    fn called_by_entry_round_trip() {
        let signer = Signer::called_by_entry(UInt160::from_script(b"account"));
        let bytes = signer.to_array().unwrap();
        assert_eq!(bytes.len(), signer.size());
        assert_eq!(Signer::from_array(&bytes).unwrap(), signer);
    }

    #[test]
    fn custom_contracts_round_trip() {
        let mut signer = Signer::new(
            UInt160::zero(),
            WitnessScope::CALLED_BY_ENTRY | WitnessScope::CUSTOM_CONTRACTS,
        );
        signer.allowed_contracts = vec![UInt160::from_script(&[1]), UInt160::from_script(&[2])];
        let bytes = signer.to_array().unwrap();
        assert_eq!(Signer::from_array(&bytes).unwrap(), signer);
    }

    #[test]
    fn rules_round_trip() {
        let mut signer = Signer::new(UInt160::zero(), WitnessScope::WITNESS_RULES);
        signer.rules = vec![WitnessRule::new(
            WitnessRuleAction::Allow,
            WitnessCondition::CalledByEntry,
        )];
        let bytes = signer.to_array().unwrap();
        assert_eq!(Signer::from_array(&bytes).unwrap(), signer);
    }

    #[test]
    fn sub_fields_absent_when_bit_clear() {
        let mut signer = Signer::called_by_entry(UInt160::zero());
        signer.allowed_contracts = vec![UInt160::zero()];
        assert!(signer.validate().is_err());

        // The serialized form must not carry the list either.
        let bytes = Signer::called_by_entry(UInt160::zero()).to_array().unwrap();
        assert_eq!(bytes.len(), 21);
    }

    #[test]
    fn global_signer_validates() {
        assert!(Signer::global(UInt160::zero()).validate().is_ok());
    }
}
