//! Witness scopes restricting where a signature is valid.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// A bitmask declaring the contract-call contexts a signer's witness
/// authorizes.
///
/// `GLOBAL` is mutually exclusive with every other bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WitnessScope(u8);

impl WitnessScope {
    /// No contract was witnessed; only the fee is paid.
    pub const NONE: Self = Self(0);
    /// Valid only in the entry context called by the transaction script.
    pub const CALLED_BY_ENTRY: Self = Self(0x01);
    /// Valid for the contracts listed in `allowed_contracts`.
    pub const CUSTOM_CONTRACTS: Self = Self(0x10);
    /// Valid for contracts whose manifest groups intersect `allowed_groups`.
    pub const CUSTOM_GROUPS: Self = Self(0x20);
    /// Valid where the signer's witness rules evaluate to Allow.
    pub const WITNESS_RULES: Self = Self(0x40);
    /// Valid everywhere.
    pub const GLOBAL: Self = Self(0x80);

    /// Parses a scope byte, rejecting unknown bits and invalid
    /// combinations with `GLOBAL`.
    pub fn from_byte(value: u8) -> Result<Self, CoreError> {
        const KNOWN: u8 = 0x01 | 0x10 | 0x20 | 0x40 | 0x80;
        if value & !KNOWN != 0 {
            return Err(CoreError::InvalidFormat(format!(
                "unknown witness scope bits: 0x{value:02x}"
            )));
        }
        let scope = Self(value);
        if scope.has_flag(Self::GLOBAL) && value != Self::GLOBAL.0 {
            return Err(CoreError::InvalidFormat(
                "Global scope cannot be combined with other scopes".to_string(),
            ));
        }
        Ok(scope)
    }

    /// The raw scope byte.
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Whether all bits of `flag` are set.
    pub fn has_flag(&self, flag: Self) -> bool {
        self.0 & flag.0 == flag.0 && (flag.0 != 0 || self.0 == 0)
    }
}

impl BitOr for WitnessScope {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for WitnessScope {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for WitnessScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "None");
        }
        let mut parts = Vec::new();
        if self.has_flag(Self::CALLED_BY_ENTRY) {
            parts.push("CalledByEntry");
        }
        if self.has_flag(Self::CUSTOM_CONTRACTS) {
            parts.push("CustomContracts");
        }
        if self.has_flag(Self::CUSTOM_GROUPS) {
            parts.push("CustomGroups");
        }
        if self.has_flag(Self::WITNESS_RULES) {
            parts.push("WitnessRules");
        }
        if self.has_flag(Self::GLOBAL) {
            parts.push("Global");
        }
        write!(f, "{}", parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_is_exclusive() {
        assert!(WitnessScope::from_byte(0x80).is_ok());
        assert!(WitnessScope::from_byte(0x81).is_err());
        assert!(WitnessScope::from_byte(0x90).is_err());
    }

    #[test]
    fn unknown_bits_are_rejected() {
        assert!(WitnessScope::from_byte(0x02).is_err());
        assert!(WitnessScope::from_byte(0x08).is_err());
    }

    #[test]
    fn combined_scopes_round_trip() {
        let scope = WitnessScope::CALLED_BY_ENTRY | WitnessScope::CUSTOM_CONTRACTS;
        let parsed = WitnessScope::from_byte(scope.bits()).unwrap();
        assert!(parsed.has_flag(WitnessScope::CALLED_BY_ENTRY));
        assert!(parsed.has_flag(WitnessScope::CUSTOM_CONTRACTS));
        assert!(!parsed.has_flag(WitnessScope::WITNESS_RULES));
    }

    #[test]
    fn none_only_matches_none() {
        assert!(WitnessScope::NONE.has_flag(WitnessScope::NONE));
        assert!(!WitnessScope::GLOBAL.has_flag(WitnessScope::NONE));
    }
}
