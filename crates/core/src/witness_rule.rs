// Copyright (C) 2015-2025 The Neo Project.
//
// witness_rule.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Witness rules: per-signer allow/deny conditions over the call context.

use crate::error::CoreError;
use crate::uint160::UInt160;
use neo3_cryptography::{ECPoint, EC_POINT_SIZE};
use neo3_io::{helper, BinaryWriter, IoError, IoResult, MemoryReader, Serializable};
use serde::{Deserialize, Serialize};

/// Maximum nesting depth accepted when decoding a condition tree.
pub const MAX_NESTING_DEPTH: u8 = 2;

/// Maximum number of subitems in an And/Or condition.
pub const MAX_SUBITEMS: usize = 16;

/// The action a matching rule applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WitnessRuleAction {
    Deny = 0,
    Allow = 1,
}

/// Wire tags for the condition variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WitnessConditionType {
    Boolean = 0x00,
    Not = 0x01,
    And = 0x02,
    Or = 0x03,
    ScriptHash = 0x18,
    Group = 0x19,
    CalledByEntry = 0x20,
    CalledByContract = 0x28,
    CalledByGroup = 0x29,
}

/// A node in a signer's condition tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WitnessCondition {
    Boolean(bool),
    Not(Box<WitnessCondition>),
    And(Vec<WitnessCondition>),
    Or(Vec<WitnessCondition>),
    ScriptHash(UInt160),
    Group(ECPoint),
    CalledByEntry,
    CalledByContract(UInt160),
    CalledByGroup(ECPoint),
}

impl WitnessCondition {
    /// The wire tag of this condition.
    pub fn condition_type(&self) -> WitnessConditionType {
        match self {
            WitnessCondition::Boolean(_) => WitnessConditionType::Boolean,
            WitnessCondition::Not(_) => WitnessConditionType::Not,
            WitnessCondition::And(_) => WitnessConditionType::And,
            WitnessCondition::Or(_) => WitnessConditionType::Or,
            WitnessCondition::ScriptHash(_) => WitnessConditionType::ScriptHash,
            WitnessCondition::Group(_) => WitnessConditionType::Group,
            WitnessCondition::CalledByEntry => WitnessConditionType::CalledByEntry,
            WitnessCondition::CalledByContract(_) => WitnessConditionType::CalledByContract,
            WitnessCondition::CalledByGroup(_) => WitnessConditionType::CalledByGroup,
        }
    }

    /// The nesting depth of the tree rooted at this condition.
    pub fn depth(&self) -> u8 {
        match self {
            WitnessCondition::Not(inner) => 1 + inner.depth(),
            WitnessCondition::And(items) | WitnessCondition::Or(items) => {
                1 + items.iter().map(WitnessCondition::depth).max().unwrap_or(0)
            }
            _ => 0,
        }
    }

    fn deserialize_at(reader: &mut MemoryReader<'_>, depth_left: u8) -> IoResult<Self> {
        let tag = reader.read_byte()?;
        let needs_nesting = matches!(tag, 0x01 | 0x02 | 0x03);
        if needs_nesting && depth_left == 0 {
            return Err(IoError::invalid_data(
                "witness condition nesting too deep",
                &tag.to_string(),
            ));
        }
        match tag {
            0x00 => Ok(WitnessCondition::Boolean(reader.read_bool()?)),
            0x01 => Ok(WitnessCondition::Not(Box::new(Self::deserialize_at(
                reader,
                depth_left - 1,
            )?))),
            0x02 | 0x03 => {
                let count = reader.read_var_int(MAX_SUBITEMS as u64)? as usize;
                if count == 0 {
                    return Err(IoError::invalid_data("empty composite condition", "0"));
                }
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(Self::deserialize_at(reader, depth_left - 1)?);
                }
                Ok(if tag == 0x02 {
                    WitnessCondition::And(items)
                } else {
                    WitnessCondition::Or(items)
                })
            }
            0x18 => {
                let hash = <UInt160 as Serializable>::deserialize(reader)?;
                Ok(WitnessCondition::ScriptHash(hash))
            }
            0x19 => Self::read_group(reader).map(WitnessCondition::Group),
            0x20 => Ok(WitnessCondition::CalledByEntry),
            0x28 => {
                let hash = <UInt160 as Serializable>::deserialize(reader)?;
                Ok(WitnessCondition::CalledByContract(hash))
            }
            0x29 => Self::read_group(reader).map(WitnessCondition::CalledByGroup),
            other => Err(IoError::invalid_data(
                "unknown witness condition type",
                &format!("0x{other:02x}"),
            )),
        }
    }

    fn read_group(reader: &mut MemoryReader<'_>) -> IoResult<ECPoint> {
        let bytes = reader.read_bytes(EC_POINT_SIZE)?;
        ECPoint::from_bytes(&bytes)
            .map_err(|e| IoError::invalid_data("witness condition group", &e.to_string()))
    }
}

impl Serializable for WitnessCondition {
    fn size(&self) -> usize {
        1 + match self {
            WitnessCondition::Boolean(_) => 1,
            WitnessCondition::Not(inner) => inner.size(),
            WitnessCondition::And(items) | WitnessCondition::Or(items) => {
                helper::get_array_size(items)
            }
            WitnessCondition::ScriptHash(_) | WitnessCondition::CalledByContract(_) => 20,
            WitnessCondition::Group(_) | WitnessCondition::CalledByGroup(_) => EC_POINT_SIZE,
            WitnessCondition::CalledByEntry => 0,
        }
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_byte(self.condition_type() as u8)?;
        match self {
            WitnessCondition::Boolean(value) => writer.write_bool(*value),
            WitnessCondition::Not(inner) => Serializable::serialize(inner.as_ref(), writer),
            WitnessCondition::And(items) | WitnessCondition::Or(items) => {
                helper::serialize_array(items, writer)
            }
            WitnessCondition::ScriptHash(hash) | WitnessCondition::CalledByContract(hash) => {
                Serializable::serialize(hash, writer)
            }
            WitnessCondition::Group(point) | WitnessCondition::CalledByGroup(point) => {
                writer.write_bytes(point.as_bytes())
            }
            WitnessCondition::CalledByEntry => Ok(()),
        }
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        Self::deserialize_at(reader, MAX_NESTING_DEPTH)
    }
}

/// A rule attached to a signer using the `WITNESS_RULES` scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WitnessRule {
    pub action: WitnessRuleAction,
    pub condition: WitnessCondition,
}

impl WitnessRule {
    pub fn new(action: WitnessRuleAction, condition: WitnessCondition) -> Self {
        Self { action, condition }
    }

    /// Validates the nesting depth after construction from non-wire input.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.condition.depth() > MAX_NESTING_DEPTH {
            return Err(CoreError::InvalidData(
                "witness rule condition nesting too deep".to_string(),
            ));
        }
        Ok(())
    }
}

impl Serializable for WitnessRule {
    fn size(&self) -> usize {
        1 + self.condition.size()
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_byte(self.action as u8)?;
        Serializable::serialize(&self.condition, writer)
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        let action = match reader.read_byte()? {
            0 => WitnessRuleAction::Deny,
            1 => WitnessRuleAction::Allow,
            other => {
                return Err(IoError::invalid_data(
                    "witness rule action",
                    &other.to_string(),
                ))
            }
        };
        Ok(Self {
            action,
            condition: <WitnessCondition as Serializable>::deserialize(reader)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo3_io::SerializableExt;

    #[test]
    fn boolean_rule_round_trip() {
        let rule = WitnessRule::new(
            WitnessRuleAction::Allow,
            WitnessCondition::Boolean(true),
        );
        let bytes = rule.to_array().unwrap();
        assert_eq!(bytes.len(), rule.size());
        assert_eq!(WitnessRule::from_array(&bytes).unwrap(), rule);
    }

    #[test]
    fn composite_rule_round_trip() {
        let rule = WitnessRule::new(
            WitnessRuleAction::Deny,
            WitnessCondition::Or(vec![
                WitnessCondition::CalledByEntry,
                WitnessCondition::Not(Box::new(WitnessCondition::ScriptHash(UInt160::zero()))),
            ]),
        );
        let bytes = rule.to_array().unwrap();
        assert_eq!(WitnessRule::from_array(&bytes).unwrap(), rule);
    }

    #[test]
    fn nesting_above_limit_is_rejected_on_decode() {
        let rule = WitnessRule::new(
            WitnessRuleAction::Allow,
            WitnessCondition::Not(Box::new(WitnessCondition::Not(Box::new(
                WitnessCondition::Not(Box::new(WitnessCondition::Boolean(false))),
            )))),
        );
        assert_eq!(rule.condition.depth(), 3);
        let bytes = rule.to_array().unwrap();
        assert!(WitnessRule::from_array(&bytes).is_err());
        assert!(rule.validate().is_err());
    }

    #[test]
    fn empty_composite_is_rejected() {
        // And condition with zero subitems.
        let bytes = [0x01u8, 0x02, 0x00];
        assert!(WitnessRule::from_array(&bytes).is_err());
    }

    #[test]
    fn unknown_condition_type_is_rejected() {
        let bytes = [0x01u8, 0x55];
        assert!(WitnessRule::from_array(&bytes).is_err());
    }
}
