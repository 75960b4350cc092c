// Copyright (C) 2015-2025 The Neo Project.
//
// settings.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Protocol settings of the NEO system.

use crate::{
    Hardfork, NetworkType, ProtocolOverrides, DATOSHI_PER_GAS, MAINNET_SEEDS,
    MAX_TRACEABLE_BLOCKS, MAX_TRANSACTIONS_PER_BLOCK, MAX_VALID_UNTIL_BLOCK_INCREMENT,
    MILLISECONDS_PER_BLOCK, TESTNET_SEEDS,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Public keys of the standby committee, compressed secp256r1 points in hex.
/// Kept as strings here so the config crate stays free of crypto dependencies;
/// `neo3-core` parses them into curve points.
const STANDBY_COMMITTEE: &[&str] = &[
    "02486fd15702c4490a26703112a5cc1d0923fd697a33406bd5a1c00e0013b09a70",
    "023a36c72844610b4d34d1968662424011bf783ca9d984efa19a20babf5582f3fe",
    "03708b860c1de5d87f5b151a12c2a99feebd2e8b315ee8e7cf8aa19692a9e18379",
    "03c6aa6e12638b36c99d11ca07c23b8ed2e4a0c81e1c32f3f8da5e37ba2d5e9e54",
    "02cd5a5547119e24feaa7c2a0f37b8c9366216bab7054de0065c9be42084003c8a",
    "03d281b42002647f0113f36c7b8efb30db66078dfaaa9ab3ff76d043a98d512fde",
    "02504acbc1f4b3bdad1d86d6e1a08603771db135a73e61c9d565ae06a1938cd2ad",
];

/// Represents the protocol settings of the NEO system.
///
/// All consensus-relevant constants live here; every component receives the
/// settings through its constructor rather than a global.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolSettings {
    /// The magic number of the network, mixed into every signature.
    pub network: u32,

    /// The address version prepended to Base58Check addresses.
    pub address_version: u8,

    /// The public keys of the standby committee members (compressed, hex).
    pub standby_committee: Vec<String>,

    /// The number of validators elected from the committee.
    pub validators_count: u8,

    /// The default seed node list.
    pub seed_list: Vec<String>,

    /// Time in milliseconds between two blocks.
    pub milliseconds_per_block: u64,

    /// The maximum increment of a transaction's `valid_until_block` field.
    pub max_valid_until_block_increment: u32,

    /// Maximum number of transactions per block.
    pub max_transactions_per_block: u32,

    /// Maximum number of blocks contract code can trace back.
    pub max_traceable_blocks: u32,

    /// GAS (in datoshi) minted to the standby validators at genesis.
    pub initial_gas_distribution: i64,

    /// Block heights at which named hardforks activate.
    pub hardforks: BTreeMap<Hardfork, u32>,
}

impl ProtocolSettings {
    /// Settings for the given public network.
    pub fn for_network(network: NetworkType) -> Self {
        match network {
            NetworkType::MainNet => Self::mainnet(),
            NetworkType::TestNet => Self::testnet(),
            NetworkType::Private => Self::private_net(),
        }
    }

    /// Default protocol settings for NEO MainNet.
    pub fn mainnet() -> Self {
        Self {
            network: NetworkType::MainNet.magic(),
            address_version: NetworkType::MainNet.address_version(),
            standby_committee: STANDBY_COMMITTEE.iter().map(|s| s.to_string()).collect(),
            validators_count: 7,
            seed_list: MAINNET_SEEDS.iter().map(|s| s.to_string()).collect(),
            milliseconds_per_block: MILLISECONDS_PER_BLOCK,
            max_valid_until_block_increment: MAX_VALID_UNTIL_BLOCK_INCREMENT,
            max_transactions_per_block: MAX_TRANSACTIONS_PER_BLOCK as u32,
            max_traceable_blocks: MAX_TRACEABLE_BLOCKS,
            initial_gas_distribution: 52_000_000 * DATOSHI_PER_GAS,
            hardforks: BTreeMap::new(),
        }
    }

    /// Default protocol settings for NEO TestNet.
    pub fn testnet() -> Self {
        Self {
            network: NetworkType::TestNet.magic(),
            seed_list: TESTNET_SEEDS.iter().map(|s| s.to_string()).collect(),
            ..Self::mainnet()
        }
    }

    /// Settings for a single-machine private network. The standby committee
    /// stays the public one until the operator overrides it.
    pub fn private_net() -> Self {
        Self {
            network: NetworkType::Private.magic(),
            seed_list: Vec::new(),
            ..Self::mainnet()
        }
    }

    /// Applies operator overrides from the node configuration file.
    pub fn apply_overrides(mut self, overrides: &ProtocolOverrides) -> Self {
        if let Some(magic) = overrides.network_magic {
            self.network = magic;
        }
        if let Some(ms) = overrides.milliseconds_per_block {
            self.milliseconds_per_block = ms;
        }
        if let Some(count) = overrides.validators_count {
            self.validators_count = count;
        }
        if let Some(keys) = &overrides.standby_committee {
            self.standby_committee = keys.clone();
        }
        if let Some(seeds) = &overrides.seed_list {
            self.seed_list = seeds.clone();
        }
        if let Some(forks) = &overrides.hardforks {
            self.hardforks = forks.clone();
        }
        self
    }

    /// The number of committee members.
    pub fn committee_members_count(&self) -> usize {
        self.standby_committee.len()
    }

    /// The standby validators, the first `validators_count` committee keys.
    pub fn standby_validators(&self) -> Vec<String> {
        self.standby_committee
            .iter()
            .take(self.validators_count as usize)
            .cloned()
            .collect()
    }

    /// Time between two blocks.
    pub fn time_per_block(&self) -> Duration {
        Duration::from_millis(self.milliseconds_per_block)
    }

    /// Whether `hardfork` is active at `height`. An omitted hardfork is
    /// active from genesis on private networks and inactive on public ones
    /// until listed.
    pub fn is_hardfork_enabled(&self, hardfork: Hardfork, height: u32) -> bool {
        match self.hardforks.get(&hardfork) {
            Some(activation) => height >= *activation,
            None => false,
        }
    }
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self::private_net()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standby_validators_are_a_prefix_of_the_committee() {
        let settings = ProtocolSettings::mainnet();
        let validators = settings.standby_validators();
        assert_eq!(validators.len(), settings.validators_count as usize);
        assert_eq!(validators[..], settings.standby_committee[..validators.len()]);
    }

    #[test]
    fn hardfork_activation_is_height_indexed() {
        let mut settings = ProtocolSettings::private_net();
        settings.hardforks.insert(Hardfork::Basilisk, 10);
        assert!(!settings.is_hardfork_enabled(Hardfork::Basilisk, 9));
        assert!(settings.is_hardfork_enabled(Hardfork::Basilisk, 10));
        assert!(!settings.is_hardfork_enabled(Hardfork::Echidna, 1_000_000));
    }

    #[test]
    fn overrides_replace_only_what_they_name() {
        let overrides = ProtocolOverrides {
            network_magic: Some(0x4e45_4f58),
            validators_count: Some(4),
            ..Default::default()
        };
        let settings = ProtocolSettings::private_net().apply_overrides(&overrides);
        assert_eq!(settings.network, 0x4e45_4f58);
        assert_eq!(settings.validators_count, 4);
        assert_eq!(
            settings.milliseconds_per_block,
            ProtocolSettings::private_net().milliseconds_per_block
        );
    }
}
