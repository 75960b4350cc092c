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

//! Neo Configuration Module
//!
//! Protocol settings, network selection and per-subsystem configuration
//! for the Neo N3 Rust node.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

mod settings;

pub use settings::ProtocolSettings;

/// Blockchain timing constants
pub const SECONDS_PER_BLOCK: u64 = 15;
pub const MILLISECONDS_PER_BLOCK: u64 = SECONDS_PER_BLOCK * 1000;

/// Network limits
pub const MAX_BLOCK_SIZE: usize = 262_144;
pub const MAX_BLOCK_SYSTEM_FEE: i64 = 900_000_000_000;
pub const MAX_TRANSACTION_SIZE: usize = 102_400;
pub const MAX_TRANSACTIONS_PER_BLOCK: usize = 512;
pub const MAX_VALID_UNTIL_BLOCK_INCREMENT: u32 = 5760;

/// Maximum number of blocks that can be traced back (about one year)
pub const MAX_TRACEABLE_BLOCKS: u32 = 2_102_400;

/// Size of a hash (UInt256) in bytes
pub const HASH_SIZE: usize = 32;
/// Size of an address (UInt160) in bytes
pub const ADDRESS_SIZE: usize = 20;
/// Maximum script size in bytes
pub const MAX_SCRIPT_SIZE: usize = 65_535;

/// Datoshi per GAS (1 GAS = 10^8 datoshi)
pub const DATOSHI_PER_GAS: i64 = 100_000_000;

/// Total GAS minted at genesis, in datoshi
pub const INITIAL_GAS_DISTRIBUTION: i64 = 52_000_000 * DATOSHI_PER_GAS;

/// Default Neo network ports
pub const DEFAULT_NEO_PORT: u16 = 10333;
pub const DEFAULT_RPC_PORT: u16 = 10332;
pub const DEFAULT_TESTNET_PORT: u16 = 20333;
pub const DEFAULT_TESTNET_RPC_PORT: u16 = 20332;

/// Neo MainNet seed nodes
pub const MAINNET_SEEDS: &[&str] = &[
    "seed1.neo.org:10333",
    "seed2.neo.org:10333",
    "seed3.neo.org:10333",
    "seed4.neo.org:10333",
    "seed5.neo.org:10333",
];

/// Neo TestNet seed nodes
pub const TESTNET_SEEDS: &[&str] = &[
    "seed1t5.neo.org:20333",
    "seed2t5.neo.org:20333",
    "seed3t5.neo.org:20333",
    "seed4t5.neo.org:20333",
    "seed5t5.neo.org:20333",
];

/// Network type for the Neo blockchain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum NetworkType {
    MainNet,
    #[default]
    TestNet,
    Private,
}

impl NetworkType {
    /// Gets the network magic number.
    pub fn magic(&self) -> u32 {
        match self {
            NetworkType::MainNet => 0x334f454e, // "NEO3" in little endian
            NetworkType::TestNet => 0x3454334e, // "N3T4" in little endian
            NetworkType::Private => 0x00746e41,
        }
    }

    /// Gets the address version byte.
    pub fn address_version(&self) -> u8 {
        0x35
    }

    /// Gets the default P2P port for the network.
    pub fn default_port(&self) -> u16 {
        match self {
            NetworkType::MainNet => DEFAULT_NEO_PORT,
            NetworkType::TestNet => DEFAULT_TESTNET_PORT,
            NetworkType::Private => DEFAULT_NEO_PORT,
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkType::MainNet => write!(f, "mainnet"),
            NetworkType::TestNet => write!(f, "testnet"),
            NetworkType::Private => write!(f, "private"),
        }
    }
}

impl FromStr for NetworkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" => Ok(NetworkType::MainNet),
            "testnet" | "test" => Ok(NetworkType::TestNet),
            "private" | "privnet" => Ok(NetworkType::Private),
            _ => Err(format!("Unknown network type: {s}")),
        }
    }
}

/// Named protocol hardforks, activated at fixed heights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Hardfork {
    Aspidochelone,
    Basilisk,
    Cockatrice,
    Domovoi,
    Echidna,
}

impl Hardfork {
    /// All hardforks in activation order.
    pub fn all() -> &'static [Hardfork] {
        &[
            Hardfork::Aspidochelone,
            Hardfork::Basilisk,
            Hardfork::Cockatrice,
            Hardfork::Domovoi,
            Hardfork::Echidna,
        ]
    }
}

impl fmt::Display for Hardfork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Hardfork::Aspidochelone => "HF_Aspidochelone",
            Hardfork::Basilisk => "HF_Basilisk",
            Hardfork::Cockatrice => "HF_Cockatrice",
            Hardfork::Domovoi => "HF_Domovoi",
            Hardfork::Echidna => "HF_Echidna",
        };
        write!(f, "{name}")
    }
}

/// P2P networking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct P2pConfig {
    /// Address to bind the listener to
    pub bind_address: String,
    /// P2P listen port
    pub port: u16,
    /// Maximum number of connected peers
    pub max_peers: usize,
    /// Number of outbound connections the node tries to keep alive
    pub min_desired_peers: usize,
    /// TCP connect timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Version/verack handshake deadline in milliseconds
    pub handshake_timeout_ms: u64,
    /// Per-request (getdata, getblocks) deadline in milliseconds
    pub request_timeout_ms: u64,
    /// How long a misbehaving address stays banned, in seconds
    pub ban_duration_secs: u64,
    /// Misbehavior score that triggers a ban
    pub ban_threshold: u32,
    /// Maximum queued outbound messages per peer
    pub max_outbound_queue: usize,
}

impl Default for P2pConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_NEO_PORT,
            max_peers: 40,
            min_desired_peers: 10,
            connect_timeout_ms: 5_000,
            handshake_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            ban_duration_secs: 15 * 60,
            ban_threshold: 100,
            max_outbound_queue: 1024,
        }
    }
}

/// RPC server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcServerConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub port: u16,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    /// Maximum items returned by a single traverseiterator call
    pub max_iterator_items: usize,
    /// Maximum concurrent iterator sessions
    pub max_sessions: usize,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1".to_string(),
            port: DEFAULT_RPC_PORT,
            timeout_ms: 30_000,
            max_iterator_items: 100,
            max_sessions: 64,
        }
    }
}

/// Consensus (dBFT) configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConsensusConfig {
    /// Whether this node participates in block production
    pub enabled: bool,
    /// Hex-encoded consensus private key (32 bytes, secp256r1)
    pub private_key: Option<String>,
}

/// Memory pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MempoolConfig {
    /// Maximum number of verified transactions in the pool
    pub capacity: usize,
    /// Maximum number of unverified transactions kept for re-verification
    pub max_unverified: usize,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            capacity: 50_000,
            max_unverified: 1_000,
        }
    }
}

/// Durable storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage engine: "memory" or "rocksdb"
    pub engine: String,
    /// Data directory for disk-backed engines
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            engine: "memory".to_string(),
            path: "./data".to_string(),
        }
    }
}

/// Top-level node configuration, loadable from TOML.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NodeConfig {
    pub network: NetworkType,
    #[serde(default)]
    pub p2p: P2pConfig,
    #[serde(default)]
    pub rpc: RpcServerConfig,
    #[serde(default)]
    pub consensus: ConsensusConfig,
    #[serde(default)]
    pub mempool: MempoolConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Overrides for protocol settings; `None` uses the network defaults
    #[serde(default)]
    pub protocol: Option<ProtocolOverrides>,
}

/// Optional overrides applied on top of the per-network protocol defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProtocolOverrides {
    pub network_magic: Option<u32>,
    pub milliseconds_per_block: Option<u64>,
    pub validators_count: Option<u8>,
    pub committee_members_count: Option<u8>,
    pub standby_committee: Option<Vec<String>>,
    pub seed_list: Option<Vec<String>>,
    pub hardforks: Option<BTreeMap<Hardfork, u32>>,
}
