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

//! # Neo Network
//!
//! The P2P layer: message framing with per-network magic, the
//! version/verack handshake, inventory exchange backed by per-peer
//! known-hash tracking, misbehavior scoring with timed bans, and the
//! block-sync scheduler that keeps the ledger at the network tip.

pub mod error;
pub mod message;
pub mod payloads;
pub mod peer_manager;
pub mod peers;
pub mod relay_cache;
pub mod sync;

pub use error::{NetworkError, NetworkResult};
pub use message::{Message, MessageCommand, PAYLOAD_MAX_SIZE};
pub use payloads::{
    GetBlockByIndexPayload, GetBlocksPayload, InvPayload, InventoryType, PingPayload,
    VersionPayload,
};
pub use peer_manager::{NetworkEvent, PeerManager};
pub use peers::{Peer, PeerInfo};
pub use relay_cache::KnownHashes;
pub use sync::run_sync;
