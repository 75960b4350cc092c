// Copyright (C) 2015-2025 The Neo Project.
//
// peers.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Connected-peer state.

use crate::message::Message;
use crate::relay_cache::KnownHashes;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

/// Identity learned during the handshake.
#[derive(Debug)]
pub struct PeerInfo {
    pub address: SocketAddr,
    /// True when this node dialed the peer.
    pub outbound: bool,
    pub nonce: u32,
    pub user_agent: String,
    pub capabilities: u64,
    pub relay: bool,
    /// Chain height the peer last reported; refreshed by ping/pong.
    start_height: AtomicU32,
}

impl PeerInfo {
    pub fn new(
        address: SocketAddr,
        outbound: bool,
        nonce: u32,
        user_agent: String,
        capabilities: u64,
        relay: bool,
        start_height: u32,
    ) -> Self {
        Self {
            address,
            outbound,
            nonce,
            user_agent,
            capabilities,
            relay,
            start_height: AtomicU32::new(start_height),
        }
    }

    pub fn start_height(&self) -> u32 {
        self.start_height.load(Ordering::Relaxed)
    }

    /// Heights only ever move forward.
    pub fn update_height(&self, height: u32) {
        self.start_height.fetch_max(height, Ordering::Relaxed);
    }
}

/// A fully handshaken peer.
pub struct Peer {
    pub info: Arc<PeerInfo>,
    /// Bounded outbound queue; overflow disconnects the peer.
    pub sender: mpsc::Sender<Message>,
    /// Inventories this peer is known to have.
    pub known: KnownHashes,
    /// Protocol violation score; past the threshold the peer is banned.
    violations: AtomicU32,
    /// Latched once the peer must go; the notify wakes parked tasks
    /// and the flag covers tasks that were busy when it fired.
    closed: AtomicBool,
    disconnect: Arc<Notify>,
}

impl Peer {
    pub fn new(info: Arc<PeerInfo>, sender: mpsc::Sender<Message>) -> Self {
        let tweak = info.nonce;
        Self {
            info,
            sender,
            known: KnownHashes::new(tweak),
            violations: AtomicU32::new(0),
            closed: AtomicBool::new(false),
            disconnect: Arc::new(Notify::new()),
        }
    }

    /// Adds to the violation score, returning the new total.
    pub fn punish(&self, score: u32) -> u32 {
        self.violations.fetch_add(score, Ordering::Relaxed) + score
    }

    /// Tells the peer's tasks to stop.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.disconnect.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// A handle the read/write tasks park on.
    pub fn closed_signal(&self) -> Arc<Notify> {
        self.disconnect.clone()
    }

    /// Queues a message; `false` means the queue is gone or full.
    pub fn try_send(&self, message: Message) -> bool {
        self.sender.try_send(message).is_ok()
    }
}
