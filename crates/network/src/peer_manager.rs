// Copyright (C) 2015-2025 The Neo Project.
//
// peer_manager.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Connection lifecycle and the peer protocol.
//!
//! The manager owns the listener, dials seeds, runs the version/verack
//! handshake, and gives every established peer a read task and a write
//! task. Received blocks and transactions feed the import pipeline
//! directly; consensus payloads and lifecycle changes surface as
//! events for the node to route.

use crate::error::{NetworkError, NetworkResult};
use crate::message::{Message, MessageCommand};
use crate::payloads::{
    capabilities, AddrPayload, GetBlockByIndexPayload, GetBlocksPayload, HeadersPayload,
    InvPayload, InventoryType, NetworkAddress, PingPayload, VersionPayload, MAX_HEADERS_COUNT,
    MAX_INV_HASHES, PROTOCOL_VERSION,
};
use crate::peers::{Peer, PeerInfo};
use dashmap::DashMap;
use neo3_config::{P2pConfig, ProtocolSettings};
use neo3_core::{Block, Transaction, UInt256};
use neo3_io::SerializableExt;
use neo3_ledger::{Blockchain, VerifyResult};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, Instant};
use tracing::{debug, info, warn};

/// Violation score for a malformed message.
const SCORE_MALFORMED: u32 = 20;
/// Violation score for an invalid block or transaction.
const SCORE_INVALID_INVENTORY: u32 = 30;
/// Violation score for a duplicate block at one height.
const SCORE_DUPLICATE_HEIGHT: u32 = 50;
/// Keep-alive cadence.
const PING_INTERVAL: Duration = Duration::from_secs(30);
/// Blocks served per getblocks/getdata batch.
const MAX_BLOCKS_SERVED: usize = 500;

/// What the network layer reports upward.
#[derive(Debug)]
pub enum NetworkEvent {
    /// A consensus payload envelope, undecoded.
    ConsensusReceived { payload: Vec<u8>, from: SocketAddr },
    PeerConnected { address: SocketAddr, start_height: u32 },
    PeerDisconnected { address: SocketAddr },
}

/// Owns every connection and the listener.
pub struct PeerManager {
    settings: Arc<ProtocolSettings>,
    config: P2pConfig,
    chain: Arc<Blockchain>,
    /// Per-process nonce; detects accidental self-connections.
    nonce: u32,
    user_agent: String,
    peers: DashMap<SocketAddr, Arc<Peer>>,
    /// Banned addresses and when the ban lifts.
    bans: DashMap<IpAddr, Instant>,
    events: mpsc::Sender<NetworkEvent>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

impl PeerManager {
    pub fn new(
        settings: Arc<ProtocolSettings>,
        config: P2pConfig,
        chain: Arc<Blockchain>,
    ) -> (Arc<Self>, mpsc::Receiver<NetworkEvent>) {
        let (events, events_rx) = mpsc::channel(1_024);
        let manager = Arc::new(Self {
            settings,
            config,
            chain,
            nonce: rand::random(),
            user_agent: format!("/neo3-rs:{}/", env!("CARGO_PKG_VERSION")),
            peers: DashMap::new(),
            bans: DashMap::new(),
            events,
        });
        (manager, events_rx)
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// `(address, user agent, reported height)` per connected peer.
    pub fn peer_list(&self) -> Vec<(SocketAddr, String, u32)> {
        self.peers
            .iter()
            .map(|entry| {
                let info = &entry.value().info;
                (info.address, info.user_agent.clone(), info.start_height())
            })
            .collect()
    }

    /// The greatest height any connected peer has reported.
    pub fn best_peer_height(&self) -> u32 {
        self.peers
            .iter()
            .map(|entry| entry.value().info.start_height())
            .max()
            .unwrap_or(0)
    }

    pub fn local_nonce(&self) -> u32 {
        self.nonce
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Binds the listener, then accepts in the background. Returns the
    /// bound address so callers can use an OS-assigned port.
    pub async fn listen(self: &Arc<Self>) -> NetworkResult<SocketAddr> {
        let listener =
            TcpListener::bind((self.config.bind_address.as_str(), self.config.port)).await?;
        let local = listener.local_addr()?;
        info!(%local, "p2p listener bound");

        let manager = self.clone();
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, address)) => {
                        if manager.is_banned(&address.ip()) {
                            debug!(%address, "rejected banned peer");
                            continue;
                        }
                        if manager.peers.len() >= manager.config.max_peers {
                            debug!(%address, "rejected peer, table full");
                            continue;
                        }
                        let manager = manager.clone();
                        tokio::spawn(async move {
                            if let Err(error) =
                                manager.establish(stream, address, false).await
                            {
                                debug!(%address, %error, "inbound connection failed");
                            }
                        });
                    }
                    Err(error) => {
                        warn!(%error, "accept failed");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        let manager = self.clone();
        tokio::spawn(async move { manager.ping_loop().await });
        Ok(local)
    }

    /// Dials every configured seed that is not yet connected.
    pub async fn connect_seeds(self: &Arc<Self>) {
        for seed in self.settings.seed_list.clone() {
            let Ok(address) = seed.parse::<SocketAddr>() else {
                continue;
            };
            if self.peers.contains_key(&address) {
                continue;
            }
            let manager = self.clone();
            tokio::spawn(async move {
                if let Err(error) = manager.connect(address).await {
                    debug!(%address, %error, "seed connection failed");
                }
            });
        }
    }

    /// Dials one peer and runs the handshake.
    pub async fn connect(self: &Arc<Self>, address: SocketAddr) -> NetworkResult<()> {
        if self.is_banned(&address.ip()) {
            return Err(NetworkError::Banned(address));
        }
        let connect = timeout(
            Duration::from_millis(self.config.connect_timeout_ms),
            TcpStream::connect(address),
        )
        .await
        .map_err(|_| NetworkError::Timeout(address))??;
        self.establish(connect, address, true).await
    }

    /// Runs the handshake and, on success, registers the peer and
    /// spawns its read/write tasks.
    async fn establish(
        self: &Arc<Self>,
        stream: TcpStream,
        address: SocketAddr,
        outbound: bool,
    ) -> NetworkResult<()> {
        stream.set_nodelay(true).ok();
        let (mut reader, mut writer) = stream.into_split();
        let version = timeout(
            Duration::from_millis(self.config.handshake_timeout_ms),
            self.handshake(&mut reader, &mut writer),
        )
        .await
        .map_err(|_| NetworkError::Timeout(address))??;

        let info = Arc::new(PeerInfo::new(
            address,
            outbound,
            version.nonce,
            version.user_agent.clone(),
            version.capabilities,
            version.relay,
            version.start_height,
        ));
        let (sender, mut outbox) = mpsc::channel::<Message>(self.config.max_outbound_queue);
        let peer = Arc::new(Peer::new(info.clone(), sender));
        self.peers.insert(address, peer.clone());
        info!(%address, height = version.start_height, outbound, "peer connected");
        let _ = self
            .events
            .send(NetworkEvent::PeerConnected {
                address,
                start_height: version.start_height,
            })
            .await;

        // Writer: drains the outbound queue until told to stop.
        let magic = self.settings.network;
        let writer_peer = peer.clone();
        let write_disconnect = peer.closed_signal();
        tokio::spawn(async move {
            while !writer_peer.is_closed() {
                tokio::select! {
                    _ = write_disconnect.notified() => break,
                    message = outbox.recv() => match message {
                        Some(message) => {
                            if message.write_to(&mut writer, magic).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        });

        // Reader: decodes frames and drives the protocol.
        let manager = self.clone();
        tokio::spawn(async move {
            let read_disconnect = peer.closed_signal();
            while !peer.is_closed() {
                tokio::select! {
                    _ = read_disconnect.notified() => break,
                    result = Message::read_from(&mut reader, magic) => match result {
                        Ok(message) => {
                            if let Err(error) = manager.handle_message(&peer, message).await {
                                debug!(%address, %error, "message handling failed");
                                manager.punish(&peer, SCORE_MALFORMED);
                            }
                        }
                        Err(error) => {
                            debug!(%address, %error, "read failed");
                            break;
                        }
                    }
                }
            }
            manager.remove_peer(&address).await;
        });
        Ok(())
    }

    /// Both sides send `version`, then ack with `verack`; nothing else
    /// is processed until both acks arrive.
    async fn handshake<R, W>(
        &self,
        reader: &mut R,
        writer: &mut W,
    ) -> NetworkResult<VersionPayload>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let magic = self.settings.network;
        let local = VersionPayload {
            magic,
            version: PROTOCOL_VERSION,
            capabilities: capabilities::FULL_NODE | capabilities::TCP_SERVER,
            timestamp: now_ms(),
            port: self.config.port,
            nonce: self.nonce,
            user_agent: self.user_agent.clone(),
            start_height: self.chain.height(),
            relay: true,
        };
        Message::new(MessageCommand::Version, local.to_array()?)
            .write_to(writer, magic)
            .await?;

        let message = Message::read_from(reader, magic).await?;
        if message.command != MessageCommand::Version {
            return Err(NetworkError::HandshakeFailed {
                peer: ([0, 0, 0, 0], 0).into(),
                reason: format!("expected version, got {:?}", message.command),
            });
        }
        let remote = VersionPayload::from_array(&message.payload)?;
        if remote.magic != magic {
            return Err(NetworkError::WrongMagic {
                got: remote.magic,
                expected: magic,
            });
        }
        if remote.nonce == self.nonce {
            return Err(NetworkError::SelfConnection);
        }

        Message::bare(MessageCommand::Verack)
            .write_to(writer, magic)
            .await?;
        let ack = Message::read_from(reader, magic).await?;
        if ack.command != MessageCommand::Verack {
            return Err(NetworkError::HandshakeFailed {
                peer: ([0, 0, 0, 0], 0).into(),
                reason: format!("expected verack, got {:?}", ack.command),
            });
        }
        Ok(remote)
    }

    fn is_banned(&self, ip: &IpAddr) -> bool {
        // The shard guard must drop before the expired entry is
        // removed.
        let active = self.bans.get(ip).map(|until| *until > Instant::now());
        match active {
            Some(true) => true,
            Some(false) => {
                self.bans.remove(ip);
                false
            }
            None => false,
        }
    }

    /// Raises the peer's violation score; past the threshold the peer
    /// is disconnected and its address banned.
    pub fn punish(&self, peer: &Arc<Peer>, score: u32) {
        let total = peer.punish(score);
        if total >= self.config.ban_threshold {
            warn!(address = %peer.info.address, total, "peer banned");
            self.bans.insert(
                peer.info.address.ip(),
                Instant::now() + Duration::from_secs(self.config.ban_duration_secs),
            );
            peer.close();
        }
    }

    /// Punishes by address; used when another subsystem (the import
    /// pipeline's duplicate-height signal) reports misbehavior.
    pub fn punish_address(&self, address: &SocketAddr, score: u32) {
        if let Some(peer) = self.peers.get(address) {
            let peer = peer.value().clone();
            self.punish(&peer, score);
        }
    }

    async fn remove_peer(&self, address: &SocketAddr) {
        if let Some((_, peer)) = self.peers.remove(address) {
            peer.close();
            info!(%address, "peer disconnected");
            let _ = self
                .events
                .send(NetworkEvent::PeerDisconnected { address: *address })
                .await;
        }
    }

    /// Periodic keep-alive; also carries our height so peers can sync.
    async fn ping_loop(self: Arc<Self>) {
        let mut ticker = interval(PING_INTERVAL);
        loop {
            ticker.tick().await;
            let payload = PingPayload {
                last_block_index: self.chain.height(),
                timestamp: now_ms(),
                nonce: rand::random(),
            };
            let Ok(encoded) = payload.to_array() else {
                continue;
            };
            self.broadcast(Message::new(MessageCommand::Ping, encoded), None);
        }
    }

    /// Sends to every peer except `exclude`, disconnecting peers whose
    /// outbound queue is full.
    pub fn broadcast(&self, message: Message, exclude: Option<SocketAddr>) {
        for entry in self.peers.iter() {
            let peer = entry.value();
            if Some(peer.info.address) == exclude {
                continue;
            }
            if !peer.try_send(message.clone()) {
                debug!(address = %peer.info.address, "outbound queue full");
                peer.close();
            }
        }
    }

    /// Announces a block to peers that do not have it yet.
    pub fn relay_block(&self, block: &Block) -> NetworkResult<()> {
        let hash = block.hash()?;
        self.relay_inventory(InventoryType::Block, hash, None);
        Ok(())
    }

    /// Announces a transaction to peers that do not have it yet.
    pub fn relay_transaction(&self, transaction: &Transaction) -> NetworkResult<()> {
        let hash = transaction.hash()?;
        self.relay_inventory(InventoryType::Transaction, hash, None);
        Ok(())
    }

    fn relay_inventory(
        &self,
        inv_type: InventoryType,
        hash: UInt256,
        exclude: Option<SocketAddr>,
    ) {
        for entry in self.peers.iter() {
            let peer = entry.value();
            if Some(peer.info.address) == exclude || peer.known.contains(&hash) {
                continue;
            }
            let payload = InvPayload::new(inv_type, vec![hash]);
            let Ok(encoded) = payload.to_array() else {
                continue;
            };
            peer.known.insert(&hash);
            if !peer.try_send(Message::new(MessageCommand::Inv, encoded)) {
                peer.close();
            }
        }
    }

    /// Sends a consensus envelope to every peer.
    pub fn broadcast_consensus(&self, payload: Vec<u8>) {
        self.broadcast(Message::new(MessageCommand::Consensus, payload), None);
    }

    /// Requests a block range from one peer; used by the sync
    /// scheduler.
    pub(crate) fn request_blocks(&self, address: &SocketAddr, start: u32, count: i16) -> bool {
        let Some(peer) = self.peers.get(address) else {
            return false;
        };
        let payload = GetBlockByIndexPayload {
            index_start: start,
            count,
        };
        match payload.to_array() {
            Ok(encoded) => peer.try_send(Message::new(MessageCommand::GetBlockByIndex, encoded)),
            Err(_) => false,
        }
    }

    /// Addresses of peers that report a height at or above `height`.
    pub(crate) fn peers_at_or_above(&self, height: u32) -> Vec<SocketAddr> {
        self.peers
            .iter()
            .filter(|entry| entry.value().info.start_height() >= height)
            .map(|entry| entry.value().info.address)
            .collect()
    }

    pub(crate) fn chain(&self) -> &Arc<Blockchain> {
        &self.chain
    }

    pub(crate) fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.config.request_timeout_ms)
    }

    /// The post-handshake protocol.
    async fn handle_message(
        self: &Arc<Self>,
        peer: &Arc<Peer>,
        message: Message,
    ) -> NetworkResult<()> {
        match message.command {
            MessageCommand::Ping => {
                let ping = PingPayload::from_array(&message.payload)?;
                peer.info.update_height(ping.last_block_index);
                let pong = PingPayload {
                    last_block_index: self.chain.height(),
                    timestamp: now_ms(),
                    nonce: ping.nonce,
                };
                peer.try_send(Message::new(MessageCommand::Pong, pong.to_array()?));
            }
            MessageCommand::Pong => {
                let pong = PingPayload::from_array(&message.payload)?;
                peer.info.update_height(pong.last_block_index);
            }
            MessageCommand::GetAddr => {
                let addresses: Vec<NetworkAddress> = self
                    .peers
                    .iter()
                    .filter(|entry| entry.value().info.address != peer.info.address)
                    .map(|entry| {
                        let info = &entry.value().info;
                        let ip = match info.address.ip() {
                            IpAddr::V4(v4) => v4.to_ipv6_mapped().octets(),
                            IpAddr::V6(v6) => v6.octets(),
                        };
                        NetworkAddress {
                            timestamp: now_ms(),
                            capabilities: info.capabilities,
                            address: ip,
                            port: info.address.port(),
                        }
                    })
                    .collect();
                let payload = AddrPayload { addresses };
                peer.try_send(Message::new(MessageCommand::Addr, payload.to_array()?));
            }
            MessageCommand::Addr => {
                // Candidates for future dials; nothing to do while the
                // peer table is above the low-water mark.
                let _ = AddrPayload::from_array(&message.payload)?;
            }
            MessageCommand::Mempool => {
                for chunk in self.chain.mempool().hashes().chunks(MAX_INV_HASHES) {
                    let payload =
                        InvPayload::new(InventoryType::Transaction, chunk.to_vec());
                    peer.try_send(Message::new(MessageCommand::Inv, payload.to_array()?));
                }
            }
            MessageCommand::Inv => {
                let inv = InvPayload::from_array(&message.payload)?;
                let mut wanted = Vec::new();
                for hash in &inv.hashes {
                    peer.known.insert(hash);
                    let have = match inv.inv_type {
                        InventoryType::Transaction => {
                            self.chain.mempool().contains(hash)
                                || self.chain.contains_transaction(hash)
                        }
                        InventoryType::Block => self.chain.get_block(hash).is_some(),
                        InventoryType::Consensus => false,
                    };
                    if !have {
                        wanted.push(*hash);
                    }
                }
                if !wanted.is_empty() {
                    let payload = InvPayload::new(inv.inv_type, wanted);
                    peer.try_send(Message::new(
                        MessageCommand::GetData,
                        payload.to_array()?,
                    ));
                }
            }
            MessageCommand::GetData => {
                let request = InvPayload::from_array(&message.payload)?;
                let mut missing = Vec::new();
                for hash in &request.hashes {
                    let served = match request.inv_type {
                        InventoryType::Transaction => {
                            match self.chain.mempool().get(hash) {
                                Some(tx) => {
                                    peer.known.insert(hash);
                                    peer.try_send(Message::new(
                                        MessageCommand::Transaction,
                                        tx.to_array()?,
                                    ))
                                }
                                None => false,
                            }
                        }
                        InventoryType::Block => match self.chain.get_block(hash) {
                            Some(block) => {
                                peer.known.insert(hash);
                                peer.try_send(Message::new(
                                    MessageCommand::Block,
                                    block.to_array()?,
                                ))
                            }
                            None => false,
                        },
                        InventoryType::Consensus => false,
                    };
                    if !served {
                        missing.push(*hash);
                    }
                }
                if !missing.is_empty() {
                    let payload = InvPayload::new(request.inv_type, missing);
                    peer.try_send(Message::new(
                        MessageCommand::NotFound,
                        payload.to_array()?,
                    ));
                }
            }
            MessageCommand::GetBlocks => {
                let request = GetBlocksPayload::from_array(&message.payload)?;
                let Some(start) = self
                    .chain
                    .get_header(&request.hash_start)
                    .map(|header| header.index)
                else {
                    return Ok(());
                };
                let count = if request.count < 0 {
                    MAX_INV_HASHES
                } else {
                    (request.count as usize).min(MAX_INV_HASHES)
                };
                let hashes: Vec<UInt256> = (start + 1..)
                    .take(count)
                    .map_while(|index| self.chain.get_block_hash(index))
                    .collect();
                if !hashes.is_empty() {
                    let payload = InvPayload::new(InventoryType::Block, hashes);
                    peer.try_send(Message::new(MessageCommand::Inv, payload.to_array()?));
                }
            }
            MessageCommand::GetBlockByIndex => {
                let request = GetBlockByIndexPayload::from_array(&message.payload)?;
                let count = if request.count < 0 {
                    MAX_BLOCKS_SERVED
                } else {
                    (request.count as usize).min(MAX_BLOCKS_SERVED)
                };
                for index in request.index_start..request.index_start.saturating_add(count as u32)
                {
                    let Some(block) = self.chain.get_block_by_index(index) else {
                        break;
                    };
                    if !peer.try_send(Message::new(MessageCommand::Block, block.to_array()?)) {
                        break;
                    }
                }
            }
            MessageCommand::GetHeaders => {
                let request = GetBlockByIndexPayload::from_array(&message.payload)?;
                let count = if request.count < 0 {
                    MAX_HEADERS_COUNT
                } else {
                    (request.count as usize).min(MAX_HEADERS_COUNT)
                };
                let headers: Vec<_> = (request.index_start..)
                    .take(count)
                    .map_while(|index| {
                        self.chain
                            .get_block_by_index(index)
                            .map(|block| block.header)
                    })
                    .collect();
                let payload = HeadersPayload { headers };
                peer.try_send(Message::new(MessageCommand::Headers, payload.to_array()?));
            }
            MessageCommand::Headers => {
                let payload = HeadersPayload::from_array(&message.payload)?;
                for header in payload.headers {
                    self.chain.header_cache().add(header);
                }
            }
            MessageCommand::Block => {
                let block = Block::from_array(&message.payload)?;
                let hash = block.hash()?;
                peer.known.insert(&hash);
                match self.chain.on_new_block(block, Some(peer.info.address)) {
                    Ok(VerifyResult::Succeed) => {
                        self.relay_inventory(
                            InventoryType::Block,
                            hash,
                            Some(peer.info.address),
                        );
                    }
                    Ok(VerifyResult::AlreadyExists | VerifyResult::UnableToVerify) => {}
                    Ok(VerifyResult::Invalid) => {
                        self.punish(peer, SCORE_DUPLICATE_HEIGHT);
                    }
                    Ok(_) => {
                        self.punish(peer, SCORE_INVALID_INVENTORY);
                    }
                    Err(error) => {
                        // Fatal persistence failures must stop the node,
                        // not be swallowed as peer misbehavior.
                        tracing::error!(%error, "fatal persistence failure");
                        std::process::exit(1);
                    }
                }
            }
            MessageCommand::Transaction => {
                let transaction = Transaction::from_array(&message.payload)?;
                let hash = transaction.hash()?;
                peer.known.insert(&hash);
                match self.chain.relay_transaction(transaction) {
                    Ok(VerifyResult::Succeed) => {
                        self.relay_inventory(
                            InventoryType::Transaction,
                            hash,
                            Some(peer.info.address),
                        );
                    }
                    Ok(
                        VerifyResult::AlreadyExists
                        | VerifyResult::AlreadyInPool
                        | VerifyResult::OutOfMemory
                        | VerifyResult::Expired
                        | VerifyResult::InsufficientFunds,
                    ) => {}
                    Ok(_) => {
                        self.punish(peer, SCORE_INVALID_INVENTORY);
                    }
                    Err(_) => {
                        self.punish(peer, SCORE_MALFORMED);
                    }
                }
            }
            MessageCommand::Consensus => {
                let _ = self
                    .events
                    .send(NetworkEvent::ConsensusReceived {
                        payload: message.payload,
                        from: peer.info.address,
                    })
                    .await;
            }
            MessageCommand::Version | MessageCommand::Verack => {
                // Only valid during the handshake.
                self.punish(peer, SCORE_MALFORMED);
            }
            MessageCommand::Reject
            | MessageCommand::FilterLoad
            | MessageCommand::FilterAdd
            | MessageCommand::FilterClear
            | MessageCommand::MerkleBlock
            | MessageCommand::NotFound
            | MessageCommand::Alert => {}
        }
        Ok(())
    }
}
