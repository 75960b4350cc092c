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

//! # Neo Node
//!
//! `NeoSystem` bundles the protocol settings, store, native-contract
//! registry, import pipeline, memory pool, peer manager and the
//! optional consensus and RPC services, wiring them through explicit
//! constructor dependencies. There are no globals: every component
//! holds a handle to exactly what it needs.

use anyhow::{bail, Context, Result};
use neo3_config::{NodeConfig, ProtocolSettings};
use neo3_consensus::{ConsensusInput, ConsensusOutput, ConsensusPayload, DbftService};
use neo3_cryptography::KeyPair;
use neo3_ledger::{Blockchain, LedgerEvent, Mempool};
use neo3_network::{run_sync, NetworkEvent, PeerManager};
use neo3_persistence::{MemoryStore, Store};
use neo3_rpc_server::{NetworkInfo, RpcServer};
use neo3_smart_contract::NativeRegistry;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Score applied when the ledger flags a peer for sending two blocks
/// at one height.
const DUPLICATE_HEIGHT_SCORE: u32 = 50;

/// Lets the RPC surface read peer state without owning the manager.
struct PeerView(Arc<PeerManager>);

impl NetworkInfo for PeerView {
    fn connection_count(&self) -> usize {
        self.0.peer_count()
    }

    fn peers(&self) -> Vec<(SocketAddr, String, u32)> {
        self.0.peer_list()
    }
}

/// The assembled node.
pub struct NeoSystem {
    pub config: NodeConfig,
    pub settings: Arc<ProtocolSettings>,
    pub store: Arc<dyn Store>,
    pub natives: Arc<NativeRegistry>,
    pub mempool: Arc<Mempool>,
    pub chain: Arc<Blockchain>,
    peers: Option<Arc<PeerManager>>,
    shutdown: watch::Sender<bool>,
}

impl NeoSystem {
    /// Builds the always-on core: settings, store, natives, pool and
    /// the chain (committing genesis on first run). Network, consensus
    /// and RPC start in [`NeoSystem::start`].
    pub fn new(config: NodeConfig) -> Result<Self> {
        let mut settings = ProtocolSettings::for_network(config.network);
        if let Some(overrides) = &config.protocol {
            settings = settings.apply_overrides(overrides);
        }
        let settings = Arc::new(settings);

        let store: Arc<dyn Store> = match config.storage.engine.as_str() {
            "memory" => Arc::new(MemoryStore::new()),
            #[cfg(feature = "rocksdb")]
            "rocksdb" => Arc::new(
                neo3_persistence::RocksDbStore::open(&config.storage.path)
                    .context("opening rocksdb store")?,
            ),
            other => bail!("unsupported storage engine {other:?}"),
        };

        let natives = Arc::new(NativeRegistry::new());
        let mempool = Arc::new(Mempool::new(config.mempool.capacity));
        let chain = Arc::new(
            Blockchain::new(
                settings.clone(),
                store.clone(),
                natives.clone(),
                mempool.clone(),
            )
            .context("opening the chain")?,
        );

        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            config,
            settings,
            store,
            natives,
            mempool,
            chain,
            peers: None,
            shutdown,
        })
    }

    pub fn peers(&self) -> Option<&Arc<PeerManager>> {
        self.peers.as_ref()
    }

    /// Brings up networking, sync, consensus and RPC, then returns.
    /// Services run until [`NeoSystem::stop`].
    pub async fn start(&mut self) -> Result<()> {
        let (peers, network_events) = PeerManager::new(
            self.settings.clone(),
            self.config.p2p.clone(),
            self.chain.clone(),
        );
        let listen = peers.listen().await.context("binding the p2p listener")?;
        info!(%listen, network = self.settings.network, "node listening");
        peers.connect_seeds().await;
        tokio::spawn(run_sync(peers.clone()));

        let consensus_inbox = self.start_consensus(&peers)?;

        if self.config.rpc.enabled {
            let server = RpcServer::new(
                self.chain.clone(),
                Arc::new(PeerView(peers.clone())),
                self.config.rpc.clone(),
            );
            server
                .start(self.shutdown.subscribe())
                .context("starting the rpc server")?;
        }

        tokio::spawn(route_network_events(
            network_events,
            consensus_inbox.clone(),
        ));
        tokio::spawn(route_ledger_events(
            self.chain.clone(),
            peers.clone(),
            consensus_inbox,
        ));

        self.peers = Some(peers);
        Ok(())
    }

    /// Spawns the dBFT service when this node is configured to
    /// produce blocks.
    fn start_consensus(
        &self,
        peers: &Arc<PeerManager>,
    ) -> Result<Option<mpsc::Sender<ConsensusInput>>> {
        if !self.config.consensus.enabled {
            return Ok(None);
        }
        let Some(key_hex) = &self.config.consensus.private_key else {
            bail!("consensus is enabled but no private key is configured");
        };
        let key = KeyPair::from_hex(key_hex).context("parsing the consensus key")?;

        let (input_tx, input_rx) = mpsc::channel(1_024);
        let (output_tx, mut output_rx) = mpsc::channel(1_024);
        let service = DbftService::new(self.chain.clone(), key, input_rx, output_tx);
        tokio::spawn(service.run());

        let chain = self.chain.clone();
        let peers = peers.clone();
        tokio::spawn(async move {
            while let Some(output) = output_rx.recv().await {
                match output {
                    ConsensusOutput::Broadcast(payload) => match payload.to_bytes() {
                        Ok(bytes) => peers.broadcast_consensus(bytes),
                        Err(error) => warn!(%error, "consensus payload encoding failed"),
                    },
                    ConsensusOutput::BlockProduced(block) => {
                        match chain.on_new_block(block, None) {
                            Ok(result) if result.is_ok() => {}
                            Ok(result) => {
                                warn!(%result, "self-produced block rejected")
                            }
                            Err(error) => {
                                tracing::error!(%error, "fatal persistence failure");
                                std::process::exit(1);
                            }
                        }
                    }
                }
            }
        });
        info!("consensus service started");
        Ok(Some(input_tx))
    }

    /// Signals every service to finish its current unit of work and
    /// exit.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// Routes decoded peer traffic to the consensus service.
async fn route_network_events(
    mut events: mpsc::Receiver<NetworkEvent>,
    consensus: Option<mpsc::Sender<ConsensusInput>>,
) {
    while let Some(event) = events.recv().await {
        match event {
            NetworkEvent::ConsensusReceived { payload, from } => {
                let Some(consensus) = &consensus else {
                    continue;
                };
                match ConsensusPayload::from_bytes(&payload) {
                    Ok(payload) => {
                        let _ = consensus.send(ConsensusInput::Payload(payload)).await;
                    }
                    Err(error) => debug!(%from, %error, "undecodable consensus payload"),
                }
            }
            NetworkEvent::PeerConnected {
                address,
                start_height,
            } => {
                debug!(%address, start_height, "peer connected");
            }
            NetworkEvent::PeerDisconnected { address } => {
                debug!(%address, "peer disconnected");
            }
        }
    }
}

/// Routes ledger outcomes to the network (relay) and consensus
/// (round restarts, pool additions).
async fn route_ledger_events(
    chain: Arc<Blockchain>,
    peers: Arc<PeerManager>,
    consensus: Option<mpsc::Sender<ConsensusInput>>,
) {
    let mut events = chain.subscribe();
    while let Ok(event) = events.recv().await {
        match event {
            LedgerEvent::BlockCommitted(block) => {
                if let Err(error) = peers.relay_block(&block) {
                    debug!(%error, "block relay failed");
                }
                if let Some(consensus) = &consensus {
                    let _ = consensus
                        .send(ConsensusInput::BlockCommitted(block.index()))
                        .await;
                }
            }
            LedgerEvent::TransactionAdded(transaction) => {
                if let Err(error) = peers.relay_transaction(&transaction) {
                    debug!(%error, "transaction relay failed");
                }
                if let Some(consensus) = &consensus {
                    let _ = consensus
                        .send(ConsensusInput::TransactionAdded(transaction))
                        .await;
                }
            }
            LedgerEvent::TransactionRemoved { .. } => {}
            LedgerEvent::BadPeer { peer, height } => {
                warn!(%peer, height, "peer sent conflicting blocks");
                peers.punish_address(&peer, DUPLICATE_HEIGHT_SCORE);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_assembles_with_defaults() {
        let system = NeoSystem::new(NodeConfig::default()).unwrap();
        assert_eq!(system.chain.height(), 0);
        assert_eq!(system.natives.all().len(), 9);
        assert!(system.peers().is_none(), "networking starts separately");
    }

    #[test]
    fn unsupported_storage_engine_is_rejected() {
        let mut config = NodeConfig::default();
        config.storage.engine = "floppy".to_string();
        assert!(NeoSystem::new(config).is_err());
    }

    #[tokio::test]
    async fn consensus_requires_a_key() {
        let mut config = NodeConfig::default();
        config.consensus.enabled = true;
        config.p2p.port = 0;
        config.rpc.enabled = false;
        let mut system = NeoSystem::new(config).unwrap();
        assert!(system.start().await.is_err());
    }
}
