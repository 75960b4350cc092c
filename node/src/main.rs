// Copyright (C) 2015-2025 The Neo Project.
//
// main.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! The node daemon: configuration, startup and graceful shutdown.

use anyhow::{Context, Result};
use clap::Parser;
use neo3_config::{NetworkType, NodeConfig};
use neo3_node::NeoSystem;
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "neo3-node", about = "Neo N3 blockchain node", version)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, short = 'c', value_name = "PATH")]
    config: Option<PathBuf>,

    /// Network to join: mainnet, testnet or private.
    #[arg(long, value_name = "NETWORK")]
    network: Option<String>,

    /// Overrides the configured P2P listen port.
    #[arg(long, value_name = "PORT")]
    p2p_port: Option<u16>,

    /// Overrides the configured RPC listen port.
    #[arg(long, value_name = "PORT")]
    rpc_port: Option<u16>,

    /// Storage engine: memory or rocksdb.
    #[arg(long, value_name = "ENGINE")]
    storage: Option<String>,

    /// Data directory for disk-backed storage.
    #[arg(long, value_name = "PATH")]
    data_dir: Option<PathBuf>,

    /// Hex-encoded consensus private key; enables block production.
    #[arg(long, value_name = "KEY")]
    consensus_key: Option<String>,
}

fn load_config(cli: &Cli) -> Result<NodeConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => NodeConfig::default(),
    };

    if let Some(network) = &cli.network {
        config.network = match network.to_lowercase().as_str() {
            "mainnet" => NetworkType::MainNet,
            "testnet" => NetworkType::TestNet,
            "private" => NetworkType::Private,
            other => anyhow::bail!("unknown network {other:?}"),
        };
    }
    if let Some(port) = cli.p2p_port {
        config.p2p.port = port;
    }
    if let Some(port) = cli.rpc_port {
        config.rpc.port = port;
    }
    if let Some(engine) = &cli.storage {
        config.storage.engine = engine.clone();
    }
    if let Some(path) = &cli.data_dir {
        config.storage.path = path.display().to_string();
    }
    if let Some(key) = &cli.consensus_key {
        config.consensus.enabled = true;
        config.consensus.private_key = Some(key.clone());
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    info!(network = ?config.network, "starting node");

    let mut system = NeoSystem::new(config)?;
    system.start().await?;

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutdown requested, finishing in-flight work");
    system.stop();
    // Give services a moment to finish their current unit of work; an
    // in-flight block persist always completes before the flag is seen.
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    info!("node stopped");
    Ok(())
}
