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

//! # Neo RPC Server
//!
//! The JSON-RPC 2.0 surface over warp: chain queries, transaction and
//! block submission, test invocations with iterator sessions, and
//! governance reads, all answered from read-only snapshots.

pub mod error_codes;
pub mod methods;
pub mod session;
pub mod types;

pub use methods::{NetworkInfo, NoNetwork, RpcMethods};
pub use session::IteratorSessions;
pub use types::{RpcError, RpcRequest, RpcResponse};

use neo3_config::RpcServerConfig;
use neo3_ledger::Blockchain;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use warp::Filter;

#[derive(Debug, thiserror::Error)]
pub enum RpcServerError {
    #[error("invalid bind address: {0}")]
    BadAddress(#[from] std::net::AddrParseError),

    #[error("bind failed: {0}")]
    Bind(#[from] warp::Error),
}

/// The HTTP front of the node.
pub struct RpcServer {
    config: RpcServerConfig,
    methods: Arc<RpcMethods>,
}

impl RpcServer {
    pub fn new(
        chain: Arc<Blockchain>,
        network: Arc<dyn NetworkInfo>,
        config: RpcServerConfig,
    ) -> Self {
        let methods = Arc::new(RpcMethods::new(chain, network, config.clone()));
        Self { config, methods }
    }

    /// Direct access to the method table, bypassing HTTP.
    pub fn methods(&self) -> &Arc<RpcMethods> {
        &self.methods
    }

    /// Binds and serves in the background until `shutdown` flips.
    /// Returns the bound address.
    pub fn start(
        &self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<SocketAddr, RpcServerError> {
        let methods = self.methods.clone();
        let timeout = Duration::from_millis(self.config.timeout_ms);

        let route = warp::post()
            .and(warp::path::end())
            .and(warp::body::json())
            .then(move |request: RpcRequest| {
                let methods = methods.clone();
                async move {
                    let id = request.id.clone();
                    let params = request.params_array();
                    let outcome = tokio::time::timeout(timeout, async {
                        methods.handle(&request.method, &params)
                    })
                    .await;
                    let response = match outcome {
                        Ok(Ok(value)) => RpcResponse::success(id, value),
                        Ok(Err(error)) => RpcResponse::failure(id, error),
                        Err(_) => {
                            RpcResponse::failure(id, RpcError::internal("request timed out"))
                        }
                    };
                    warp::reply::json(&response)
                }
            });

        let address: SocketAddr =
            format!("{}:{}", self.config.bind_address, self.config.port).parse()?;
        let (bound, serving) =
            warp::serve(route).try_bind_with_graceful_shutdown(address, async move {
                let _ = shutdown.changed().await;
            })?;
        info!(%bound, "rpc server listening");
        tokio::spawn(serving);
        Ok(bound)
    }
}
