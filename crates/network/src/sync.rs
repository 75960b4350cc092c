// Copyright (C) 2015-2025 The Neo Project.
//
// sync.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! The block-sync scheduler.
//!
//! Compares the committed tip against the heights peers report and
//! requests the gap in fixed-size batches, round-robin over the peers
//! that are ahead, with one outstanding request per peer and a
//! deadline on each. Arriving blocks flow through the normal import
//! path; out-of-order batches wait in the ledger's unverified cache.

use crate::peer_manager::PeerManager;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Instant};
use tracing::debug;

/// Blocks requested per getblockbyindex.
const BATCH_SIZE: u32 = 50;
/// Outstanding batches across all peers.
const MAX_PARALLEL_REQUESTS: usize = 4;
/// Scheduler cadence.
const TICK: Duration = Duration::from_millis(500);

struct InflightRequest {
    peer: SocketAddr,
    start: u32,
    deadline: Instant,
}

/// First height no outstanding batch covers.
fn next_uncovered(tip: u32, inflight: &[InflightRequest]) -> u32 {
    let mut next = tip + 1;
    for request in inflight {
        next = next.max(request.start + BATCH_SIZE);
    }
    next
}

/// Runs until the process shuts down; spawned by the node.
pub async fn run_sync(manager: Arc<PeerManager>) {
    let mut inflight: Vec<InflightRequest> = Vec::new();
    let mut next_peer: usize = 0;
    let mut ticker = interval(TICK);

    loop {
        ticker.tick().await;
        let tip = manager.chain().height();
        let now = Instant::now();

        // Finished or expired requests free their slot.
        inflight.retain(|request| {
            if request.start <= tip {
                return false;
            }
            if request.deadline <= now {
                debug!(peer = %request.peer, start = request.start, "block request timed out");
                return false;
            }
            true
        });

        let best = manager.best_peer_height();
        if best <= tip {
            continue;
        }

        let mut next_start = next_uncovered(tip, &inflight);
        while inflight.len() < MAX_PARALLEL_REQUESTS && next_start <= best {
            let candidates = manager.peers_at_or_above(next_start);
            let available: Vec<SocketAddr> = candidates
                .into_iter()
                .filter(|peer| !inflight.iter().any(|request| request.peer == *peer))
                .collect();
            if available.is_empty() {
                break;
            }
            let peer = available[next_peer % available.len()];
            next_peer = next_peer.wrapping_add(1);

            if manager.request_blocks(&peer, next_start, BATCH_SIZE as i16) {
                debug!(%peer, start = next_start, "requested block batch");
                inflight.push(InflightRequest {
                    peer,
                    start: next_start,
                    deadline: now + manager.request_timeout(),
                });
                next_start += BATCH_SIZE;
            } else {
                break;
            }
        }
    }
}
