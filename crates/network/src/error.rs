// Copyright (C) 2015-2025 The Neo Project.
//
// error.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Network error types.

use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] neo3_io::IoError),

    #[error("core error: {0}")]
    Core(#[from] neo3_core::CoreError),

    #[error("invalid message from {peer}: {reason}")]
    InvalidMessage { peer: SocketAddr, reason: String },

    #[error("wrong network magic: got {got:#x}, expected {expected:#x}")]
    WrongMagic { got: u32, expected: u32 },

    #[error("payload of {0} bytes exceeds the 32 MiB limit")]
    OversizedPayload(usize),

    #[error("handshake with {peer} failed: {reason}")]
    HandshakeFailed { peer: SocketAddr, reason: String },

    #[error("connected to self (nonce collision)")]
    SelfConnection,

    #[error("peer {0} is banned")]
    Banned(SocketAddr),

    #[error("connection to {0} timed out")]
    Timeout(SocketAddr),

    #[error("peer {0} disconnected")]
    Disconnected(SocketAddr),
}

pub type NetworkResult<T> = Result<T, NetworkError>;
