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

//! # Neo Ledger
//!
//! The block import pipeline: genesis construction, ordered admission
//! of received blocks with an unverified cache, deterministic
//! verification, the atomic persist sequence, and the fee-ordered
//! memory pool feeding block production.

pub mod blockchain;
pub mod error;
pub mod genesis;
pub mod header_cache;
pub mod mempool;
pub mod verify_result;

pub use blockchain::{Blockchain, LedgerEvent};
pub use error::{LedgerError, LedgerResult};
pub use genesis::{genesis_block, GENESIS_NONCE, GENESIS_TIMESTAMP_MS};
pub use header_cache::HeaderCache;
pub use mempool::{Mempool, PooledTransaction, RemovalReason};
pub use verify_result::VerifyResult;
