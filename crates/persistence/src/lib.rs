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

//! # Neo Persistence
//!
//! The storage model: immutable storage keys, storage items with a
//! read-only flag, a durable [`Store`] abstraction with in-memory and
//! RocksDB backends, and the layered copy-on-write [`Snapshot`] the
//! execution pipeline mutates.

pub mod error;
pub mod snapshot;
pub mod storage_item;
pub mod storage_key;
pub mod store;

#[cfg(feature = "rocksdb")]
pub mod rocksdb_store;

pub use error::{PersistenceError, PersistenceResult};
pub use snapshot::{Snapshot, SnapshotHandle};
pub use storage_item::StorageItem;
pub use storage_key::StorageKey;
pub use store::{MemoryStore, Store, WriteBatch};

#[cfg(feature = "rocksdb")]
pub use rocksdb_store::RocksDbStore;
