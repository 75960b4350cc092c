// Copyright (C) 2015-2025 The Neo Project.
//
// snapshot.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Layered snapshots over the durable store.
//!
//! Each snapshot holds local overrides and tombstones above a parent, a
//! key never appearing in both. `commit` merges into the parent and seals
//! the snapshot; `child` opens a speculative layer whose commit folds
//! back into this one.

use crate::error::{PersistenceError, PersistenceResult};
use crate::storage_item::StorageItem;
use crate::storage_key::StorageKey;
use crate::store::{Store, WriteBatch};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_SNAPSHOT_ID: AtomicU64 = AtomicU64::new(1);

/// A shared, lockable snapshot layer.
pub type SnapshotHandle = Arc<RwLock<Snapshot>>;

enum Parent {
    Store(Arc<dyn Store>),
    Snapshot(SnapshotHandle),
}

/// A read-through copy-on-write layer over the store or another snapshot.
pub struct Snapshot {
    id: u64,
    parent: Parent,
    overrides: BTreeMap<StorageKey, StorageItem>,
    tombstones: BTreeSet<StorageKey>,
    committed: bool,
}

impl Snapshot {
    /// Opens a snapshot directly over the durable store.
    pub fn on_store(store: Arc<dyn Store>) -> Self {
        Self {
            id: NEXT_SNAPSHOT_ID.fetch_add(1, Ordering::Relaxed),
            parent: Parent::Store(store),
            overrides: BTreeMap::new(),
            tombstones: BTreeSet::new(),
            committed: false,
        }
    }

    /// Opens a child layer for speculative execution. The parent chain is
    /// checked for cycles, which can only arise from bugs but are cheap
    /// to rule out.
    pub fn child_of(parent: &SnapshotHandle) -> PersistenceResult<Self> {
        let id = NEXT_SNAPSHOT_ID.fetch_add(1, Ordering::Relaxed);
        let mut seen: HashSet<u64> = HashSet::new();
        seen.insert(id);
        let mut cursor = Some(parent.clone());
        while let Some(handle) = cursor {
            let guard = handle.read();
            if !seen.insert(guard.id) {
                return Err(PersistenceError::CycleDetected(guard.id));
            }
            cursor = match &guard.parent {
                Parent::Snapshot(next) => Some(next.clone()),
                Parent::Store(_) => None,
            };
        }
        Ok(Self {
            id,
            parent: Parent::Snapshot(parent.clone()),
            overrides: BTreeMap::new(),
            tombstones: BTreeSet::new(),
            committed: false,
        })
    }

    /// Wraps the snapshot for sharing.
    pub fn into_handle(self) -> SnapshotHandle {
        Arc::new(RwLock::new(self))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Number of pending local changes.
    pub fn change_count(&self) -> usize {
        self.overrides.len() + self.tombstones.len()
    }

    /// Reads through the layer chain.
    pub fn get(&self, key: &StorageKey) -> Option<StorageItem> {
        if self.tombstones.contains(key) {
            return None;
        }
        if let Some(item) = self.overrides.get(key) {
            return Some(item.clone());
        }
        match &self.parent {
            Parent::Snapshot(parent) => parent.read().get(key),
            Parent::Store(store) => store
                .get(&key.to_bytes())
                .and_then(|bytes| StorageItem::from_bytes(&bytes).ok()),
        }
    }

    pub fn contains(&self, key: &StorageKey) -> bool {
        self.get(key).is_some()
    }

    /// Writes a local override.
    pub fn put(&mut self, key: StorageKey, item: StorageItem) -> PersistenceResult<()> {
        if self.committed {
            return Err(PersistenceError::AlreadyCommitted);
        }
        if let Some(existing) = self.get(&key) {
            if existing.read_only {
                return Err(PersistenceError::ReadOnlyItem);
            }
        }
        self.tombstones.remove(&key);
        self.overrides.insert(key, item);
        Ok(())
    }

    /// Writes a tombstone.
    pub fn delete(&mut self, key: &StorageKey) -> PersistenceResult<()> {
        if self.committed {
            return Err(PersistenceError::AlreadyCommitted);
        }
        if let Some(existing) = self.get(key) {
            if existing.read_only {
                return Err(PersistenceError::ReadOnlyItem);
            }
        }
        self.overrides.remove(key);
        self.tombstones.insert(key.clone());
        Ok(())
    }

    /// All live entries whose encoded key starts with `prefix`,
    /// ascending by encoded key; merges the parent view with this layer.
    pub fn find(&self, prefix: &[u8]) -> Vec<(StorageKey, StorageItem)> {
        let mut merged: BTreeMap<StorageKey, StorageItem> = BTreeMap::new();
        match &self.parent {
            Parent::Snapshot(parent) => {
                for (key, item) in parent.read().find(prefix) {
                    merged.insert(key, item);
                }
            }
            Parent::Store(store) => {
                for (key_bytes, value_bytes) in store.find_prefix(prefix) {
                    if let (Some(key), Ok(item)) = (
                        StorageKey::from_bytes(&key_bytes),
                        StorageItem::from_bytes(&value_bytes),
                    ) {
                        merged.insert(key, item);
                    }
                }
            }
        }
        for key in &self.tombstones {
            if key.to_bytes().starts_with(prefix) {
                merged.remove(key);
            }
        }
        for (key, item) in &self.overrides {
            if key.to_bytes().starts_with(prefix) {
                merged.insert(key.clone(), item.clone());
            }
        }
        merged.into_iter().collect()
    }

    /// Merges local changes into the parent and seals this snapshot.
    pub fn commit(&mut self) -> PersistenceResult<()> {
        if self.committed {
            return Err(PersistenceError::AlreadyCommitted);
        }
        debug_assert!(
            self.overrides.keys().all(|k| !self.tombstones.contains(k)),
            "a key must never be both overridden and tombstoned"
        );
        let overrides = std::mem::take(&mut self.overrides);
        let tombstones = std::mem::take(&mut self.tombstones);
        match &self.parent {
            Parent::Snapshot(parent) => {
                let mut parent = parent.write();
                if parent.committed {
                    return Err(PersistenceError::AlreadyCommitted);
                }
                for key in tombstones {
                    parent.overrides.remove(&key);
                    parent.tombstones.insert(key);
                }
                for (key, item) in overrides {
                    parent.tombstones.remove(&key);
                    parent.overrides.insert(key, item);
                }
            }
            Parent::Store(store) => {
                let mut batch = WriteBatch::new();
                for key in tombstones {
                    batch.delete(key.to_bytes());
                }
                for (key, item) in overrides {
                    batch.put(key.to_bytes(), item.to_bytes());
                }
                store.write_batch(batch)?;
            }
        }
        self.committed = true;
        Ok(())
    }

    /// Discards local changes without touching the parent.
    pub fn discard(&mut self) {
        self.overrides.clear();
        self.tombstones.clear();
        self.committed = true;
    }
}
