//! Durable store abstraction and the in-memory backend.

use crate::error::PersistenceResult;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;

/// A batch of writes applied atomically.
#[derive(Debug, Default, Clone)]
pub struct WriteBatch {
    pub puts: Vec<(Vec<u8>, Vec<u8>)>,
    pub deletes: Vec<Vec<u8>>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.puts.push((key, value));
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.deletes.push(key);
    }

    pub fn is_empty(&self) -> bool {
        self.puts.is_empty() && self.deletes.is_empty()
    }
}

/// A plain key-value store with prefix scans and atomic batches.
///
/// The import pipeline is the single writer; snapshots give readers a
/// consistent view.
pub trait Store: Send + Sync {
    /// Reads a value.
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Whether the key exists.
    fn contains(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// All entries whose key starts with `prefix`, ascending by key.
    fn find_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)>;

    /// Applies a batch atomically.
    fn write_batch(&self, batch: WriteBatch) -> PersistenceResult<()>;
}

/// The in-memory backend used by tests and private chains.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.read().get(key).cloned()
    }

    fn find_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let data = self.data.read();
        data.range((Bound::Included(prefix.to_vec()), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    fn write_batch(&self, batch: WriteBatch) -> PersistenceResult<()> {
        let mut data = self.data.write();
        for key in batch.deletes {
            data.remove(&key);
        }
        for (key, value) in batch.puts {
            data.insert(key, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_applies_atomically() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.put(vec![1], vec![10]);
        batch.put(vec![2], vec![20]);
        store.write_batch(batch).unwrap();
        assert_eq!(store.get(&[1]), Some(vec![10]));

        let mut batch = WriteBatch::new();
        batch.delete(vec![1]);
        batch.put(vec![3], vec![30]);
        store.write_batch(batch).unwrap();
        assert_eq!(store.get(&[1]), None);
        assert_eq!(store.get(&[3]), Some(vec![30]));
    }

    #[test]
    fn prefix_scan_is_ordered_and_bounded() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.put(vec![1, 2], vec![1]);
        batch.put(vec![1, 1], vec![2]);
        batch.put(vec![1, 3], vec![3]);
        batch.put(vec![2, 0], vec![4]);
        store.write_batch(batch).unwrap();

        let found = store.find_prefix(&[1]);
        let keys: Vec<Vec<u8>> = found.into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![vec![1, 1], vec![1, 2], vec![1, 3]]);
    }

    #[test]
    fn deletes_inside_batch_apply_before_puts() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.put(vec![9], vec![1]);
        store.write_batch(batch).unwrap();

        // Delete and re-put the same key in one batch keeps the new value.
        let mut batch = WriteBatch::new();
        batch.delete(vec![9]);
        batch.put(vec![9], vec![2]);
        store.write_batch(batch).unwrap();
        assert_eq!(store.get(&[9]), Some(vec![2]));
    }
}
