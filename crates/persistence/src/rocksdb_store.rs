//! RocksDB-backed durable store, the production backend.

use crate::error::{PersistenceError, PersistenceResult};
use crate::store::{Store, WriteBatch};
use rocksdb::{IteratorMode, Options, DB};
use std::path::Path;

/// A [`Store`] over a RocksDB database.
pub struct RocksDbStore {
    db: DB,
}

impl RocksDbStore {
    /// Opens (or creates) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> PersistenceResult<Self> {
        let mut options = Options::default();
        options.create_if_missing(true);
        options.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let db = DB::open(&options, path)
            .map_err(|e| PersistenceError::Store(e.to_string()))?;
        Ok(Self { db })
    }
}

impl Store for RocksDbStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.db.get(key).ok().flatten()
    }

    fn find_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mode = IteratorMode::From(prefix, rocksdb::Direction::Forward);
        self.db
            .iterator(mode)
            .filter_map(Result::ok)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.to_vec(), value.to_vec()))
            .collect()
    }

    fn write_batch(&self, batch: WriteBatch) -> PersistenceResult<()> {
        let mut db_batch = rocksdb::WriteBatch::default();
        for key in batch.deletes {
            db_batch.delete(key);
        }
        for (key, value) in batch.puts {
            db_batch.put(key, value);
        }
        self.db
            .write(db_batch)
            .map_err(|e| PersistenceError::Store(e.to_string()))
    }
}
