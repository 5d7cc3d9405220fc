//! Key-value storage backends for casino state
//!
//! Every state change the casino makes is expressed as a batch of
//! [`WriteOp`]s so that a balance change and the record it pays for land
//! together or not at all.

use crate::{
    config::{CompressionType, StorageConfig},
    errors::{CasinoError, CasinoResult, StorageError},
};
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use std::{
    collections::BTreeMap,
    path::Path,
    sync::{Arc, RwLock},
};

/// A single mutation inside an atomic batch
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl WriteOp {
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        WriteOp::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        WriteOp::Delete { key: key.into() }
    }
}

/// Storage interface shared by the ledger and the bet store
pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> CasinoResult<Option<Vec<u8>>>;

    /// Apply all operations atomically.
    fn write_batch(&self, ops: &[WriteOp]) -> CasinoResult<()>;

    /// All entries whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, prefix: &[u8]) -> CasinoResult<Vec<(Vec<u8>, Vec<u8>)>>;
}

/// Open the backend selected by the configuration.
pub fn open_store(config: &StorageConfig) -> CasinoResult<Arc<dyn KvStore>> {
    if config.in_memory {
        tracing::info!("Using in-memory casino storage (state is not persisted)");
        return Ok(Arc::new(MemoryStorage::new()));
    }

    if config.clear_on_start {
        tracing::warn!(
            path = %config.data_directory,
            "Testing mode: clearing casino database"
        );
        let _ = std::fs::remove_dir_all(&config.data_directory);
    }

    Ok(Arc::new(RocksStorage::new_with_config(config)?))
}

/// RocksDB-backed storage
#[derive(Clone)]
pub struct RocksStorage {
    db: Arc<DB>,
}

impl RocksStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> CasinoResult<Self> {
        Self::open(path, &StorageConfig::default())
    }

    pub fn new_with_config(config: &StorageConfig) -> CasinoResult<Self> {
        Self::open(&config.data_directory, config)
    }

    fn open<P: AsRef<Path>>(path: P, config: &StorageConfig) -> CasinoResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(config.write_buffer_size_mb * 1024 * 1024);
        opts.set_max_write_buffer_number(config.max_write_buffer_number);
        opts.set_compression_type(match config.compression_type {
            CompressionType::None => rocksdb::DBCompressionType::None,
            CompressionType::Snappy => rocksdb::DBCompressionType::Snappy,
            CompressionType::Lz4 => rocksdb::DBCompressionType::Lz4,
            CompressionType::Zstd => rocksdb::DBCompressionType::Zstd,
        });

        let db = DB::open(&opts, path.as_ref()).map_err(|e| {
            CasinoError::Storage(StorageError::DatabaseOpenFailed(format!(
                "{}: {}",
                path.as_ref().display(),
                e
            )))
        })?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl KvStore for RocksStorage {
    fn get(&self, key: &[u8]) -> CasinoResult<Option<Vec<u8>>> {
        self.db
            .get(key)
            .map_err(|e| CasinoError::Storage(StorageError::ReadFailed(e.to_string())))
    }

    fn write_batch(&self, ops: &[WriteOp]) -> CasinoResult<()> {
        let mut batch = WriteBatch::default();
        for op in ops {
            match op {
                WriteOp::Put { key, value } => batch.put(key, value),
                WriteOp::Delete { key } => batch.delete(key),
            }
        }
        self.db
            .write(batch)
            .map_err(|e| CasinoError::Storage(StorageError::WriteFailed(e.to_string())))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> CasinoResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut rows = Vec::new();
        for item in self
            .db
            .iterator(IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, value) =
                item.map_err(|e| CasinoError::Storage(StorageError::ReadFailed(e.to_string())))?;
            if !key.starts_with(prefix) {
                break;
            }
            rows.push((key.to_vec(), value.to_vec()));
        }
        Ok(rows)
    }
}

/// Process-local storage used for tests and `--memory` runs
#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> CasinoError {
    CasinoError::Storage(StorageError::ReadFailed(
        "memory storage lock poisoned".to_string(),
    ))
}

impl KvStore for MemoryStorage {
    fn get(&self, key: &[u8]) -> CasinoResult<Option<Vec<u8>>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(key).cloned())
    }

    fn write_batch(&self, ops: &[WriteOp]) -> CasinoResult<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        for op in ops {
            match op {
                WriteOp::Put { key, value } => {
                    entries.insert(key.clone(), value.clone());
                }
                WriteOp::Delete { key } => {
                    entries.remove(key);
                }
            }
        }
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> CasinoResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}
