//! RocksDB-backed store implementation.

use rocksdb::{Options, DB};
use tracing::debug;

use crate::store::{db_key, BatchOp, Store, WriteBatch};
use crate::{DomainTag, Error, Result, StorageConfig};

/// A [`Store`] backed by RocksDB.
///
/// One database holds every domain; [`db_key`] prefixes keep the keyspaces
/// apart. Batches map directly onto RocksDB write batches, which gives the
/// atomicity the cache flush protocol requires.
pub struct RocksDbStore {
    db: DB,
}

impl RocksDbStore {
    /// Opens (or creates) the database described by `config`.
    pub fn open(config: &StorageConfig) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(config.create_if_missing);
        if let Some(max_open_files) = config.max_open_files {
            opts.set_max_open_files(max_open_files);
        }
        if let Some(parallelism) = config.parallelism {
            opts.increase_parallelism(parallelism);
        }

        let db = DB::open(&opts, &config.path)
            .map_err(|e| Error::Database(format!("failed to open rocksdb: {e}")))?;
        debug!(path = %config.path.display(), "opened rocksdb store");

        Ok(Self { db })
    }
}

impl Store for RocksDbStore {
    fn get(&self, tag: DomainTag, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.db
            .get(db_key(tag, key))
            .map_err(|e| Error::Database(e.to_string()))
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        let ops = batch.into_ops();
        let count = ops.len();
        let mut wb = rocksdb::WriteBatch::default();
        for op in ops {
            match op {
                BatchOp::Put { key, value } => wb.put(key, value),
                BatchOp::Delete { key } => wb.delete(key),
            }
        }
        self.db
            .write(wb)
            .map_err(|e| Error::Database(e.to_string()))?;
        debug!(ops = count, "applied rocksdb batch");
        Ok(())
    }
}
