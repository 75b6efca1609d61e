//! In-memory store for tests and development.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tracing::trace;

use crate::store::{db_key, BatchOp, Store, WriteBatch};
use crate::{DomainTag, Result};

/// A [`Store`] backed by an ordered in-memory map.
///
/// Full feature compatibility with the persistent stores, no disk I/O.
/// Used by the test suites and by tooling that replays state without a
/// database directory.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored, across all domains.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Whether the raw domain-tagged key is present. Test helper.
    pub fn contains(&self, tag: DomainTag, key: &[u8]) -> bool {
        self.data.read().contains_key(&db_key(tag, key))
    }
}

impl Store for MemoryStore {
    fn get(&self, tag: DomainTag, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data.read().get(&db_key(tag, key)).cloned())
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        let mut data = self.data.write();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { key, value } => {
                    trace!(key = %hex::encode(&key), len = value.len(), "memory put");
                    data.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    trace!(key = %hex::encode(&key), "memory delete");
                    data.remove(&key);
                }
            }
        }
        Ok(())
    }
}
