//! Op logs and the type-erased undo dispatch table.
//!
//! Every mutation on a cache with an attached sink records the serialized
//! value the key held *before* the call. The logs for one transactional
//! unit (typically one block) live in a single [`OpLogMap`] shared by all
//! domain caches of that scope. Rolling the unit back replays each domain's
//! log in reverse through the [`UndoRegistry`].

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use chaindb_storage::DomainTag;

use crate::{Error, Result};

/// One captured mutation: the serialized key (empty for scalar domains)
/// and the serialized prior value, which may be the empty sentinel when
/// the key was previously absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpLog {
    key: Vec<u8>,
    prior: Vec<u8>,
}

impl OpLog {
    /// Creates an op-log entry from already-serialized key and prior value.
    pub fn new(key: Vec<u8>, prior: Vec<u8>) -> Self {
        Self { key, prior }
    }

    /// Serialized key bytes.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Serialized prior value bytes.
    pub fn prior(&self) -> &[u8] {
        &self.prior
    }
}

/// Per-domain ordered op-log sequences for one transactional unit of work.
///
/// Entries within a domain keep chronological order; there is no ordering
/// guarantee across domains.
#[derive(Debug, Default)]
pub struct OpLogMap {
    logs: BTreeMap<DomainTag, Vec<OpLog>>,
}

impl OpLogMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `op` to `tag`'s sequence.
    pub fn push(&mut self, tag: DomainTag, op: OpLog) {
        self.logs.entry(tag).or_default().push(op);
    }

    /// The captured sequence for `tag`, if any mutation touched it.
    pub fn domain_logs(&self, tag: DomainTag) -> Option<&[OpLog]> {
        self.logs.get(&tag).map(Vec::as_slice)
    }

    /// Iterates `(tag, sequence)` pairs for every domain present.
    pub fn iter(&self) -> impl Iterator<Item = (DomainTag, &[OpLog])> {
        self.logs.iter().map(|(tag, ops)| (*tag, ops.as_slice()))
    }

    /// True when no mutation was captured.
    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }

    /// Total number of captured entries across all domains.
    pub fn len(&self) -> usize {
        self.logs.values().map(Vec::len).sum()
    }

    /// Drops every captured entry.
    pub fn clear(&mut self) {
        self.logs.clear();
    }
}

/// An op-log sink shared by all domain caches of one validation scope.
pub type SharedOpLogMap = Arc<RwLock<OpLogMap>>;

/// Creates a fresh shared op-log sink.
pub fn shared_op_log() -> SharedOpLogMap {
    Arc::new(RwLock::new(OpLogMap::new()))
}

/// A live cache instance that can replay op logs for its domain.
///
/// Implemented by [`KeyedCache`](crate::KeyedCache) and
/// [`ScalarCache`](crate::ScalarCache); the registry stores these as trait
/// objects so the rollback driver needs no knowledge of key or value types.
pub trait UndoTarget: Send + Sync {
    /// The domain this target restores.
    fn domain(&self) -> DomainTag;

    /// Replays `logs` in reverse order, restoring every touched key to its
    /// pre-sequence value. Must not itself capture op logs.
    fn undo_all(&self, logs: &[OpLog]) -> Result<()>;
}

/// Domain-tag-keyed table of undo targets for one set of live caches.
#[derive(Default)]
pub struct UndoRegistry {
    targets: BTreeMap<DomainTag, Arc<dyn UndoTarget>>,
}

impl UndoRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `target` under its domain tag, replacing any previous
    /// registration for that domain.
    pub fn register(&mut self, target: Arc<dyn UndoTarget>) {
        self.targets.insert(target.domain(), target);
    }

    /// Number of registered domains.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Rolls back everything captured in `op_logs`.
    ///
    /// Domains are processed independently; each domain's entries are
    /// replayed last-to-first by its registered target. A domain with no
    /// registered target is a configuration bug and fails fast.
    pub fn undo(&self, op_logs: &OpLogMap) -> Result<()> {
        for (tag, logs) in op_logs.iter() {
            let target = self.targets.get(&tag).ok_or_else(|| {
                Error::InvariantViolation(format!("no undo target registered for domain {tag}"))
            })?;
            debug!(domain = %tag, entries = logs.len(), "replaying op log");
            target.undo_all(logs)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_domain_order_is_preserved() {
        let mut map = OpLogMap::new();
        map.push(DomainTag::Account, OpLog::new(b"a".to_vec(), b"1".to_vec()));
        map.push(DomainTag::Asset, OpLog::new(b"x".to_vec(), b"9".to_vec()));
        map.push(DomainTag::Account, OpLog::new(b"b".to_vec(), b"2".to_vec()));

        let logs = map.domain_logs(DomainTag::Account).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].key(), b"a");
        assert_eq!(logs[1].key(), b"b");
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn undo_of_unregistered_domain_fails() {
        let registry = UndoRegistry::new();
        let mut map = OpLogMap::new();
        map.push(DomainTag::Utxo, OpLog::new(vec![], vec![]));

        let err = registry.undo(&map).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
    }
}
