//! The keyed layered cache.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use chaindb_storage::{DomainTag, Store, WriteBatch};

use crate::codec;
use crate::domain::KeyedDomain;
use crate::entry::CacheEntry;
use crate::op_log::{OpLog, SharedOpLogMap, UndoRegistry, UndoTarget};
use crate::{Error, Result};

/// The backend a cache layer flushes into and reads through.
enum Backend<D: KeyedDomain> {
    /// Not yet bound; must be bound before any data flows.
    Detached,
    /// In-memory child layer over a same-shape parent.
    Parent(Arc<KeyedCache<D>>),
    /// Root layer over the durable store.
    Store(Arc<dyn Store>),
}

impl<D: KeyedDomain> Clone for Backend<D> {
    fn clone(&self) -> Self {
        match self {
            Backend::Detached => Backend::Detached,
            Backend::Parent(parent) => Backend::Parent(Arc::clone(parent)),
            Backend::Store(store) => Backend::Store(Arc::clone(store)),
        }
    }
}

struct Inner<D: KeyedDomain> {
    backend: Backend<D>,
    entries: BTreeMap<D::Key, CacheEntry<D::Value>>,
    op_log: Option<SharedOpLogMap>,
    calc_size: bool,
    size: u32,
}

/// A copy-on-write cache layer for one keyed chain-state domain.
///
/// Bound for its whole lifetime to exactly one backend: a parent cache of
/// the same domain, or the durable store. Reads fall through the backend
/// chain and memoize hits locally (unmodified); writes stay local and
/// marked modified until [`flush`](Self::flush) pushes them one level down.
/// Erasure writes a tombstone (the domain's empty sentinel) so a later read
/// does not resurrect the parent's stale value.
///
/// With an op-log sink attached, every mutation records the prior value
/// first, allowing exact rollback through [`UndoTarget::undo_all`].
pub struct KeyedCache<D: KeyedDomain> {
    inner: RwLock<Inner<D>>,
}

impl<D: KeyedDomain> KeyedCache<D> {
    fn with_backend(backend: Backend<D>, calc_size: bool) -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(Inner {
                backend,
                entries: BTreeMap::new(),
                op_log: None,
                calc_size,
                size: 0,
            }),
        })
    }

    /// Creates an unbound layer; [`bind_parent`](Self::bind_parent) must be
    /// called before any data is read or written.
    pub fn detached() -> Arc<Self> {
        Self::with_backend(Backend::Detached, false)
    }

    /// Creates a child layer over `parent`.
    pub fn level_over(parent: &Arc<Self>) -> Arc<Self> {
        Self::with_backend(Backend::Parent(Arc::clone(parent)), false)
    }

    /// Creates the root layer over the durable store. Size tracking is
    /// enabled here, where the long-lived hot set accumulates.
    pub fn of_store(store: Arc<dyn Store>) -> Arc<Self> {
        Self::with_backend(Backend::Store(store), true)
    }

    /// Binds a detached layer to `parent`.
    ///
    /// Fails once any data has been cached or another backend is bound;
    /// rebinding a live layer is a programming error.
    pub fn bind_parent(&self, parent: &Arc<Self>) -> Result<()> {
        let mut inner = self.inner.write();
        if !matches!(inner.backend, Backend::Detached) {
            return Err(Error::InvariantViolation(format!(
                "{}: backend already bound",
                D::TAG
            )));
        }
        if !inner.entries.is_empty() {
            return Err(Error::InvariantViolation(format!(
                "{}: cannot bind parent after data was cached",
                D::TAG
            )));
        }
        inner.backend = Backend::Parent(Arc::clone(parent));
        Ok(())
    }

    /// Attaches the scope's op-log sink; subsequent mutations are captured.
    pub fn attach_op_log(&self, sink: &SharedOpLogMap) {
        self.inner.write().op_log = Some(Arc::clone(sink));
    }

    /// Detaches the op-log sink; subsequent mutations are not captured.
    pub fn detach_op_log(&self) {
        self.inner.write().op_log = None;
    }

    /// This cache's domain tag.
    pub fn tag(&self) -> DomainTag {
        D::TAG
    }

    /// Reads the value for `key`, falling through parent layers and the
    /// store on a local miss. Returns `Ok(None)` for absent keys and
    /// tombstones alike.
    pub fn get(&self, key: &D::Key) -> Result<Option<D::Value>> {
        ensure_key_not_empty::<D>(key)?;
        Ok(self.load(key)?.filter(|value| !codec::is_empty(value)))
    }

    /// Whether `key` currently resolves to a non-empty value.
    pub fn contains(&self, key: &D::Key) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Inserts or updates `key`, marking it modified in this layer.
    ///
    /// Captures the prior value in the op log first (the empty sentinel if
    /// the key was previously absent everywhere).
    pub fn set(&self, key: &D::Key, value: D::Value) -> Result<()> {
        ensure_key_not_empty::<D>(key)?;
        self.load(key)?;

        let mut inner = self.inner.write();
        let sink = inner.op_log.clone();
        let key_bytes = codec::encode(key)?;
        let prior = inner.entries.get(key).map(|e| e.value().clone());

        match prior {
            Some(prior) => {
                push_op_log(&sink, D::TAG, &key_bytes, &prior)?;
                if inner.calc_size {
                    let add = codec::serialized_size(&value)?;
                    let sub = codec::serialized_size(&prior)?;
                    inner.size = (inner.size + add).saturating_sub(sub);
                }
            }
            None => {
                push_op_log(&sink, D::TAG, &key_bytes, &D::Value::default())?;
                if inner.calc_size {
                    inner.size += codec::serialized_size(key)? + codec::serialized_size(&value)?;
                }
            }
        }
        inner.entries.insert(key.clone(), CacheEntry::new(value, true));
        Ok(())
    }

    /// Erases `key` by writing a tombstone: the entry stays in the map,
    /// holding the empty sentinel and marked modified, so the parent's
    /// value cannot be resurrected by a later read. Erasing a key that is
    /// absent (or already a tombstone) at every level is a no-op.
    pub fn erase(&self, key: &D::Key) -> Result<()> {
        ensure_key_not_empty::<D>(key)?;
        let current = self.load(key)?;

        let mut inner = self.inner.write();
        let sink = inner.op_log.clone();
        if let Some(prior) = current {
            if !codec::is_empty(&prior) {
                push_op_log(&sink, D::TAG, &codec::encode(key)?, &prior)?;
                if inner.calc_size {
                    // Well-defined accounting order: drop the old value's
                    // size, then account for the tombstone sentinel.
                    let old = codec::serialized_size(&prior)?;
                    let empty = codec::serialized_size(&D::Value::default())?;
                    inner.size = inner.size.saturating_sub(old) + empty;
                }
                inner
                    .entries
                    .insert(key.clone(), CacheEntry::new(D::Value::default(), true));
            }
        }
        Ok(())
    }

    /// Merges every modified entry into the backend, then clears this
    /// layer.
    ///
    /// Parent-bound: modified entries overwrite the parent's local entries
    /// and stay marked modified there, so they propagate on the parent's
    /// own flush. Store-bound: modified entries become one atomic batch of
    /// puts (live values) and deletes (tombstones).
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.inner.write();
        let backend = inner.backend.clone();
        match backend {
            Backend::Parent(parent) => {
                let mut merged = 0usize;
                for (key, entry) in inner.entries.iter() {
                    if entry.is_modified() {
                        parent.merge(key, entry.value().clone())?;
                        merged += 1;
                    }
                }
                trace!(domain = %D::TAG, entries = merged, "flushed layer into parent");
            }
            Backend::Store(store) => {
                let mut batch = WriteBatch::new();
                for (key, entry) in inner.entries.iter() {
                    if entry.is_modified() {
                        let key_bytes = codec::encode(key)?;
                        if entry.is_empty() {
                            batch.delete(D::TAG, &key_bytes);
                        } else {
                            batch.put(D::TAG, &key_bytes, codec::encode(entry.value())?);
                        }
                    }
                }
                if !batch.is_empty() {
                    debug!(domain = %D::TAG, ops = batch.len(), "flushing layer to store");
                    store.write_batch(batch)?;
                }
            }
            Backend::Detached => {
                return Err(Error::InvariantViolation(format!(
                    "{}: flush on a layer with neither parent nor store",
                    D::TAG
                )));
            }
        }
        inner.entries.clear();
        inner.size = 0;
        Ok(())
    }

    /// Drops all local entries without flushing. Discards speculative
    /// state that was never committed.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.size = 0;
    }

    /// Restores one captured mutation, bypassing op-log capture: an undo
    /// must never itself be undoable.
    pub fn undo_one(&self, log: &OpLog) -> Result<()> {
        let key: D::Key = codec::decode(log.key())?;
        let prior: D::Value = codec::decode(log.prior())?;
        self.merge(&key, prior)
    }

    /// Installs this instance in `registry` under its domain tag so a
    /// generic rollback driver can reach it.
    pub fn register_undo(self: &Arc<Self>, registry: &mut UndoRegistry) {
        registry.register(Arc::clone(self) as Arc<dyn UndoTarget>);
    }

    /// Sum of serialized key+value sizes of all cached entries, `0` when
    /// size tracking is disabled for this layer.
    pub fn approximate_size(&self) -> u32 {
        self.inner.read().size
    }

    /// Number of locally cached entries, tombstones included.
    pub fn cached_entries(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Reads through the layer chain, memoizing a hit into the local map
    /// unmodified. Returns the raw cached value, tombstones included;
    /// `None` means no level knows the key, and no entry is created.
    fn load(&self, key: &D::Key) -> Result<Option<D::Value>> {
        let mut inner = self.inner.write();
        if let Some(entry) = inner.entries.get(key) {
            return Ok(Some(entry.value().clone()));
        }

        let found = match inner.backend.clone() {
            Backend::Parent(parent) => parent.load(key)?,
            Backend::Store(store) => store
                .get(D::TAG, &codec::encode(key)?)?
                .map(|bytes| codec::decode::<D::Value>(&bytes))
                .transpose()?,
            Backend::Detached => None,
        };

        match found {
            Some(value) => {
                if inner.entries.contains_key(key) {
                    return Err(Error::InvariantViolation(format!(
                        "{}: key materialized twice during read-through",
                        D::TAG
                    )));
                }
                if inner.calc_size {
                    inner.size += codec::serialized_size(key)? + codec::serialized_size(&value)?;
                }
                inner
                    .entries
                    .insert(key.clone(), CacheEntry::new(value.clone(), false));
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Writes `value` directly into this layer's map, marked modified,
    /// without op-log capture. Used by child flushes and undo replay.
    fn merge(&self, key: &D::Key, value: D::Value) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.calc_size {
            match inner.entries.get(key) {
                Some(existing) => {
                    let add = codec::serialized_size(&value)?;
                    let sub = codec::serialized_size(existing.value())?;
                    inner.size = (inner.size + add).saturating_sub(sub);
                }
                None => {
                    inner.size +=
                        codec::serialized_size(key)? + codec::serialized_size(&value)?;
                }
            }
        }
        inner.entries.insert(key.clone(), CacheEntry::new(value, true));
        Ok(())
    }
}

impl<D: KeyedDomain> UndoTarget for KeyedCache<D> {
    fn domain(&self) -> DomainTag {
        D::TAG
    }

    fn undo_all(&self, logs: &[OpLog]) -> Result<()> {
        for log in logs.iter().rev() {
            self.undo_one(log)?;
        }
        Ok(())
    }
}

fn ensure_key_not_empty<D: KeyedDomain>(key: &D::Key) -> Result<()> {
    if codec::is_empty(key) {
        return Err(Error::InvariantViolation(format!(
            "{}: empty key is reserved as the key sentinel",
            D::TAG
        )));
    }
    Ok(())
}

pub(crate) fn push_op_log<V: serde::Serialize>(
    sink: &Option<SharedOpLogMap>,
    tag: DomainTag,
    key_bytes: &[u8],
    prior: &V,
) -> Result<()> {
    if let Some(sink) = sink {
        let op = OpLog::new(key_bytes.to_vec(), codec::encode(prior)?);
        sink.write().push(tag, op);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaindb_storage::MemoryStore;

    struct Balances;
    impl KeyedDomain for Balances {
        const TAG: DomainTag = DomainTag::Account;
        type Key = String;
        type Value = u64;
    }

    fn store_root() -> (Arc<KeyedCache<Balances>>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let root = KeyedCache::<Balances>::of_store(Arc::clone(&store) as Arc<dyn Store>);
        (root, store)
    }

    #[test]
    fn empty_key_is_rejected() {
        let (root, _store) = store_root();
        let err = root.set(&String::new(), 1).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
        assert!(root.get(&String::new()).is_err());
    }

    #[test]
    fn set_then_get_is_local_until_flush() {
        let (root, store) = store_root();
        let layer = KeyedCache::level_over(&root);

        layer.set(&"k1".into(), 10).unwrap();
        assert_eq!(layer.get(&"k1".into()).unwrap(), Some(10));
        assert_eq!(root.get(&"k1".into()).unwrap(), None);
        assert!(store.is_empty());

        layer.flush().unwrap();
        assert_eq!(layer.cached_entries(), 0);
        assert_eq!(root.get(&"k1".into()).unwrap(), Some(10));
        // Read-through repopulates the cleared child layer.
        assert_eq!(layer.get(&"k1".into()).unwrap(), Some(10));
        // Nothing reached the store until the root itself flushes.
        assert!(store.is_empty());

        root.flush().unwrap();
        let raw = store
            .get(DomainTag::Account, &codec::encode(&"k1".to_string()).unwrap())
            .unwrap();
        assert_eq!(raw, Some(codec::encode(&10u64).unwrap()));
    }

    #[test]
    fn tombstone_shadows_parent_value() {
        let (root, _store) = store_root();
        root.set(&"k1".into(), 7).unwrap();

        let layer = KeyedCache::level_over(&root);
        layer.erase(&"k1".into()).unwrap();

        assert_eq!(layer.get(&"k1".into()).unwrap(), None);
        assert!(!layer.contains(&"k1".into()).unwrap());
        // Parent unchanged until flush.
        assert_eq!(root.get(&"k1".into()).unwrap(), Some(7));

        layer.flush().unwrap();
        assert_eq!(root.get(&"k1".into()).unwrap(), None);
    }

    #[test]
    fn erase_of_absent_key_is_noop_everywhere() {
        let (root, store) = store_root();
        let layer = KeyedCache::level_over(&root);

        layer.erase(&"ghost".into()).unwrap();
        assert_eq!(layer.cached_entries(), 0);

        layer.flush().unwrap();
        root.flush().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn memoized_read_does_not_dirty_parent() {
        let (root, store) = store_root();
        root.set(&"k1".into(), 3).unwrap();
        root.flush().unwrap();
        assert_eq!(store.len(), 1);

        let layer = KeyedCache::level_over(&root);
        assert_eq!(layer.get(&"k1".into()).unwrap(), Some(3));
        assert_eq!(layer.cached_entries(), 1);

        // A flush after a pure read writes nothing anywhere.
        layer.flush().unwrap();
        assert_eq!(root.cached_entries(), 1);
        root.flush().unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn rebinding_live_layer_fails() {
        let (root, _store) = store_root();
        let err = root.bind_parent(&KeyedCache::detached()).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));

        let detached = KeyedCache::<Balances>::detached();
        detached.bind_parent(&root).unwrap();
        let err = detached.bind_parent(&root).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
    }

    #[test]
    fn flush_of_detached_layer_fails() {
        let detached = KeyedCache::<Balances>::detached();
        assert!(matches!(
            detached.flush().unwrap_err(),
            Error::InvariantViolation(_)
        ));
    }

    #[test]
    fn size_accounting_follows_serialized_lengths() {
        let (root, _store) = store_root();
        let key = "k1".to_string();
        let key_size = codec::serialized_size(&key).unwrap();
        let value_size = codec::serialized_size(&10u64).unwrap();
        let empty_size = codec::serialized_size(&0u64).unwrap();

        assert_eq!(root.approximate_size(), 0);
        root.set(&key, 10).unwrap();
        assert_eq!(root.approximate_size(), key_size + value_size);

        root.erase(&key).unwrap();
        assert_eq!(root.approximate_size(), key_size + empty_size);

        root.clear();
        assert_eq!(root.approximate_size(), 0);
    }

    #[test]
    fn child_layers_do_not_track_size() {
        let (root, _store) = store_root();
        let layer = KeyedCache::level_over(&root);
        layer.set(&"k1".into(), 10).unwrap();
        assert_eq!(layer.approximate_size(), 0);
    }
}
