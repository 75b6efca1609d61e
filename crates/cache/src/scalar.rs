//! The scalar layered cache: the keyed design collapsed to one slot.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use chaindb_storage::{DomainTag, Store, WriteBatch};

use crate::codec;
use crate::domain::ScalarDomain;
use crate::entry::CacheEntry;
use crate::keyed::push_op_log;
use crate::op_log::{OpLog, SharedOpLogMap, UndoRegistry, UndoTarget};
use crate::{Error, Result};

enum Backend<D: ScalarDomain> {
    Detached,
    Parent(Arc<ScalarCache<D>>),
    Store(Arc<dyn Store>),
}

impl<D: ScalarDomain> Clone for Backend<D> {
    fn clone(&self) -> Self {
        match self {
            Backend::Detached => Backend::Detached,
            Backend::Parent(parent) => Backend::Parent(Arc::clone(parent)),
            Backend::Store(store) => Backend::Store(Arc::clone(store)),
        }
    }
}

struct Inner<D: ScalarDomain> {
    backend: Backend<D>,
    slot: Option<CacheEntry<D::Value>>,
    op_log: Option<SharedOpLogMap>,
}

/// A layered cache for singleton state: one optional value slot instead of
/// a key-value map.
///
/// An empty slot means "never looked up here"; a slot holding the empty
/// sentinel is a tombstone. Read-through copies the parent's (or store's)
/// value into a private slot on first read, keeping each layer's mutations
/// isolated. Flush moves the slot one level down only when this layer
/// modified it. Op-log entries for scalar domains carry empty key bytes.
pub struct ScalarCache<D: ScalarDomain> {
    inner: RwLock<Inner<D>>,
}

impl<D: ScalarDomain> ScalarCache<D> {
    fn with_backend(backend: Backend<D>) -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(Inner {
                backend,
                slot: None,
                op_log: None,
            }),
        })
    }

    /// Creates an unbound layer; [`bind_parent`](Self::bind_parent) must be
    /// called before any data flows.
    pub fn detached() -> Arc<Self> {
        Self::with_backend(Backend::Detached)
    }

    /// Creates a child layer over `parent`.
    pub fn level_over(parent: &Arc<Self>) -> Arc<Self> {
        Self::with_backend(Backend::Parent(Arc::clone(parent)))
    }

    /// Creates the root layer over the durable store.
    pub fn of_store(store: Arc<dyn Store>) -> Arc<Self> {
        Self::with_backend(Backend::Store(store))
    }

    /// Binds a detached layer to `parent`; fails once data has been cached
    /// or another backend is bound.
    pub fn bind_parent(&self, parent: &Arc<Self>) -> Result<()> {
        let mut inner = self.inner.write();
        if !matches!(inner.backend, Backend::Detached) {
            return Err(Error::InvariantViolation(format!(
                "{}: backend already bound",
                D::TAG
            )));
        }
        if inner.slot.is_some() {
            return Err(Error::InvariantViolation(format!(
                "{}: cannot bind parent after data was cached",
                D::TAG
            )));
        }
        inner.backend = Backend::Parent(Arc::clone(parent));
        Ok(())
    }

    /// Attaches the scope's op-log sink.
    pub fn attach_op_log(&self, sink: &SharedOpLogMap) {
        self.inner.write().op_log = Some(Arc::clone(sink));
    }

    /// Detaches the op-log sink.
    pub fn detach_op_log(&self) {
        self.inner.write().op_log = None;
    }

    /// This cache's domain tag.
    pub fn tag(&self) -> DomainTag {
        D::TAG
    }

    /// Reads the value, falling through the layer chain on a local miss.
    /// Returns `Ok(None)` when absent or tombstoned.
    pub fn get(&self) -> Result<Option<D::Value>> {
        Ok(self.load()?.filter(|value| !codec::is_empty(value)))
    }

    /// Whether a non-empty value is currently visible.
    pub fn contains(&self) -> Result<bool> {
        Ok(self.get()?.is_some())
    }

    /// Replaces the value, capturing the prior value (possibly the empty
    /// sentinel) in the op log first.
    pub fn set(&self, value: D::Value) -> Result<()> {
        let prior = self.load()?.unwrap_or_default();

        let mut inner = self.inner.write();
        let sink = inner.op_log.clone();
        push_op_log(&sink, D::TAG, &[], &prior)?;
        inner.slot = Some(CacheEntry::new(value, true));
        Ok(())
    }

    /// Tombstones the value. A no-op when nothing is visible.
    pub fn erase(&self) -> Result<()> {
        let current = self.load()?;

        let mut inner = self.inner.write();
        let sink = inner.op_log.clone();
        if let Some(prior) = current {
            if !codec::is_empty(&prior) {
                push_op_log(&sink, D::TAG, &[], &prior)?;
                inner.slot = Some(CacheEntry::new(D::Value::default(), true));
            }
        }
        Ok(())
    }

    /// Moves a modified slot one level down, then clears the slot.
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.inner.write();
        let backend = inner.backend.clone();
        match backend {
            Backend::Parent(parent) => {
                if let Some(entry) = inner.slot.take() {
                    if entry.is_modified() {
                        parent.merge(entry.into_value());
                        trace!(domain = %D::TAG, "flushed scalar slot into parent");
                    }
                }
            }
            Backend::Store(store) => {
                if let Some(entry) = inner.slot.take() {
                    if entry.is_modified() {
                        let mut batch = WriteBatch::new();
                        if entry.is_empty() {
                            batch.delete(D::TAG, &[]);
                        } else {
                            batch.put(D::TAG, &[], codec::encode(entry.value())?);
                        }
                        debug!(domain = %D::TAG, "flushing scalar slot to store");
                        store.write_batch(batch)?;
                    }
                }
            }
            Backend::Detached => {
                return Err(Error::InvariantViolation(format!(
                    "{}: flush on a layer with neither parent nor store",
                    D::TAG
                )));
            }
        }
        inner.slot = None;
        Ok(())
    }

    /// Drops the slot without flushing.
    pub fn clear(&self) {
        self.inner.write().slot = None;
    }

    /// Restores one captured mutation, bypassing op-log capture.
    pub fn undo_one(&self, log: &OpLog) -> Result<()> {
        let prior: D::Value = codec::decode(log.prior())?;
        self.merge(prior);
        Ok(())
    }

    /// Installs this instance in `registry` under its domain tag.
    pub fn register_undo(self: &Arc<Self>, registry: &mut UndoRegistry) {
        registry.register(Arc::clone(self) as Arc<dyn UndoTarget>);
    }

    /// Serialized size of the cached value, `0` when the slot is empty.
    pub fn approximate_size(&self) -> u32 {
        let inner = self.inner.read();
        inner
            .slot
            .as_ref()
            .and_then(|entry| codec::serialized_size(entry.value()).ok())
            .unwrap_or(0)
    }

    fn load(&self) -> Result<Option<D::Value>> {
        let mut inner = self.inner.write();
        if let Some(entry) = &inner.slot {
            return Ok(Some(entry.value().clone()));
        }

        let found = match inner.backend.clone() {
            Backend::Parent(parent) => parent.load()?,
            Backend::Store(store) => store
                .get(D::TAG, &[])?
                .map(|bytes| codec::decode::<D::Value>(&bytes))
                .transpose()?,
            Backend::Detached => None,
        };

        match found {
            Some(value) => {
                inner.slot = Some(CacheEntry::new(value.clone(), false));
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn merge(&self, value: D::Value) {
        self.inner.write().slot = Some(CacheEntry::new(value, true));
    }
}

impl<D: ScalarDomain> UndoTarget for ScalarCache<D> {
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
