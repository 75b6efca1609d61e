//! Core storage interface consumed by the layered caches.

use crate::{DomainTag, Result};

/// Builds the physical database key for `tag` and a serialized domain key.
///
/// Scalar domains pass an empty `key` and are stored under the bare prefix.
pub fn db_key(tag: DomainTag, key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + key.len());
    out.extend_from_slice(tag.prefix());
    out.extend_from_slice(key);
    out
}

/// One operation inside a [`WriteBatch`]. Keys are full database keys,
/// already domain-tagged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Store `value` under `key`, overwriting any previous value.
    Put { key: Vec<u8>, value: Vec<u8> },
    /// Remove `key`; removing an absent key is a no-op.
    Delete { key: Vec<u8> },
}

/// An ordered set of puts and deletes applied atomically by
/// [`Store::write_batch`].
#[derive(Debug, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a put of `value` under the domain-tagged key.
    pub fn put(&mut self, tag: DomainTag, key: &[u8], value: Vec<u8>) {
        self.ops.push(BatchOp::Put {
            key: db_key(tag, key),
            value,
        });
    }

    /// Queues a delete of the domain-tagged key.
    pub fn delete(&mut self, tag: DomainTag, key: &[u8]) {
        self.ops.push(BatchOp::Delete {
            key: db_key(tag, key),
        });
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True when no operations are queued.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Consumes the batch, yielding its operations in insertion order.
    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// Durable key-value engine beneath the root cache layer.
///
/// Implementations must apply a [`WriteBatch`] as one atomic unit: a crash
/// mid-batch must never leave a partial batch visible.
pub trait Store: Send + Sync {
    /// Point lookup of the value stored for `(tag, key)`.
    ///
    /// An absent key is `Ok(None)`; `Err` is reserved for engine failures.
    fn get(&self, tag: DomainTag, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Applies all operations in `batch` atomically.
    fn write_batch(&self, batch: WriteBatch) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_key_prepends_prefix() {
        let key = db_key(DomainTag::Account, b"alice");
        assert_eq!(&key[..2], DomainTag::Account.prefix());
        assert_eq!(&key[2..], b"alice");
    }

    #[test]
    fn scalar_db_key_is_bare_prefix() {
        assert_eq!(
            db_key(DomainTag::MedianPrices, b""),
            DomainTag::MedianPrices.prefix().to_vec()
        );
    }

    #[test]
    fn batch_preserves_insertion_order() {
        let mut batch = WriteBatch::new();
        batch.put(DomainTag::Account, b"a", vec![1]);
        batch.delete(DomainTag::Account, b"b");
        let ops = batch.into_ops();
        assert_eq!(ops.len(), 2);
        assert!(matches!(ops[0], BatchOp::Put { .. }));
        assert!(matches!(ops[1], BatchOp::Delete { .. }));
    }
}
