//! A single cached value and its dirty flag.

use crate::domain::CacheValue;

/// One cached value plus the flag saying whether this layer modified it.
///
/// "Absent" is a value equal to the domain's empty sentinel, not a missing
/// entry: a present-but-empty entry is a tombstone, while a missing entry
/// only means the key was never looked up at this layer.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    value: V,
    modified: bool,
}

impl<V: CacheValue> CacheEntry<V> {
    /// Creates an entry holding `value`.
    pub fn new(value: V, modified: bool) -> Self {
        Self { value, modified }
    }

    /// The cached value, which may be the empty sentinel.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Consumes the entry, yielding its value.
    pub fn into_value(self) -> V {
        self.value
    }

    /// Whether this layer changed the value since it was loaded.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Whether the value equals the empty sentinel (tombstone).
    pub fn is_empty(&self) -> bool {
        self.value == V::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tombstone_is_empty_and_modified() {
        let entry = CacheEntry::new(0u64, true);
        assert!(entry.is_empty());
        assert!(entry.is_modified());

        let entry = CacheEntry::new(5u64, false);
        assert!(!entry.is_empty());
        assert!(!entry.is_modified());
    }
}
