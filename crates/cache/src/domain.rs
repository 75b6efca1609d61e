//! Domain definitions binding a cache to a keyspace and a value shape.

use serde::de::DeserializeOwned;
use serde::Serialize;

use chaindb_storage::DomainTag;

/// Capability bundle required of every cached key.
///
/// `Default + PartialEq` expresses the empty-key sentinel; `Ord` keeps the
/// local map (and therefore flush batches) deterministic.
pub trait CacheKey:
    Serialize + DeserializeOwned + Default + PartialEq + Ord + Clone + Send + Sync + 'static
{
}

impl<T> CacheKey for T where
    T: Serialize + DeserializeOwned + Default + PartialEq + Ord + Clone + Send + Sync + 'static
{
}

/// Capability bundle required of every cached value.
///
/// `Default + PartialEq` expresses the empty-value sentinel used for
/// tombstones.
pub trait CacheValue:
    Serialize + DeserializeOwned + Default + PartialEq + Clone + Send + Sync + 'static
{
}

impl<T> CacheValue for T where
    T: Serialize + DeserializeOwned + Default + PartialEq + Clone + Send + Sync + 'static
{
}

/// A keyed chain-state domain: one tag, one key type, one value type.
///
/// Implementors are zero-sized marker types; the trait only carries
/// compile-time shape information, so one generic cache engine serves
/// every domain.
pub trait KeyedDomain: Send + Sync + 'static {
    /// Keyspace tag inside the shared backing store.
    const TAG: DomainTag;
    /// Key type.
    type Key: CacheKey;
    /// Value type.
    type Value: CacheValue;
}

/// A singleton chain-state domain: one tag, one value, no key.
pub trait ScalarDomain: Send + Sync + 'static {
    /// Keyspace tag inside the shared backing store.
    const TAG: DomainTag;
    /// Value type.
    type Value: CacheValue;
}
