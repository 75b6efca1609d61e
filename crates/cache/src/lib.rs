//! # Chaindb Layered Caches
//!
//! Generic copy-on-write caches that let block and transaction execution
//! mutate chain state speculatively, then commit or discard those changes
//! without touching the durable database until a flush is requested.
//!
//! ## Layering
//!
//! Every cache instance is bound to exactly one *backend* for its lifetime:
//! either a parent cache of the same shape (an in-memory child layer) or the
//! durable [`Store`](chaindb_storage::Store) (the root layer). The common
//! deployment stacks three levels:
//!
//! ```text
//! transaction layer  ->  block layer  ->  persistent layer  ->  store
//!    (parent bound)      (parent bound)     (store bound)
//! ```
//!
//! Reads fall through the chain lazily and memoize what they find in the
//! reading layer, never marking the copy as modified. Writes stay local
//! until [`KeyedCache::flush`] merges the modified entries one level down,
//! or - on the root layer - into a single atomic store batch.
//!
//! ## Undo logging
//!
//! A layer may carry an op-log sink ([`SharedOpLogMap`]). Every mutation
//! first records the value the key held before the call. Replaying a
//! domain's log in reverse order restores every touched key exactly, which
//! is how an already-flushed block is rolled back during reorganization.
//! The [`UndoRegistry`] dispatches each domain's log to the live cache
//! instance that owns the domain without knowing its key/value types.
//!
//! ## Variants
//!
//! [`KeyedCache`] maps keys to values for a domain; [`ScalarCache`] is the
//! same design collapsed to one singleton slot (pending delegate sets,
//! current median prices, and similar).

#![warn(rustdoc::missing_crate_level_docs)]

pub mod codec;
pub mod domain;
pub mod entry;
pub mod keyed;
pub mod op_log;
pub mod scalar;

pub use domain::{KeyedDomain, ScalarDomain};
pub use entry::CacheEntry;
pub use keyed::KeyedCache;
pub use op_log::{shared_op_log, OpLog, OpLogMap, SharedOpLogMap, UndoRegistry, UndoTarget};
pub use scalar::ScalarCache;

use thiserror::Error;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Cache-specific error types.
///
/// Expected misses are never errors; reads signal them as `Ok(None)`.
/// `InvariantViolation` marks caller bugs and is never retried.
#[derive(Error, Debug)]
pub enum Error {
    /// A programming error: empty-key access, rebinding a live layer,
    /// flushing an unbound layer, or undoing an unregistered domain.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Key, value, or op-log payload failed to (de)serialize.
    #[error("codec error: {0}")]
    Codec(String),

    /// Backing store failure, surfaced unchanged.
    #[error(transparent)]
    Store(#[from] chaindb_storage::Error),
}
