//! # Chaindb Storage Layer
//!
//! The durable backing store beneath the chain-state caches.
//!
//! Every chain-state category (accounts, assets, delegate votes, prices,
//! UTXOs, ...) shares one physical key-value database. A [`DomainTag`] gives
//! each category its own keyspace inside that database: every stored key is
//! the tag's stable two-byte prefix followed by the serialized domain key.
//!
//! The caches above this crate never talk to a storage engine directly; they
//! consume the [`Store`] trait, which exposes exactly two operations:
//!
//! - point lookup by `(tag, key)`, and
//! - atomic application of a [`WriteBatch`] of puts and deletes.
//!
//! Two implementations are provided: [`MemoryStore`] for tests and tooling,
//! and [`RocksDbStore`] (behind the default `rocksdb` feature) for
//! production nodes.

#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod domain;
pub mod memory;
#[cfg(feature = "rocksdb")]
pub mod rocksdb;
pub mod store;

pub use config::StorageConfig;
pub use domain::DomainTag;
pub use memory::MemoryStore;
#[cfg(feature = "rocksdb")]
pub use rocksdb::RocksDbStore;
pub use store::{db_key, BatchOp, Store, WriteBatch};

use thiserror::Error;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Storage-specific error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Underlying database engine error
    #[error("database error: {0}")]
    Database(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
