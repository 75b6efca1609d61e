//! # Chaindb Chain State
//!
//! Typed chain-state domains over the generic layered caches: accounts,
//! registered assets, delegate votes, the oracle price feed, the UTXO set,
//! and governed system parameters.
//!
//! Each domain module pairs its value types with a thin cache wrapper that
//! exposes domain operations (`get_account`, `spend_utxo`, ...) and the
//! layering plumbing every wrapper shares (flush, clear, op-log attach,
//! undo registration). [`ChainStateCache`] bundles one instance of every
//! wrapper into the unit block validation works with: build a child level
//! over the committed state, execute, then flush on success or replay the
//! captured op logs on failure.

#![warn(rustdoc::missing_crate_level_docs)]

pub mod account;
pub mod asset;
pub mod delegate;
pub mod price;
pub mod sys_param;
pub mod utxo;
pub mod wrapper;

pub use account::{Account, AccountCache, TokenBalance};
pub use asset::{perm, Asset, AssetCache};
pub use delegate::{DelegateCache, PendingDelegates, VoteDelegate, VoteDelegateState};
pub use price::{MedianPriceDetail, PriceCoinPair, PriceDetailMap, PriceFeedCache};
pub use sys_param::{SysParam, SysParamCache};
pub use utxo::{Utxo, UtxoCache, UtxoCond, UtxoKey};
pub use wrapper::ChainStateCache;

use thiserror::Error;

/// Account identifier, the chain's registration id rendered as text.
pub type AccountId = String;

/// Token symbol, e.g. `"CORE"` or `"USD"`.
pub type TokenSymbol = String;

/// Result type for chain-state operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Chain-state error types.
///
/// Every variant is fatal to the transaction or block being executed;
/// callers roll back the current scope's op log on any error.
#[derive(Error, Debug)]
pub enum Error {
    /// Cache or storage failure.
    #[error(transparent)]
    Cache(#[from] chaindb_cache::Error),

    /// Balance operation would overdraw the account.
    #[error("insufficient {symbol} balance: have {available}, need {required}")]
    InsufficientBalance {
        symbol: TokenSymbol,
        available: u64,
        required: u64,
    },

    /// Balance credit would overflow the amount representation.
    #[error("{symbol} balance overflow: {current} + {credit} exceeds the amount range")]
    BalanceOverflow {
        symbol: TokenSymbol,
        current: u64,
        credit: u64,
    },

    /// Asset symbol is already registered.
    #[error("asset already registered: {0}")]
    AssetAlreadyRegistered(TokenSymbol),

    /// UTXO to spend does not exist (or was already spent).
    #[error("utxo not found: {0}")]
    UtxoNotFound(String),

    /// UTXO id collision on creation.
    #[error("utxo already exists: {0}")]
    UtxoAlreadyExists(String),
}
