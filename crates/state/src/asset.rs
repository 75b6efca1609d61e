//! Registered assets and their permission bits.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use chaindb_cache::{KeyedCache, KeyedDomain, SharedOpLogMap, UndoRegistry};
use chaindb_storage::{DomainTag, Store};

use crate::{AccountId, Error, Result, TokenSymbol};

/// Permission bits for an asset. Expandable through governance; absence of
/// every bit means the asset cannot be used anywhere, transfers included.
pub mod perm {
    /// May serve as the base coin of a DEX pair.
    pub const DEX_BASE: u64 = 1 << 1;
    /// May serve as the quote coin of a DEX pair.
    pub const DEX_QUOTE: u64 = 1 << 2;
    /// May collateralize a CDP.
    pub const CDP_BCOIN: u64 = 1 << 3;
    /// May be minted from a CDP.
    pub const CDP_SCOIN: u64 = 1 << 4;
    /// May be quoted by the oracle price feed.
    pub const PRICE_FEED: u64 = 1 << 5;
    /// May cross chains through the swap bridge.
    pub const XCHAIN_SWAP: u64 = 1 << 6;
}

/// A registered on-chain asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Unique token symbol.
    pub symbol: TokenSymbol,
    /// Account controlling the asset.
    pub owner_id: AccountId,
    /// Human-readable name.
    pub name: String,
    /// Total minted supply, in the smallest unit.
    pub total_supply: u64,
    /// Whether further minting is allowed.
    pub mintable: bool,
    /// Bitwise OR of [`perm`] flags.
    pub perms: u64,
}

impl Asset {
    /// Whether the asset carries every bit of `perms`.
    pub fn has_perms(&self, perms: u64) -> bool {
        self.perms & perms == perms
    }
}

/// Asset keyspace: token symbol -> [`Asset`].
pub struct AssetDomain;

impl KeyedDomain for AssetDomain {
    const TAG: DomainTag = DomainTag::Asset;
    type Key = TokenSymbol;
    type Value = Asset;
}

/// Layered cache over the asset registry.
pub struct AssetCache {
    cache: Arc<KeyedCache<AssetDomain>>,
}

impl AssetCache {
    /// Root layer over the durable store.
    pub fn of_store(store: &Arc<dyn Store>) -> Self {
        Self {
            cache: KeyedCache::of_store(Arc::clone(store)),
        }
    }

    /// Child layer over `parent`.
    pub fn level_over(parent: &AssetCache) -> Self {
        Self {
            cache: KeyedCache::level_over(&parent.cache),
        }
    }

    /// Reads the asset registered under `symbol`.
    pub fn get_asset(&self, symbol: &TokenSymbol) -> Result<Option<Asset>> {
        Ok(self.cache.get(symbol)?)
    }

    /// Whether `symbol` is registered.
    pub fn has_asset(&self, symbol: &TokenSymbol) -> Result<bool> {
        Ok(self.cache.contains(symbol)?)
    }

    /// Registers a new asset; rejects an already-registered symbol.
    pub fn register_asset(&self, asset: Asset) -> Result<()> {
        if self.has_asset(&asset.symbol)? {
            return Err(Error::AssetAlreadyRegistered(asset.symbol));
        }
        self.set_asset(asset)
    }

    /// Overwrites the asset registered under its symbol.
    pub fn set_asset(&self, asset: Asset) -> Result<()> {
        let symbol = asset.symbol.clone();
        Ok(self.cache.set(&symbol, asset)?)
    }

    /// Whether `symbol` is registered with every bit of `perms`.
    pub fn asset_has_perms(&self, symbol: &TokenSymbol, perms: u64) -> Result<bool> {
        Ok(self
            .get_asset(symbol)?
            .map(|asset| asset.has_perms(perms))
            .unwrap_or(false))
    }

    /// Attaches the scope's op-log sink.
    pub fn attach_op_log(&self, sink: &SharedOpLogMap) {
        self.cache.attach_op_log(sink);
    }

    /// Detaches the op-log sink.
    pub fn detach_op_log(&self) {
        self.cache.detach_op_log();
    }

    /// Flushes modified entries into the parent layer or the store.
    pub fn flush(&self) -> Result<()> {
        Ok(self.cache.flush()?)
    }

    /// Discards local entries without flushing.
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Registers the undo target for this domain.
    pub fn register_undo(&self, registry: &mut UndoRegistry) {
        self.cache.register_undo(registry);
    }
}
