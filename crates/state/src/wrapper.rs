//! The per-level bundle of every domain cache.
//!
//! Block validation works with one [`ChainStateCache`] per level: a root
//! bound to the durable store, a block level over it, and a transaction
//! level over that. Execute against the innermost level, flush inward on
//! success, and replay the captured op logs on failure.

use std::sync::Arc;

use tracing::{debug, info};

use chaindb_cache::{shared_op_log, OpLogMap, SharedOpLogMap, UndoRegistry};
use chaindb_storage::Store;

use crate::account::AccountCache;
use crate::asset::AssetCache;
use crate::delegate::DelegateCache;
use crate::price::PriceFeedCache;
use crate::sys_param::SysParamCache;
use crate::utxo::UtxoCache;
use crate::Result;

/// One level of the full chain state.
pub struct ChainStateCache {
    /// Account balances and vote tallies received.
    pub accounts: AccountCache,
    /// Registered assets.
    pub assets: AssetCache,
    /// Delegate votes and the active/pending sets.
    pub delegates: DelegateCache,
    /// Oracle coin pairs and median prices.
    pub prices: PriceFeedCache,
    /// The UTXO set.
    pub utxos: UtxoCache,
    /// Governed system parameters.
    pub sys_params: SysParamCache,
    undo_registry: UndoRegistry,
}

impl ChainStateCache {
    /// Root level bound to the durable store.
    pub fn of_store(store: Arc<dyn Store>) -> Self {
        Self::build(
            AccountCache::of_store(&store),
            AssetCache::of_store(&store),
            DelegateCache::of_store(&store),
            PriceFeedCache::of_store(&store),
            UtxoCache::of_store(&store),
            SysParamCache::of_store(&store),
        )
    }

    /// Child level layered over `parent`.
    pub fn level_over(parent: &ChainStateCache) -> Self {
        Self::build(
            AccountCache::level_over(&parent.accounts),
            AssetCache::level_over(&parent.assets),
            DelegateCache::level_over(&parent.delegates),
            PriceFeedCache::level_over(&parent.prices),
            UtxoCache::level_over(&parent.utxos),
            SysParamCache::level_over(&parent.sys_params),
        )
    }

    fn build(
        accounts: AccountCache,
        assets: AssetCache,
        delegates: DelegateCache,
        prices: PriceFeedCache,
        utxos: UtxoCache,
        sys_params: SysParamCache,
    ) -> Self {
        let mut undo_registry = UndoRegistry::new();
        accounts.register_undo(&mut undo_registry);
        assets.register_undo(&mut undo_registry);
        delegates.register_undo(&mut undo_registry);
        prices.register_undo(&mut undo_registry);
        utxos.register_undo(&mut undo_registry);
        sys_params.register_undo(&mut undo_registry);

        Self {
            accounts,
            assets,
            delegates,
            prices,
            utxos,
            sys_params,
            undo_registry,
        }
    }

    /// Creates a fresh op-log sink and attaches it to every domain cache.
    pub fn enable_undo_log(&self) -> SharedOpLogMap {
        let sink = shared_op_log();
        self.attach_op_log(&sink);
        sink
    }

    /// Attaches `sink` to every domain cache.
    pub fn attach_op_log(&self, sink: &SharedOpLogMap) {
        self.accounts.attach_op_log(sink);
        self.assets.attach_op_log(sink);
        self.delegates.attach_op_log(sink);
        self.prices.attach_op_log(sink);
        self.utxos.attach_op_log(sink);
        self.sys_params.attach_op_log(sink);
    }

    /// Detaches the op-log sink from every domain cache.
    pub fn detach_op_log(&self) {
        self.accounts.detach_op_log();
        self.assets.detach_op_log();
        self.delegates.detach_op_log();
        self.prices.detach_op_log();
        self.utxos.detach_op_log();
        self.sys_params.detach_op_log();
    }

    /// Flushes every domain cache into the parent level or the store.
    ///
    /// The order is fixed so two nodes flushing the same level produce the
    /// same store write sequence.
    pub fn flush(&self) -> Result<()> {
        debug!("flushing chain state level");
        self.accounts.flush()?;
        self.assets.flush()?;
        self.delegates.flush()?;
        self.prices.flush()?;
        self.utxos.flush()?;
        self.sys_params.flush()?;
        Ok(())
    }

    /// Discards every domain cache's local state without flushing.
    pub fn clear(&self) {
        self.accounts.clear();
        self.assets.clear();
        self.delegates.clear();
        self.prices.clear();
        self.utxos.clear();
        self.sys_params.clear();
    }

    /// Rolls back everything captured in `op_logs` against this level's
    /// caches, restoring each touched key to its pre-capture value.
    pub fn undo(&self, op_logs: &OpLogMap) -> Result<()> {
        info!(entries = op_logs.len(), "rolling back chain state");
        self.undo_registry.undo(op_logs)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaindb_storage::MemoryStore;

    #[test]
    fn undo_registry_covers_every_domain() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let state = ChainStateCache::of_store(store);
        // One target per domain tag in use.
        assert_eq!(state.undo_registry.len(), 11);
    }
}
