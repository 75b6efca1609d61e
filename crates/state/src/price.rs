//! Oracle price-feed state: accepted coin pairs and latest median prices.
//!
//! Both pieces are singletons layered through [`ScalarCache`]; the sliding
//! window median computation itself belongs to the price-feed module of the
//! node, which reads and writes through this cache.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use chaindb_cache::{ScalarCache, ScalarDomain, SharedOpLogMap, UndoRegistry};
use chaindb_storage::{DomainTag, Store};

use crate::{Result, TokenSymbol};

/// Symbols with protocol-level roles.
pub mod symbols {
    /// Native staking coin.
    pub const CORE: &str = "CORE";
    /// Governance coin, inflated by forced liquidation.
    pub const GOV: &str = "GOV";
    /// Fiat quote currency.
    pub const USD: &str = "USD";
}

/// A base/quote pair quoted by the price feed.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PriceCoinPair {
    /// Asset being priced.
    pub base: TokenSymbol,
    /// Currency the price is quoted in.
    pub quote: TokenSymbol,
}

impl PriceCoinPair {
    /// Creates a pair from symbol literals.
    pub fn new(base: impl Into<TokenSymbol>, quote: impl Into<TokenSymbol>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    /// Pairs every node accepts without registration: CORE/USD backs CDP
    /// staking, GOV/USD backs forced liquidation.
    pub fn is_builtin(&self) -> bool {
        (self.base == symbols::CORE || self.base == symbols::GOV) && self.quote == symbols::USD
    }
}

/// Median price of one coin pair plus the height that last fed it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedianPriceDetail {
    /// Median price in the smallest quote unit.
    pub price: u64,
    /// Height of the most recent feed contributing to the median.
    pub last_feed_height: u32,
}

/// Latest median price per coin pair.
pub type PriceDetailMap = BTreeMap<PriceCoinPair, MedianPriceDetail>;

struct MedianPricesDomain;
impl ScalarDomain for MedianPricesDomain {
    const TAG: DomainTag = DomainTag::MedianPrices;
    type Value = PriceDetailMap;
}

struct FeedCoinPairsDomain;
impl ScalarDomain for FeedCoinPairsDomain {
    const TAG: DomainTag = DomainTag::FeedCoinPairs;
    type Value = BTreeSet<PriceCoinPair>;
}

/// Layered cache over the price-feed state.
pub struct PriceFeedCache {
    median_prices: Arc<ScalarCache<MedianPricesDomain>>,
    feed_pairs: Arc<ScalarCache<FeedCoinPairsDomain>>,
}

impl PriceFeedCache {
    /// Root layer over the durable store.
    pub fn of_store(store: &Arc<dyn Store>) -> Self {
        Self {
            median_prices: ScalarCache::of_store(Arc::clone(store)),
            feed_pairs: ScalarCache::of_store(Arc::clone(store)),
        }
    }

    /// Child layer over `parent`.
    pub fn level_over(parent: &PriceFeedCache) -> Self {
        Self {
            median_prices: ScalarCache::level_over(&parent.median_prices),
            feed_pairs: ScalarCache::level_over(&parent.feed_pairs),
        }
    }

    /// Latest median price for `pair`, zero when never priced.
    pub fn median_price(&self, pair: &PriceCoinPair) -> Result<u64> {
        Ok(self
            .median_prices()?
            .get(pair)
            .map(|detail| detail.price)
            .unwrap_or(0))
    }

    /// The full median price map.
    pub fn median_prices(&self) -> Result<PriceDetailMap> {
        Ok(self.median_prices.get()?.unwrap_or_default())
    }

    /// Replaces the median price map, normally once per block.
    pub fn set_median_prices(&self, prices: PriceDetailMap) -> Result<()> {
        Ok(self.median_prices.set(prices)?)
    }

    /// Registers a coin pair for feeding. Built-in pairs need none.
    pub fn add_feed_pair(&self, pair: PriceCoinPair) -> Result<()> {
        if pair.is_builtin() {
            return Ok(());
        }
        let mut pairs = self.feed_pairs.get()?.unwrap_or_default();
        if pairs.insert(pair) {
            self.feed_pairs.set(pairs)?;
        }
        Ok(())
    }

    /// Deregisters a coin pair. Built-in pairs cannot be removed.
    pub fn erase_feed_pair(&self, pair: &PriceCoinPair) -> Result<()> {
        if pair.is_builtin() {
            return Ok(());
        }
        let mut pairs = self.feed_pairs.get()?.unwrap_or_default();
        if pairs.remove(pair) {
            self.feed_pairs.set(pairs)?;
        }
        Ok(())
    }

    /// Whether `pair` may be fed.
    pub fn has_feed_pair(&self, pair: &PriceCoinPair) -> Result<bool> {
        if pair.is_builtin() {
            return Ok(true);
        }
        Ok(self
            .feed_pairs
            .get()?
            .map(|pairs| pairs.contains(pair))
            .unwrap_or(false))
    }

    /// The registered (non-builtin) feed pairs.
    pub fn feed_pairs(&self) -> Result<BTreeSet<PriceCoinPair>> {
        Ok(self.feed_pairs.get()?.unwrap_or_default())
    }

    /// Attaches the scope's op-log sink.
    pub fn attach_op_log(&self, sink: &SharedOpLogMap) {
        self.median_prices.attach_op_log(sink);
        self.feed_pairs.attach_op_log(sink);
    }

    /// Detaches the op-log sink.
    pub fn detach_op_log(&self) {
        self.median_prices.detach_op_log();
        self.feed_pairs.detach_op_log();
    }

    /// Flushes both price caches.
    pub fn flush(&self) -> Result<()> {
        self.median_prices.flush()?;
        self.feed_pairs.flush()?;
        Ok(())
    }

    /// Discards local state without flushing.
    pub fn clear(&self) {
        self.median_prices.clear();
        self.feed_pairs.clear();
    }

    /// Registers undo targets for both price domains.
    pub fn register_undo(&self, registry: &mut UndoRegistry) {
        self.median_prices.register_undo(registry);
        self.feed_pairs.register_undo(registry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaindb_storage::MemoryStore;

    fn root() -> PriceFeedCache {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        PriceFeedCache::of_store(&store)
    }

    #[test]
    fn builtin_pairs_are_always_feedable() {
        let prices = root();
        let core_usd = PriceCoinPair::new(symbols::CORE, symbols::USD);
        let gov_usd = PriceCoinPair::new(symbols::GOV, symbols::USD);

        assert!(prices.has_feed_pair(&core_usd).unwrap());
        assert!(prices.has_feed_pair(&gov_usd).unwrap());
        // Registration of a builtin never dirties the stored set.
        prices.add_feed_pair(core_usd).unwrap();
        assert!(prices.feed_pairs().unwrap().is_empty());
    }

    #[test]
    fn feed_pair_registration_roundtrip() {
        let prices = root();
        let gold_usd = PriceCoinPair::new("GOLD", symbols::USD);

        assert!(!prices.has_feed_pair(&gold_usd).unwrap());
        prices.add_feed_pair(gold_usd.clone()).unwrap();
        assert!(prices.has_feed_pair(&gold_usd).unwrap());

        prices.erase_feed_pair(&gold_usd).unwrap();
        assert!(!prices.has_feed_pair(&gold_usd).unwrap());
    }

    #[test]
    fn median_prices_roundtrip() {
        let prices = root();
        let core_usd = PriceCoinPair::new(symbols::CORE, symbols::USD);
        assert_eq!(prices.median_price(&core_usd).unwrap(), 0);

        let mut map = PriceDetailMap::new();
        map.insert(
            core_usd.clone(),
            MedianPriceDetail {
                price: 21_000,
                last_feed_height: 42,
            },
        );
        prices.set_median_prices(map).unwrap();
        assert_eq!(prices.median_price(&core_usd).unwrap(), 21_000);
    }
}
