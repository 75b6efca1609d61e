//! Governed system parameters.
//!
//! Each parameter ships with a protocol default; governance proposals
//! overwrite individual values through the cache, and reads fall back to
//! the default for anything never proposed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use chaindb_cache::{KeyedCache, KeyedDomain, SharedOpLogMap, UndoRegistry};
use chaindb_storage::{DomainTag, Store};

use crate::Result;

/// The governed parameters.
///
/// `Null` is the reserved empty value; it is never stored and never has a
/// meaningful default.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum SysParam {
    /// Reserved, not a real parameter.
    #[default]
    Null,
    /// Minimum received votes to qualify as a block producer.
    BpDelegateVoteMin,
    /// Number of active block producers.
    TotalBpsSize,
    /// Sliding window length, in blocks, of the median price.
    MedianPriceSlideWindow,
    /// Per-kilobyte minimum transaction fee.
    TxFeeMinPerKb,
    /// Account registration fee.
    AccountRegisterFee,
}

impl SysParam {
    /// Protocol default, used until governance overrides the value.
    pub fn default_value(self) -> u64 {
        match self {
            SysParam::Null => 0,
            SysParam::BpDelegateVoteMin => 21_000 * 100_000_000,
            SysParam::TotalBpsSize => 11,
            SysParam::MedianPriceSlideWindow => 1_200,
            SysParam::TxFeeMinPerKb => 10_000,
            SysParam::AccountRegisterFee => 10_000,
        }
    }
}

struct SysParamDomain;
impl KeyedDomain for SysParamDomain {
    const TAG: DomainTag = DomainTag::SysParam;
    type Key = SysParam;
    type Value = u64;
}

/// Layered cache over governed parameter values.
pub struct SysParamCache {
    cache: Arc<KeyedCache<SysParamDomain>>,
}

impl SysParamCache {
    /// Root layer over the durable store.
    pub fn of_store(store: &Arc<dyn Store>) -> Self {
        Self {
            cache: KeyedCache::of_store(Arc::clone(store)),
        }
    }

    /// Child layer over `parent`.
    pub fn level_over(parent: &SysParamCache) -> Self {
        Self {
            cache: KeyedCache::level_over(&parent.cache),
        }
    }

    /// Current value of `param`: the governed override if one was ever
    /// applied, the protocol default otherwise.
    pub fn get_param(&self, param: SysParam) -> Result<u64> {
        Ok(self
            .cache
            .get(&param)?
            .unwrap_or_else(|| param.default_value()))
    }

    /// Applies a governed override for `param`.
    pub fn set_param(&self, param: SysParam, value: u64) -> Result<()> {
        Ok(self.cache.set(&param, value)?)
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
