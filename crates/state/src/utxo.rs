//! The UTXO set: conditional outputs addressed by (txid, vout index).

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use chaindb_cache::{KeyedCache, KeyedDomain, SharedOpLogMap, UndoRegistry};
use chaindb_storage::{DomainTag, Store};

use crate::{AccountId, Error, Result, TokenSymbol};

/// Position of an output inside its creating transaction.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct UtxoKey {
    /// Hash of the creating transaction.
    pub txid: [u8; 32],
    /// Output index within that transaction.
    pub vout_index: u16,
}

impl UtxoKey {
    pub fn new(txid: [u8; 32], vout_index: u16) -> Self {
        Self { txid, vout_index }
    }
}

impl fmt::Display for UtxoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", hex::encode(self.txid), self.vout_index)
    }
}

/// Spend condition attached to a UTXO. All conditions on an output must be
/// satisfied by the spending transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UtxoCond {
    /// Spendable only by the named account.
    SingleAddress {
        /// The account allowed to spend.
        uid: AccountId,
    },
    /// Spendable with `m` of `n` signatures from `uids`.
    MultiSign {
        m: u8,
        n: u8,
        uids: Vec<AccountId>,
    },
    /// Spendable by whoever reveals the password hashing to `hash`.
    PasswordHash {
        /// Hex-encoded hash of the password proof.
        hash: String,
    },
    /// Claimable by the recipient only at or after `height`.
    ClaimLock {
        height: u32,
    },
    /// Reclaimable by the creator only at or after `height`.
    ReclaimLock {
        height: u32,
    },
}

/// A conditional output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    /// Account that created the output.
    pub from_uid: AccountId,
    /// Token the output carries.
    pub coin_symbol: TokenSymbol,
    /// Amount in the smallest unit.
    pub coin_amount: u64,
    /// Conditions gating the spend.
    pub conds: Vec<UtxoCond>,
}

/// UTXO keyspace: [`UtxoKey`] -> [`Utxo`].
pub struct UtxoDomain;

impl KeyedDomain for UtxoDomain {
    const TAG: DomainTag = DomainTag::Utxo;
    type Key = UtxoKey;
    type Value = Utxo;
}

/// Layered cache over the UTXO set.
pub struct UtxoCache {
    cache: Arc<KeyedCache<UtxoDomain>>,
}

impl UtxoCache {
    /// Root layer over the durable store.
    pub fn of_store(store: &Arc<dyn Store>) -> Self {
        Self {
            cache: KeyedCache::of_store(Arc::clone(store)),
        }
    }

    /// Child layer over `parent`.
    pub fn level_over(parent: &UtxoCache) -> Self {
        Self {
            cache: KeyedCache::level_over(&parent.cache),
        }
    }

    /// Reads the unspent output at `key`.
    pub fn get_utxo(&self, key: &UtxoKey) -> Result<Option<Utxo>> {
        Ok(self.cache.get(key)?)
    }

    /// Whether `key` is unspent.
    pub fn has_utxo(&self, key: &UtxoKey) -> Result<bool> {
        Ok(self.cache.contains(key)?)
    }

    /// Creates a new output; a live output at the same key is a collision.
    pub fn add_utxo(&self, key: &UtxoKey, utxo: Utxo) -> Result<()> {
        if self.has_utxo(key)? {
            return Err(Error::UtxoAlreadyExists(key.to_string()));
        }
        Ok(self.cache.set(key, utxo)?)
    }

    /// Spends the output at `key`, returning it.
    pub fn spend_utxo(&self, key: &UtxoKey) -> Result<Utxo> {
        let utxo = self
            .get_utxo(key)?
            .ok_or_else(|| Error::UtxoNotFound(key.to_string()))?;
        self.cache.erase(key)?;
        Ok(utxo)
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

#[cfg(test)]
mod tests {
    use super::*;
    use chaindb_storage::MemoryStore;

    fn root() -> UtxoCache {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        UtxoCache::of_store(&store)
    }

    fn sample(vout_index: u16) -> (UtxoKey, Utxo) {
        let key = UtxoKey::new([7u8; 32], vout_index);
        let utxo = Utxo {
            from_uid: "r1-100".to_string(),
            coin_symbol: "CORE".to_string(),
            coin_amount: 1_000,
            conds: vec![UtxoCond::SingleAddress {
                uid: "r1-200".to_string(),
            }],
        };
        (key, utxo)
    }

    #[test]
    fn add_spend_lifecycle() {
        let utxos = root();
        let (key, utxo) = sample(0);

        utxos.add_utxo(&key, utxo.clone()).unwrap();
        assert!(utxos.has_utxo(&key).unwrap());

        let spent = utxos.spend_utxo(&key).unwrap();
        assert_eq!(spent, utxo);
        assert!(!utxos.has_utxo(&key).unwrap());

        let err = utxos.spend_utxo(&key).unwrap_err();
        assert!(matches!(err, Error::UtxoNotFound(_)));
    }

    #[test]
    fn duplicate_output_is_a_collision() {
        let utxos = root();
        let (key, utxo) = sample(1);

        utxos.add_utxo(&key, utxo.clone()).unwrap();
        let err = utxos.add_utxo(&key, utxo).unwrap_err();
        assert!(matches!(err, Error::UtxoAlreadyExists(_)));
    }

    #[test]
    fn spent_key_can_be_recreated_before_flush() {
        // A spend tombstones the key; re-adding revives it in place.
        let utxos = root();
        let (key, utxo) = sample(2);

        utxos.add_utxo(&key, utxo.clone()).unwrap();
        utxos.spend_utxo(&key).unwrap();
        utxos.add_utxo(&key, utxo).unwrap();
        assert!(utxos.has_utxo(&key).unwrap());
    }
}
