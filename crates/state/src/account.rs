//! Account state and its layered cache.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use chaindb_cache::{KeyedCache, KeyedDomain, SharedOpLogMap, UndoRegistry};
use chaindb_storage::{DomainTag, Store};

use crate::{AccountId, Error, Result, TokenSymbol};

/// Free and frozen amounts of one token held by an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    /// Spendable amount.
    pub free: u64,
    /// Amount locked by pending operations (votes, open orders).
    pub frozen: u64,
}

/// On-chain account state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Registration id of the owner.
    pub owner: AccountId,
    /// Per-token balances.
    pub tokens: BTreeMap<TokenSymbol, TokenBalance>,
    /// Votes this account has received as a delegate candidate.
    pub received_votes: u64,
}

impl Account {
    /// Creates an empty account owned by `owner`.
    pub fn new(owner: AccountId) -> Self {
        Self {
            owner,
            ..Self::default()
        }
    }

    /// Balance for `symbol`, zero when the token was never held.
    pub fn token(&self, symbol: &str) -> TokenBalance {
        self.tokens.get(symbol).cloned().unwrap_or_default()
    }

    /// Credits `amount` to the free balance of `symbol`.
    pub fn add_free(&mut self, symbol: &str, amount: u64) -> Result<()> {
        let balance = self.tokens.entry(symbol.to_string()).or_default();
        balance.free = checked_credit(symbol, balance.free, amount)?;
        Ok(())
    }

    /// Debits `amount` from the free balance of `symbol`.
    pub fn sub_free(&mut self, symbol: &str, amount: u64) -> Result<()> {
        let balance = self.tokens.entry(symbol.to_string()).or_default();
        if balance.free < amount {
            return Err(Error::InsufficientBalance {
                symbol: symbol.to_string(),
                available: balance.free,
                required: amount,
            });
        }
        balance.free -= amount;
        Ok(())
    }

    /// Moves `amount` from free to frozen.
    pub fn freeze(&mut self, symbol: &str, amount: u64) -> Result<()> {
        let balance = self.tokens.entry(symbol.to_string()).or_default();
        if balance.free < amount {
            return Err(Error::InsufficientBalance {
                symbol: symbol.to_string(),
                available: balance.free,
                required: amount,
            });
        }
        balance.frozen = checked_credit(symbol, balance.frozen, amount)?;
        balance.free -= amount;
        Ok(())
    }

    /// Moves `amount` from frozen back to free.
    pub fn unfreeze(&mut self, symbol: &str, amount: u64) -> Result<()> {
        let balance = self.tokens.entry(symbol.to_string()).or_default();
        if balance.frozen < amount {
            return Err(Error::InsufficientBalance {
                symbol: symbol.to_string(),
                available: balance.frozen,
                required: amount,
            });
        }
        balance.free = checked_credit(symbol, balance.free, amount)?;
        balance.frozen -= amount;
        Ok(())
    }
}

fn checked_credit(symbol: &str, current: u64, credit: u64) -> Result<u64> {
    current.checked_add(credit).ok_or_else(|| Error::BalanceOverflow {
        symbol: symbol.to_string(),
        current,
        credit,
    })
}

/// Account keyspace: account id -> [`Account`].
pub struct AccountDomain;

impl KeyedDomain for AccountDomain {
    const TAG: DomainTag = DomainTag::Account;
    type Key = AccountId;
    type Value = Account;
}

/// Layered cache over the account domain.
pub struct AccountCache {
    cache: Arc<KeyedCache<AccountDomain>>,
}

impl AccountCache {
    /// Root layer over the durable store.
    pub fn of_store(store: &Arc<dyn Store>) -> Self {
        Self {
            cache: KeyedCache::of_store(Arc::clone(store)),
        }
    }

    /// Child layer over `parent`.
    pub fn level_over(parent: &AccountCache) -> Self {
        Self {
            cache: KeyedCache::level_over(&parent.cache),
        }
    }

    /// Reads the account for `id`.
    pub fn get_account(&self, id: &AccountId) -> Result<Option<Account>> {
        Ok(self.cache.get(id)?)
    }

    /// Writes `account` under `id`.
    pub fn set_account(&self, id: &AccountId, account: Account) -> Result<()> {
        Ok(self.cache.set(id, account)?)
    }

    /// Whether `id` exists.
    pub fn has_account(&self, id: &AccountId) -> Result<bool> {
        Ok(self.cache.contains(id)?)
    }

    /// Tombstones the account for `id`.
    pub fn erase_account(&self, id: &AccountId) -> Result<()> {
        Ok(self.cache.erase(id)?)
    }

    /// Credits `amount` of `symbol` to `id`, creating the account if it
    /// does not exist yet.
    pub fn add_balance(&self, id: &AccountId, symbol: &str, amount: u64) -> Result<()> {
        let mut account = self
            .get_account(id)?
            .unwrap_or_else(|| Account::new(id.clone()));
        account.add_free(symbol, amount)?;
        self.set_account(id, account)
    }

    /// Debits `amount` of `symbol` from `id`.
    pub fn sub_balance(&self, id: &AccountId, symbol: &str, amount: u64) -> Result<()> {
        let mut account = self
            .get_account(id)?
            .unwrap_or_else(|| Account::new(id.clone()));
        account.sub_free(symbol, amount)?;
        self.set_account(id, account)
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

    /// Approximate serialized size of the cached entries.
    pub fn approximate_size(&self) -> u32 {
        self.cache.approximate_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaindb_storage::MemoryStore;

    fn root() -> AccountCache {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        AccountCache::of_store(&store)
    }

    #[test]
    fn balance_operations() {
        let accounts = root();
        let id = "r1-100".to_string();

        accounts.add_balance(&id, "CORE", 50).unwrap();
        accounts.add_balance(&id, "CORE", 25).unwrap();
        accounts.sub_balance(&id, "CORE", 30).unwrap();

        let account = accounts.get_account(&id).unwrap().unwrap();
        assert_eq!(account.token("CORE").free, 45);
        assert_eq!(account.token("USD").free, 0);
    }

    #[test]
    fn overdraw_is_rejected_and_state_unchanged() {
        let accounts = root();
        let id = "r1-100".to_string();
        accounts.add_balance(&id, "CORE", 10).unwrap();

        let err = accounts.sub_balance(&id, "CORE", 11).unwrap_err();
        assert!(matches!(err, Error::InsufficientBalance { .. }));
        let account = accounts.get_account(&id).unwrap().unwrap();
        assert_eq!(account.token("CORE").free, 10);
    }

    #[test]
    fn credit_overflow_is_rejected_and_state_unchanged() {
        let accounts = root();
        let id = "r1-100".to_string();
        accounts.add_balance(&id, "CORE", u64::MAX).unwrap();

        let err = accounts.add_balance(&id, "CORE", 1).unwrap_err();
        assert!(matches!(err, Error::BalanceOverflow { .. }));
        let account = accounts.get_account(&id).unwrap().unwrap();
        assert_eq!(account.token("CORE").free, u64::MAX);
    }

    #[test]
    fn unfreeze_overflow_is_rejected() {
        let mut account = Account::new("r1-100".to_string());
        account.add_free("CORE", u64::MAX).unwrap();
        account.freeze("CORE", 1).unwrap();
        // Free is back at its ceiling; thawing the frozen unit cannot fit.
        account.add_free("CORE", 1).unwrap();
        let err = account.unfreeze("CORE", 1).unwrap_err();
        assert!(matches!(err, Error::BalanceOverflow { .. }));
    }

    #[test]
    fn freeze_unfreeze_roundtrip() {
        let mut account = Account::new("r1-100".to_string());
        account.add_free("CORE", 100).unwrap();
        account.freeze("CORE", 40).unwrap();
        assert_eq!(account.token("CORE").free, 60);
        assert_eq!(account.token("CORE").frozen, 40);

        account.unfreeze("CORE", 40).unwrap();
        assert_eq!(account.token("CORE").free, 100);
        assert!(account.unfreeze("CORE", 1).is_err());
    }
}
