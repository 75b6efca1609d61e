//! Domain tags partitioning the shared database keyspace.

use std::fmt;

/// Identifies one chain-state category's keyspace inside the shared
/// backing store.
///
/// Each tag owns a stable two-byte prefix; the prefix never changes once a
/// database has been written with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DomainTag {
    /// Account id -> account state
    Account,
    /// Token symbol -> registered asset
    Asset,
    /// Delegate id -> received vote tally
    DelegateVotes,
    /// Singleton: ids of every account that has ever received votes
    DelegateList,
    /// Singleton: currently active delegate set
    ActiveDelegates,
    /// Singleton: pending delegate set awaiting activation
    PendingDelegates,
    /// Singleton: height of the last counted delegate vote
    LastVoteHeight,
    /// Singleton: coin pairs accepted by the price feed
    FeedCoinPairs,
    /// Singleton: latest median price per coin pair
    MedianPrices,
    /// (txid, vout index) -> unspent conditional output
    Utxo,
    /// System parameter -> configured value
    SysParam,
}

impl DomainTag {
    /// The stable byte prefix written in front of every key of this domain.
    pub const fn prefix(self) -> &'static [u8; 2] {
        match self {
            DomainTag::Account => b"ac",
            DomainTag::Asset => b"as",
            DomainTag::DelegateVotes => b"dv",
            DomainTag::DelegateList => b"dl",
            DomainTag::ActiveDelegates => b"ad",
            DomainTag::PendingDelegates => b"pd",
            DomainTag::LastVoteHeight => b"lv",
            DomainTag::FeedCoinPairs => b"fc",
            DomainTag::MedianPrices => b"mp",
            DomainTag::Utxo => b"ut",
            DomainTag::SysParam => b"sp",
        }
    }

    /// Short name used in logs.
    pub const fn name(self) -> &'static str {
        match self {
            DomainTag::Account => "account",
            DomainTag::Asset => "asset",
            DomainTag::DelegateVotes => "delegate_votes",
            DomainTag::DelegateList => "delegate_list",
            DomainTag::ActiveDelegates => "active_delegates",
            DomainTag::PendingDelegates => "pending_delegates",
            DomainTag::LastVoteHeight => "last_vote_height",
            DomainTag::FeedCoinPairs => "feed_coin_pairs",
            DomainTag::MedianPrices => "median_prices",
            DomainTag::Utxo => "utxo",
            DomainTag::SysParam => "sys_param",
        }
    }
}

impl fmt::Display for DomainTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn prefixes_are_unique() {
        let tags = [
            DomainTag::Account,
            DomainTag::Asset,
            DomainTag::DelegateVotes,
            DomainTag::DelegateList,
            DomainTag::ActiveDelegates,
            DomainTag::PendingDelegates,
            DomainTag::LastVoteHeight,
            DomainTag::FeedCoinPairs,
            DomainTag::MedianPrices,
            DomainTag::Utxo,
            DomainTag::SysParam,
        ];
        let prefixes: BTreeSet<_> = tags.iter().map(|t| t.prefix()).collect();
        assert_eq!(prefixes.len(), tags.len());
    }
}
