//! Delegate vote tallies and the active/pending delegate sets.
//!
//! Vote tallies are keyed per candidate; the active set, the pending set,
//! the candidate list, and the last vote height are singletons. Rotation
//! policy (when votes are counted and when a pending set activates) lives
//! with the consensus driver, not here.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use chaindb_cache::{
    KeyedCache, KeyedDomain, ScalarCache, ScalarDomain, SharedOpLogMap, UndoRegistry,
};
use chaindb_storage::{DomainTag, Store};

use crate::{AccountId, Result};

/// Lifecycle of a pending delegate set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteDelegateState {
    /// No pending set.
    #[default]
    None,
    /// Counted but not yet activated.
    Pending,
    /// Promoted to the active set.
    Activated,
}

/// One delegate candidate and its vote tally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteDelegate {
    /// Candidate account.
    pub delegate_id: AccountId,
    /// Received votes.
    pub votes: u64,
}

/// The delegate set counted at a vote slot, awaiting activation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDelegates {
    /// Height at which the votes were counted.
    pub counted_vote_height: u32,
    /// Top candidates by tally at that height.
    pub top_vote_delegates: Vec<VoteDelegate>,
    /// Where this set is in its lifecycle.
    pub state: VoteDelegateState,
}

struct VotesDomain;
impl KeyedDomain for VotesDomain {
    const TAG: DomainTag = DomainTag::DelegateVotes;
    type Key = AccountId;
    type Value = u64;
}

struct CandidateListDomain;
impl ScalarDomain for CandidateListDomain {
    const TAG: DomainTag = DomainTag::DelegateList;
    type Value = BTreeSet<AccountId>;
}

struct ActiveDelegatesDomain;
impl ScalarDomain for ActiveDelegatesDomain {
    const TAG: DomainTag = DomainTag::ActiveDelegates;
    type Value = Vec<VoteDelegate>;
}

struct PendingDelegatesDomain;
impl ScalarDomain for PendingDelegatesDomain {
    const TAG: DomainTag = DomainTag::PendingDelegates;
    type Value = PendingDelegates;
}

struct LastVoteHeightDomain;
impl ScalarDomain for LastVoteHeightDomain {
    const TAG: DomainTag = DomainTag::LastVoteHeight;
    type Value = u32;
}

/// Layered caches for everything delegate-related.
pub struct DelegateCache {
    votes: Arc<KeyedCache<VotesDomain>>,
    candidates: Arc<ScalarCache<CandidateListDomain>>,
    active: Arc<ScalarCache<ActiveDelegatesDomain>>,
    pending: Arc<ScalarCache<PendingDelegatesDomain>>,
    last_vote_height: Arc<ScalarCache<LastVoteHeightDomain>>,
}

impl DelegateCache {
    /// Root layer over the durable store.
    pub fn of_store(store: &Arc<dyn Store>) -> Self {
        Self {
            votes: KeyedCache::of_store(Arc::clone(store)),
            candidates: ScalarCache::of_store(Arc::clone(store)),
            active: ScalarCache::of_store(Arc::clone(store)),
            pending: ScalarCache::of_store(Arc::clone(store)),
            last_vote_height: ScalarCache::of_store(Arc::clone(store)),
        }
    }

    /// Child layer over `parent`.
    pub fn level_over(parent: &DelegateCache) -> Self {
        Self {
            votes: KeyedCache::level_over(&parent.votes),
            candidates: ScalarCache::level_over(&parent.candidates),
            active: ScalarCache::level_over(&parent.active),
            pending: ScalarCache::level_over(&parent.pending),
            last_vote_height: ScalarCache::level_over(&parent.last_vote_height),
        }
    }

    /// Records `votes` for `id` at `height`, tracking the candidate and
    /// the vote height. A zero tally tombstones the candidate's entry.
    pub fn set_delegate_votes(&self, id: &AccountId, votes: u64, height: u32) -> Result<()> {
        if votes == 0 {
            self.votes.erase(id)?;
            let mut list = self.candidates.get()?.unwrap_or_default();
            if list.remove(id) {
                self.candidates.set(list)?;
            }
        } else {
            self.votes.set(id, votes)?;
            let mut list = self.candidates.get()?.unwrap_or_default();
            if list.insert(id.clone()) {
                self.candidates.set(list)?;
            }
        }
        self.last_vote_height.set(height)?;
        Ok(())
    }

    /// Current tally for `id`, zero when the candidate has no votes.
    pub fn delegate_votes(&self, id: &AccountId) -> Result<u64> {
        Ok(self.votes.get(id)?.unwrap_or(0))
    }

    /// The `count` highest-voted candidates holding at least `min_votes`,
    /// ordered by tally descending, then id ascending for a stable order.
    pub fn top_vote_delegates(&self, count: usize, min_votes: u64) -> Result<Vec<VoteDelegate>> {
        let candidates = self.candidates.get()?.unwrap_or_default();
        let mut top = Vec::with_capacity(candidates.len());
        for id in candidates {
            let votes = self.delegate_votes(&id)?;
            if votes >= min_votes && votes > 0 {
                top.push(VoteDelegate {
                    delegate_id: id,
                    votes,
                });
            }
        }
        top.sort_by(|a, b| {
            b.votes
                .cmp(&a.votes)
                .then_with(|| a.delegate_id.cmp(&b.delegate_id))
        });
        top.truncate(count);
        Ok(top)
    }

    /// The currently active delegate set, if one was ever activated.
    pub fn active_delegates(&self) -> Result<Option<Vec<VoteDelegate>>> {
        Ok(self.active.get()?)
    }

    /// Replaces the active delegate set.
    pub fn set_active_delegates(&self, delegates: Vec<VoteDelegate>) -> Result<()> {
        Ok(self.active.set(delegates)?)
    }

    /// The pending delegate set, defaulted when none was counted yet.
    pub fn pending_delegates(&self) -> Result<PendingDelegates> {
        Ok(self.pending.get()?.unwrap_or_default())
    }

    /// Replaces the pending delegate set.
    pub fn set_pending_delegates(&self, pending: PendingDelegates) -> Result<()> {
        Ok(self.pending.set(pending)?)
    }

    /// Height of the most recent vote mutation, zero before any vote.
    pub fn last_vote_height(&self) -> Result<u32> {
        Ok(self.last_vote_height.get()?.unwrap_or(0))
    }

    /// Attaches the scope's op-log sink to every delegate cache.
    pub fn attach_op_log(&self, sink: &SharedOpLogMap) {
        self.votes.attach_op_log(sink);
        self.candidates.attach_op_log(sink);
        self.active.attach_op_log(sink);
        self.pending.attach_op_log(sink);
        self.last_vote_height.attach_op_log(sink);
    }

    /// Detaches the op-log sink.
    pub fn detach_op_log(&self) {
        self.votes.detach_op_log();
        self.candidates.detach_op_log();
        self.active.detach_op_log();
        self.pending.detach_op_log();
        self.last_vote_height.detach_op_log();
    }

    /// Flushes every delegate cache.
    pub fn flush(&self) -> Result<()> {
        self.votes.flush()?;
        self.candidates.flush()?;
        self.active.flush()?;
        self.pending.flush()?;
        self.last_vote_height.flush()?;
        Ok(())
    }

    /// Discards local state without flushing.
    pub fn clear(&self) {
        self.votes.clear();
        self.candidates.clear();
        self.active.clear();
        self.pending.clear();
        self.last_vote_height.clear();
    }

    /// Registers undo targets for every delegate domain.
    pub fn register_undo(&self, registry: &mut UndoRegistry) {
        self.votes.register_undo(registry);
        self.candidates.register_undo(registry);
        self.active.register_undo(registry);
        self.pending.register_undo(registry);
        self.last_vote_height.register_undo(registry);
    }
}
