//! Per-node vote CRDT.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A boolean vote held by this node, with cluster-wide aggregates.
///
/// Only the self-vote is locally mutable. The `voters` and `votes_for`
/// aggregates are owned by the proxy and installed through inbound deltas
/// and states; the local adjustments after [`Vote::vote`] are an estimate
/// until the proxy confirms them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    self_vote: bool,
    voters: u32,
    votes_for: u32,
    changed: bool,
}

/// Full snapshot of a [`Vote`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VoteState {
    /// Number of nodes voting `true`.
    pub votes_for: u32,
    /// Number of nodes participating.
    pub total_voters: u32,
    /// This node's vote.
    pub self_vote: bool,
}

/// Incremental change of a [`Vote`].
///
/// Outbound deltas announce the self-vote; inbound deltas install the
/// proxy's aggregates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VoteDelta {
    /// This node's vote.
    pub self_vote: bool,
    /// Number of nodes voting `true`.
    pub votes_for: u32,
    /// Number of nodes participating.
    pub total_voters: u32,
}

impl Default for Vote {
    fn default() -> Self {
        Self::new()
    }
}

impl Vote {
    /// Creates a vote counting this node as a non-affirming voter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            self_vote: false,
            voters: 1,
            votes_for: 0,
            changed: false,
        }
    }

    /// This node's vote.
    #[must_use]
    pub fn self_vote(&self) -> bool {
        self.self_vote
    }

    /// Number of participating nodes, as last reported by the proxy.
    #[must_use]
    pub fn voters(&self) -> u32 {
        self.voters
    }

    /// Number of affirming nodes, as last reported by the proxy.
    #[must_use]
    pub fn votes_for(&self) -> u32 {
        self.votes_for
    }

    /// Whether at least one node votes `true`.
    #[must_use]
    pub fn at_least_one(&self) -> bool {
        self.votes_for > 0
    }

    /// Whether a strict majority of nodes votes `true`.
    #[must_use]
    pub fn majority(&self) -> bool {
        self.votes_for * 2 > self.voters
    }

    /// Whether every node votes `true`.
    #[must_use]
    pub fn all(&self) -> bool {
        self.votes_for == self.voters
    }

    /// Casts this node's vote. Re-casting the same vote is a silent no-op;
    /// flipping it twice within one delta window cancels the change.
    pub fn vote(&mut self, vote: bool) {
        if self.self_vote == vote {
            return;
        }
        self.self_vote = vote;
        self.changed = !self.changed;
        if vote {
            self.votes_for += 1;
        } else {
            self.votes_for = self.votes_for.saturating_sub(1);
        }
    }

    /// Full snapshot.
    #[must_use]
    pub fn state(&self) -> VoteState {
        VoteState {
            votes_for: self.votes_for,
            total_voters: self.voters,
            self_vote: self.self_vote,
        }
    }

    /// The pending delta. Callers guard with [`Vote::has_delta`].
    #[must_use]
    pub fn delta(&self) -> VoteDelta {
        VoteDelta {
            self_vote: self.self_vote,
            votes_for: self.votes_for,
            total_voters: self.voters,
        }
    }

    /// Whether the self-vote changed since the last reset.
    #[must_use]
    pub fn has_delta(&self) -> bool {
        self.changed
    }

    /// Clears the pending delta. The value is untouched.
    pub fn reset_delta(&mut self) {
        self.changed = false;
    }

    /// Replaces the value wholesale.
    pub fn apply_state(&mut self, state: VoteState) {
        self.votes_for = state.votes_for;
        self.voters = state.total_voters;
        self.self_vote = state.self_vote;
    }

    /// Installs the proxy's aggregates. The self-vote is local-only and is
    /// not overwritten by remote deltas.
    pub fn apply_delta(&mut self, delta: VoteDelta) {
        self.votes_for = delta.votes_for;
        self.voters = delta.total_voters;
    }
}
