//! Replicated data types for entity state.
//!
//! Eight CRDTs share one contract: a *value* plus a *pending delta* that
//! accumulates local effects since the last [`Crdt::reset_delta`]. The proxy
//! owns storage and distribution; these types are deterministic
//! state-transformation logic over a single in-memory replica, with
//! commutative, associative, idempotent merges.
//!
//! [`Crdt`] is a flat tagged variant over the concrete types, so dispatch on
//! the hot path is a match, not a virtual call. [`CrdtState`] and
//! [`CrdtDelta`] are the matching wire-facing unions.

mod flag;
mod gcounter;
mod gset;
mod lwwregister;
mod ormap;
mod orset;
mod pncounter;
mod vote;

pub use flag::{Flag, FlagDelta, FlagState};
pub use gcounter::{GCounter, GCounterDelta, GCounterState};
pub use gset::{GSet, GSetDelta, GSetState};
pub use lwwregister::{Clock, LwwRegister, LwwRegisterDelta, LwwRegisterState};
pub use ormap::{ORMap, ORMapDelta, ORMapEntry, ORMapEntryDelta, ORMapState};
pub use orset::{ORSet, ORSetDelta, ORSetState};
pub use pncounter::{PNCounter, PNCounterDelta, PNCounterState};
pub use vote::{Vote, VoteDelta, VoteState};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when applying remote state or deltas.
#[derive(Debug, Error)]
pub enum CrdtError {
    /// A state or delta of one kind was applied to a CRDT of another kind.
    #[error("crdt kind mismatch: cannot apply a {got} {what} to a {expected}")]
    Mismatch {
        /// Kind of the local CRDT.
        expected: &'static str,
        /// Kind of the inbound state or delta.
        got: &'static str,
        /// Whether a state or a delta was being applied.
        what: &'static str,
    },
}

/// A replicated data type: one of the eight concrete CRDTs.
#[derive(Debug, Clone)]
pub enum Crdt {
    /// Grow-only counter.
    GCounter(GCounter),
    /// Positive-negative counter.
    PNCounter(PNCounter),
    /// Grow-only set.
    GSet(GSet),
    /// Observed-remove set.
    ORSet(ORSet),
    /// Monotonic boolean flag.
    Flag(Flag),
    /// Last-writer-wins register.
    LwwRegister(LwwRegister),
    /// Per-node vote.
    Vote(Vote),
    /// Observed-remove map of nested CRDTs.
    ORMap(ORMap),
}

/// Full snapshot of a CRDT, as carried by init, state and create frames.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CrdtState {
    /// Grow-only counter snapshot.
    GCounter(GCounterState),
    /// Positive-negative counter snapshot.
    PNCounter(PNCounterState),
    /// Grow-only set snapshot.
    GSet(GSetState),
    /// Observed-remove set snapshot.
    ORSet(ORSetState),
    /// Flag snapshot.
    Flag(FlagState),
    /// Register snapshot.
    LwwRegister(LwwRegisterState),
    /// Vote snapshot.
    Vote(VoteState),
    /// Map snapshot.
    ORMap(ORMapState),
}

/// Incremental change of a CRDT, as carried by changed and update frames.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CrdtDelta {
    /// Grow-only counter change.
    GCounter(GCounterDelta),
    /// Positive-negative counter change.
    PNCounter(PNCounterDelta),
    /// Grow-only set change.
    GSet(GSetDelta),
    /// Observed-remove set change.
    ORSet(ORSetDelta),
    /// Flag change.
    Flag(FlagDelta),
    /// Register change.
    LwwRegister(LwwRegisterDelta),
    /// Vote change.
    Vote(VoteDelta),
    /// Map change.
    ORMap(ORMapDelta),
}

impl Crdt {
    /// Materializes a replica from an inbound full state.
    #[must_use]
    pub fn from_state(state: CrdtState) -> Self {
        match state {
            CrdtState::GCounter(s) => {
                let mut c = GCounter::new();
                c.apply_state(s);
                Crdt::GCounter(c)
            }
            CrdtState::PNCounter(s) => {
                let mut c = PNCounter::new();
                c.apply_state(s);
                Crdt::PNCounter(c)
            }
            CrdtState::GSet(s) => {
                let mut c = GSet::new();
                c.apply_state(s);
                Crdt::GSet(c)
            }
            CrdtState::ORSet(s) => {
                let mut c = ORSet::new();
                c.apply_state(s);
                Crdt::ORSet(c)
            }
            CrdtState::Flag(s) => {
                let mut c = Flag::new();
                c.apply_state(s);
                Crdt::Flag(c)
            }
            CrdtState::LwwRegister(s) => {
                let mut c = LwwRegister::new(None);
                c.apply_state(s);
                Crdt::LwwRegister(c)
            }
            CrdtState::Vote(s) => {
                let mut c = Vote::new();
                c.apply_state(s);
                Crdt::Vote(c)
            }
            CrdtState::ORMap(s) => {
                let mut c = ORMap::new();
                c.apply_state(s);
                Crdt::ORMap(c)
            }
        }
    }

    /// The kind of this CRDT, for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Crdt::GCounter(_) => "gcounter",
            Crdt::PNCounter(_) => "pncounter",
            Crdt::GSet(_) => "gset",
            Crdt::ORSet(_) => "orset",
            Crdt::Flag(_) => "flag",
            Crdt::LwwRegister(_) => "lwwregister",
            Crdt::Vote(_) => "vote",
            Crdt::ORMap(_) => "ormap",
        }
    }

    /// Full snapshot of the value.
    #[must_use]
    pub fn state(&self) -> CrdtState {
        match self {
            Crdt::GCounter(c) => CrdtState::GCounter(c.state()),
            Crdt::PNCounter(c) => CrdtState::PNCounter(c.state()),
            Crdt::GSet(c) => CrdtState::GSet(c.state()),
            Crdt::ORSet(c) => CrdtState::ORSet(c.state()),
            Crdt::Flag(c) => CrdtState::Flag(c.state()),
            Crdt::LwwRegister(c) => CrdtState::LwwRegister(c.state()),
            Crdt::Vote(c) => CrdtState::Vote(c.state()),
            Crdt::ORMap(c) => CrdtState::ORMap(c.state()),
        }
    }

    /// The pending delta.
    ///
    /// Calling this when [`Crdt::has_delta`] is `false` is a usage error;
    /// callers must guard.
    #[must_use]
    pub fn delta(&self) -> CrdtDelta {
        debug_assert!(self.has_delta(), "delta() called with no pending delta");
        match self {
            Crdt::GCounter(c) => CrdtDelta::GCounter(c.delta()),
            Crdt::PNCounter(c) => CrdtDelta::PNCounter(c.delta()),
            Crdt::GSet(c) => CrdtDelta::GSet(c.delta()),
            Crdt::ORSet(c) => CrdtDelta::ORSet(c.delta()),
            Crdt::Flag(c) => CrdtDelta::Flag(c.delta()),
            Crdt::LwwRegister(c) => CrdtDelta::LwwRegister(c.delta()),
            Crdt::Vote(c) => CrdtDelta::Vote(c.delta()),
            Crdt::ORMap(c) => CrdtDelta::ORMap(c.delta()),
        }
    }

    /// Whether any local effect is pending.
    #[must_use]
    pub fn has_delta(&self) -> bool {
        match self {
            Crdt::GCounter(c) => c.has_delta(),
            Crdt::PNCounter(c) => c.has_delta(),
            Crdt::GSet(c) => c.has_delta(),
            Crdt::ORSet(c) => c.has_delta(),
            Crdt::Flag(c) => c.has_delta(),
            Crdt::LwwRegister(c) => c.has_delta(),
            Crdt::Vote(c) => c.has_delta(),
            Crdt::ORMap(c) => c.has_delta(),
        }
    }

    /// Clears the pending delta. The value is untouched.
    pub fn reset_delta(&mut self) {
        match self {
            Crdt::GCounter(c) => c.reset_delta(),
            Crdt::PNCounter(c) => c.reset_delta(),
            Crdt::GSet(c) => c.reset_delta(),
            Crdt::ORSet(c) => c.reset_delta(),
            Crdt::Flag(c) => c.reset_delta(),
            Crdt::LwwRegister(c) => c.reset_delta(),
            Crdt::Vote(c) => c.reset_delta(),
            Crdt::ORMap(c) => c.reset_delta(),
        }
    }

    /// Replaces the value wholesale from an inbound full state.
    pub fn apply_state(&mut self, state: CrdtState) -> Result<(), CrdtError> {
        match (self, state) {
            (Crdt::GCounter(c), CrdtState::GCounter(s)) => c.apply_state(s),
            (Crdt::PNCounter(c), CrdtState::PNCounter(s)) => c.apply_state(s),
            (Crdt::GSet(c), CrdtState::GSet(s)) => c.apply_state(s),
            (Crdt::ORSet(c), CrdtState::ORSet(s)) => c.apply_state(s),
            (Crdt::Flag(c), CrdtState::Flag(s)) => c.apply_state(s),
            (Crdt::LwwRegister(c), CrdtState::LwwRegister(s)) => c.apply_state(s),
            (Crdt::Vote(c), CrdtState::Vote(s)) => c.apply_state(s),
            (Crdt::ORMap(c), CrdtState::ORMap(s)) => c.apply_state(s),
            (this, state) => {
                return Err(CrdtError::Mismatch {
                    expected: this.kind(),
                    got: state.kind(),
                    what: "state",
                })
            }
        }
        Ok(())
    }

    /// Merges an inbound delta into the value.
    pub fn apply_delta(&mut self, delta: CrdtDelta) -> Result<(), CrdtError> {
        match (self, delta) {
            (Crdt::GCounter(c), CrdtDelta::GCounter(d)) => c.apply_delta(d),
            (Crdt::PNCounter(c), CrdtDelta::PNCounter(d)) => c.apply_delta(d),
            (Crdt::GSet(c), CrdtDelta::GSet(d)) => c.apply_delta(d),
            (Crdt::ORSet(c), CrdtDelta::ORSet(d)) => c.apply_delta(d),
            (Crdt::Flag(c), CrdtDelta::Flag(d)) => c.apply_delta(d),
            (Crdt::LwwRegister(c), CrdtDelta::LwwRegister(d)) => c.apply_delta(d),
            (Crdt::Vote(c), CrdtDelta::Vote(d)) => c.apply_delta(d),
            (Crdt::ORMap(c), CrdtDelta::ORMap(d)) => return c.apply_delta(d),
            (this, delta) => {
                return Err(CrdtError::Mismatch {
                    expected: this.kind(),
                    got: delta.kind(),
                    what: "delta",
                })
            }
        }
        Ok(())
    }
}

impl CrdtState {
    /// The kind of CRDT this snapshot belongs to, for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            CrdtState::GCounter(_) => "gcounter",
            CrdtState::PNCounter(_) => "pncounter",
            CrdtState::GSet(_) => "gset",
            CrdtState::ORSet(_) => "orset",
            CrdtState::Flag(_) => "flag",
            CrdtState::LwwRegister(_) => "lwwregister",
            CrdtState::Vote(_) => "vote",
            CrdtState::ORMap(_) => "ormap",
        }
    }
}

impl CrdtDelta {
    /// The kind of CRDT this change belongs to, for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            CrdtDelta::GCounter(_) => "gcounter",
            CrdtDelta::PNCounter(_) => "pncounter",
            CrdtDelta::GSet(_) => "gset",
            CrdtDelta::ORSet(_) => "orset",
            CrdtDelta::Flag(_) => "flag",
            CrdtDelta::LwwRegister(_) => "lwwregister",
            CrdtDelta::Vote(_) => "vote",
            CrdtDelta::ORMap(_) => "ormap",
        }
    }
}
