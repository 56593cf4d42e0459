//! Positive-negative counter CRDT.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A counter that can grow and shrink.
///
/// The pending delta is the signed net change since the last reset, so an
/// increment followed by an equal decrement leaves nothing pending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PNCounter {
    value: i64,
    change: i64,
}

/// Full snapshot of a [`PNCounter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PNCounterState {
    /// Current counter value.
    pub value: i64,
}

/// Incremental change of a [`PNCounter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PNCounterDelta {
    /// Signed net change since the last reset.
    pub change: i64,
}

impl PNCounter {
    /// Creates a counter at zero with no pending delta.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value.
    #[must_use]
    pub fn value(&self) -> i64 {
        self.value
    }

    /// Adds `n` to the counter.
    pub fn increment(&mut self, n: u64) {
        let n = n as i64;
        self.value += n;
        self.change += n;
    }

    /// Subtracts `n` from the counter.
    pub fn decrement(&mut self, n: u64) {
        let n = n as i64;
        self.value -= n;
        self.change -= n;
    }

    /// Full snapshot.
    #[must_use]
    pub fn state(&self) -> PNCounterState {
        PNCounterState { value: self.value }
    }

    /// The pending delta. Callers guard with [`PNCounter::has_delta`].
    #[must_use]
    pub fn delta(&self) -> PNCounterDelta {
        PNCounterDelta {
            change: self.change,
        }
    }

    /// Whether the net local change since the last reset is non-zero.
    #[must_use]
    pub fn has_delta(&self) -> bool {
        self.change != 0
    }

    /// Clears the pending delta. The value is untouched.
    pub fn reset_delta(&mut self) {
        self.change = 0;
    }

    /// Replaces the value wholesale.
    pub fn apply_state(&mut self, state: PNCounterState) {
        self.value = state.value;
    }

    /// Merges a remote net change into the value.
    pub fn apply_delta(&mut self, delta: PNCounterDelta) {
        self.value += delta.change;
    }
}
