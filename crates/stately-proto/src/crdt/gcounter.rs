//! Grow-only counter CRDT.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A counter that can only grow.
///
/// The value is the sum of increments across all replicas; the pending delta
/// is the sum of local increments since the last reset. Remote deltas are
/// net changes and are assumed to be delivered exactly once.
///
/// # Example
///
/// ```rust
/// use stately_proto::crdt::GCounter;
///
/// let mut counter = GCounter::new();
/// counter.increment(7);
/// assert_eq!(counter.value(), 7);
/// assert!(counter.has_delta());
/// assert_eq!(counter.delta().increment, 7);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GCounter {
    value: u64,
    increment: u64,
}

/// Full snapshot of a [`GCounter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GCounterState {
    /// Current counter value.
    pub value: u64,
}

/// Incremental change of a [`GCounter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GCounterDelta {
    /// Sum of increments since the last reset.
    pub increment: u64,
}

impl GCounter {
    /// Creates a counter at zero with no pending delta.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Adds `n` to the counter and to the pending delta.
    pub fn increment(&mut self, n: u64) {
        self.value += n;
        self.increment += n;
    }

    /// Full snapshot.
    #[must_use]
    pub fn state(&self) -> GCounterState {
        GCounterState { value: self.value }
    }

    /// The pending delta. Callers guard with [`GCounter::has_delta`].
    #[must_use]
    pub fn delta(&self) -> GCounterDelta {
        GCounterDelta {
            increment: self.increment,
        }
    }

    /// Whether any local increment is pending.
    #[must_use]
    pub fn has_delta(&self) -> bool {
        self.increment > 0
    }

    /// Clears the pending delta. The value is untouched.
    pub fn reset_delta(&mut self) {
        self.increment = 0;
    }

    /// Replaces the value wholesale.
    pub fn apply_state(&mut self, state: GCounterState) {
        self.value = state.value;
    }

    /// Merges a remote delta into the value. A grow-only counter never
    /// decrements.
    pub fn apply_delta(&mut self, delta: GCounterDelta) {
        self.value += delta.increment;
    }
}
