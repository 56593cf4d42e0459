//! Monotonic boolean flag CRDT.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A boolean that starts `false` and can only be raised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flag {
    value: bool,
    changed: bool,
}

/// Full snapshot of a [`Flag`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FlagState {
    /// Current flag value.
    pub value: bool,
}

/// Incremental change of a [`Flag`]. Carries the final value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FlagDelta {
    /// The flag value after the change.
    pub value: bool,
}

impl Flag {
    /// Creates a lowered flag with no pending delta.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value.
    #[must_use]
    pub fn value(&self) -> bool {
        self.value
    }

    /// Raises the flag. Raising an already-raised flag is a silent no-op.
    pub fn enable(&mut self) {
        if !self.value {
            self.value = true;
            self.changed = true;
        }
    }

    /// Full snapshot.
    #[must_use]
    pub fn state(&self) -> FlagState {
        FlagState { value: self.value }
    }

    /// The pending delta. Callers guard with [`Flag::has_delta`].
    #[must_use]
    pub fn delta(&self) -> FlagDelta {
        FlagDelta { value: self.value }
    }

    /// Whether the flag was raised since the last reset.
    #[must_use]
    pub fn has_delta(&self) -> bool {
        self.changed
    }

    /// Clears the pending delta. The value is untouched.
    pub fn reset_delta(&mut self) {
        self.changed = false;
    }

    /// Replaces the value wholesale.
    pub fn apply_state(&mut self, state: FlagState) {
        self.value = state.value;
    }

    /// Merges a remote delta. The flag is monotonic, so the merge is an OR.
    pub fn apply_delta(&mut self, delta: FlagDelta) {
        self.value = self.value || delta.value;
    }
}
