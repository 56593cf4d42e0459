//! Last-writer-wins register CRDT.

use crate::payload::Payload;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Clock discriminator for last-writer-wins conflict resolution.
///
/// The proxy resolves concurrent writes; the register only records which
/// clock the writer chose. The custom clock value is meaningful for the two
/// custom variants only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Clock {
    /// Proxy wall clock; the default.
    #[default]
    Default,
    /// Reversed ordering: the earliest write wins.
    Reverse,
    /// Caller-supplied clock value.
    Custom,
    /// Caller-supplied clock value, auto-incremented when it would not
    /// advance past the current one.
    CustomAutoIncrement,
}

/// A register holding a single payload, resolved last-writer-wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LwwRegister {
    value: Option<Payload>,
    clock: Clock,
    custom_clock_value: i64,
    pending: Option<LwwRegisterDelta>,
}

/// Full snapshot of an [`LwwRegister`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LwwRegisterState {
    /// Current register contents, absent until first written.
    pub value: Option<Payload>,
    /// Clock chosen by the last local write.
    pub clock: Clock,
    /// Custom clock value of the last local write.
    pub custom_clock_value: i64,
}

/// Incremental change of an [`LwwRegister`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LwwRegisterDelta {
    /// The written value.
    pub value: Option<Payload>,
    /// Clock chosen by the write.
    pub clock: Clock,
    /// Custom clock value of the write.
    pub custom_clock_value: i64,
}

impl LwwRegister {
    /// Creates a register. A `Some` initial value is recorded in the pending
    /// delta so the first announced state carries it; `None` starts empty.
    #[must_use]
    pub fn new(initial: Option<Payload>) -> Self {
        let mut register = Self::default();
        if let Some(value) = initial {
            register.set(value);
        }
        register
    }

    /// Current contents.
    #[must_use]
    pub fn value(&self) -> Option<&Payload> {
        self.value.as_ref()
    }

    /// Writes a value with the default clock.
    pub fn set(&mut self, value: Payload) {
        self.set_with_clock(value, Clock::Default, 0);
    }

    /// Writes a value recording the chosen clock. The custom clock value is
    /// ignored unless the clock is one of the custom variants.
    pub fn set_with_clock(&mut self, value: Payload, clock: Clock, custom_clock_value: i64) {
        self.value = Some(value.clone());
        self.clock = clock;
        self.custom_clock_value = custom_clock_value;
        self.pending = Some(LwwRegisterDelta {
            value: Some(value),
            clock,
            custom_clock_value,
        });
    }

    /// Full snapshot.
    #[must_use]
    pub fn state(&self) -> LwwRegisterState {
        LwwRegisterState {
            value: self.value.clone(),
            clock: self.clock,
            custom_clock_value: self.custom_clock_value,
        }
    }

    /// The pending delta. Callers guard with [`LwwRegister::has_delta`].
    #[must_use]
    pub fn delta(&self) -> LwwRegisterDelta {
        self.pending.clone().unwrap_or_default()
    }

    /// Whether a local write is pending.
    #[must_use]
    pub fn has_delta(&self) -> bool {
        self.pending.is_some()
    }

    /// Clears the pending delta and resets the local clock choice to
    /// `(Default, 0)`. The value is untouched.
    pub fn reset_delta(&mut self) {
        self.pending = None;
        self.clock = Clock::Default;
        self.custom_clock_value = 0;
    }

    /// Replaces the value wholesale.
    pub fn apply_state(&mut self, state: LwwRegisterState) {
        self.value = state.value;
        self.clock = state.clock;
        self.custom_clock_value = state.custom_clock_value;
    }

    /// Installs the winning value chosen by the proxy.
    pub fn apply_delta(&mut self, delta: LwwRegisterDelta) {
        self.value = delta.value;
    }
}
