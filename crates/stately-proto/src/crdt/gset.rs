//! Grow-only set CRDT.

use std::collections::HashSet;

use ahash::RandomState;

use crate::payload::{shared_hasher, Payload};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A set of payloads that only ever grows.
///
/// Element identity is the typed envelope: type URL plus bytes, octet for
/// octet. Adding an element already present is a silent no-op and leaves no
/// pending delta behind.
#[derive(Debug, Clone)]
pub struct GSet {
    value: HashSet<Payload, RandomState>,
    added: HashSet<Payload, RandomState>,
}

/// Full snapshot of a [`GSet`]. Item order is unspecified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GSetState {
    /// All elements of the set.
    pub items: Vec<Payload>,
}

/// Incremental change of a [`GSet`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GSetDelta {
    /// Elements added since the last reset.
    pub added: Vec<Payload>,
}

impl Default for GSet {
    fn default() -> Self {
        Self::new()
    }
}

impl GSet {
    /// Creates an empty set with no pending delta.
    #[must_use]
    pub fn new() -> Self {
        Self {
            value: HashSet::with_hasher(shared_hasher()),
            added: HashSet::with_hasher(shared_hasher()),
        }
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.value.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Whether the set contains `item`.
    #[must_use]
    pub fn contains(&self, item: &Payload) -> bool {
        self.value.contains(item)
    }

    /// Iterates over the elements in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Payload> {
        self.value.iter()
    }

    /// Adds an element. Idempotent.
    pub fn add(&mut self, item: Payload) {
        if !self.value.contains(&item) {
            self.added.insert(item.clone());
            self.value.insert(item);
        }
    }

    /// Full snapshot.
    #[must_use]
    pub fn state(&self) -> GSetState {
        GSetState {
            items: self.value.iter().cloned().collect(),
        }
    }

    /// The pending delta. Callers guard with [`GSet::has_delta`].
    #[must_use]
    pub fn delta(&self) -> GSetDelta {
        GSetDelta {
            added: self.added.iter().cloned().collect(),
        }
    }

    /// Whether any local addition is pending.
    #[must_use]
    pub fn has_delta(&self) -> bool {
        !self.added.is_empty()
    }

    /// Clears the pending delta. The value is untouched.
    pub fn reset_delta(&mut self) {
        self.added.clear();
    }

    /// Replaces the value wholesale.
    pub fn apply_state(&mut self, state: GSetState) {
        self.value = state.items.into_iter().collect();
    }

    /// Merges a remote delta into the value. Re-adding a present element is
    /// a silent no-op, which makes delta application idempotent.
    pub fn apply_delta(&mut self, delta: GSetDelta) {
        for item in delta.added {
            self.value.insert(item);
        }
    }
}
