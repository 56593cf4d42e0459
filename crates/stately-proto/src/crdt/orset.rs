//! Observed-remove set CRDT.

use std::collections::HashSet;

use ahash::RandomState;

use crate::payload::{shared_hasher, Payload};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A set of payloads supporting add, remove and clear with add-wins
/// delta bookkeeping.
///
/// Within one delta window a remove followed by an add of the same element
/// records only the add, and an add followed by a remove records neither. A
/// remove that would empty the set is promoted to a clear, and a clear
/// supersedes any pending added or removed elements.
///
/// Element identity is the typed envelope: type URL plus bytes, octet for
/// octet.
#[derive(Debug, Clone)]
pub struct ORSet {
    value: HashSet<Payload, RandomState>,
    added: HashSet<Payload, RandomState>,
    removed: HashSet<Payload, RandomState>,
    cleared: bool,
}

/// Full snapshot of an [`ORSet`]. Item order is unspecified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ORSetState {
    /// All elements of the set.
    pub items: Vec<Payload>,
}

/// Incremental change of an [`ORSet`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ORSetDelta {
    /// Elements added since the last reset.
    pub added: Vec<Payload>,
    /// Elements removed since the last reset.
    pub removed: Vec<Payload>,
    /// When set, the receiver empties its value first and the added/removed
    /// lists are empty.
    pub cleared: bool,
}

impl Default for ORSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ORSet {
    /// Creates an empty set with no pending delta.
    #[must_use]
    pub fn new() -> Self {
        Self {
            value: HashSet::with_hasher(shared_hasher()),
            added: HashSet::with_hasher(shared_hasher()),
            removed: HashSet::with_hasher(shared_hasher()),
            cleared: false,
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

    /// Adds an element. Idempotent. An add over a pending remove of the same
    /// element cancels the remove; the delta then records only the add.
    pub fn add(&mut self, item: Payload) {
        if !self.value.contains(&item) {
            self.removed.remove(&item);
            self.added.insert(item.clone());
            self.value.insert(item);
        }
    }

    /// Removes an element. Removing an absent element is a silent no-op; a
    /// remove of a pending add cancels the add. Emptying the set promotes
    /// the remove to a clear.
    pub fn remove(&mut self, item: &Payload) {
        if !self.value.contains(item) {
            return;
        }
        if self.value.len() == 1 {
            self.clear();
            return;
        }
        self.value.remove(item);
        if !self.added.remove(item) {
            self.removed.insert(item.clone());
        }
    }

    /// Empties the set. Supersedes any pending added or removed elements.
    pub fn clear(&mut self) {
        self.cleared = true;
        self.value.clear();
        self.added.clear();
        self.removed.clear();
    }

    /// Full snapshot.
    #[must_use]
    pub fn state(&self) -> ORSetState {
        ORSetState {
            items: self.value.iter().cloned().collect(),
        }
    }

    /// The pending delta. Callers guard with [`ORSet::has_delta`].
    #[must_use]
    pub fn delta(&self) -> ORSetDelta {
        ORSetDelta {
            added: self.added.iter().cloned().collect(),
            removed: self.removed.iter().cloned().collect(),
            cleared: self.cleared,
        }
    }

    /// Whether a clear, addition or removal is pending.
    #[must_use]
    pub fn has_delta(&self) -> bool {
        self.cleared || !self.added.is_empty() || !self.removed.is_empty()
    }

    /// Clears the pending delta. The value is untouched.
    pub fn reset_delta(&mut self) {
        self.cleared = false;
        self.added.clear();
        self.removed.clear();
    }

    /// Replaces the value wholesale.
    pub fn apply_state(&mut self, state: ORSetState) {
        self.value = state.items.into_iter().collect();
    }

    /// Merges a remote delta: clear first, then removals, then additions.
    /// Re-adding a present element and re-removing an absent one are silent
    /// no-ops.
    pub fn apply_delta(&mut self, delta: ORSetDelta) {
        if delta.cleared {
            self.value.clear();
        }
        for item in &delta.removed {
            self.value.remove(item);
        }
        for item in delta.added {
            self.value.insert(item);
        }
    }
}
