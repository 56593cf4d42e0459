//! Observed-remove map of nested CRDTs.

use std::collections::{HashMap, HashSet};

use ahash::RandomState;

use crate::crdt::{Crdt, CrdtDelta, CrdtError, CrdtState};
use crate::payload::{shared_hasher, Payload};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A map from payload keys to nested CRDT values.
///
/// The map exclusively owns its children; any of the eight CRDT kinds can
/// nest, including further maps. Key identity is the typed envelope: type
/// URL plus bytes, octet for octet.
///
/// Delta bookkeeping: added entries carry the nested CRDT's full state,
/// removed entries carry only the key, surviving entries with pending nested
/// deltas are enumerated as updates, and a clear supersedes all three.
/// Overwriting an entry the proxy already knows is announced as a removal
/// plus an addition, so the receiver replaces the nested value instead of
/// merging into it.
#[derive(Debug, Clone)]
pub struct ORMap {
    entries: HashMap<Payload, Crdt, RandomState>,
    added: HashSet<Payload, RandomState>,
    removed: HashSet<Payload, RandomState>,
    cleared: bool,
}

/// One entry of an [`ORMap`] snapshot: a key and the nested full state.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ORMapEntry {
    /// Entry key.
    pub key: Payload,
    /// Full state of the nested CRDT.
    pub state: CrdtState,
}

/// One updated entry of an [`ORMap`] delta: a key and the nested delta.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ORMapEntryDelta {
    /// Entry key.
    pub key: Payload,
    /// Pending delta of the nested CRDT.
    pub delta: CrdtDelta,
}

/// Full snapshot of an [`ORMap`]. Entry order is unspecified.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ORMapState {
    /// All entries of the map.
    pub entries: Vec<ORMapEntry>,
}

/// Incremental change of an [`ORMap`].
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ORMapDelta {
    /// Entries added since the last reset, with their full nested state.
    pub added: Vec<ORMapEntry>,
    /// Keys removed since the last reset.
    pub removed: Vec<Payload>,
    /// Surviving entries whose nested CRDT has a pending delta.
    pub updated: Vec<ORMapEntryDelta>,
    /// When set, the receiver empties its value first and the other lists
    /// are empty.
    pub cleared: bool,
}

impl Default for ORMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ORMap {
    /// Creates an empty map with no pending delta.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::with_hasher(shared_hasher()),
            added: HashSet::with_hasher(shared_hasher()),
            removed: HashSet::with_hasher(shared_hasher()),
            cleared: false,
        }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the map holds an entry for `key`.
    #[must_use]
    pub fn has_key(&self, key: &Payload) -> bool {
        self.entries.contains_key(key)
    }

    /// The nested CRDT stored under `key`.
    #[must_use]
    pub fn get(&self, key: &Payload) -> Option<&Crdt> {
        self.entries.get(key)
    }

    /// Mutable access to the nested CRDT stored under `key`. Mutations are
    /// tracked through the nested CRDT's own pending delta.
    pub fn get_mut(&mut self, key: &Payload) -> Option<&mut Crdt> {
        self.entries.get_mut(key)
    }

    /// Iterates over the entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&Payload, &Crdt)> {
        self.entries.iter()
    }

    /// Iterates over the keys in unspecified order.
    pub fn keys(&self) -> impl Iterator<Item = &Payload> {
        self.entries.keys()
    }

    /// Inserts or replaces the entry under `key`.
    ///
    /// A key unknown to the proxy is recorded as an addition; replacing a
    /// known key is recorded as a removal plus an addition.
    pub fn set(&mut self, key: Payload, value: Crdt) {
        if self.entries.contains_key(&key) {
            // The proxy knows this entry unless the addition is still
            // pending; a pending removal is left in place so the delta
            // reads remove-then-add.
            if !self.added.contains(&key) {
                self.removed.insert(key.clone());
                self.added.insert(key.clone());
            }
        } else {
            self.added.insert(key.clone());
        }
        self.entries.insert(key, value);
    }

    /// Removes the entry under `key`. Removing an absent key is a silent
    /// no-op; removing a pending addition cancels the addition.
    pub fn remove(&mut self, key: &Payload) {
        if self.entries.remove(key).is_some() && !self.added.remove(key) {
            self.removed.insert(key.clone());
        }
    }

    /// Empties the map. Supersedes any pending additions and removals.
    pub fn clear(&mut self) {
        self.cleared = true;
        self.entries.clear();
        self.added.clear();
        self.removed.clear();
    }

    /// Full snapshot.
    #[must_use]
    pub fn state(&self) -> ORMapState {
        ORMapState {
            entries: self
                .entries
                .iter()
                .map(|(key, value)| ORMapEntry {
                    key: key.clone(),
                    state: value.state(),
                })
                .collect(),
        }
    }

    /// The pending delta. Callers guard with [`ORMap::has_delta`].
    #[must_use]
    pub fn delta(&self) -> ORMapDelta {
        let added = self
            .added
            .iter()
            .filter_map(|key| {
                self.entries.get(key).map(|value| ORMapEntry {
                    key: key.clone(),
                    state: value.state(),
                })
            })
            .collect();
        let updated = self
            .entries
            .iter()
            .filter(|(key, value)| !self.added.contains(*key) && value.has_delta())
            .map(|(key, value)| ORMapEntryDelta {
                key: key.clone(),
                delta: value.delta(),
            })
            .collect();
        ORMapDelta {
            added,
            removed: self.removed.iter().cloned().collect(),
            updated,
            cleared: self.cleared,
        }
    }

    /// Whether a clear, addition, removal or nested delta is pending.
    #[must_use]
    pub fn has_delta(&self) -> bool {
        self.cleared
            || !self.added.is_empty()
            || !self.removed.is_empty()
            || self.entries.values().any(Crdt::has_delta)
    }

    /// Clears the pending delta, recursively resetting every nested CRDT.
    /// The value is untouched.
    pub fn reset_delta(&mut self) {
        self.cleared = false;
        self.added.clear();
        self.removed.clear();
        for value in self.entries.values_mut() {
            value.reset_delta();
        }
    }

    /// Replaces the value wholesale, materializing every nested CRDT from
    /// its full state.
    pub fn apply_state(&mut self, state: ORMapState) {
        self.entries = state
            .entries
            .into_iter()
            .map(|entry| (entry.key, Crdt::from_state(entry.state)))
            .collect();
    }

    /// Merges a remote delta: clear first, then removals, then additions,
    /// then nested updates. Updates for absent keys are silent no-ops;
    /// nested kind mismatches fail.
    pub fn apply_delta(&mut self, delta: ORMapDelta) -> Result<(), CrdtError> {
        if delta.cleared {
            self.entries.clear();
        }
        for key in &delta.removed {
            self.entries.remove(key);
        }
        for entry in delta.added {
            self.entries
                .insert(entry.key, Crdt::from_state(entry.state));
        }
        for update in delta.updated {
            if let Some(value) = self.entries.get_mut(&update.key) {
                value.apply_delta(update.delta)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crdt::{GCounter, PNCounter};

    fn key(s: &str) -> Payload {
        Payload::from_string(s)
    }

    fn counter(n: u64) -> Crdt {
        let mut counter = GCounter::new();
        counter.increment(n);
        Crdt::GCounter(counter)
    }

    #[test]
    fn test_new_map_has_no_delta() {
        let map = ORMap::new();
        assert!(map.is_empty());
        assert!(!map.has_delta());
    }

    #[test]
    fn test_set_records_added_entry_with_full_state() {
        let mut map = ORMap::new();
        map.set(key("a"), counter(7));
        let delta = map.delta();
        assert_eq!(delta.added.len(), 1);
        assert_eq!(delta.added[0].key, key("a"));
        assert!(matches!(
            delta.added[0].state,
            CrdtState::GCounter(ref s) if s.value == 7
        ));
        assert!(delta.updated.is_empty());
    }

    #[test]
    fn test_nested_mutation_is_an_update() {
        let mut map = ORMap::new();
        map.set(key("a"), Crdt::GCounter(GCounter::new()));
        map.reset_delta();

        if let Some(Crdt::GCounter(c)) = map.get_mut(&key("a")) {
            c.increment(3);
        }
        assert!(map.has_delta());
        let delta = map.delta();
        assert!(delta.added.is_empty());
        assert_eq!(delta.updated.len(), 1);
        assert!(matches!(
            delta.updated[0].delta,
            CrdtDelta::GCounter(ref d) if d.increment == 3
        ));
    }

    #[test]
    fn test_overwriting_known_key_is_remove_plus_add() {
        let mut map = ORMap::new();
        map.set(key("a"), counter(1));
        map.reset_delta();

        map.set(key("a"), Crdt::PNCounter(PNCounter::new()));
        let delta = map.delta();
        assert_eq!(delta.removed, vec![key("a")]);
        assert_eq!(delta.added.len(), 1);
        assert!(matches!(delta.added[0].state, CrdtState::PNCounter(_)));
        assert!(delta.updated.is_empty());
    }

    #[test]
    fn test_remove_of_pending_addition_cancels_it() {
        let mut map = ORMap::new();
        map.set(key("a"), counter(1));
        map.remove(&key("a"));
        assert!(!map.has_delta());
        assert!(map.is_empty());
    }

    #[test]
    fn test_clear_supersedes_everything() {
        let mut map = ORMap::new();
        map.set(key("a"), counter(1));
        map.reset_delta();
        map.set(key("b"), counter(2));
        map.remove(&key("a"));
        map.clear();

        let delta = map.delta();
        assert!(delta.cleared);
        assert!(delta.added.is_empty());
        assert!(delta.removed.is_empty());
        assert!(delta.updated.is_empty());
    }

    #[test]
    fn test_reset_delta_resets_nested_deltas() {
        let mut map = ORMap::new();
        map.set(key("a"), counter(5));
        map.reset_delta();
        assert!(!map.has_delta());
        if let Some(value) = map.get(&key("a")) {
            assert!(!value.has_delta());
        }
    }

    #[test]
    fn test_apply_delta_replaces_on_remove_plus_add() {
        let mut map = ORMap::new();
        map.apply_state(ORMapState {
            entries: vec![ORMapEntry {
                key: key("a"),
                state: CrdtState::GCounter(crate::crdt::GCounterState { value: 9 }),
            }],
        });

        map.apply_delta(ORMapDelta {
            added: vec![ORMapEntry {
                key: key("a"),
                state: CrdtState::PNCounter(crate::crdt::PNCounterState { value: -1 }),
            }],
            removed: vec![key("a")],
            updated: vec![],
            cleared: false,
        })
        .unwrap();

        assert!(matches!(map.get(&key("a")), Some(Crdt::PNCounter(_))));
    }

    #[test]
    fn test_apply_delta_nested_mismatch_fails() {
        let mut map = ORMap::new();
        map.apply_state(ORMapState {
            entries: vec![ORMapEntry {
                key: key("a"),
                state: CrdtState::GCounter(crate::crdt::GCounterState { value: 0 }),
            }],
        });

        let err = map.apply_delta(ORMapDelta {
            added: vec![],
            removed: vec![],
            updated: vec![ORMapEntryDelta {
                key: key("a"),
                delta: CrdtDelta::Flag(crate::crdt::FlagDelta { value: true }),
            }],
            cleared: false,
        });
        assert!(err.is_err());
    }

    #[test]
    fn test_maps_nest_recursively() {
        let mut inner = ORMap::new();
        inner.set(key("leaf"), counter(1));

        let mut outer = ORMap::new();
        outer.set(key("branch"), Crdt::ORMap(inner));

        let delta = outer.delta();
        assert_eq!(delta.added.len(), 1);
        assert!(matches!(delta.added[0].state, CrdtState::ORMap(_)));
    }
}
