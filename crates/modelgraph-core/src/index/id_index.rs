//! Unique-key index: at most one distinct value per key.

use super::spec::IndexSpec;
use crate::types::GraphError;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as DashEntry;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

fn conflict<K: std::fmt::Debug>(key: &K) -> GraphError {
    GraphError::IndexKeyConflict {
        key: format!("{key:?}"),
    }
}

// =============================================================================
// SINGLE-THREADED
// =============================================================================

/// Unique-key index mutated through `&mut self`.
///
/// Re-adding a value equal to the bound one is a no-op that succeeds.
#[derive(Debug, Clone)]
pub struct IdIndex<V, S: IndexSpec<V>> {
    spec: S,
    map: HashMap<S::Key, V>,
}

impl<V: PartialEq, S: IndexSpec<V>> IdIndex<V, S> {
    pub fn new(spec: S) -> Self {
        Self {
            spec,
            map: HashMap::new(),
        }
    }

    /// Build an index over `values`, failing on the first conflict.
    pub fn with_values(spec: S, values: impl IntoIterator<Item = V>) -> Result<Self, GraphError> {
        let mut index = Self::new(spec);
        index.add_all(values)?;
        Ok(index)
    }

    pub fn spec(&self) -> &S {
        &self.spec
    }

    pub fn get(&self, key: &S::Key) -> Option<&V> {
        self.map.get(key)
    }

    /// Bind `value` under its key. Returns `false`, leaving the index
    /// untouched, when the key is bound to a different value.
    pub fn try_add(&mut self, value: V) -> bool {
        match self.map.entry(self.spec.key(&value)) {
            Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
            Entry::Occupied(slot) => *slot.get() == value,
        }
    }

    /// Like [`IdIndex::try_add`] but a conflict is an error naming the key.
    pub fn add(&mut self, value: V) -> Result<(), GraphError> {
        let key = self.spec.key(&value);
        match self.map.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(())
            }
            Entry::Occupied(slot) if *slot.get() == value => Ok(()),
            Entry::Occupied(slot) => Err(conflict(slot.key())),
        }
    }

    /// Try every value in order. Returns `true` when all of them were bound.
    pub fn try_add_all(&mut self, values: impl IntoIterator<Item = V>) -> bool {
        values
            .into_iter()
            .fold(true, |all, value| self.try_add(value) && all)
    }

    /// Add values in order, stopping at the first conflict. Values added
    /// before the conflict stay in the index.
    pub fn add_all(&mut self, values: impl IntoIterator<Item = V>) -> Result<(), GraphError> {
        values.into_iter().try_for_each(|value| self.add(value))
    }

    /// Unbind the value's key, but only while it is still bound to `value`.
    pub fn remove(&mut self, value: &V) -> bool {
        let key = self.spec.key(value);
        if self.map.get(&key) == Some(value) {
            self.map.remove(&key);
            true
        } else {
            false
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &S::Key> {
        self.map.keys()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// =============================================================================
// CONCURRENT
// =============================================================================

/// Unique-key index safe for concurrent use through `&self`.
///
/// Each key is updated atomically; a bulk add is not atomic as a whole.
#[derive(Debug)]
pub struct ConcurrentIdIndex<V, S: IndexSpec<V>> {
    spec: S,
    map: DashMap<S::Key, V>,
}

impl<V: PartialEq + Clone, S: IndexSpec<V>> ConcurrentIdIndex<V, S> {
    pub fn new(spec: S) -> Self {
        Self {
            spec,
            map: DashMap::new(),
        }
    }

    pub fn with_values(spec: S, values: impl IntoIterator<Item = V>) -> Result<Self, GraphError> {
        let index = Self::new(spec);
        index.add_all(values)?;
        Ok(index)
    }

    pub fn spec(&self) -> &S {
        &self.spec
    }

    pub fn get(&self, key: &S::Key) -> Option<V> {
        self.map.get(key).map(|entry| entry.value().clone())
    }

    pub fn try_add(&self, value: V) -> bool {
        match self.map.entry(self.spec.key(&value)) {
            DashEntry::Vacant(slot) => {
                slot.insert(value);
                true
            }
            DashEntry::Occupied(slot) => *slot.get() == value,
        }
    }

    pub fn add(&self, value: V) -> Result<(), GraphError> {
        match self.map.entry(self.spec.key(&value)) {
            DashEntry::Vacant(slot) => {
                slot.insert(value);
                Ok(())
            }
            DashEntry::Occupied(slot) if *slot.get() == value => Ok(()),
            DashEntry::Occupied(slot) => Err(conflict(slot.key())),
        }
    }

    pub fn try_add_all(&self, values: impl IntoIterator<Item = V>) -> bool {
        values
            .into_iter()
            .fold(true, |all, value| self.try_add(value) && all)
    }

    pub fn add_all(&self, values: impl IntoIterator<Item = V>) -> Result<(), GraphError> {
        values.into_iter().try_for_each(|value| self.add(value))
    }

    pub fn remove(&self, value: &V) -> bool {
        let key = self.spec.key(value);
        self.map
            .remove_if(&key, |_, existing| existing == value)
            .is_some()
    }

    /// Snapshot of the bound keys.
    pub fn keys(&self) -> Vec<S::Key> {
        self.map.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
