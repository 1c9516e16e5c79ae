//! Multi-value index: an ordered bag of values per key.
//!
//! Both variants evict a key as soon as its bag is empty, so `get` on a key
//! that had all of its values removed behaves exactly like an absent key.

use super::spec::IndexSpec;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as DashEntry;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

/// Group `values` by derived key, keeping input order inside each group.
fn group_by_key<'v, V, S: IndexSpec<V>>(
    spec: &S,
    values: impl IntoIterator<Item = &'v V>,
) -> HashMap<S::Key, Vec<&'v V>>
where
    V: 'v,
{
    let mut groups: HashMap<S::Key, Vec<&'v V>> = HashMap::new();
    for value in values {
        groups.entry(spec.key(value)).or_default().push(value);
    }
    groups
}

// =============================================================================
// SINGLE-THREADED
// =============================================================================

/// Multi-value index mutated through `&mut self`. Bags keep insertion order.
#[derive(Debug, Clone)]
pub struct Index<V, S: IndexSpec<V>> {
    spec: S,
    map: HashMap<S::Key, Vec<V>>,
}

impl<V: PartialEq, S: IndexSpec<V>> Index<V, S> {
    pub fn new(spec: S) -> Self {
        Self {
            spec,
            map: HashMap::new(),
        }
    }

    pub fn with_values(spec: S, values: impl IntoIterator<Item = V>) -> Self {
        let mut index = Self::new(spec);
        index.add_all(values);
        index
    }

    pub fn spec(&self) -> &S {
        &self.spec
    }

    /// Values under `key`; empty when the key is absent.
    pub fn get(&self, key: &S::Key) -> &[V] {
        self.map.get(key).map_or(&[], Vec::as_slice)
    }

    pub fn add(&mut self, value: V) {
        let key = self.spec.key(&value);
        self.map.entry(key).or_default().push(value);
    }

    pub fn add_all(&mut self, values: impl IntoIterator<Item = V>) {
        for value in values {
            self.add(value);
        }
    }

    /// Remove one occurrence of `value`. Returns whether one was found.
    pub fn remove(&mut self, value: &V) -> bool {
        let Entry::Occupied(mut slot) = self.map.entry(self.spec.key(value)) else {
            return false;
        };
        let Some(position) = slot.get().iter().position(|v| v == value) else {
            return false;
        };
        slot.get_mut().remove(position);
        if slot.get().is_empty() {
            slot.remove();
        }
        true
    }

    /// Remove every occurrence of each value, one pass per derived key.
    /// Values that are not present are ignored.
    pub fn remove_all<'v>(&mut self, values: impl IntoIterator<Item = &'v V>)
    where
        V: 'v,
    {
        for (key, doomed) in group_by_key(&self.spec, values) {
            if let Entry::Occupied(mut slot) = self.map.entry(key) {
                slot.get_mut().retain(|v| !doomed.contains(&v));
                if slot.get().is_empty() {
                    slot.remove();
                }
            }
        }
    }

    /// Number of keys with at least one value.
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

/// Multi-value index safe for concurrent use through `&self`.
///
/// Each bag is an immutable `Arc<[V]>` replaced wholesale on every change
/// while the key's shard is locked. Readers holding an older bag keep
/// seeing it unchanged; there is no atomicity across keys.
#[derive(Debug)]
pub struct ConcurrentIndex<V, S: IndexSpec<V>> {
    spec: S,
    map: DashMap<S::Key, Arc<[V]>>,
}

impl<V: PartialEq + Clone, S: IndexSpec<V>> ConcurrentIndex<V, S> {
    pub fn new(spec: S) -> Self {
        Self {
            spec,
            map: DashMap::new(),
        }
    }

    pub fn with_values(spec: S, values: impl IntoIterator<Item = V>) -> Self {
        let index = Self::new(spec);
        index.add_all(values);
        index
    }

    pub fn spec(&self) -> &S {
        &self.spec
    }

    /// Snapshot of the bag under `key`; empty when the key is absent.
    pub fn get(&self, key: &S::Key) -> Arc<[V]> {
        self.map
            .get(key)
            .map_or_else(|| Arc::from(Vec::new()), |bag| Arc::clone(bag.value()))
    }

    pub fn add(&self, value: V) {
        match self.map.entry(self.spec.key(&value)) {
            DashEntry::Occupied(mut slot) => {
                let mut next = Vec::with_capacity(slot.get().len() + 1);
                next.extend_from_slice(slot.get());
                next.push(value);
                slot.insert(Arc::from(next));
            }
            DashEntry::Vacant(slot) => {
                slot.insert(Arc::from(vec![value]));
            }
        }
    }

    pub fn add_all(&self, values: impl IntoIterator<Item = V>) {
        for value in values {
            self.add(value);
        }
    }

    pub fn remove(&self, value: &V) -> bool {
        let DashEntry::Occupied(mut slot) = self.map.entry(self.spec.key(value)) else {
            return false;
        };
        let Some(position) = slot.get().iter().position(|v| v == value) else {
            return false;
        };
        if slot.get().len() == 1 {
            slot.remove();
        } else {
            let mut next = slot.get().to_vec();
            next.remove(position);
            slot.insert(Arc::from(next));
        }
        true
    }

    pub fn remove_all<'v>(&self, values: impl IntoIterator<Item = &'v V>)
    where
        V: 'v,
    {
        for (key, doomed) in group_by_key(&self.spec, values) {
            if let DashEntry::Occupied(mut slot) = self.map.entry(key) {
                let next: Vec<V> = slot
                    .get()
                    .iter()
                    .filter(|v| !doomed.contains(v))
                    .cloned()
                    .collect();
                if next.is_empty() {
                    slot.remove();
                } else if next.len() != slot.get().len() {
                    slot.insert(Arc::from(next));
                }
            }
        }
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
