//! # Secondary Indexes
//!
//! Lookup structures over graph values, keyed by a derived key.
//!
//! Two families, each in a plain (`&mut self`) and a concurrent (`&self`,
//! `DashMap`-backed) flavour:
//! - [`IdIndex`] / [`ConcurrentIdIndex`]: exactly one value per key
//! - [`Index`] / [`ConcurrentIndex`]: an ordered bag of values per key
//!
//! The key is computed by an [`IndexSpec`]. Any `Fn(&V) -> K` closure is a
//! spec; [`NameSpec`], [`SourceIdSpec`] and [`PropertyValueSpec`] cover the
//! common node keys for anything that borrows as a [`Node`](crate::graph::Node).

mod id_index;
mod multi;
mod spec;

pub use id_index::{ConcurrentIdIndex, IdIndex};
pub use multi::{ConcurrentIndex, Index};
pub use spec::{IndexSpec, NameSpec, PropertyValueSpec, SourceIdSpec};

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::graph::{NodeKind, Repository};
    use crate::types::NodeId;
    use std::sync::Arc;

    #[test]
    fn property_value_spec_indexes_arena_nodes() {
        let mut repo = Repository::new();
        let class = repo.new_top_level("Class", None, None).unwrap();
        repo.set_classifier(class, class).unwrap();
        let owner = repo.new_node("owner", class, None).unwrap();
        let alice = repo.new_primitive(NodeKind::String, "alice").unwrap();
        let a = repo.new_node("a", class, None).unwrap();
        let b = repo.new_node("b", class, None).unwrap();
        let c = repo.new_node("c", class, None).unwrap();
        repo.set_property(a, owner, vec![alice]).unwrap();
        repo.set_property(b, owner, vec![alice]).unwrap();

        let nodes: Vec<Arc<_>> = [a, b, c]
            .iter()
            .map(|id| Arc::new(repo.get(*id).unwrap().clone()))
            .collect();
        let index = ConcurrentIndex::with_values(PropertyValueSpec::new("owner"), nodes);

        let owned: Vec<NodeId> = index.get(&Some(alice)).iter().map(|n| n.id).collect();
        assert_eq!(owned, vec![a, b]);
        assert_eq!(index.get(&None).len(), 1);
    }
}
