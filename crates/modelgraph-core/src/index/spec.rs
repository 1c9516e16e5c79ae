//! Key extraction strategies.

use crate::graph::Node;
use crate::types::NodeId;
use std::borrow::Borrow;
use std::fmt::Debug;
use std::hash::Hash;

/// Derives the index key of a value. Must be a pure function of the value.
pub trait IndexSpec<V> {
    type Key: Eq + Hash + Clone + Debug;

    fn key(&self, value: &V) -> Self::Key;
}

impl<V, K, F> IndexSpec<V> for F
where
    F: Fn(&V) -> K,
    K: Eq + Hash + Clone + Debug,
{
    type Key = K;

    fn key(&self, value: &V) -> K {
        self(value)
    }
}

/// Key: the node's name.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameSpec;

impl<V: Borrow<Node>> IndexSpec<V> for NameSpec {
    type Key = String;

    fn key(&self, value: &V) -> String {
        value.borrow().name.clone()
    }
}

/// Key: the file of the node's source location, `None` when it has none.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceIdSpec;

impl<V: Borrow<Node>> IndexSpec<V> for SourceIdSpec {
    type Key = Option<String>;

    fn key(&self, value: &V) -> Option<String> {
        value
            .borrow()
            .source_information
            .as_ref()
            .map(|source| source.source_id.clone())
    }
}

/// Key: the first value of a named property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyValueSpec {
    property: String,
}

impl PropertyValueSpec {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
        }
    }
}

impl<V: Borrow<Node>> IndexSpec<V> for PropertyValueSpec {
    type Key = Option<NodeId>;

    fn key(&self, value: &V) -> Option<NodeId> {
        value.borrow().values(&self.property).first().copied()
    }
}
