//! Graph vertex and its property entries.

use super::value::{NodeKind, PrimitiveValue};
use crate::types::{CompileStates, NodeId, SourceInformation};
use serde::{Deserialize, Serialize};

/// One property of a node: the key node, its real key path, and the ordered
/// value references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyEntry {
    /// Node standing for the property itself.
    pub key: NodeId,
    /// Canonical segmented name of the key. Never empty.
    pub real_key: Vec<String>,
    pub values: Vec<NodeId>,
}

impl PropertyEntry {
    /// Property name: the last real-key segment.
    #[must_use]
    pub fn name(&self) -> &str {
        self.real_key.last().map_or("", String::as_str)
    }
}

/// The fundamental graph vertex.
///
/// Nodes refer to each other by [`NodeId`] only; the owning
/// [`Repository`](super::Repository) is the arena that resolves them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    /// Unset only while a deserialization is between its two passes.
    pub classifier: Option<NodeId>,
    pub source_information: Option<SourceInformation>,
    pub compile_states: CompileStates,
    /// Present on nodes used as property keys.
    pub real_key_path: Option<Vec<String>>,
    properties: Vec<PropertyEntry>,
    primitive: Option<PrimitiveValue>,
}

impl Node {
    #[must_use]
    pub fn new(
        id: NodeId,
        name: impl Into<String>,
        classifier: Option<NodeId>,
        source_information: Option<SourceInformation>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            classifier,
            source_information,
            compile_states: CompileStates::empty(),
            real_key_path: None,
            properties: Vec::new(),
            primitive: None,
        }
    }

    /// Build a primitive node. `name` must already be the literal of `value`.
    #[must_use]
    pub fn new_primitive(
        id: NodeId,
        name: impl Into<String>,
        classifier: Option<NodeId>,
        value: PrimitiveValue,
    ) -> Self {
        let mut node = Self::new(id, name, classifier, None);
        node.primitive = Some(value);
        node
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.primitive
            .as_ref()
            .map_or(NodeKind::Generic, PrimitiveValue::kind)
    }

    #[must_use]
    pub fn primitive(&self) -> Option<&PrimitiveValue> {
        self.primitive.as_ref()
    }

    #[must_use]
    pub fn is_primitive(&self) -> bool {
        self.primitive.is_some()
    }

    /// Properties in insertion order.
    #[must_use]
    pub fn properties(&self) -> &[PropertyEntry] {
        &self.properties
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyEntry> {
        self.properties.iter().find(|entry| entry.name() == name)
    }

    /// Values of the named property; empty when the property is absent.
    #[must_use]
    pub fn values(&self, name: &str) -> &[NodeId] {
        self.property(name).map_or(&[], |entry| &entry.values)
    }

    /// Replace the values of a property, keeping its position if it exists.
    pub fn set_property(&mut self, key: NodeId, real_key: Vec<String>, values: Vec<NodeId>) {
        match self.entry_mut(key, &real_key) {
            Some(entry) => {
                entry.key = key;
                entry.real_key = real_key;
                entry.values = values;
            }
            None => self.properties.push(PropertyEntry {
                key,
                real_key,
                values,
            }),
        }
    }

    /// Append one value to a property, creating the property if needed.
    pub fn add_value(&mut self, key: NodeId, real_key: Vec<String>, value: NodeId) {
        match self.entry_mut(key, &real_key) {
            Some(entry) => entry.values.push(value),
            None => self.properties.push(PropertyEntry {
                key,
                real_key,
                values: vec![value],
            }),
        }
    }

    /// Drop a property entirely. Returns its values if it was present.
    pub fn remove_property(&mut self, name: &str) -> Option<Vec<NodeId>> {
        let index = self.properties.iter().position(|e| e.name() == name)?;
        Some(self.properties.remove(index).values)
    }

    fn entry_mut(&mut self, key: NodeId, real_key: &[String]) -> Option<&mut PropertyEntry> {
        let name = real_key.last().map(String::as_str);
        self.properties
            .iter_mut()
            .find(|entry| entry.key == key || Some(entry.name()) == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> Vec<String> {
        vec!["meta".to_string(), name.to_string()]
    }

    #[test]
    fn properties_keep_insertion_order() {
        let mut node = Node::new(NodeId(1), "C", None, None);
        node.set_property(NodeId(10), key("b"), vec![NodeId(2)]);
        node.set_property(NodeId(11), key("a"), vec![NodeId(3)]);
        node.set_property(NodeId(10), key("b"), vec![NodeId(4), NodeId(5)]);

        let names: Vec<&str> = node.properties().iter().map(PropertyEntry::name).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(node.values("b"), &[NodeId(4), NodeId(5)]);
    }

    #[test]
    fn add_value_appends() {
        let mut node = Node::new(NodeId(1), "C", None, None);
        node.add_value(NodeId(10), key("p"), NodeId(2));
        node.add_value(NodeId(10), key("p"), NodeId(3));
        assert_eq!(node.values("p"), &[NodeId(2), NodeId(3)]);
        assert!(node.values("missing").is_empty());

        assert_eq!(node.remove_property("p"), Some(vec![NodeId(2), NodeId(3)]));
        assert!(node.properties().is_empty());
    }

    #[test]
    fn primitive_nodes_report_their_kind() {
        let node = Node::new_primitive(NodeId(3), "7", None, PrimitiveValue::Integer(7));
        assert_eq!(node.kind(), NodeKind::Integer);
        assert!(node.is_primitive());
        assert_eq!(Node::new(NodeId(4), "x", None, None).kind(), NodeKind::Generic);
    }
}
