//! # Graph Arena
//!
//! The in-memory model graph.
//!
//! Nodes live in a flat `BTreeMap<NodeId, Node>` and reference each other
//! by id, so cycles and shared references need no ownership tricks.
//! Top-level nodes are additionally registered by name.
//!
//! All maps are `BTreeMap` for deterministic iteration.

mod node;
mod value;

pub use node::{Node, PropertyEntry};
pub use value::{NodeKind, PrimitiveValue, PureDate};

use crate::primitives::{CHILDREN_PROPERTY, PATH_SEPARATOR};
use crate::types::{GraphError, NodeId, SourceInformation};
use std::collections::BTreeMap;

/// Name of the package that holds top-level packages when the graph has one.
pub const ROOT_PACKAGE: &str = "Root";

/// Prefix of the generated names of anonymous nodes.
pub const ANONYMOUS_PREFIX: &str = "@_";

// =============================================================================
// REPOSITORY
// =============================================================================

/// Owning arena for one model graph.
#[derive(Debug, Clone, Default)]
pub struct Repository {
    nodes: BTreeMap<NodeId, Node>,
    top_levels: BTreeMap<String, NodeId>,
    id_counter: i32,
    anonymous_id_counter: i32,
}

impl Repository {
    /// Create a new empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Counters
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn id_counter(&self) -> i32 {
        self.id_counter
    }

    #[must_use]
    pub fn anonymous_id_counter(&self) -> i32 {
        self.anonymous_id_counter
    }

    /// Overwrite both counters, as restored from a serialized header.
    pub fn set_counters(&mut self, id_counter: i32, anonymous_id_counter: i32) {
        self.id_counter = id_counter;
        self.anonymous_id_counter = anonymous_id_counter;
    }

    /// Allocate the next id not already present in the arena.
    fn next_id(&mut self) -> Result<NodeId, GraphError> {
        loop {
            let id = NodeId(self.id_counter);
            self.id_counter = self.id_counter.checked_add(1).ok_or_else(|| {
                GraphError::InternalConsistency("node id counter overflow".to_string())
            })?;
            if !self.nodes.contains_key(&id) {
                return Ok(id);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Create a named node of the given classifier.
    pub fn new_node(
        &mut self,
        name: impl Into<String>,
        classifier: NodeId,
        source_information: Option<SourceInformation>,
    ) -> Result<NodeId, GraphError> {
        self.require(classifier)?;
        let id = self.next_id()?;
        self.nodes.insert(
            id,
            Node::new(id, name, Some(classifier), source_information),
        );
        Ok(id)
    }

    /// Create a node with a generated `@_<n>` name.
    pub fn new_anonymous_node(
        &mut self,
        classifier: NodeId,
        source_information: Option<SourceInformation>,
    ) -> Result<NodeId, GraphError> {
        let name = format!("{ANONYMOUS_PREFIX}{}", self.anonymous_id_counter);
        self.anonymous_id_counter = self.anonymous_id_counter.checked_add(1).ok_or_else(|| {
            GraphError::InternalConsistency("anonymous id counter overflow".to_string())
        })?;
        self.new_node(name, classifier, source_information)
    }

    /// Create and register a top-level node.
    ///
    /// The classifier may be omitted while bootstrapping self-describing
    /// meta-classes; set it afterwards with [`Repository::set_classifier`].
    pub fn new_top_level(
        &mut self,
        name: impl Into<String>,
        classifier: Option<NodeId>,
        source_information: Option<SourceInformation>,
    ) -> Result<NodeId, GraphError> {
        let name = name.into();
        if self.top_levels.contains_key(&name) {
            return Err(GraphError::DuplicateTopLevel(name));
        }
        if let Some(classifier) = classifier {
            self.require(classifier)?;
        }
        let id = self.next_id()?;
        self.top_levels.insert(name.clone(), id);
        self.nodes
            .insert(id, Node::new(id, name, classifier, source_information));
        Ok(id)
    }

    /// Return the top level named `name`, creating an unclassified one if absent.
    pub fn get_or_create_top_level(&mut self, name: &str) -> Result<NodeId, GraphError> {
        match self.top_levels.get(name) {
            Some(id) => Ok(*id),
            None => self.new_top_level(name, None, None),
        }
    }

    /// Create a primitive node. Its classifier is the top level named after
    /// the kind, created on first use.
    pub fn new_primitive(&mut self, kind: NodeKind, literal: &str) -> Result<NodeId, GraphError> {
        let type_name = kind.type_name().ok_or(GraphError::Unsupported(
            "generic kind has no primitive representation",
        ))?;
        let value = PrimitiveValue::parse(kind, literal)?.ok_or(GraphError::Unsupported(
            "generic kind has no primitive representation",
        ))?;
        let classifier = self.get_or_create_top_level(type_name)?;
        let id = self.next_id()?;
        self.nodes.insert(
            id,
            Node::new_primitive(id, literal, Some(classifier), value),
        );
        Ok(id)
    }

    /// Insert a fully built node under its own id.
    ///
    /// The id counter is not advanced; later allocations skip taken ids.
    pub fn insert_with_id(&mut self, node: Node) -> Result<NodeId, GraphError> {
        let id = node.id;
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateNodeId(id));
        }
        self.nodes.insert(id, node);
        Ok(id)
    }

    /// Allocate a fresh id for `node` and insert it.
    pub fn insert_fresh(&mut self, mut node: Node) -> Result<NodeId, GraphError> {
        let id = self.next_id()?;
        node.id = id;
        self.nodes.insert(id, node);
        Ok(id)
    }

    /// Register an existing node as a top level under its name.
    pub fn add_top_level(&mut self, id: NodeId) -> Result<(), GraphError> {
        let name = self.node(id)?.name.clone();
        match self.top_levels.get(&name) {
            Some(existing) if *existing == id => Ok(()),
            Some(_) => Err(GraphError::DuplicateTopLevel(name)),
            None => {
                self.top_levels.insert(name, id);
                Ok(())
            }
        }
    }

    // -------------------------------------------------------------------------
    // Mutation
    // -------------------------------------------------------------------------

    pub fn set_classifier(&mut self, id: NodeId, classifier: NodeId) -> Result<(), GraphError> {
        self.require(classifier)?;
        self.node_mut(id)?.classifier = Some(classifier);
        Ok(())
    }

    /// Replace a property's values. The real key is taken from the key
    /// node's real key path, or its name when it has none.
    pub fn set_property(
        &mut self,
        owner: NodeId,
        key: NodeId,
        values: Vec<NodeId>,
    ) -> Result<(), GraphError> {
        let real_key = self.real_key_of(key)?;
        self.set_property_with_real_key(owner, key, real_key, values)
    }

    /// Replace a property's values under an explicit real key.
    pub fn set_property_with_real_key(
        &mut self,
        owner: NodeId,
        key: NodeId,
        real_key: Vec<String>,
        values: Vec<NodeId>,
    ) -> Result<(), GraphError> {
        if real_key.is_empty() {
            return Err(GraphError::InternalConsistency(format!(
                "empty real key for property key {key}"
            )));
        }
        for value in &values {
            self.require(*value)?;
        }
        self.node_mut(owner)?.set_property(key, real_key, values);
        Ok(())
    }

    /// Append one value to a property.
    pub fn add_value(&mut self, owner: NodeId, key: NodeId, value: NodeId) -> Result<(), GraphError> {
        let real_key = self.real_key_of(key)?;
        self.require(value)?;
        self.node_mut(owner)?.add_value(key, real_key, value);
        Ok(())
    }

    /// Values of `owner`'s property called `name`.
    pub fn property_values(&self, owner: NodeId, name: &str) -> Result<&[NodeId], GraphError> {
        Ok(self.node(owner)?.values(name))
    }

    fn real_key_of(&self, key: NodeId) -> Result<Vec<String>, GraphError> {
        let key_node = self.node(key)?;
        Ok(key_node
            .real_key_path
            .clone()
            .unwrap_or_else(|| vec![key_node.name.clone()]))
    }

    // -------------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Like [`Repository::get`] but failing with `NodeNotFound`.
    pub fn node(&self, id: NodeId) -> Result<&Node, GraphError> {
        self.nodes.get(&id).ok_or(GraphError::NodeNotFound(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, GraphError> {
        self.nodes.get_mut(&id).ok_or(GraphError::NodeNotFound(id))
    }

    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// The classifier node of `id`.
    pub fn classifier_of(&self, id: NodeId) -> Result<&Node, GraphError> {
        let classifier = self
            .node(id)?
            .classifier
            .ok_or(GraphError::MissingClassifier(id))?;
        self.node(classifier)
    }

    #[must_use]
    pub fn top_level(&self, name: &str) -> Option<NodeId> {
        self.top_levels.get(name).copied()
    }

    #[must_use]
    pub fn is_top_level(&self, id: NodeId) -> bool {
        self.nodes
            .get(&id)
            .is_some_and(|node| self.top_levels.get(&node.name) == Some(&id))
    }

    /// Top-level ids in name order.
    pub fn top_levels(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.top_levels.values().copied()
    }

    #[must_use]
    pub fn top_level_count(&self) -> usize {
        self.top_levels.len()
    }

    /// All nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Resolve `a::b::C` starting at a top level and following `children`.
    ///
    /// A path whose first segment is not a top level is retried from the
    /// root package when one exists.
    #[must_use]
    pub fn resolve_path(&self, path: &str) -> Option<NodeId> {
        let mut segments = path.split(PATH_SEPARATOR);
        let first = segments.next()?;
        match self.top_level(first) {
            Some(start) => self.walk_children(start, segments),
            None => {
                let root = self.top_level(ROOT_PACKAGE)?;
                self.walk_children(root, path.split(PATH_SEPARATOR))
            }
        }
    }

    fn walk_children<'p>(
        &self,
        start: NodeId,
        segments: impl Iterator<Item = &'p str>,
    ) -> Option<NodeId> {
        let mut current = start;
        for segment in segments {
            current = self
                .get(current)?
                .values(CHILDREN_PROPERTY)
                .iter()
                .copied()
                .find(|child| self.get(*child).is_some_and(|n| n.name == segment))?;
        }
        Some(current)
    }

    /// Full `::`-separated path of a node, following `children` links
    /// from the top levels. `None` when the node is not reachable that way.
    #[must_use]
    pub fn path_of(&self, id: NodeId) -> Option<String> {
        self.element_paths().remove(&id)
    }

    /// Path of every node reachable from the top levels through `children`.
    ///
    /// Members of the root package are named without a `Root` prefix. When
    /// a node is reachable along several routes, the first one found wins.
    #[must_use]
    pub fn element_paths(&self) -> BTreeMap<NodeId, String> {
        let root = self.top_level(ROOT_PACKAGE);
        let mut paths: BTreeMap<NodeId, String> = BTreeMap::new();
        let mut stack: Vec<(NodeId, Option<String>)> = self
            .top_levels
            .iter()
            .rev()
            .map(|(name, id)| {
                let path = (Some(*id) != root).then(|| name.clone());
                (*id, path)
            })
            .collect();

        while let Some((current, path)) = stack.pop() {
            if paths.contains_key(&current) {
                continue;
            }
            let Some(node) = self.get(current) else {
                continue;
            };
            for child in node.values(CHILDREN_PROPERTY).iter().rev() {
                if paths.contains_key(child) {
                    continue;
                }
                let Some(child_node) = self.get(*child) else {
                    continue;
                };
                let child_path = match &path {
                    Some(prefix) => format!("{prefix}{PATH_SEPARATOR}{}", child_node.name),
                    None => child_node.name.clone(),
                };
                stack.push((*child, Some(child_path)));
            }
            paths.insert(current, path.unwrap_or_else(|| node.name.clone()));
        }
        paths
    }

    fn require(&self, id: NodeId) -> Result<(), GraphError> {
        if self.nodes.contains_key(&id) {
            Ok(())
        } else {
            Err(GraphError::NodeNotFound(id))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
