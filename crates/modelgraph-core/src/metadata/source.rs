//! Classifier-partitioned instance sources.
//!
//! An [`ObjSource`] holds encoded [`Obj`] records grouped by classifier path
//! and keyed by identifier. The lazy store reads through this trait only, so
//! the records may live in memory ([`MemoryObjSource`]) or on disk
//! ([`RedbObjSource`](crate::storage::RedbObjSource)).

use super::{Obj, RValue};
use crate::graph::{Node, Repository};
use crate::primitives::ENUMERATION_TYPE_NAME;
use crate::types::{GraphError, NodeId};
use std::collections::BTreeMap;

/// Read access to encoded instances, partitioned by classifier.
pub trait ObjSource: Send + Sync {
    fn has_classifier(&self, classifier: &str) -> Result<bool, GraphError>;

    /// Identifiers of every instance of `classifier`, in order.
    fn classifier_instance_ids(&self, classifier: &str) -> Result<Vec<String>, GraphError>;

    /// Decode the listed instances, in the order asked.
    ///
    /// Fails with `ClassifierNotFound` or `InstanceNotFound` on the first miss.
    fn get_instances(&self, classifier: &str, ids: &[String]) -> Result<Vec<Obj>, GraphError>;

    fn get_instance(&self, classifier: &str, id: &str) -> Result<Obj, GraphError> {
        self.get_instances(classifier, &[id.to_string()])?
            .pop()
            .ok_or_else(|| GraphError::InstanceNotFound {
                classifier: classifier.to_string(),
                id: id.to_string(),
            })
    }
}

// =============================================================================
// IN-MEMORY SOURCE
// =============================================================================

/// Encoded partitions held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjSource {
    partitions: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
}

impl MemoryObjSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode and store `obj`, replacing any record with the same key.
    pub fn insert(&mut self, obj: &Obj) -> Result<(), GraphError> {
        let bytes = obj.to_bytes()?;
        self.partitions
            .entry(obj.classifier.clone())
            .or_default()
            .insert(obj.identifier.clone(), bytes);
        Ok(())
    }

    /// Classifier paths, in order.
    pub fn classifiers(&self) -> impl Iterator<Item = &str> {
        self.partitions.keys().map(String::as_str)
    }

    /// Number of records in one partition.
    pub fn partition_len(&self, classifier: &str) -> usize {
        self.partitions.get(classifier).map_or(0, BTreeMap::len)
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.partitions.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Total encoded size of all records.
    pub fn encoded_size(&self) -> usize {
        self.partitions
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum()
    }

    fn partition(&self, classifier: &str) -> Result<&BTreeMap<String, Vec<u8>>, GraphError> {
        self.partitions
            .get(classifier)
            .ok_or_else(|| GraphError::ClassifierNotFound {
                classifier: classifier.to_string(),
            })
    }
}

impl ObjSource for MemoryObjSource {
    fn has_classifier(&self, classifier: &str) -> Result<bool, GraphError> {
        Ok(self.partitions.contains_key(classifier))
    }

    fn classifier_instance_ids(&self, classifier: &str) -> Result<Vec<String>, GraphError> {
        Ok(self.partition(classifier)?.keys().cloned().collect())
    }

    fn get_instances(&self, classifier: &str, ids: &[String]) -> Result<Vec<Obj>, GraphError> {
        let partition = self.partition(classifier)?;
        ids.iter()
            .map(|id| {
                let bytes = partition.get(id).ok_or_else(|| GraphError::InstanceNotFound {
                    classifier: classifier.to_string(),
                    id: id.clone(),
                })?;
                Obj::from_bytes(bytes)
            })
            .collect()
    }
}

// =============================================================================
// PARTITIONING A REPOSITORY
// =============================================================================

/// Resolves node ids to the string keys instances are stored under.
struct Partitioner<'r> {
    repo: &'r Repository,
    paths: BTreeMap<NodeId, String>,
}

impl<'r> Partitioner<'r> {
    fn new(repo: &'r Repository) -> Self {
        Self {
            repo,
            paths: repo.element_paths(),
        }
    }

    fn classifier_of(&self, node: &Node) -> Result<&'r Node, GraphError> {
        self.repo.classifier_of(node.id)
    }

    /// Element path when reachable through `children`, the name otherwise.
    fn path(&self, node: &Node) -> String {
        self.paths
            .get(&node.id)
            .cloned()
            .unwrap_or_else(|| node.name.clone())
    }

    /// A node is an enumeration member when its classifier is an `Enumeration`.
    fn is_enum_member(&self, node: &Node) -> bool {
        node.classifier
            .and_then(|id| self.repo.get(id))
            .and_then(|enumeration| enumeration.classifier)
            .and_then(|id| self.repo.get(id))
            .is_some_and(|meta| meta.name == ENUMERATION_TYPE_NAME)
    }

    fn identifier(&self, node: &Node) -> String {
        if self.is_enum_member(node) {
            return node.name.clone();
        }
        self.paths
            .get(&node.id)
            .cloned()
            .unwrap_or_else(|| node.id.to_string())
    }

    fn value(&self, id: NodeId) -> Result<RValue, GraphError> {
        let node = self.repo.node(id)?;
        if let Some(primitive) = node.primitive() {
            return Ok(RValue::Primitive(primitive.clone()));
        }
        let classifier = self.classifier_of(node)?;
        if self.is_enum_member(node) {
            return Ok(RValue::EnumRef {
                enumeration: self.path(classifier),
                member: node.name.clone(),
            });
        }
        Ok(RValue::ObjRef {
            classifier: self.path(classifier),
            id: self.identifier(node),
        })
    }

    fn obj(&self, node: &Node) -> Result<Obj, GraphError> {
        let classifier = self.classifier_of(node)?;
        let properties = node
            .properties()
            .iter()
            .map(|entry| {
                let values = entry
                    .values
                    .iter()
                    .map(|value| self.value(*value))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((entry.name().to_string(), values))
            })
            .collect::<Result<Vec<_>, GraphError>>()?;
        Ok(Obj {
            classifier: self.path(classifier),
            identifier: self.identifier(node),
            name: node.name.clone(),
            source_information: node.source_information.clone(),
            properties,
            is_enum: self.is_enum_member(node),
        })
    }
}

/// Flatten a repository into classifier-keyed records.
///
/// Primitive nodes become inline values and are not emitted. Nodes without
/// a classifier are skipped. A property value without a classifier fails
/// with `MissingClassifier`.
pub fn objs_from_repository(repo: &Repository) -> Result<Vec<Obj>, GraphError> {
    let partitioner = Partitioner::new(repo);
    repo.nodes()
        .filter(|node| !node.is_primitive() && node.classifier.is_some())
        .map(|node| partitioner.obj(node))
        .collect()
}

/// Encode a repository into an in-memory source.
pub fn partition_repository(repo: &Repository) -> Result<MemoryObjSource, GraphError> {
    let mut source = MemoryObjSource::new();
    for obj in objs_from_repository(repo)? {
        source.insert(&obj)?;
    }
    tracing::debug!(
        classifiers = source.partitions.len(),
        instances = source.len(),
        "repository partitioned"
    );
    Ok(source)
}
