//! # Repository Serializer
//!
//! Binary wire format for whole model graphs.
//!
//! Layout (all integers big-endian Int32, strings length-prefixed UTF-8):
//! - `idCounter`, `anonymousIdCounter`
//! - file-name table (string array, ordered by assigned file id)
//! - top-level ids (int array, ascending)
//! - `nodeCount`, then per node: the node record as a byte array, a
//!   "has real key path" boolean and, if set, the path as a string array
//!
//! A node record is `id, classifierId, name, compileState`, the source
//! marker (`-1` or a file id followed by six positions), then
//! `propertyCount` entries of `keyId, valueIds[]`.
//!
//! ## Walk
//!
//! Serialization walks from the top levels with an explicit stack and a
//! done set, so deep or cyclic graphs never grow the call stack and every
//! node is written once. The node table is emitted in ascending id order,
//! so saving a freshly loaded graph reproduces the input byte for byte.
//!
//! ## Build
//!
//! Loading is two-pass: every record becomes a live node first, then
//! classifiers and property values are wired by id. Property values may
//! point forward, so nothing is dereferenced before all nodes exist.
//!
//! ## Validation
//!
//! The declared node count is checked against [`Limits`] before the node
//! table is allocated; every length prefix is bounded by the reader.

use crate::codec::{BufferWriter, Reader, SliceReader, Writer};
use crate::graph::{Node, NodeKind, PrimitiveValue, Repository};
use crate::primitives::{Limits, NO_SOURCE_INFORMATION};
use crate::types::{CompileStates, GraphError, NodeId, SourceInformation};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::collections::hash_map::Entry;

/// Upper bound on capacity reserved up front from a declared count.
const PREALLOCATE_LIMIT: usize = 4096;

// =============================================================================
// OPTIONS AND SUMMARIES
// =============================================================================

/// Optional collaborators for [`BinaryRepositorySerializer::build`].
#[derive(Clone, Copy, Default)]
pub struct BuildOptions<'a> {
    /// Receives human-readable progress at pass boundaries.
    pub message: Option<&'a dyn Fn(&str)>,
    /// Classifier ids to element paths in the target repository. When set,
    /// classifiers are resolved by path and every node gets a fresh id.
    pub classifier_id_to_path: Option<&'a HashMap<i32, String>>,
}

impl BuildOptions<'_> {
    fn report(&self, text: &str) {
        if let Some(message) = self.message {
            message(text);
        }
    }
}

/// Counts describing one serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SerializeSummary {
    pub node_count: usize,
    pub file_count: usize,
    pub top_level_count: usize,
}

/// Header of a serialized repository, read without building any node.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct HeaderSummary {
    pub id_counter: i32,
    pub anonymous_id_counter: i32,
    pub file_names: Vec<String>,
    pub top_level_ids: Vec<i32>,
    pub node_count: usize,
    /// Records carrying a real key path.
    pub real_key_path_count: usize,
}

/// A node as read from the wire, with every reference still a raw id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntermediateNode {
    pub id: i32,
    pub classifier_id: i32,
    pub name: String,
    pub compile_states: CompileStates,
    pub source_information: Option<SourceInformation>,
    /// `(key node id, value ids)` in the node's property order.
    pub properties: Vec<(i32, Vec<i32>)>,
    pub real_key_path: Option<Vec<String>>,
}

// =============================================================================
// FILE TABLE
// =============================================================================

/// File names interned in first-seen order.
#[derive(Debug, Default)]
struct FileTable {
    ids: HashMap<String, i32>,
    names: Vec<String>,
}

impl FileTable {
    fn intern(&mut self, name: &str) -> Result<i32, GraphError> {
        if let Some(id) = self.ids.get(name) {
            return Ok(*id);
        }
        let id = i32::try_from(self.names.len()).map_err(|_| GraphError::LimitExceeded {
            what: "file table size",
            value: self.names.len() as u64,
            limit: i32::MAX as u64,
        })?;
        self.ids.insert(name.to_string(), id);
        self.names.push(name.to_string());
        Ok(id)
    }
}

// =============================================================================
// SERIALIZER
// =============================================================================

/// Reads and writes [`Repository`] graphs in the binary wire format.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryRepositorySerializer {
    limits: Limits,
}

impl BinaryRepositorySerializer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_limits(limits: Limits) -> Self {
        Self { limits }
    }

    #[must_use]
    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Serialize everything reachable from the repository's top levels.
    pub fn serialize<W: Writer>(
        &self,
        repo: &Repository,
        writer: &mut W,
    ) -> Result<SerializeSummary, GraphError> {
        let top_levels: Vec<NodeId> = repo.top_levels().collect();
        self.serialize_top_levels(repo, &top_levels, writer)
    }

    /// Serialize everything reachable from `top_levels`.
    ///
    /// Classifiers and property key nodes are followed like values, so the
    /// output is closed under every reference it contains.
    pub fn serialize_top_levels<W: Writer>(
        &self,
        repo: &Repository,
        top_levels: &[NodeId],
        writer: &mut W,
    ) -> Result<SerializeSummary, GraphError> {
        let mut serialized: BTreeMap<NodeId, Vec<u8>> = BTreeMap::new();
        let mut done: HashSet<NodeId> = HashSet::new();
        let mut key_paths: HashMap<NodeId, &[String]> = HashMap::new();
        let mut files = FileTable::default();
        let mut buffer = BufferWriter::new();
        let mut stack: Vec<NodeId> = Vec::new();

        for &top in top_levels {
            stack.push(top);
            while let Some(id) = stack.pop() {
                if !done.insert(id) {
                    continue;
                }
                let node = repo.node(id)?;
                let classifier = node.classifier.ok_or(GraphError::MissingClassifier(id))?;
                if !done.contains(&classifier) {
                    stack.push(classifier);
                }

                buffer.clear();
                write_node_record(node, classifier, &mut files, &mut buffer)?;

                for entry in node.properties() {
                    if !done.contains(&entry.key) {
                        stack.push(entry.key);
                    }
                    key_paths.entry(entry.key).or_insert(&entry.real_key);
                    for value in &entry.values {
                        if !done.contains(value) {
                            stack.push(*value);
                        }
                    }
                }

                if serialized.insert(id, buffer.as_bytes().to_vec()).is_some() {
                    return Err(GraphError::InternalConsistency(format!(
                        "node {id} serialized twice"
                    )));
                }
            }
        }

        let mut top_ids: Vec<i32> = top_levels.iter().map(|id| id.value()).collect();
        top_ids.sort_unstable();
        top_ids.dedup();

        writer.write_int(repo.id_counter())?;
        writer.write_int(repo.anonymous_id_counter())?;
        writer.write_string_array(&files.names)?;
        writer.write_int_array(&top_ids)?;
        writer.write_length(serialized.len())?;
        for (id, bytes) in &serialized {
            writer.write_byte_array(bytes)?;
            match key_paths.get(id) {
                Some(&path) => {
                    writer.write_boolean(true)?;
                    writer.write_string_array(path)?;
                }
                None => writer.write_boolean(false)?,
            }
        }
        writer.flush()?;

        let summary = SerializeSummary {
            node_count: serialized.len(),
            file_count: files.names.len(),
            top_level_count: top_ids.len(),
        };
        tracing::debug!(
            nodes = summary.node_count,
            files = summary.file_count,
            top_levels = summary.top_level_count,
            "serialized repository"
        );
        Ok(summary)
    }

    /// Rebuild a serialized graph into `repo`.
    ///
    /// Returns the serialized id of every record mapped to its live id. The
    /// two are equal unless `options.classifier_id_to_path` is set.
    ///
    /// Only a non-top-level node whose classifier is a top level is built as
    /// a primitive, and only when that classifier's name is a primitive type
    /// name. Every record is checked first (primitive literals, id and
    /// top-level name conflicts, dangling references), so a failed build
    /// leaves `repo` untouched.
    pub fn build<R: Reader>(
        &self,
        reader: &mut R,
        repo: &mut Repository,
        options: &BuildOptions<'_>,
    ) -> Result<BTreeMap<i32, NodeId>, GraphError> {
        // ---- Pass 0: header and intermediate records ----
        options.report("Reading header");
        let id_counter = reader.read_int()?;
        let anonymous_id_counter = reader.read_int()?;
        let files = reader.read_string_array()?;
        let top_ids: BTreeSet<i32> = reader.read_int_array()?.into_iter().collect();
        let count = self.read_node_count(reader)?;

        options.report(&format!("Reading {count} nodes"));
        let mut records: Vec<IntermediateNode> = Vec::with_capacity(count.min(PREALLOCATE_LIMIT));
        let mut by_id: HashMap<i32, usize> = HashMap::with_capacity(count.min(PREALLOCATE_LIMIT));
        for _ in 0..count {
            let record = read_intermediate_node(reader, &files)?;
            match by_id.entry(record.id) {
                Entry::Occupied(_) => return Err(GraphError::DuplicateNodeId(NodeId(record.id))),
                Entry::Vacant(slot) => {
                    slot.insert(records.len());
                }
            }
            records.push(record);
        }
        tracing::debug!(nodes = count, files = files.len(), "read repository header");

        // ---- Pass 1: validate, then instantiate ----
        options.report(&format!("Instantiating {count} nodes"));
        let fresh_ids = options.classifier_id_to_path.is_some();
        let mut top_names: HashSet<&str> = HashSet::new();
        let mut prepared: Vec<Node> = Vec::with_capacity(records.len());
        for record in &records {
            let is_top_level = top_ids.contains(&record.id);
            if !fresh_ids && repo.contains(NodeId(record.id)) {
                return Err(GraphError::DuplicateNodeId(NodeId(record.id)));
            }
            if is_top_level
                && (repo.top_level(&record.name).is_some() || !top_names.insert(&record.name))
            {
                return Err(GraphError::DuplicateTopLevel(record.name.clone()));
            }

            let mut kind = NodeKind::Generic;
            if !is_top_level
                && top_ids.contains(&record.classifier_id)
                && let Some(classifier_record) = by_id.get(&record.classifier_id).map(|i| &records[*i])
            {
                kind = NodeKind::from_type_name(&classifier_record.name);
            }

            let mut classifier = None;
            if let Some(paths) = options.classifier_id_to_path
                && let Some(path) = paths.get(&record.classifier_id)
            {
                classifier = repo.resolve_path(path);
                if !is_top_level
                    && kind == NodeKind::Generic
                    && let Some(resolved) = classifier.filter(|c| repo.is_top_level(*c))
                {
                    kind = repo
                        .get(resolved)
                        .map_or(NodeKind::Generic, |c| NodeKind::from_type_name(&c.name));
                }
            }

            let mut node = match PrimitiveValue::parse(kind, &record.name)? {
                Some(value) => Node::new_primitive(
                    NodeId(record.id),
                    record.name.clone(),
                    classifier,
                    value,
                ),
                None => Node::new(
                    NodeId(record.id),
                    record.name.clone(),
                    classifier,
                    None,
                ),
            };
            node.source_information = record.source_information.clone();
            node.compile_states = record.compile_states;
            node.real_key_path = record.real_key_path.clone();
            prepared.push(node);
        }

        let resolvable =
            |id: i32| by_id.contains_key(&id) || (!fresh_ids && repo.contains(NodeId(id)));
        for (record, node) in records.iter().zip(&prepared) {
            if node.classifier.is_none() && !resolvable(record.classifier_id) {
                return Err(GraphError::NodeNotFound(NodeId(record.classifier_id)));
            }
            for (key_id, value_ids) in &record.properties {
                if let Some(missing) = std::iter::once(key_id)
                    .chain(value_ids)
                    .find(|id| !resolvable(**id))
                {
                    return Err(GraphError::NodeNotFound(NodeId(*missing)));
                }
            }
        }

        repo.set_counters(id_counter, anonymous_id_counter);
        let mut id_map: BTreeMap<i32, NodeId> = BTreeMap::new();
        for (record, node) in records.iter().zip(prepared) {
            let live = if fresh_ids {
                repo.insert_fresh(node)?
            } else {
                repo.insert_with_id(node)?
            };
            if top_ids.contains(&record.id) {
                repo.add_top_level(live)?;
            }
            id_map.insert(record.id, live);
        }

        // ---- Pass 2: wire classifiers and properties ----
        options.report(&format!("Wiring {count} nodes"));
        let lookup = |id: i32, repo: &Repository| -> Result<NodeId, GraphError> {
            match id_map.get(&id) {
                Some(live) => Ok(*live),
                None if options.classifier_id_to_path.is_none() && repo.contains(NodeId(id)) => {
                    Ok(NodeId(id))
                }
                None => Err(GraphError::NodeNotFound(NodeId(id))),
            }
        };

        for record in &records {
            let live = lookup(record.id, repo)?;
            if repo.node(live)?.classifier.is_none() {
                let classifier = lookup(record.classifier_id, repo)?;
                repo.node_mut(live)?.classifier = Some(classifier);
            }

            for (key_id, value_ids) in &record.properties {
                let key = lookup(*key_id, repo)?;
                let real_key = match by_id
                    .get(key_id)
                    .and_then(|i| records[*i].real_key_path.clone())
                {
                    Some(path) => path,
                    None => {
                        let key_node = repo.node(key)?;
                        key_node
                            .real_key_path
                            .clone()
                            .unwrap_or_else(|| vec![key_node.name.clone()])
                    }
                };
                let values = value_ids
                    .iter()
                    .map(|value| lookup(*value, repo))
                    .collect::<Result<Vec<_>, _>>()?;
                repo.node_mut(live)?.set_property(key, real_key, values);
            }
        }

        options.report("Done");
        tracing::debug!(nodes = id_map.len(), "built repository");
        Ok(id_map)
    }

    /// Read the header and skip over every node record.
    pub fn inspect_header<R: Reader>(&self, reader: &mut R) -> Result<HeaderSummary, GraphError> {
        let id_counter = reader.read_int()?;
        let anonymous_id_counter = reader.read_int()?;
        let file_names = reader.read_string_array()?;
        let top_level_ids = reader.read_int_array()?;
        let node_count = self.read_node_count(reader)?;

        let mut real_key_path_count = 0;
        for _ in 0..node_count {
            reader.skip_byte_array()?;
            if reader.read_boolean()? {
                real_key_path_count += 1;
                reader.skip_string_array()?;
            }
        }

        Ok(HeaderSummary {
            id_counter,
            anonymous_id_counter,
            file_names,
            top_level_ids,
            node_count,
            real_key_path_count,
        })
    }

    fn read_node_count<R: Reader>(&self, reader: &mut R) -> Result<usize, GraphError> {
        let count = reader.read_length()?;
        if count as u64 > u64::from(self.limits.max_node_count) {
            return Err(GraphError::LimitExceeded {
                what: "node count",
                value: count as u64,
                limit: u64::from(self.limits.max_node_count),
            });
        }
        Ok(count)
    }
}

// =============================================================================
// NODE RECORDS
// =============================================================================

fn write_node_record(
    node: &Node,
    classifier: NodeId,
    files: &mut FileTable,
    out: &mut BufferWriter,
) -> Result<(), GraphError> {
    out.write_int(node.id.value())?;
    out.write_int(classifier.value())?;
    out.write_string(&node.name)?;
    out.write_int(node.compile_states.bits() as i32)?;

    match &node.source_information {
        None => out.write_int(NO_SOURCE_INFORMATION)?,
        Some(source) => {
            out.write_int(files.intern(&source.source_id)?)?;
            out.write_int(source.start_line)?;
            out.write_int(source.start_column)?;
            out.write_int(source.line)?;
            out.write_int(source.column)?;
            out.write_int(source.end_line)?;
            out.write_int(source.end_column)?;
        }
    }

    out.write_length(node.properties().len())?;
    for entry in node.properties() {
        out.write_int(entry.key.value())?;
        let values: Vec<i32> = entry.values.iter().map(|v| v.value()).collect();
        out.write_int_array(&values)?;
    }
    Ok(())
}

/// Read one node-table entry: the record bytes plus the real key path.
///
/// `files` is the file-name table from the header; source markers index it.
pub fn read_intermediate_node<R: Reader>(
    reader: &mut R,
    files: &[String],
) -> Result<IntermediateNode, GraphError> {
    let bytes = reader.read_byte_array()?;
    let mut record = SliceReader::new(&bytes).with_max_length(reader.max_length());

    let id = record.read_int()?;
    let classifier_id = record.read_int()?;
    let name = record.read_string()?;
    let compile_states = CompileStates::from_bits(record.read_int()? as u32);

    let marker = record.read_int()?;
    let source_information = if marker == NO_SOURCE_INFORMATION {
        None
    } else {
        let source_id = usize::try_from(marker)
            .ok()
            .and_then(|i| files.get(i))
            .ok_or_else(|| {
                GraphError::SerializationError(format!(
                    "node {id}: file id {marker} outside file table of {}",
                    files.len()
                ))
            })?;
        Some(SourceInformation::new(
            source_id.clone(),
            record.read_int()?,
            record.read_int()?,
            record.read_int()?,
            record.read_int()?,
            record.read_int()?,
            record.read_int()?,
        ))
    };

    let property_count = record.read_length()?;
    let mut properties = Vec::with_capacity(property_count.min(PREALLOCATE_LIMIT));
    for _ in 0..property_count {
        let key = record.read_int()?;
        let values = record.read_int_array()?;
        properties.push((key, values));
    }

    if !record.is_exhausted() {
        return Err(GraphError::SerializationError(format!(
            "node {id}: {} trailing bytes in record",
            record.remaining()
        )));
    }

    let real_key_path = if reader.read_boolean()? {
        Some(reader.read_string_array()?)
    } else {
        None
    };

    Ok(IntermediateNode {
        id,
        classifier_id,
        name,
        compile_states,
        source_information,
        properties,
        real_key_path,
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::codec::CodecError;
    use crate::primitives::CHILDREN_PROPERTY;
    use std::cell::RefCell;

    struct Fixture {
        repo: Repository,
        class: NodeId,
        package: NodeId,
        p: NodeId,
        c: NodeId,
        a: NodeId,
        hello: NodeId,
    }

    /// Root package P containing class C; C.superType = A (a root class);
    /// the String literal "hello" is the default value of C.
    fn fixture() -> Fixture {
        let mut repo = Repository::new();
        let class = repo.new_top_level("Class", None, None).unwrap();
        repo.set_classifier(class, class).unwrap();
        let package = repo.new_top_level("Package", Some(class), None).unwrap();
        let property = repo.new_top_level("Property", Some(class), None).unwrap();
        let string = repo.get_or_create_top_level("String").unwrap();
        repo.set_classifier(string, class).unwrap();

        let children = repo.new_node(CHILDREN_PROPERTY, property, None).unwrap();
        let super_type = repo.new_node("superType", property, None).unwrap();
        repo.get_mut(super_type).unwrap().real_key_path = Some(vec![
            "meta".to_string(),
            "Class".to_string(),
            "superType".to_string(),
        ]);
        let default_value = repo.new_node("defaultValue", property, None).unwrap();

        let source = SourceInformation::new("/model/p.pure", 1, 1, 2, 7, 4, 1);
        let p = repo.new_top_level("P", Some(package), None).unwrap();
        let a = repo.new_top_level("A", Some(class), None).unwrap();
        let c = repo.new_node("C", class, Some(source)).unwrap();
        let hello = repo.new_primitive(NodeKind::String, "hello").unwrap();

        repo.add_value(p, children, c).unwrap();
        repo.set_property(c, super_type, vec![a]).unwrap();
        repo.set_property(c, default_value, vec![hello]).unwrap();
        repo.get_mut(c)
            .unwrap()
            .compile_states
            .insert(CompileStates::PROCESSED);

        Fixture {
            repo,
            class,
            package,
            p,
            c,
            a,
            hello,
        }
    }

    fn to_bytes(repo: &Repository, tops: &[NodeId]) -> Vec<u8> {
        let mut writer = BufferWriter::new();
        BinaryRepositorySerializer::new()
            .serialize_top_levels(repo, tops, &mut writer)
            .unwrap();
        writer.into_bytes()
    }

    fn build(bytes: &[u8]) -> (Repository, BTreeMap<i32, NodeId>) {
        let mut repo = Repository::new();
        let map = BinaryRepositorySerializer::new()
            .build(
                &mut SliceReader::new(bytes),
                &mut repo,
                &BuildOptions::default(),
            )
            .unwrap();
        (repo, map)
    }

    #[test]
    fn concrete_scenario_round_trips() {
        let f = fixture();
        let bytes = to_bytes(&f.repo, &[f.p, f.a]);

        let header = BinaryRepositorySerializer::new()
            .inspect_header(&mut SliceReader::new(&bytes))
            .unwrap();
        let mut expected_tops = vec![f.a.value(), f.p.value()];
        expected_tops.sort_unstable();
        assert_eq!(header.top_level_ids, expected_tops);
        // P, C, A, "hello", their classifiers Class/Package/String,
        // the three property keys and their classifier Property.
        assert_eq!(header.node_count, 11);
        assert_eq!(header.file_names, vec!["/model/p.pure"]);

        let (loaded, _) = build(&bytes);
        assert_eq!(loaded.classifier_of(f.c).unwrap().name, "Class");
        assert_eq!(loaded.property_values(f.c, "superType").unwrap(), &[f.a]);
        // String is not among this stream's top levels, so "hello" is generic.
        let hello = loaded.get(f.hello).unwrap();
        assert_eq!(hello.name, "hello");
        assert_eq!(hello.primitive(), None);
        assert_eq!(loaded.top_level("P"), Some(f.p));
        assert_eq!(loaded.top_level("A"), Some(f.a));
        assert!(
            loaded.get(f.c).unwrap().compile_states.contains(CompileStates::PROCESSED)
        );
        assert_eq!(
            loaded.get(f.c).unwrap().properties()[0].real_key,
            vec!["meta", "Class", "superType"]
        );
    }

    #[test]
    fn shared_nodes_are_emitted_once() {
        let f = fixture();
        // Class is both a classifier and reachable from the root set itself.
        let bytes = to_bytes(&f.repo, &[f.p, f.a, f.class, f.package]);
        let header = BinaryRepositorySerializer::new()
            .inspect_header(&mut SliceReader::new(&bytes))
            .unwrap();
        assert_eq!(header.node_count, 11);
        assert_eq!(header.top_level_ids.len(), 4);
    }

    #[test]
    fn save_load_save_is_byte_identical() {
        let f = fixture();
        let mut first = BufferWriter::new();
        BinaryRepositorySerializer::new()
            .serialize(&f.repo, &mut first)
            .unwrap();

        let (loaded, _) = build(first.as_bytes());
        let mut second = BufferWriter::new();
        BinaryRepositorySerializer::new()
            .serialize(&loaded, &mut second)
            .unwrap();

        assert_eq!(first.as_bytes(), second.as_bytes());
        assert_eq!(loaded.id_counter(), f.repo.id_counter());
        assert_eq!(
            loaded.get(f.hello).unwrap().primitive(),
            Some(&PrimitiveValue::String("hello".into()))
        );
    }

    #[test]
    fn only_instances_of_top_level_primitive_classifiers_are_specialized() {
        let mut repo = Repository::new();
        let class = repo.new_top_level("Class", None, None).unwrap();
        repo.set_classifier(class, class).unwrap();
        let package = repo.new_top_level("Package", Some(class), None).unwrap();
        let property = repo.new_top_level("Property", Some(class), None).unwrap();
        let integer = repo.new_top_level("Integer", Some(class), None).unwrap();
        let children = repo.new_node(CHILDREN_PROPERTY, property, None).unwrap();

        // model::Integer is an ordinary nested class.
        let model = repo.new_top_level("model", Some(package), None).unwrap();
        let nested = repo.new_node("Integer", class, None).unwrap();
        let instance = repo.new_node("anInstance", nested, None).unwrap();
        repo.set_property(model, children, vec![nested, instance])
            .unwrap();
        // A top level classified by the primitive type is never parsed.
        let named = repo.new_top_level("notANumber", Some(integer), None).unwrap();
        let seven = repo.new_primitive(NodeKind::Integer, "7").unwrap();
        repo.add_value(model, children, seven).unwrap();

        let mut writer = BufferWriter::new();
        BinaryRepositorySerializer::new()
            .serialize(&repo, &mut writer)
            .unwrap();
        let (loaded, _) = build(writer.as_bytes());

        let instance = loaded.get(instance).unwrap();
        assert_eq!(instance.name, "anInstance");
        assert_eq!(instance.primitive(), None);
        assert_eq!(loaded.classifier_of(instance.id).unwrap().id, nested);
        assert_eq!(loaded.get(named).unwrap().primitive(), None);
        assert_eq!(loaded.top_level("notANumber"), Some(named));
        assert_eq!(
            loaded.get(seven).unwrap().primitive(),
            Some(&PrimitiveValue::Integer(7))
        );
    }

    #[test]
    fn wide_integer_literals_round_trip() {
        let mut repo = Repository::new();
        let class = repo.new_top_level("Class", None, None).unwrap();
        repo.set_classifier(class, class).unwrap();
        let property = repo.new_top_level("Property", Some(class), None).unwrap();
        let amount = repo.new_node("amount", property, None).unwrap();
        let holder = repo.new_top_level("holder", Some(class), None).unwrap();
        let wide = repo
            .new_primitive(NodeKind::Integer, "99999999999999999999")
            .unwrap();
        let integer = repo.top_level("Integer").unwrap();
        repo.set_classifier(integer, class).unwrap();
        repo.set_property(holder, amount, vec![wide]).unwrap();

        let mut first = BufferWriter::new();
        BinaryRepositorySerializer::new()
            .serialize(&repo, &mut first)
            .unwrap();
        let (loaded, _) = build(first.as_bytes());
        let mut second = BufferWriter::new();
        BinaryRepositorySerializer::new()
            .serialize(&loaded, &mut second)
            .unwrap();

        let value = loaded.property_values(holder, "amount").unwrap()[0];
        assert_eq!(
            loaded.get(value).unwrap().primitive(),
            Some(&PrimitiveValue::BigInteger("99999999999999999999".into()))
        );
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn failed_build_leaves_the_target_untouched() {
        let mut repo = Repository::new();
        let class = repo.new_top_level("Class", None, None).unwrap();
        repo.set_classifier(class, class).unwrap();
        let integer = repo.new_top_level("Integer", Some(class), None).unwrap();
        let property = repo.new_top_level("Property", Some(class), None).unwrap();
        let value = repo.new_node("value", property, None).unwrap();
        let holder = repo.new_top_level("holder", Some(class), None).unwrap();
        // Classified by the top-level Integer but not an Integer literal.
        let bogus = repo.new_node("abc", integer, None).unwrap();
        repo.set_property(holder, value, vec![bogus]).unwrap();

        let mut writer = BufferWriter::new();
        BinaryRepositorySerializer::new()
            .serialize(&repo, &mut writer)
            .unwrap();

        let mut target = Repository::new();
        let err = BinaryRepositorySerializer::new()
            .build(
                &mut SliceReader::new(writer.as_bytes()),
                &mut target,
                &BuildOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidPrimitive { .. }));
        assert_eq!(target.node_count(), 0);
        assert_eq!(target.top_level_count(), 0);
        assert_eq!(target.id_counter(), 0);

        // A conflicting second load is refused before anything is inserted.
        let f = fixture();
        let bytes = to_bytes(&f.repo, &[f.p, f.a]);
        let (mut loaded, _) = build(&bytes);
        let before = loaded.node_count();
        let err = BinaryRepositorySerializer::new()
            .build(
                &mut SliceReader::new(&bytes),
                &mut loaded,
                &BuildOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, GraphError::DuplicateNodeId(_)));
        assert_eq!(loaded.node_count(), before);
    }

    #[test]
    fn cycles_terminate() {
        let mut repo = Repository::new();
        let class = repo.new_top_level("Class", None, None).unwrap();
        repo.set_classifier(class, class).unwrap();
        let next = repo.new_node("next", class, None).unwrap();
        let a = repo.new_top_level("a", Some(class), None).unwrap();
        let b = repo.new_node("b", class, None).unwrap();
        repo.set_property(a, next, vec![b]).unwrap();
        repo.set_property(b, next, vec![a]).unwrap();

        let bytes = to_bytes(&repo, &[a]);
        let (loaded, _) = build(&bytes);
        assert_eq!(loaded.property_values(b, "next").unwrap(), &[a]);
        assert_eq!(loaded.node_count(), 4);
    }

    #[test]
    fn deep_chain_does_not_overflow() {
        let mut repo = Repository::new();
        let class = repo.new_top_level("Class", None, None).unwrap();
        repo.set_classifier(class, class).unwrap();
        let next = repo.new_node("next", class, None).unwrap();
        let head = repo.new_top_level("head", Some(class), None).unwrap();
        let mut previous = head;
        for i in 0..50_000 {
            let node = repo.new_node(format!("n{i}"), class, None).unwrap();
            repo.set_property(previous, next, vec![node]).unwrap();
            previous = node;
        }

        let bytes = to_bytes(&repo, &[head]);
        let (loaded, _) = build(&bytes);
        assert_eq!(loaded.node_count(), repo.node_count());
    }

    #[test]
    fn forward_references_resolve() {
        // The value node has a higher id than its owner.
        let f = fixture();
        let bytes = to_bytes(&f.repo, &[f.p, f.a]);
        let (loaded, map) = build(&bytes);
        assert!(f.hello.value() > f.c.value());
        assert_eq!(map.get(&f.hello.value()), Some(&f.hello));
        assert_eq!(
            loaded.property_values(f.c, "defaultValue").unwrap(),
            &[f.hello]
        );
    }

    #[test]
    fn truncated_input_reports_unexpected_end() {
        let f = fixture();
        let bytes = to_bytes(&f.repo, &[f.p, f.a]);

        // Cut two bytes into the anonymous id counter.
        let mut repo = Repository::new();
        let err = BinaryRepositorySerializer::new()
            .build(
                &mut SliceReader::new(&bytes[..6]),
                &mut repo,
                &BuildOptions::default(),
            )
            .unwrap_err();
        match err {
            GraphError::Codec(CodecError::UnexpectedEnd {
                requested,
                available,
                ..
            }) => {
                assert_eq!(requested, 4);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // Every shorter prefix fails; none silently builds.
        for cut in [bytes.len() / 2, bytes.len() - 1] {
            let mut repo = Repository::new();
            let result = BinaryRepositorySerializer::new().build(
                &mut SliceReader::new(&bytes[..cut]),
                &mut repo,
                &BuildOptions::default(),
            );
            assert!(matches!(
                result,
                Err(GraphError::Codec(CodecError::UnexpectedEnd { .. }))
            ));
        }
    }

    #[test]
    fn node_count_limit_checked_before_reading_records() {
        let f = fixture();
        let bytes = to_bytes(&f.repo, &[f.p, f.a]);
        let serializer = BinaryRepositorySerializer::with_limits(Limits {
            max_node_count: 3,
            ..Limits::default()
        });
        let mut repo = Repository::new();
        let err = serializer
            .build(
                &mut SliceReader::new(&bytes),
                &mut repo,
                &BuildOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            GraphError::LimitExceeded {
                what: "node count",
                value: 11,
                limit: 3
            }
        ));
        assert_eq!(repo.node_count(), 0);
    }

    #[test]
    fn missing_classifier_aborts_serialize() {
        let mut repo = Repository::new();
        let orphan = repo.get_or_create_top_level("orphan").unwrap();
        let mut writer = BufferWriter::new();
        let err = BinaryRepositorySerializer::new()
            .serialize(&repo, &mut writer)
            .unwrap_err();
        assert!(matches!(err, GraphError::MissingClassifier(id) if id == orphan));
    }

    #[test]
    fn progress_messages_mark_pass_boundaries() {
        let f = fixture();
        let bytes = to_bytes(&f.repo, &[f.p, f.a]);
        let seen = RefCell::new(Vec::new());
        let record = |text: &str| seen.borrow_mut().push(text.to_string());
        let mut repo = Repository::new();
        BinaryRepositorySerializer::new()
            .build(
                &mut SliceReader::new(&bytes),
                &mut repo,
                &BuildOptions {
                    message: Some(&record),
                    classifier_id_to_path: None,
                },
            )
            .unwrap();
        let seen = seen.into_inner();
        assert_eq!(seen.first().map(String::as_str), Some("Reading header"));
        assert!(seen.iter().any(|m| m.starts_with("Instantiating")));
        assert!(seen.iter().any(|m| m.starts_with("Wiring")));
        assert_eq!(seen.last().map(String::as_str), Some("Done"));
    }

    #[test]
    fn classifier_paths_bridge_into_an_existing_repository() {
        // Target already owns the metamodel; only instances are shipped.
        let mut target = Repository::new();
        let class = target.new_top_level("Class", None, None).unwrap();
        target.set_classifier(class, class).unwrap();
        let string = target.new_top_level("String", Some(class), None).unwrap();

        let mut source = Repository::new();
        let src_class = source.new_top_level("Class", None, None).unwrap();
        source.set_classifier(src_class, src_class).unwrap();
        let thing = source.new_top_level("thing", Some(src_class), None).unwrap();
        let hello = source.new_primitive(NodeKind::String, "hi").unwrap();
        let src_string = source.get(hello).unwrap().classifier.unwrap();
        source.set_classifier(src_string, src_class).unwrap();
        let label = source.new_node("label", src_class, None).unwrap();
        source.set_property(thing, label, vec![hello]).unwrap();

        let bytes = to_bytes(&source, &[thing]);
        let paths: HashMap<i32, String> = [
            (src_class.value(), "Class".to_string()),
            (src_string.value(), "String".to_string()),
        ]
        .into_iter()
        .collect();

        // Pre-existing ids collide with the shipped ones, so fresh ids are used.
        let map = BinaryRepositorySerializer::new()
            .build(
                &mut SliceReader::new(&bytes),
                &mut target,
                &BuildOptions {
                    message: None,
                    classifier_id_to_path: Some(&paths),
                },
            )
            .unwrap_or_else(|e| panic!("build failed: {e}"));

        let live_hello = map[&hello.value()];
        let node = target.get(live_hello).unwrap();
        assert_eq!(node.primitive(), Some(&PrimitiveValue::String("hi".into())));
        assert_eq!(node.classifier, Some(string));
        let live_thing = map[&thing.value()];
        assert_eq!(target.get(live_thing).unwrap().classifier, Some(class));
        assert_eq!(
            target.property_values(live_thing, "label").unwrap(),
            &[live_hello]
        );
    }

    #[test]
    fn intermediate_node_keeps_raw_ids() {
        let f = fixture();
        let mut out = BufferWriter::new();
        let mut files = FileTable::default();
        let node = f.repo.get(f.c).unwrap();
        write_node_record(node, f.class, &mut files, &mut out).unwrap();

        let mut entry = BufferWriter::new();
        entry.write_byte_array(out.as_bytes()).unwrap();
        entry.write_boolean(false).unwrap();

        let record =
            read_intermediate_node(&mut SliceReader::new(entry.as_bytes()), &files.names)
                .unwrap();
        assert_eq!(record.id, f.c.value());
        assert_eq!(record.classifier_id, f.class.value());
        assert_eq!(record.properties.len(), 2);
        assert_eq!(record.properties[0].1, vec![f.a.value()]);
        assert_eq!(
            record.source_information.as_ref().map(|s| s.source_id.as_str()),
            Some("/model/p.pure")
        );
        assert!(record.real_key_path.is_none());
    }

    #[test]
    fn out_of_range_file_id_is_rejected() {
        let mut out = BufferWriter::new();
        out.write_int(1).unwrap();
        out.write_int(0).unwrap();
        out.write_string("x").unwrap();
        out.write_int(0).unwrap();
        out.write_int(5).unwrap();

        let mut entry = BufferWriter::new();
        entry.write_byte_array(out.as_bytes()).unwrap();
        let err = read_intermediate_node(&mut SliceReader::new(entry.as_bytes()), &[])
            .unwrap_err();
        assert!(matches!(err, GraphError::SerializationError(_)));
    }
}
