//! # Property-Based Tests
//!
//! Determinism and robustness invariants of the codec, the repository wire
//! format and the index families.

use modelgraph_core::{
    BufferWriter, GraphError, IdIndex, Index, Limits, NodeId, NodeKind, Reader, Repository,
    SliceReader, Writer, repository_from_bytes, repository_to_bytes,
};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::BTreeSet;

/// A package tree of `widths.len()` packages, each with `widths[i]` classes
/// carrying a `label` string and a `next` link to the previous class.
fn generated_repository(widths: &[usize], labels: &[String]) -> Repository {
    let mut repo = Repository::new();
    let class = repo.new_top_level("Class", None, None).expect("class");
    repo.set_classifier(class, class).expect("classify");
    let package = repo
        .new_top_level("Package", Some(class), None)
        .expect("package");
    let property = repo
        .new_top_level("Property", Some(class), None)
        .expect("property");
    repo.new_top_level("String", Some(class), None)
        .expect("string");
    let children = repo.new_node("children", property, None).expect("children");
    let label = repo.new_node("label", property, None).expect("label");
    let next = repo.new_node("next", property, None).expect("next");

    let mut previous: Option<NodeId> = None;
    let mut counter = 0;
    for (p, width) in widths.iter().enumerate() {
        let pkg = repo
            .new_top_level(format!("pkg{p}"), Some(package), None)
            .expect("pkg");
        let mut members = Vec::new();
        for c in 0..*width {
            let node = repo.new_node(format!("C{c}"), class, None).expect("node");
            let text = &labels[counter % labels.len()];
            counter += 1;
            let value = repo.new_primitive(NodeKind::String, text).expect("label");
            repo.set_property(node, label, vec![value]).expect("set label");
            if let Some(prev) = previous {
                repo.set_property(node, next, vec![prev]).expect("set next");
            }
            previous = Some(node);
            members.push(node);
        }
        repo.set_property(pkg, children, members).expect("children");
    }
    repo
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Values read back in write order, whatever their mix.
    #[test]
    fn codec_reads_back_what_was_written(
        ints in vec(any::<i32>(), 0..20),
        longs in vec(any::<i64>(), 0..20),
        text in ".{0,40}",
    ) {
        let mut writer = BufferWriter::new();
        writer.write_int_array(&ints).expect("ints");
        writer.write_string(&text).expect("text");
        writer.write_long_array(&longs).expect("longs");

        let bytes = writer.into_bytes();
        let mut reader = SliceReader::new(&bytes);
        prop_assert_eq!(reader.read_int_array().expect("ints"), ints);
        prop_assert_eq!(reader.read_string().expect("text"), text);
        prop_assert_eq!(reader.read_long_array().expect("longs"), longs);
        prop_assert!(reader.is_exhausted());
    }

    /// save -> load -> save is byte-identical and keeps every node.
    #[test]
    fn repository_resave_is_byte_identical(
        widths in vec(0usize..6, 1..5),
        labels in vec("[a-z]{0,8}", 1..4),
    ) {
        let repo = generated_repository(&widths, &labels);
        let first = repository_to_bytes(&repo).expect("first save");
        let loaded = repository_from_bytes(&first, Limits::default()).expect("load");
        let second = repository_to_bytes(&loaded).expect("second save");

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(loaded.node_count(), repo.node_count());
        prop_assert_eq!(loaded.id_counter(), repo.id_counter());
    }

    /// Every strict prefix of a valid stream fails cleanly.
    #[test]
    fn truncated_streams_are_rejected(
        widths in vec(1usize..4, 1..3),
        cut in any::<prop::sample::Index>(),
    ) {
        let repo = generated_repository(&widths, &["x".to_string()]);
        let bytes = repository_to_bytes(&repo).expect("save");
        let cut = cut.index(bytes.len());

        let result = repository_from_bytes(&bytes[..cut], Limits::default());
        prop_assert!(matches!(result, Err(GraphError::Codec(_))));
    }

    /// A unique index built from distinct keys finds every value.
    #[test]
    fn id_index_finds_every_distinct_key(keys in vec(any::<u32>(), 0..50)) {
        let distinct: BTreeSet<u32> = keys.iter().copied().collect();
        let index = IdIndex::with_values(|v: &u32| *v, distinct.iter().copied())
            .expect("distinct keys");

        prop_assert_eq!(index.len(), distinct.len());
        for key in &distinct {
            prop_assert_eq!(index.get(key), Some(key));
        }
    }

    /// After grouped removal no removed value is left under any key.
    #[test]
    fn grouped_removal_leaves_nothing_behind(
        values in vec(0u32..100, 0..60),
        doomed in vec(0u32..100, 0..30),
    ) {
        let mut index = Index::with_values(|v: &u32| v % 7, values.iter().copied());
        index.remove_all(doomed.iter());

        for key in 0..7 {
            for value in index.get(&key) {
                prop_assert!(!doomed.contains(value));
            }
        }
        let survivors = values.iter().filter(|v| !doomed.contains(*v)).count();
        let stored: usize = (0..7).map(|key| index.get(&key).len()).sum();
        prop_assert_eq!(stored, survivors);
    }
}
