//! # CLI Command Tests
//!
//! Drives the command functions against graph files in a temp directory.

use modelgraph::cli::{inspect, load, lookup, partition, store, verify};
use modelgraph_core::{GraphError, Limits, NodeKind, Repository, repository_to_bytes};
use std::path::{Path, PathBuf};
use tempfile::tempdir;

/// `model::Person` with a `name` and an `employer`, plus `model::Firm`.
fn sample_repository() -> Repository {
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
    let name = repo.new_node("name", property, None).expect("name");
    let employer = repo.new_node("employer", property, None).expect("employer");

    let model = repo
        .new_top_level("model", Some(package), None)
        .expect("model");
    let person = repo.new_node("Person", class, None).expect("person");
    let firm = repo.new_node("Firm", class, None).expect("firm");
    repo.set_property(model, children, vec![person, firm])
        .expect("children");

    let alice = repo.new_primitive(NodeKind::String, "alice").expect("alice");
    repo.set_property(person, name, vec![alice]).expect("name");
    repo.set_property(person, employer, vec![firm]).expect("employer");
    repo
}

fn write_sample(dir: &Path) -> PathBuf {
    let path = dir.join("sample.graph");
    let bytes = repository_to_bytes(&sample_repository()).expect("serialize");
    std::fs::write(&path, bytes).expect("write graph");
    path
}

#[test]
fn inspect_reports_the_header() {
    let temp = tempdir().expect("temp dir");
    let path = write_sample(temp.path());

    let report = inspect(&path, Limits::default()).expect("inspect");
    assert_eq!(report.header.node_count, sample_repository().node_count());
    assert_eq!(report.header.top_level_ids.len(), 5);
    assert_eq!(report.content_hash.len(), 64);
    assert_eq!(report.bytes, std::fs::metadata(&path).expect("meta").len());
}

#[test]
fn inspect_rejects_trailing_bytes() {
    let temp = tempdir().expect("temp dir");
    let path = write_sample(temp.path());
    let mut bytes = std::fs::read(&path).expect("read");
    bytes.push(0);
    std::fs::write(&path, bytes).expect("rewrite");

    let err = inspect(&path, Limits::default()).expect_err("trailing byte");
    assert!(matches!(err, GraphError::SerializationError(_)));
}

#[test]
fn verify_confirms_byte_identical_resave() {
    let temp = tempdir().expect("temp dir");
    let path = write_sample(temp.path());

    let report = verify(&path, Limits::default()).expect("verify");
    assert!(report.identical);
    assert_eq!(report.top_level_count, 5);
}

#[test]
fn limits_from_configuration_are_enforced() {
    let temp = tempdir().expect("temp dir");
    let path = write_sample(temp.path());
    let limits = Limits {
        max_node_count: 2,
        ..Limits::default()
    };

    let err = verify(&path, limits).expect_err("too many nodes");
    assert!(matches!(err, GraphError::LimitExceeded { .. }));
}

#[test]
fn missing_input_is_reported() {
    let temp = tempdir().expect("temp dir");
    let err = verify(&temp.path().join("absent.graph"), Limits::default())
        .expect_err("missing file");
    assert!(matches!(err, GraphError::FileNotFound { .. }));
}

#[test]
fn partition_then_lookup() {
    let temp = tempdir().expect("temp dir");
    let path = write_sample(temp.path());
    let database = temp.path().join("objs.redb");

    let first = partition(&path, &database, Limits::default()).expect("partition");
    assert!(first.written > 0);
    assert_eq!(first.written, first.partitioned);
    assert!(first.classifiers.iter().any(|(name, _)| name == "Class"));

    // A second run finds every record already present.
    let second = partition(&path, &database, Limits::default()).expect("again");
    assert_eq!(second.written, 0);

    let report = lookup(&database, "Class", "model::Person", true).expect("lookup");
    assert_eq!(report.instance.name, "Person");
    assert_eq!(report.references.len(), 1);
    assert_eq!(report.references[0].identifier, "model::Firm");
}

#[test]
fn lookup_of_unknown_id_fails() {
    let temp = tempdir().expect("temp dir");
    let path = write_sample(temp.path());
    let database = temp.path().join("objs.redb");
    partition(&path, &database, Limits::default()).expect("partition");

    let err = lookup(&database, "Class", "model::Nobody", false).expect_err("unknown id");
    assert!(matches!(err, GraphError::InstanceNotFound { .. }));
}

#[test]
fn lookup_needs_an_existing_database() {
    let temp = tempdir().expect("temp dir");
    let err = lookup(&temp.path().join("absent.redb"), "Class", "x", false)
        .expect_err("missing database");
    assert!(matches!(err, GraphError::FileNotFound { .. }));
}

#[test]
fn store_then_load_a_module() {
    let temp = tempdir().expect("temp dir");
    let path = write_sample(temp.path());
    let root = temp.path().join("modules");

    let manifest = store(&path, &root, "sample", Limits::default()).expect("store");
    assert!(manifest.elements.contains(&"model::Person".to_string()));

    let report = load(&root, "sample", Limits::default()).expect("load");
    assert_eq!(report.manifest, manifest);
    assert_eq!(report.node_count, sample_repository().node_count());
    assert_eq!(report.steps.first().map(String::as_str), Some("Reading header"));
    assert_eq!(report.steps.last().map(String::as_str), Some("Done"));
}
