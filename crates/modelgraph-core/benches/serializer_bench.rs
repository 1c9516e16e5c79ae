//! # Serializer Benchmarks
//!
//! Throughput of the repository wire format and the lazy metadata store.
//!
//! Run with: `cargo bench -p modelgraph-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use modelgraph_core::metadata::partition_repository;
use modelgraph_core::{
    BinaryRepositorySerializer, BufferWriter, Limits, Metadata, MetadataLazy, NodeKind,
    Repository, SliceReader, repository_from_bytes, repository_to_bytes,
};
use std::hint::black_box;

/// One package of `size` classes, each labelled and linked to the previous one.
fn create_package(size: usize) -> Repository {
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

    let root = repo
        .new_top_level("bench", Some(package), None)
        .expect("root");
    let mut members = Vec::with_capacity(size);
    let mut previous = None;
    for i in 0..size {
        let node = repo.new_node(format!("C{i}"), class, None).expect("node");
        let text = repo
            .new_primitive(NodeKind::String, &format!("label {i}"))
            .expect("label");
        repo.set_property(node, label, vec![text]).expect("set label");
        if let Some(prev) = previous {
            repo.set_property(node, next, vec![prev]).expect("set next");
        }
        previous = Some(node);
        members.push(node);
    }
    repo.set_property(root, children, members).expect("children");
    repo
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialize");

    for size in [100, 1000, 10000].iter() {
        let repo = create_package(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &repo, |b, repo| {
            b.iter(|| {
                let mut writer = BufferWriter::new();
                BinaryRepositorySerializer::new()
                    .serialize(repo, &mut writer)
                    .expect("serialize");
                black_box(writer)
            });
        });
    }

    group.finish();
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");

    for size in [100, 1000, 10000].iter() {
        let bytes = repository_to_bytes(&create_package(*size)).expect("bytes");
        group.bench_with_input(BenchmarkId::from_parameter(size), &bytes, |b, bytes| {
            b.iter(|| black_box(repository_from_bytes(bytes, Limits::default()).expect("build")));
        });
    }

    group.finish();
}

fn bench_inspect_header(c: &mut Criterion) {
    let bytes = repository_to_bytes(&create_package(10000)).expect("bytes");
    c.bench_function("inspect_header_10000", |b| {
        b.iter(|| {
            let mut reader = SliceReader::new(&bytes);
            black_box(
                BinaryRepositorySerializer::new()
                    .inspect_header(&mut reader)
                    .expect("header"),
            )
        });
    });
}

fn bench_lazy_lookup(c: &mut Criterion) {
    let source = partition_repository(&create_package(1000)).expect("partition");
    c.bench_function("lazy_cold_lookup_1000", |b| {
        b.iter(|| {
            let store = MetadataLazy::new(source.clone());
            black_box(store.get_metadata("Class", "bench::C500").expect("lookup"))
        });
    });
}

criterion_group!(
    benches,
    bench_serialize,
    bench_build,
    bench_inspect_header,
    bench_lazy_lookup
);
criterion_main!(benches);
