//! # CLI Command Implementations
//!
//! Each command is split in two: a function that does the work and returns
//! a serializable report, and a `cmd_*` wrapper that prints it as text or
//! JSON.

use modelgraph_core::formats::content_hash;
use modelgraph_core::metadata::{ResolvedValue, partition_repository};
use modelgraph_core::{
    BinaryRepositorySerializer, BuildOptions, GraphError, HeaderSummary, Limits, MetaInstance,
    Metadata, MetadataLazy, ModuleManifest, ModuleStore, RedbObjSource, Repository, SliceReader,
    repository_from_bytes, repository_to_bytes,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a serialized graph file (512 MB).
const MAX_GRAPH_FILE_SIZE: u64 = 512 * 1024 * 1024;

/// Resolve an input path and read it, refusing directories and oversized files.
fn read_graph_file(path: &Path) -> Result<(PathBuf, Vec<u8>), GraphError> {
    let canonical = path.canonicalize().map_err(|_| GraphError::FileNotFound {
        name: "graph".to_string(),
        path: path.to_path_buf(),
    })?;
    if !canonical.is_file() {
        return Err(GraphError::InvalidArgument {
            what: "graph file",
            value: path.display().to_string(),
        });
    }

    let size = std::fs::metadata(&canonical)?.len();
    if size > MAX_GRAPH_FILE_SIZE {
        return Err(GraphError::LimitExceeded {
            what: "graph file size",
            value: size,
            limit: MAX_GRAPH_FILE_SIZE,
        });
    }

    let bytes = std::fs::read(&canonical)?;
    Ok((canonical, bytes))
}

/// Print a report as pretty JSON.
fn print_json<T: Serialize>(report: &T) -> Result<(), GraphError> {
    let text = serde_json::to_string_pretty(report)
        .map_err(|e| GraphError::SerializationError(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

// =============================================================================
// INSPECT COMMAND
// =============================================================================

/// Header of a graph file plus its content hash.
#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub file: PathBuf,
    pub bytes: u64,
    pub content_hash: String,
    pub header: HeaderSummary,
}

/// Read the header and node table framing without building any node.
pub fn inspect(path: &Path, limits: Limits) -> Result<InspectReport, GraphError> {
    let (file, bytes) = read_graph_file(path)?;
    let mut reader = SliceReader::new(&bytes).with_max_length(limits.max_array_length);
    let header = BinaryRepositorySerializer::with_limits(limits).inspect_header(&mut reader)?;
    if !reader.is_exhausted() {
        return Err(GraphError::SerializationError(format!(
            "{} trailing bytes after node table",
            reader.remaining()
        )));
    }

    Ok(InspectReport {
        file,
        bytes: bytes.len() as u64,
        content_hash: content_hash(&bytes),
        header,
    })
}

pub fn cmd_inspect(path: &Path, limits: Limits, json_mode: bool) -> Result<(), GraphError> {
    let report = inspect(path, limits)?;
    if json_mode {
        return print_json(&report);
    }

    println!("Graph File");
    println!("==========");
    println!("File:          {}", report.file.display());
    println!("Size:          {} bytes", report.bytes);
    println!("BLAKE3:        {}", report.content_hash);
    println!();
    println!("Nodes:         {}", report.header.node_count);
    println!("Top levels:    {}", report.header.top_level_ids.len());
    println!("Source files:  {}", report.header.file_names.len());
    println!("Real key paths: {}", report.header.real_key_path_count);
    println!("Id counter:    {}", report.header.id_counter);
    println!("Anonymous ids: {}", report.header.anonymous_id_counter);
    for name in report.header.file_names.iter().take(10) {
        println!("  {}", name);
    }
    if report.header.file_names.len() > 10 {
        println!("  ... and {} more", report.header.file_names.len() - 10);
    }

    Ok(())
}

// =============================================================================
// VERIFY COMMAND
// =============================================================================

/// Outcome of a load/re-save comparison.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    pub file: PathBuf,
    pub bytes: u64,
    pub node_count: usize,
    pub top_level_count: usize,
    pub identical: bool,
}

/// Build the graph and serialize it again.
pub fn verify(path: &Path, limits: Limits) -> Result<VerifyReport, GraphError> {
    let (file, bytes) = read_graph_file(path)?;
    let repo = repository_from_bytes(&bytes, limits)?;
    let resaved = repository_to_bytes(&repo)?;

    Ok(VerifyReport {
        file,
        bytes: bytes.len() as u64,
        node_count: repo.node_count(),
        top_level_count: repo.top_level_count(),
        identical: resaved == bytes,
    })
}

pub fn cmd_verify(path: &Path, limits: Limits, json_mode: bool) -> Result<(), GraphError> {
    let report = verify(path, limits)?;
    if json_mode {
        print_json(&report)?;
    } else {
        println!(
            "{}: {} nodes, {} top levels, {} bytes",
            report.file.display(),
            report.node_count,
            report.top_level_count,
            report.bytes
        );
        if report.identical {
            println!("Re-serialized output is byte-identical");
        }
    }

    if !report.identical {
        return Err(GraphError::InternalConsistency(format!(
            "re-serializing {} gives different bytes",
            report.file.display()
        )));
    }
    Ok(())
}

// =============================================================================
// PARTITION COMMAND
// =============================================================================

/// Counts written by a partition run.
#[derive(Debug, Clone, Serialize)]
pub struct PartitionReport {
    pub database: PathBuf,
    pub partitioned: usize,
    pub written: usize,
    /// Instance count per classifier after the write.
    pub classifiers: Vec<(String, u64)>,
}

/// Partition a graph file by classifier into a redb database.
pub fn partition(path: &Path, output: &Path, limits: Limits) -> Result<PartitionReport, GraphError> {
    let (_, bytes) = read_graph_file(path)?;
    let repo = repository_from_bytes(&bytes, limits)?;
    let memory = partition_repository(&repo)?;

    let database = RedbObjSource::open(output)?;
    let written = database.import(&memory)?;
    tracing::info!(
        objs = memory.len(),
        written,
        database = %output.display(),
        "partitioned graph"
    );

    Ok(PartitionReport {
        database: output.to_path_buf(),
        partitioned: memory.len(),
        written,
        classifiers: database.classifiers()?,
    })
}

pub fn cmd_partition(
    path: &Path,
    output: &Path,
    limits: Limits,
    json_mode: bool,
) -> Result<(), GraphError> {
    let report = partition(path, output, limits)?;
    if json_mode {
        return print_json(&report);
    }

    println!(
        "Partitioned {} instances into {} ({} new)",
        report.partitioned,
        report.database.display(),
        report.written
    );
    for (classifier, count) in &report.classifiers {
        println!("  {:<24} {}", classifier, count);
    }
    Ok(())
}

// =============================================================================
// LOOKUP COMMAND
// =============================================================================

/// One instance, plus the instances its properties refer to when resolved.
#[derive(Debug, Clone, Serialize)]
pub struct LookupReport {
    pub instance: MetaInstance,
    pub references: Vec<MetaInstance>,
}

/// Load `classifier`/`id` through a lazy store over `database`.
pub fn lookup(
    database: &Path,
    classifier: &str,
    id: &str,
    resolve: bool,
) -> Result<LookupReport, GraphError> {
    if !database.is_file() {
        return Err(GraphError::FileNotFound {
            name: "database".to_string(),
            path: database.to_path_buf(),
        });
    }
    let store = MetadataLazy::new(RedbObjSource::open(database)?);
    let instance = store.get_metadata(classifier, id)?;

    let mut references = Vec::new();
    if resolve {
        for values in instance.properties.values() {
            for resolved in store.resolve_values(values)? {
                if let ResolvedValue::Instance(referenced) = resolved {
                    references.push((*referenced).clone());
                }
            }
        }
    }
    tracing::debug!(cached = store.cached_count(), "lookup finished");

    Ok(LookupReport {
        instance: (*instance).clone(),
        references,
    })
}

pub fn cmd_lookup(
    database: &Path,
    classifier: &str,
    id: &str,
    resolve: bool,
    json_mode: bool,
) -> Result<(), GraphError> {
    let report = lookup(database, classifier, id, resolve)?;
    if json_mode {
        return print_json(&report);
    }

    let instance = &report.instance;
    println!("{} {} ({})", instance.classifier, instance.identifier, instance.name);
    if let Some(source) = &instance.source_information {
        println!("  at {}", source);
    }
    for (property, values) in &instance.properties {
        println!("  {} = {:?}", property, values);
    }
    if !report.references.is_empty() {
        println!("References:");
        for referenced in &report.references {
            println!("  {} {}", referenced.classifier, referenced.identifier);
        }
    }
    Ok(())
}

// =============================================================================
// MODULE COMMANDS
// =============================================================================

/// Store a graph file under `root` as `module`.
pub fn store(
    path: &Path,
    root: &Path,
    module: &str,
    limits: Limits,
) -> Result<ModuleManifest, GraphError> {
    let (_, bytes) = read_graph_file(path)?;
    let repo = repository_from_bytes(&bytes, limits)?;
    ModuleStore::new(root).with_limits(limits).write_module(&repo, module)
}

pub fn cmd_store(
    path: &Path,
    root: &Path,
    module: &str,
    limits: Limits,
    json_mode: bool,
) -> Result<(), GraphError> {
    let manifest = store(path, root, module, limits)?;
    if json_mode {
        return print_json(&manifest);
    }

    println!(
        "Stored module '{}': {} nodes, {} elements, {} bytes",
        manifest.module,
        manifest.node_count,
        manifest.elements.len(),
        manifest.graph_length
    );
    Ok(())
}

/// A module read back into a fresh repository.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub manifest: ModuleManifest,
    pub node_count: usize,
    pub steps: Vec<String>,
}

/// Read `module` from `root` into a fresh repository.
pub fn load(root: &Path, module: &str, limits: Limits) -> Result<LoadReport, GraphError> {
    let store = ModuleStore::new(root).with_limits(limits);
    let manifest = store.read_manifest(module)?;

    let steps = std::cell::RefCell::new(Vec::new());
    let report_step = |step: &str| {
        tracing::debug!(module, step, "reading module");
        steps.borrow_mut().push(step.to_string());
    };
    let options = BuildOptions {
        message: Some(&report_step),
        classifier_id_to_path: None,
    };

    let mut repo = Repository::new();
    let ids = store.read_module(module, &mut repo, &options)?;

    Ok(LoadReport {
        manifest,
        node_count: ids.len(),
        steps: steps.into_inner(),
    })
}

pub fn cmd_load(root: &Path, module: &str, limits: Limits, json_mode: bool) -> Result<(), GraphError> {
    let report = load(root, module, limits)?;
    if json_mode {
        return print_json(&report);
    }

    println!("Module '{}'", report.manifest.module);
    println!("  Nodes:      {}", report.node_count);
    println!("  Top levels: {}", report.manifest.top_levels.join(", "));
    for element in report.manifest.elements.iter().take(20) {
        println!("    {}", element);
    }
    if report.manifest.elements.len() > 20 {
        println!("    ... and {} more", report.manifest.elements.len() - 20);
    }
    Ok(())
}
