//! # modelgraph-core
//!
//! The persistence engine for classified object graphs - THE ENGINE.
//!
//! A model graph is a set of nodes, each with a classifier node and named
//! properties whose values are other nodes. This crate stores such graphs
//! in a compact big-endian binary format and serves them back:
//! - `codec`: the primitive reader/writer pair everything else is built on
//! - `graph`: the arena repository and its node model
//! - `formats`: the repository wire format and its two-pass builder
//! - `index`: unique-key and multi-value secondary indexes
//! - `metadata`: classifier-keyed instance lookup, eager or lazy
//! - `storage` / `files`: redb-backed sources and the on-disk module layout
//!
//! ## Architectural Constraints
//!
//! - Synchronous: NO async, NO network dependencies (pure Rust)
//! - Passive: spawns no threads; callers drive every operation
//! - Deterministic: the same repository always serializes to the same bytes
//! - Graph walks use explicit work stacks, never recursion

// =============================================================================
// MODULES
// =============================================================================

pub mod codec;
pub mod files;
pub mod formats;
pub mod graph;
pub mod index;
pub mod metadata;
pub mod primitives;
pub mod scope;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{CompileStates, GraphError, NodeId, SourceInformation};

// =============================================================================
// RE-EXPORTS: Codec
// =============================================================================

pub use codec::{
    BufferWriter, CodecError, Reader, SeekReader, SliceReader, SliceWriter, StreamReader,
    StreamWriter, Writer,
};

// =============================================================================
// RE-EXPORTS: Graph Model
// =============================================================================

pub use graph::{Node, NodeKind, PrimitiveValue, PropertyEntry, PureDate, Repository};
pub use primitives::Limits;
pub use scope::VariableScope;

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{
    BinaryRepositorySerializer, BuildOptions, HeaderSummary, IntermediateNode, SerializeSummary,
    read_intermediate_node, repository_from_bytes, repository_to_bytes,
};

// =============================================================================
// RE-EXPORTS: Indexes
// =============================================================================

pub use index::{
    ConcurrentIdIndex, ConcurrentIndex, IdIndex, Index, IndexSpec, NameSpec, PropertyValueSpec,
    SourceIdSpec,
};

// =============================================================================
// RE-EXPORTS: Metadata and Storage
// =============================================================================

pub use files::{DefaultFilePathProvider, FilePathProvider, ModuleManifest, ModuleStore};
pub use metadata::{
    MemoryObjSource, MetaInstance, Metadata, MetadataEager, MetadataLazy, Obj, ObjSource, RValue,
    Transaction,
};
pub use storage::RedbObjSource;
