//! # Core Type Definitions
//!
//! This module contains the core types shared by every layer of the engine:
//! - Node identifiers (`NodeId`)
//! - Source locations (`SourceInformation`)
//! - Processing flags (`CompileStates`)
//! - Error types (`GraphError`)
//!
//! ## Identity
//!
//! Node ids are synthetic, process-unique and carried on the wire as Int32,
//! so the in-memory identifier is an `i32` newtype. Ids are assigned by the
//! owning [`Repository`](crate::graph::Repository) and preserved across a
//! save/load round-trip.

use crate::codec::CodecError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// NODE IDENTIFIER
// =============================================================================

/// Synthetic identity of a node inside one repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub i32);

impl NodeId {
    /// Get the raw id value as written on the wire.
    #[must_use]
    pub const fn value(self) -> i32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// SOURCE INFORMATION
// =============================================================================

/// Location of the text a node was parsed from.
///
/// `source_id` is interned against the per-serialization file table, so the
/// same file name is written once no matter how many nodes reference it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceInformation {
    pub source_id: String,
    pub start_line: i32,
    pub start_column: i32,
    pub line: i32,
    pub column: i32,
    pub end_line: i32,
    pub end_column: i32,
}

impl SourceInformation {
    /// Create a source location.
    #[must_use]
    pub fn new(
        source_id: impl Into<String>,
        start_line: i32,
        start_column: i32,
        line: i32,
        column: i32,
        end_line: i32,
        end_column: i32,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            start_line,
            start_column,
            line,
            column,
            end_line,
            end_column,
        }
    }
}

impl fmt::Display for SourceInformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}c{}-{}c{}",
            self.source_id, self.start_line, self.start_column, self.end_line, self.end_column
        )
    }
}

// =============================================================================
// COMPILE STATES
// =============================================================================

/// Processing flags attached to a node.
///
/// The bitmask is persisted verbatim. Bits this crate does not name are
/// carried through untouched.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct CompileStates(u32);

impl CompileStates {
    /// Node has been through post-processing.
    pub const PROCESSED: Self = Self(1);
    /// Node has been validated.
    pub const VALIDATED: Self = Self(1 << 1);
    /// Node was materialized by the deserializer.
    pub const DESERIALIZED: Self = Self(1 << 2);

    /// No flags set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Build from a raw bitmask.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bitmask.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the engine.
///
/// - No silent failures
/// - Nothing is retried internally; every error propagates to the caller
/// - Byte-level failures keep their [`CodecError`] shape untranslated
#[derive(Debug, Error)]
pub enum GraphError {
    /// Reading or writing the underlying bytes failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A referenced node does not exist in the repository.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// A node has no classifier where one is required.
    #[error("Node {0} has no classifier")]
    MissingClassifier(NodeId),

    /// A node id is already taken in the target repository.
    #[error("Duplicate node id: {0}")]
    DuplicateNodeId(NodeId),

    /// Another node is already registered as a top level under this name.
    #[error("Top level '{0}' is already registered")]
    DuplicateTopLevel(String),

    /// An internal invariant was violated; the whole operation is aborted.
    #[error("Internal consistency violation: {0}")]
    InternalConsistency(String),

    /// A primitive node's name is not a valid literal of its type.
    #[error("Invalid {type_name} literal: {literal:?}")]
    InvalidPrimitive { type_name: String, literal: String },

    /// A unique index already binds the key to a different value.
    #[error("Index key conflict: {key}")]
    IndexKeyConflict { key: String },

    /// A name is already bound in the current scope.
    #[error("'{name}' has already been defined")]
    VariableNameConflict { name: String },

    /// The classifier is unknown to the metadata store.
    #[error("Unknown classifier: {classifier}")]
    ClassifierNotFound { classifier: String },

    /// The classifier is known but has no instance with this id.
    #[error("Cannot find {classifier} with id '{id}'")]
    InstanceNotFound { classifier: String, id: String },

    /// The enumeration or the member is unknown.
    #[error("Cannot find enum '{member}' in enumeration '{enumeration}'")]
    EnumNotFound { enumeration: String, member: String },

    /// A module or element file is missing at the expected location.
    #[error("Cannot find file for {name} at {}", path.display())]
    FileNotFound { name: String, path: PathBuf },

    /// A name or path argument is empty or malformed.
    #[error("Invalid {what}: {value:?}")]
    InvalidArgument { what: &'static str, value: String },

    /// A declared size exceeds the configured limit.
    #[error("{what} {value} exceeds maximum allowed {limit}")]
    LimitExceeded {
        what: &'static str,
        value: u64,
        limit: u64,
    },

    /// The operation is not supported by this implementation.
    #[error("Not supported: {0}")]
    Unsupported(&'static str),

    /// A manifest or record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The backing database failed.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// A filesystem operation failed.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_states_flags() {
        let mut states = CompileStates::empty();
        assert!(states.is_empty());

        states.insert(CompileStates::PROCESSED);
        states.insert(CompileStates::VALIDATED);
        assert!(states.contains(CompileStates::PROCESSED));
        assert!(states.contains(CompileStates::VALIDATED));
        assert!(!states.contains(CompileStates::DESERIALIZED));

        states.remove(CompileStates::PROCESSED);
        assert!(!states.contains(CompileStates::PROCESSED));
        assert_eq!(states.bits(), 2);
    }

    #[test]
    fn compile_states_keep_unknown_bits() {
        let states = CompileStates::from_bits(0x8000_0001);
        assert!(states.contains(CompileStates::PROCESSED));
        assert_eq!(states.bits(), 0x8000_0001);
    }

    #[test]
    fn source_information_display() {
        let info = SourceInformation::new("/model/a.pure", 1, 2, 3, 4, 5, 6);
        assert_eq!(info.to_string(), "/model/a.pure:1c2-5c6");
    }

    #[test]
    fn error_messages_name_the_missing_instance() {
        let err = GraphError::InstanceNotFound {
            classifier: "meta::pure::metamodel::type::Class".to_string(),
            id: "my::Person".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("meta::pure::metamodel::type::Class"));
        assert!(msg.contains("my::Person"));
    }
}
