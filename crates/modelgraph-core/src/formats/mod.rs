//! # Formats Module
//!
//! Serialization formats for model graphs.
//!
//! - `binary`: the repository wire format and its two-pass builder
//!
//! The byte-slice helpers here are pure transformations; file I/O lives in
//! [`crate::files`].

pub mod binary;

pub use binary::{
    BinaryRepositorySerializer, BuildOptions, HeaderSummary, IntermediateNode, SerializeSummary,
    read_intermediate_node,
};

use crate::codec::{BufferWriter, SliceReader};
use crate::graph::Repository;
use crate::primitives::Limits;
use crate::types::GraphError;

/// Serialize a whole repository to bytes.
pub fn repository_to_bytes(repo: &Repository) -> Result<Vec<u8>, GraphError> {
    let mut writer = BufferWriter::new();
    BinaryRepositorySerializer::new().serialize(repo, &mut writer)?;
    Ok(writer.into_bytes())
}

/// Build a fresh repository from bytes, rejecting input beyond `limits`.
pub fn repository_from_bytes(bytes: &[u8], limits: Limits) -> Result<Repository, GraphError> {
    let mut reader = SliceReader::new(bytes).with_max_length(limits.max_array_length);
    let mut repo = Repository::new();
    BinaryRepositorySerializer::with_limits(limits).build(
        &mut reader,
        &mut repo,
        &BuildOptions::default(),
    )?;
    if !reader.is_exhausted() {
        return Err(GraphError::SerializationError(format!(
            "{} trailing bytes after node table",
            reader.remaining()
        )));
    }
    Ok(repo)
}

/// BLAKE3 digest of serialized bytes, as lowercase hex.
#[cfg(feature = "crypto-hash")]
#[must_use]
pub fn content_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}
