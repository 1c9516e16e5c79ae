//! # Storage
//!
//! Disk-backed implementations of the engine's source traits.

mod redb_source;

pub use redb_source::RedbObjSource;
