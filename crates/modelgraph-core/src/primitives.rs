//! # Fixed Constants
//!
//! Hardcoded names and limits for the engine.
//!
//! The primitive type names form a closed enumeration. The deserializer
//! recognises primitive nodes solely by the name of their classifier, so
//! this list is part of the wire contract and must not change within a
//! format version.

use serde::{Deserialize, Serialize};

pub const BOOLEAN_TYPE_NAME: &str = "Boolean";
pub const DATE_TYPE_NAME: &str = "Date";
pub const STRICT_DATE_TYPE_NAME: &str = "StrictDate";
pub const DATETIME_TYPE_NAME: &str = "DateTime";
pub const FLOAT_TYPE_NAME: &str = "Float";
pub const DECIMAL_TYPE_NAME: &str = "Decimal";
pub const INTEGER_TYPE_NAME: &str = "Integer";
pub const STRING_TYPE_NAME: &str = "String";

/// Every primitive type name, in declaration order.
pub const PRIMITIVE_TYPE_NAMES: [&str; 8] = [
    BOOLEAN_TYPE_NAME,
    DATE_TYPE_NAME,
    STRICT_DATE_TYPE_NAME,
    DATETIME_TYPE_NAME,
    FLOAT_TYPE_NAME,
    DECIMAL_TYPE_NAME,
    INTEGER_TYPE_NAME,
    STRING_TYPE_NAME,
];

/// Name of the classifier whose instances are enumerations.
pub const ENUMERATION_TYPE_NAME: &str = "Enumeration";

/// Property holding the members of a package or an enumeration.
pub const CHILDREN_PROPERTY: &str = "children";

/// Path separator used by element paths (`a::b::C`).
pub const PATH_SEPARATOR: &str = "::";

/// Marker written in place of a file id when a node has no source information.
pub const NO_SOURCE_INFORMATION: i32 = -1;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum number of node records accepted by the deserializer.
///
/// Checked against the declared count BEFORE the node table is allocated.
pub const MAX_NODE_COUNT: u32 = 10_000_000;

/// Maximum element count or byte length of a single length-prefixed value.
///
/// 256 MB keeps a corrupted length prefix from driving a huge allocation.
pub const MAX_ARRAY_LENGTH: u32 = 256 * 1024 * 1024;

/// Maximum size of a module manifest file.
///
/// Checked BEFORE the payload is decoded.
pub const MAX_MANIFEST_SIZE: usize = 64 * 1024 * 1024;

// =============================================================================
// FILE LAYOUT
// =============================================================================

/// Magic bytes opening every module manifest.
pub const MANIFEST_MAGIC: &[u8; 4] = b"MGMF";

/// Current manifest format version.
pub const MANIFEST_VERSION: u8 = 1;

pub const GRAPH_FILE_EXTENSION: &str = "graph";
pub const MANIFEST_FILE_EXTENSION: &str = "manifest";
pub const ELEMENT_FILE_EXTENSION: &str = "elt";

/// Configurable limits applied while reading untrusted bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Upper bound on the declared node count of a serialized repository.
    pub max_node_count: u32,
    /// Upper bound on any length prefix.
    pub max_array_length: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_node_count: MAX_NODE_COUNT,
            max_array_length: MAX_ARRAY_LENGTH,
        }
    }
}

/// Whether `name` is one of the closed set of primitive type names.
#[must_use]
pub fn is_primitive_type_name(name: &str) -> bool {
    PRIMITIVE_TYPE_NAMES.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_names_are_closed() {
        assert_eq!(PRIMITIVE_TYPE_NAMES.len(), 8);
        assert!(is_primitive_type_name("Integer"));
        assert!(is_primitive_type_name("StrictDate"));
        assert!(!is_primitive_type_name("Class"));
        assert!(!is_primitive_type_name("integer"));
    }

    #[test]
    fn limits_default_to_constants() {
        let limits = Limits::default();
        assert_eq!(limits.max_node_count, MAX_NODE_COUNT);
        assert_eq!(limits.max_array_length, MAX_ARRAY_LENGTH);
    }
}
