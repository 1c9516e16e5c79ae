//! # Metadata Stores
//!
//! "Give me the instance of classifier C with id I."
//!
//! Two stores answer that question:
//! - [`MetadataEager`]: everything in memory, with explicit transactions
//! - [`MetadataLazy`]: instances decoded on first access from an
//!   [`ObjSource`] partitioned by classifier, then cached
//!
//! Instances are keyed by classifier path and identifier strings, not by
//! node id, so they survive being shipped between separately built graphs.
//! Enumeration members are looked up by enumeration path and member name.

mod eager;
mod lazy;
pub(crate) mod source;

pub use eager::{MetadataEager, Transaction};
pub use lazy::{
    Constructor, DefaultInstanceFactory, InstanceFactory, MetadataLazy, ResolvedValue,
};
pub use source::{MemoryObjSource, ObjSource, objs_from_repository, partition_repository};

use crate::codec::{BufferWriter, CodecError, Reader, SliceReader, Writer};
use crate::graph::{NodeKind, PrimitiveValue};
use crate::types::{GraphError, SourceInformation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

// =============================================================================
// VALUES
// =============================================================================

/// One property value of a stored instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RValue {
    Primitive(PrimitiveValue),
    ObjRef { classifier: String, id: String },
    EnumRef { enumeration: String, member: String },
}

const TAG_PRIMITIVE: u8 = 0;
const TAG_OBJ_REF: u8 = 1;
const TAG_ENUM_REF: u8 = 2;

impl RValue {
    fn write<W: Writer>(&self, out: &mut W) -> Result<(), CodecError> {
        match self {
            Self::Primitive(value) => {
                out.write_byte(TAG_PRIMITIVE)?;
                out.write_string(value.kind().type_name().unwrap_or_default())?;
                out.write_string(&value.to_string())
            }
            Self::ObjRef { classifier, id } => {
                out.write_byte(TAG_OBJ_REF)?;
                out.write_string(classifier)?;
                out.write_string(id)
            }
            Self::EnumRef {
                enumeration,
                member,
            } => {
                out.write_byte(TAG_ENUM_REF)?;
                out.write_string(enumeration)?;
                out.write_string(member)
            }
        }
    }

    fn read<R: Reader>(input: &mut R) -> Result<Self, GraphError> {
        let offset = input.position();
        match input.read_byte()? {
            TAG_PRIMITIVE => {
                let kind = NodeKind::from_type_name(&input.read_string()?);
                let literal = input.read_string()?;
                let value = PrimitiveValue::parse(kind, &literal)?.ok_or_else(|| {
                    GraphError::SerializationError(format!(
                        "offset {offset}: primitive value without a primitive type"
                    ))
                })?;
                Ok(Self::Primitive(value))
            }
            TAG_OBJ_REF => Ok(Self::ObjRef {
                classifier: input.read_string()?,
                id: input.read_string()?,
            }),
            TAG_ENUM_REF => Ok(Self::EnumRef {
                enumeration: input.read_string()?,
                member: input.read_string()?,
            }),
            tag => Err(GraphError::SerializationError(format!(
                "offset {offset}: unknown value tag {tag}"
            ))),
        }
    }
}

// =============================================================================
// RAW RECORDS
// =============================================================================

/// A stored instance as decoded from an [`ObjSource`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obj {
    pub classifier: String,
    pub identifier: String,
    pub name: String,
    pub source_information: Option<SourceInformation>,
    /// Property name to values, in the node's property order.
    pub properties: Vec<(String, Vec<RValue>)>,
    /// Member of an enumeration.
    pub is_enum: bool,
}

impl Obj {
    /// Encode with the crate's binary codec.
    pub fn write<W: Writer>(&self, out: &mut W) -> Result<(), CodecError> {
        out.write_boolean(self.is_enum)?;
        out.write_string(&self.classifier)?;
        out.write_string(&self.identifier)?;
        out.write_string(&self.name)?;
        match &self.source_information {
            None => out.write_boolean(false)?,
            Some(source) => {
                out.write_boolean(true)?;
                out.write_string(&source.source_id)?;
                out.write_int(source.start_line)?;
                out.write_int(source.start_column)?;
                out.write_int(source.line)?;
                out.write_int(source.column)?;
                out.write_int(source.end_line)?;
                out.write_int(source.end_column)?;
            }
        }
        out.write_length(self.properties.len())?;
        for (name, values) in &self.properties {
            out.write_string(name)?;
            out.write_length(values.len())?;
            for value in values {
                value.write(out)?;
            }
        }
        Ok(())
    }

    /// Encode into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>, GraphError> {
        let mut out = BufferWriter::new();
        self.write(&mut out)?;
        Ok(out.into_bytes())
    }

    /// Decode one record that must span all of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GraphError> {
        let mut input = SliceReader::new(bytes);
        let obj = Self::read(&mut input)?;
        if !input.is_exhausted() {
            return Err(GraphError::SerializationError(format!(
                "{} trailing bytes after record {}",
                input.remaining(),
                obj.identifier
            )));
        }
        Ok(obj)
    }

    pub fn read<R: Reader>(input: &mut R) -> Result<Self, GraphError> {
        let is_enum = input.read_boolean()?;
        let classifier = input.read_string()?;
        let identifier = input.read_string()?;
        let name = input.read_string()?;
        let source_information = if input.read_boolean()? {
            Some(SourceInformation::new(
                input.read_string()?,
                input.read_int()?,
                input.read_int()?,
                input.read_int()?,
                input.read_int()?,
                input.read_int()?,
                input.read_int()?,
            ))
        } else {
            None
        };
        let property_count = input.read_length()?;
        let mut properties = Vec::with_capacity(property_count.min(64));
        for _ in 0..property_count {
            let property = input.read_string()?;
            let value_count = input.read_length()?;
            let mut values = Vec::with_capacity(value_count.min(64));
            for _ in 0..value_count {
                values.push(RValue::read(input)?);
            }
            properties.push((property, values));
        }
        Ok(Self {
            classifier,
            identifier,
            name,
            source_information,
            properties,
            is_enum,
        })
    }
}

// =============================================================================
// LIVE INSTANCES
// =============================================================================

/// A live instance served by a metadata store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaInstance {
    pub classifier: String,
    pub identifier: String,
    pub name: String,
    pub source_information: Option<SourceInformation>,
    pub properties: BTreeMap<String, Vec<RValue>>,
    pub is_enum: bool,
}

impl MetaInstance {
    /// Create an instance with no properties.
    pub fn new(
        classifier: impl Into<String>,
        identifier: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            classifier: classifier.into(),
            identifier: identifier.into(),
            name: name.into(),
            source_information: None,
            properties: BTreeMap::new(),
            is_enum: false,
        }
    }

    /// Create an enumeration member; its identifier is its name.
    pub fn new_enum(enumeration: impl Into<String>, member: impl Into<String>) -> Self {
        let member = member.into();
        let mut instance = Self::new(enumeration, member.clone(), member);
        instance.is_enum = true;
        instance
    }

    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, values: Vec<RValue>) -> Self {
        self.properties.insert(name.into(), values);
        self
    }

    /// Values of a property; empty when absent.
    #[must_use]
    pub fn values(&self, name: &str) -> &[RValue] {
        self.properties.get(name).map_or(&[], Vec::as_slice)
    }
}

impl From<&Obj> for MetaInstance {
    fn from(obj: &Obj) -> Self {
        Self {
            classifier: obj.classifier.clone(),
            identifier: obj.identifier.clone(),
            name: obj.name.clone(),
            source_information: obj.source_information.clone(),
            properties: obj.properties.iter().cloned().collect(),
            is_enum: obj.is_enum,
        }
    }
}

// =============================================================================
// METADATA TRAIT
// =============================================================================

/// Lookup surface shared by the eager and lazy stores.
pub trait Metadata {
    /// The instance `id` of `classifier`.
    ///
    /// Fails with `ClassifierNotFound` when the classifier is unknown and
    /// `InstanceNotFound` when only the id is.
    fn get_metadata(&self, classifier: &str, id: &str) -> Result<Arc<MetaInstance>, GraphError>;

    /// Every instance of `classifier`, keyed by identifier.
    fn get_classifier_instances(
        &self,
        classifier: &str,
    ) -> Result<BTreeMap<String, Arc<MetaInstance>>, GraphError>;

    /// The member `member` of `enumeration`.
    fn get_enum(&self, enumeration: &str, member: &str) -> Result<Arc<MetaInstance>, GraphError>;

    fn start_transaction(&self) -> Result<Transaction, GraphError>;

    fn commit_transaction(&self, transaction: Transaction) -> Result<(), GraphError>;

    fn rollback_transaction(&self, transaction: Transaction) -> Result<(), GraphError>;
}
