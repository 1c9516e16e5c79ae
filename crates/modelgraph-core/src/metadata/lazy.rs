//! Metadata store that decodes instances on first access.
//!
//! Every lookup goes cache first, then [`ObjSource`]. Freshly decoded
//! instances are published get-if-absent, so concurrent loaders of the same
//! instance all end up holding the one that was stored first.
//!
//! Instances are built by a [`Constructor`] that the [`InstanceFactory`]
//! resolves once per classifier. Enumeration members share a single enum
//! constructor.

use super::{MetaInstance, Metadata, Obj, ObjSource, RValue, Transaction};
use crate::graph::PrimitiveValue;
use crate::types::GraphError;
use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Builds a live instance from a decoded record.
pub type Constructor = Arc<dyn Fn(&Obj) -> Result<MetaInstance, GraphError> + Send + Sync>;

/// Supplies constructors to a [`MetadataLazy`].
pub trait InstanceFactory: Send + Sync {
    /// Constructor for instances of `classifier`. Called at most once per
    /// classifier unless it fails.
    fn constructor(&self, classifier: &str) -> Result<Constructor, GraphError>;

    /// Constructor for enumeration members.
    fn enum_constructor(&self) -> Constructor;
}

/// Copies the record as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultInstanceFactory;

impl InstanceFactory for DefaultInstanceFactory {
    fn constructor(&self, _classifier: &str) -> Result<Constructor, GraphError> {
        Ok(Arc::new(|obj: &Obj| -> Result<MetaInstance, GraphError> {
            Ok(MetaInstance::from(obj))
        }))
    }

    fn enum_constructor(&self) -> Constructor {
        Arc::new(|obj: &Obj| -> Result<MetaInstance, GraphError> {
            let mut instance = MetaInstance::from(obj);
            instance.is_enum = true;
            Ok(instance)
        })
    }
}

/// A property value with references replaced by live instances.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedValue {
    Primitive(PrimitiveValue),
    Instance(Arc<MetaInstance>),
}

type InstanceCache = Arc<DashMap<String, Arc<MetaInstance>>>;
type EnumIndex = Arc<BTreeMap<String, Arc<MetaInstance>>>;

/// Metadata store backed by an [`ObjSource`].
pub struct MetadataLazy<S, F = DefaultInstanceFactory> {
    source: S,
    factory: F,
    /// classifier -> identifier -> instance
    instances: DashMap<String, InstanceCache>,
    /// enumeration -> member name -> instance
    enums: DashMap<String, EnumIndex>,
    constructors: DashMap<String, Constructor>,
    enum_constructor: OnceLock<Constructor>,
}

impl<S, F> fmt::Debug for MetadataLazy<S, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataLazy")
            .field("cached_classifiers", &self.instances.len())
            .field("cached_enumerations", &self.enums.len())
            .field("constructors", &self.constructors.len())
            .finish()
    }
}

impl<S: ObjSource> MetadataLazy<S> {
    pub fn new(source: S) -> Self {
        Self::with_factory(source, DefaultInstanceFactory)
    }
}

impl<S: ObjSource, F: InstanceFactory> MetadataLazy<S, F> {
    pub fn with_factory(source: S, factory: F) -> Self {
        Self {
            source,
            factory,
            instances: DashMap::new(),
            enums: DashMap::new(),
            constructors: DashMap::new(),
            enum_constructor: OnceLock::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Number of instances decoded so far.
    pub fn cached_count(&self) -> usize {
        self.instances.iter().map(|cache| cache.len()).sum()
    }

    pub fn is_cached(&self, classifier: &str, id: &str) -> bool {
        self.instances
            .get(classifier)
            .is_some_and(|cache| cache.contains_key(id))
    }

    // =========================================================================
    // LOADING
    // =========================================================================

    fn cache_for(&self, classifier: &str) -> Result<InstanceCache, GraphError> {
        if let Some(cache) = self.instances.get(classifier) {
            return Ok(Arc::clone(cache.value()));
        }
        if !self.source.has_classifier(classifier)? {
            return Err(GraphError::ClassifierNotFound {
                classifier: classifier.to_string(),
            });
        }
        Ok(Arc::clone(
            self.instances.entry(classifier.to_string()).or_default().value(),
        ))
    }

    fn constructor(&self, classifier: &str) -> Result<Constructor, GraphError> {
        if let Some(constructor) = self.constructors.get(classifier) {
            return Ok(Arc::clone(constructor.value()));
        }
        let constructor = self.factory.constructor(classifier)?;
        Ok(Arc::clone(
            self.constructors
                .entry(classifier.to_string())
                .or_insert(constructor)
                .value(),
        ))
    }

    fn instantiate(&self, obj: &Obj) -> Result<MetaInstance, GraphError> {
        let constructor = if obj.is_enum {
            Arc::clone(
                self.enum_constructor
                    .get_or_init(|| self.factory.enum_constructor()),
            )
        } else {
            self.constructor(&obj.classifier)?
        };
        constructor(obj)
    }

    /// Instances `ids` of `classifier`, in the order asked.
    ///
    /// Everything not yet cached is fetched from the source in one batch.
    pub fn get_many(
        &self,
        classifier: &str,
        ids: &[String],
    ) -> Result<Vec<Arc<MetaInstance>>, GraphError> {
        let cache = self.cache_for(classifier)?;

        let mut seen = HashSet::new();
        let missing: Vec<String> = ids
            .iter()
            .filter(|&id| !cache.contains_key(id.as_str()) && seen.insert(id.as_str()))
            .cloned()
            .collect();

        if !missing.is_empty() {
            let objs = self.source.get_instances(classifier, &missing)?;
            tracing::debug!(classifier, loaded = objs.len(), "metadata instances loaded");
            for obj in &objs {
                let instance = self.instantiate(obj)?;
                cache
                    .entry(obj.identifier.clone())
                    .or_insert_with(|| Arc::new(instance));
            }
        }

        ids.iter()
            .map(|id| {
                cache
                    .get(id)
                    .map(|instance| Arc::clone(instance.value()))
                    .ok_or_else(|| GraphError::InstanceNotFound {
                        classifier: classifier.to_string(),
                        id: id.clone(),
                    })
            })
            .collect()
    }

    /// Replace references by live instances, keeping order.
    ///
    /// Object references are loaded in one batch per classifier.
    pub fn resolve_values(&self, values: &[RValue]) -> Result<Vec<ResolvedValue>, GraphError> {
        let mut wanted: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for value in values {
            if let RValue::ObjRef { classifier, id } = value
                && !self.is_cached(classifier, id)
            {
                wanted.entry(classifier.as_str()).or_default().push(id.clone());
            }
        }
        for (classifier, ids) in &wanted {
            self.get_many(classifier, ids)?;
        }

        values
            .iter()
            .map(|value| match value {
                RValue::Primitive(primitive) => Ok(ResolvedValue::Primitive(primitive.clone())),
                RValue::ObjRef { classifier, id } => {
                    self.get_metadata(classifier, id).map(ResolvedValue::Instance)
                }
                RValue::EnumRef {
                    enumeration,
                    member,
                } => self.get_enum(enumeration, member).map(ResolvedValue::Instance),
            })
            .collect()
    }

    fn enum_index(&self, enumeration: &str) -> Result<EnumIndex, GraphError> {
        if let Some(index) = self.enums.get(enumeration) {
            return Ok(Arc::clone(index.value()));
        }
        let ids = self.source.classifier_instance_ids(enumeration)?;
        let members: BTreeMap<String, Arc<MetaInstance>> = self
            .get_many(enumeration, &ids)?
            .into_iter()
            .filter(|instance| instance.is_enum)
            .map(|instance| (instance.name.clone(), instance))
            .collect();
        tracing::debug!(enumeration, members = members.len(), "enum index built");
        Ok(Arc::clone(
            self.enums
                .entry(enumeration.to_string())
                .or_insert_with(|| Arc::new(members))
                .value(),
        ))
    }

    /// Classifiers with at least one cached instance.
    pub fn cached_classifiers(&self) -> BTreeSet<String> {
        self.instances
            .iter()
            .filter(|cache| !cache.is_empty())
            .map(|cache| cache.key().clone())
            .collect()
    }
}

impl<S: ObjSource, F: InstanceFactory> Metadata for MetadataLazy<S, F> {
    fn get_metadata(&self, classifier: &str, id: &str) -> Result<Arc<MetaInstance>, GraphError> {
        if let Some(instance) = self
            .instances
            .get(classifier)
            .and_then(|cache| cache.get(id).map(|instance| Arc::clone(instance.value())))
        {
            return Ok(instance);
        }
        self.get_many(classifier, &[id.to_string()])?
            .pop()
            .ok_or_else(|| GraphError::InstanceNotFound {
                classifier: classifier.to_string(),
                id: id.to_string(),
            })
    }

    fn get_classifier_instances(
        &self,
        classifier: &str,
    ) -> Result<BTreeMap<String, Arc<MetaInstance>>, GraphError> {
        let ids = self.source.classifier_instance_ids(classifier)?;
        let instances = self.get_many(classifier, &ids)?;
        Ok(ids.into_iter().zip(instances).collect())
    }

    fn get_enum(&self, enumeration: &str, member: &str) -> Result<Arc<MetaInstance>, GraphError> {
        let not_found = || GraphError::EnumNotFound {
            enumeration: enumeration.to_string(),
            member: member.to_string(),
        };
        let index = match self.enum_index(enumeration) {
            Ok(index) => index,
            Err(GraphError::ClassifierNotFound { .. }) => return Err(not_found()),
            Err(e) => return Err(e),
        };
        index.get(member).cloned().ok_or_else(not_found)
    }

    fn start_transaction(&self) -> Result<Transaction, GraphError> {
        Err(GraphError::Unsupported("transactions on the lazy metadata store"))
    }

    fn commit_transaction(&self, _transaction: Transaction) -> Result<(), GraphError> {
        Err(GraphError::Unsupported("transactions on the lazy metadata store"))
    }

    fn rollback_transaction(&self, _transaction: Transaction) -> Result<(), GraphError> {
        Err(GraphError::Unsupported("transactions on the lazy metadata store"))
    }
}
