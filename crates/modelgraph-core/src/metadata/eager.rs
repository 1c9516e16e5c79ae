//! In-memory metadata store with caller-held transactions.
//!
//! A [`Transaction`] is a shadow map owned by the caller. Writes made through
//! it are visible to lookups that pass it in, and become visible to everyone
//! else only on commit. Commit merges the shadow over the shared map; the
//! last commit of an instance wins.

use super::{MetaInstance, Metadata};
use crate::types::GraphError;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

type InstanceMap = BTreeMap<String, BTreeMap<String, Arc<MetaInstance>>>;

fn insert(map: &mut InstanceMap, instance: MetaInstance) {
    map.entry(instance.classifier.clone())
        .or_default()
        .insert(instance.identifier.clone(), Arc::new(instance));
}

fn find_enum(map: &InstanceMap, enumeration: &str, member: &str) -> Option<Arc<MetaInstance>> {
    map.get(enumeration)?
        .values()
        .find(|instance| instance.is_enum && instance.name == member)
        .cloned()
}

// =============================================================================
// TRANSACTION
// =============================================================================

/// Pending writes against a [`MetadataEager`].
#[derive(Debug, Default)]
pub struct Transaction {
    shadow: InstanceMap,
}

impl Transaction {
    /// Stage an instance, replacing any staged one with the same key.
    pub fn add(&mut self, instance: MetaInstance) {
        insert(&mut self.shadow, instance);
    }

    /// Number of staged instances.
    pub fn len(&self) -> usize {
        self.shadow.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shadow.is_empty()
    }
}

// =============================================================================
// STORE
// =============================================================================

/// Metadata store holding every instance in memory.
#[derive(Debug, Default)]
pub struct MetadataEager {
    instances: RwLock<InstanceMap>,
}

impl MetadataEager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a batch of instances.
    pub fn with_instances(instances: impl IntoIterator<Item = MetaInstance>) -> Self {
        let store = Self::new();
        {
            let mut map = store.instances.write();
            for instance in instances {
                insert(&mut map, instance);
            }
        }
        store
    }

    /// Add an instance outside any transaction.
    pub fn add(&self, instance: MetaInstance) {
        insert(&mut self.instances.write(), instance);
    }

    /// Look an instance up, seeing the transaction's own writes first.
    pub fn get_metadata_in(
        &self,
        transaction: Option<&Transaction>,
        classifier: &str,
        id: &str,
    ) -> Result<Arc<MetaInstance>, GraphError> {
        if let Some(staged) = transaction
            .and_then(|tx| tx.shadow.get(classifier))
            .and_then(|instances| instances.get(id))
        {
            return Ok(Arc::clone(staged));
        }

        let staged_classifier =
            transaction.is_some_and(|tx| tx.shadow.contains_key(classifier));
        let map = self.instances.read();
        match map.get(classifier) {
            Some(instances) => instances.get(id).cloned().ok_or_else(|| {
                GraphError::InstanceNotFound {
                    classifier: classifier.to_string(),
                    id: id.to_string(),
                }
            }),
            None if staged_classifier => Err(GraphError::InstanceNotFound {
                classifier: classifier.to_string(),
                id: id.to_string(),
            }),
            None => Err(GraphError::ClassifierNotFound {
                classifier: classifier.to_string(),
            }),
        }
    }

    /// Every instance of `classifier`, overlaid with the transaction's writes.
    pub fn get_classifier_instances_in(
        &self,
        transaction: Option<&Transaction>,
        classifier: &str,
    ) -> Result<BTreeMap<String, Arc<MetaInstance>>, GraphError> {
        let staged = transaction.and_then(|tx| tx.shadow.get(classifier));
        let mut result = match self.instances.read().get(classifier) {
            Some(instances) => instances.clone(),
            None if staged.is_some() => BTreeMap::new(),
            None => {
                return Err(GraphError::ClassifierNotFound {
                    classifier: classifier.to_string(),
                });
            }
        };
        if let Some(staged) = staged {
            result.extend(staged.iter().map(|(id, instance)| (id.clone(), Arc::clone(instance))));
        }
        Ok(result)
    }

    /// Look an enumeration member up, seeing the transaction's own writes first.
    pub fn get_enum_in(
        &self,
        transaction: Option<&Transaction>,
        enumeration: &str,
        member: &str,
    ) -> Result<Arc<MetaInstance>, GraphError> {
        transaction
            .and_then(|tx| find_enum(&tx.shadow, enumeration, member))
            .or_else(|| find_enum(&self.instances.read(), enumeration, member))
            .ok_or_else(|| GraphError::EnumNotFound {
                enumeration: enumeration.to_string(),
                member: member.to_string(),
            })
    }

    /// Number of classifiers with at least one instance.
    pub fn classifier_count(&self) -> usize {
        self.instances.read().len()
    }

    /// Total number of instances.
    pub fn instance_count(&self) -> usize {
        self.instances.read().values().map(BTreeMap::len).sum()
    }
}

impl Metadata for MetadataEager {
    fn get_metadata(&self, classifier: &str, id: &str) -> Result<Arc<MetaInstance>, GraphError> {
        self.get_metadata_in(None, classifier, id)
    }

    fn get_classifier_instances(
        &self,
        classifier: &str,
    ) -> Result<BTreeMap<String, Arc<MetaInstance>>, GraphError> {
        self.get_classifier_instances_in(None, classifier)
    }

    fn get_enum(&self, enumeration: &str, member: &str) -> Result<Arc<MetaInstance>, GraphError> {
        self.get_enum_in(None, enumeration, member)
    }

    fn start_transaction(&self) -> Result<Transaction, GraphError> {
        Ok(Transaction::default())
    }

    fn commit_transaction(&self, transaction: Transaction) -> Result<(), GraphError> {
        let staged = transaction.len();
        let mut map = self.instances.write();
        for (classifier, instances) in transaction.shadow {
            map.entry(classifier).or_default().extend(instances);
        }
        tracing::debug!(staged, "metadata transaction committed");
        Ok(())
    }

    fn rollback_transaction(&self, transaction: Transaction) -> Result<(), GraphError> {
        tracing::debug!(staged = transaction.len(), "metadata transaction rolled back");
        Ok(())
    }
}
