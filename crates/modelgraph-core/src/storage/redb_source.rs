//! # redb-backed Instance Source
//!
//! A disk-backed [`ObjSource`] using the redb embedded database.
//!
//! Records are stored under `(classifier, identifier)` keys, so the instances
//! of one classifier form a contiguous key range. A second table lists the
//! known classifiers with their instance counts.

use crate::metadata::{MemoryObjSource, Obj, ObjSource};
use crate::types::GraphError;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::Path;

/// Table for instances: (classifier, identifier) -> encoded Obj bytes
const OBJS: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("objs");

/// Table for classifiers: classifier path -> instance count
const CLASSIFIERS: TableDefinition<&str, u64> = TableDefinition::new("classifiers");

fn storage_error(e: impl std::fmt::Display) -> GraphError {
    GraphError::StorageError(e.to_string())
}

/// Instance records persisted in a redb file.
pub struct RedbObjSource {
    db: Database,
}

impl std::fmt::Debug for RedbObjSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbObjSource").finish_non_exhaustive()
    }
}

impl RedbObjSource {
    /// Open or create a source database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let db = Database::create(path.as_ref()).map_err(storage_error)?;

        // Create the tables so readers never see them missing
        {
            let write_txn = db.begin_write().map_err(storage_error)?;
            let _ = write_txn.open_table(OBJS).map_err(storage_error)?;
            let _ = write_txn.open_table(CLASSIFIERS).map_err(storage_error)?;
            write_txn.commit().map_err(storage_error)?;
        }

        Ok(Self { db })
    }

    /// Store records in one write transaction. Existing keys are replaced.
    pub fn write_objs<'o>(&self, objs: impl IntoIterator<Item = &'o Obj>) -> Result<usize, GraphError> {
        let write_txn = self.db.begin_write().map_err(storage_error)?;
        let mut written = 0;
        {
            let mut objs_table = write_txn.open_table(OBJS).map_err(storage_error)?;
            let mut classifiers = write_txn.open_table(CLASSIFIERS).map_err(storage_error)?;
            for obj in objs {
                let bytes = obj.to_bytes()?;
                let is_new = objs_table
                    .insert((obj.classifier.as_str(), obj.identifier.as_str()), bytes.as_slice())
                    .map_err(storage_error)?
                    .is_none();
                if is_new {
                    let count = classifiers
                        .get(obj.classifier.as_str())
                        .map_err(storage_error)?
                        .map(|v| v.value())
                        .unwrap_or(0);
                    classifiers
                        .insert(obj.classifier.as_str(), count + 1)
                        .map_err(storage_error)?;
                }
                written += 1;
            }
        }
        write_txn.commit().map_err(storage_error)?;
        tracing::debug!(written, "instance records stored");
        Ok(written)
    }

    /// Copy every record of an in-memory source.
    pub fn import(&self, source: &MemoryObjSource) -> Result<usize, GraphError> {
        let mut objs = Vec::with_capacity(source.len());
        for classifier in source.classifiers() {
            let ids = source.classifier_instance_ids(classifier)?;
            objs.extend(source.get_instances(classifier, &ids)?);
        }
        self.write_objs(&objs)
    }

    /// Known classifier paths with their instance counts, in order.
    pub fn classifiers(&self) -> Result<Vec<(String, u64)>, GraphError> {
        let read_txn = self.db.begin_read().map_err(storage_error)?;
        let table = read_txn.open_table(CLASSIFIERS).map_err(storage_error)?;
        let mut classifiers = Vec::new();
        for entry in table.iter().map_err(storage_error)? {
            let (key, value) = entry.map_err(storage_error)?;
            classifiers.push((key.value().to_string(), value.value()));
        }
        Ok(classifiers)
    }

    /// Total number of stored records.
    pub fn len(&self) -> Result<u64, GraphError> {
        let read_txn = self.db.begin_read().map_err(storage_error)?;
        let table = read_txn.open_table(OBJS).map_err(storage_error)?;
        table.len().map_err(storage_error)
    }

    pub fn is_empty(&self) -> Result<bool, GraphError> {
        Ok(self.len()? == 0)
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<(), GraphError> {
        self.db.compact().map_err(storage_error)?;
        Ok(())
    }

    fn require_classifier(&self, classifier: &str) -> Result<(), GraphError> {
        if self.has_classifier(classifier)? {
            Ok(())
        } else {
            Err(GraphError::ClassifierNotFound {
                classifier: classifier.to_string(),
            })
        }
    }
}

impl ObjSource for RedbObjSource {
    fn has_classifier(&self, classifier: &str) -> Result<bool, GraphError> {
        let read_txn = self.db.begin_read().map_err(storage_error)?;
        let table = read_txn.open_table(CLASSIFIERS).map_err(storage_error)?;
        Ok(table.get(classifier).map_err(storage_error)?.is_some())
    }

    fn classifier_instance_ids(&self, classifier: &str) -> Result<Vec<String>, GraphError> {
        self.require_classifier(classifier)?;
        let read_txn = self.db.begin_read().map_err(storage_error)?;
        let table = read_txn.open_table(OBJS).map_err(storage_error)?;
        let mut ids = Vec::new();
        for entry in table
            .range((classifier, "")..)
            .map_err(storage_error)?
        {
            let (key, _) = entry.map_err(storage_error)?;
            let (owner, id) = key.value();
            if owner != classifier {
                break;
            }
            ids.push(id.to_string());
        }
        Ok(ids)
    }

    fn get_instances(&self, classifier: &str, ids: &[String]) -> Result<Vec<Obj>, GraphError> {
        self.require_classifier(classifier)?;
        let read_txn = self.db.begin_read().map_err(storage_error)?;
        let table = read_txn.open_table(OBJS).map_err(storage_error)?;
        ids.iter()
            .map(|id| {
                let data = table
                    .get((classifier, id.as_str()))
                    .map_err(storage_error)?
                    .ok_or_else(|| GraphError::InstanceNotFound {
                        classifier: classifier.to_string(),
                        id: id.clone(),
                    })?;
                Obj::from_bytes(data.value())
            })
            .collect()
    }
}
