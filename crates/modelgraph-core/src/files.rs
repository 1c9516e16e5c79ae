//! # On-disk Module Layout
//!
//! Where serialized modules live and how they are read back.
//!
//! A module is stored as two files side by side:
//! - `<module>.graph`: the repository wire format
//! - `<module>.manifest`: header (5 bytes) + postcard-encoded [`ModuleManifest`]
//!
//! Single elements may also be stored on their own under their element path
//! (`a::b::C` becomes `a/b/C.elt`).
//!
//! The manifest size and header are validated BEFORE the payload is decoded.

use crate::codec::SliceReader;
use crate::formats::{BinaryRepositorySerializer, BuildOptions};
use crate::graph::Repository;
use crate::metadata::Obj;
use crate::primitives::{
    self, ELEMENT_FILE_EXTENSION, GRAPH_FILE_EXTENSION, Limits, MANIFEST_FILE_EXTENSION,
    MAX_MANIFEST_SIZE, PATH_SEPARATOR,
};
use crate::types::{GraphError, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

fn validate_non_empty<'s>(value: &'s str, what: &'static str) -> Result<&'s str, GraphError> {
    if value.is_empty() {
        return Err(GraphError::InvalidArgument {
            what,
            value: value.to_string(),
        });
    }
    Ok(value)
}

// =============================================================================
// PATH PROVIDER
// =============================================================================

/// Maps module names and element paths to file paths relative to a root.
pub trait FilePathProvider: Send + Sync {
    fn module_file(&self, module: &str) -> Result<PathBuf, GraphError>;

    fn module_manifest_file(&self, module: &str) -> Result<PathBuf, GraphError>;

    fn element_file(&self, element_path: &str) -> Result<PathBuf, GraphError>;
}

/// `<module>.graph`, `<module>.manifest` and `a/b/C.elt`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFilePathProvider;

impl FilePathProvider for DefaultFilePathProvider {
    fn module_file(&self, module: &str) -> Result<PathBuf, GraphError> {
        let module = validate_non_empty(module, "module name")?;
        Ok(PathBuf::from(format!("{module}.{GRAPH_FILE_EXTENSION}")))
    }

    fn module_manifest_file(&self, module: &str) -> Result<PathBuf, GraphError> {
        let module = validate_non_empty(module, "module name")?;
        Ok(PathBuf::from(format!("{module}.{MANIFEST_FILE_EXTENSION}")))
    }

    fn element_file(&self, element_path: &str) -> Result<PathBuf, GraphError> {
        validate_non_empty(element_path, "element path")?;
        let segments: Vec<&str> = element_path.split(PATH_SEPARATOR).collect();
        if segments
            .iter()
            .any(|s| s.is_empty() || *s == "." || *s == ".." || s.contains(['/', '\\']))
        {
            return Err(GraphError::InvalidArgument {
                what: "element path",
                value: element_path.to_string(),
            });
        }
        let (name, packages) = segments
            .split_last()
            .ok_or_else(|| GraphError::InvalidArgument {
                what: "element path",
                value: element_path.to_string(),
            })?;
        let mut path: PathBuf = packages.iter().collect();
        path.push(format!("{name}.{ELEMENT_FILE_EXTENSION}"));
        Ok(path)
    }
}

// =============================================================================
// MANIFEST
// =============================================================================

/// The header preceding every manifest payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl ManifestHeader {
    const SIZE: usize = 5;

    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MANIFEST_MAGIC,
            version: primitives::MANIFEST_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), GraphError> {
        if &self.magic != primitives::MANIFEST_MAGIC {
            return Err(GraphError::SerializationError(
                "Invalid manifest magic bytes".to_string(),
            ));
        }
        if self.version != primitives::MANIFEST_VERSION {
            return Err(GraphError::SerializationError(format!(
                "Unsupported manifest version: {} (expected {})",
                self.version,
                primitives::MANIFEST_VERSION
            )));
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> [u8; 5] {
        let mut bytes = [0u8; 5];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GraphError> {
        let Some(header) = bytes.get(..Self::SIZE) else {
            return Err(GraphError::SerializationError(
                "Manifest header too short".to_string(),
            ));
        };
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&header[0..4]);
        Ok(Self {
            magic,
            version: header[4],
        })
    }
}

impl Default for ManifestHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// What a stored module contains, written next to its graph file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleManifest {
    pub module: String,
    /// Names of the top levels, in order.
    pub top_levels: Vec<String>,
    /// Paths of the elements reachable through `children`, in order.
    pub elements: Vec<String>,
    pub node_count: u64,
    /// Byte length of the graph file.
    pub graph_length: u64,
}

impl ModuleManifest {
    pub fn to_bytes(&self) -> Result<Vec<u8>, GraphError> {
        let payload = postcard::to_stdvec(self)
            .map_err(|e| GraphError::SerializationError(e.to_string()))?;
        let mut bytes = Vec::with_capacity(ManifestHeader::SIZE + payload.len());
        bytes.extend_from_slice(&ManifestHeader::new().to_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GraphError> {
        if bytes.len() > MAX_MANIFEST_SIZE {
            return Err(GraphError::LimitExceeded {
                what: "manifest size",
                value: bytes.len() as u64,
                limit: MAX_MANIFEST_SIZE as u64,
            });
        }
        ManifestHeader::from_bytes(bytes)?.validate()?;
        postcard::from_bytes(&bytes[ManifestHeader::SIZE..]).map_err(|e| {
            GraphError::SerializationError(format!("Failed to decode manifest: {e}"))
        })
    }
}

// =============================================================================
// MODULE STORE
// =============================================================================

/// Reads and writes modules under a root directory.
#[derive(Debug, Clone)]
pub struct ModuleStore<P = DefaultFilePathProvider> {
    root: PathBuf,
    provider: P,
    limits: Limits,
}

impl ModuleStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_provider(root, DefaultFilePathProvider)
    }
}

impl<P: FilePathProvider> ModuleStore<P> {
    pub fn with_provider(root: impl Into<PathBuf>, provider: P) -> Self {
        Self {
            root: root.into(),
            provider,
            limits: Limits::default(),
        }
    }

    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn module_path(&self, module: &str) -> Result<PathBuf, GraphError> {
        Ok(self.root.join(self.provider.module_file(module)?))
    }

    pub fn manifest_path(&self, module: &str) -> Result<PathBuf, GraphError> {
        Ok(self.root.join(self.provider.module_manifest_file(module)?))
    }

    pub fn element_path(&self, element_path: &str) -> Result<PathBuf, GraphError> {
        Ok(self.root.join(self.provider.element_file(element_path)?))
    }

    /// Whether the module's graph file exists.
    pub fn module_exists(&self, module: &str) -> Result<bool, GraphError> {
        Ok(self.module_path(module)?.is_file())
    }

    /// Serialize `repo` as `module`, replacing any previous version.
    pub fn write_module(
        &self,
        repo: &Repository,
        module: &str,
    ) -> Result<ModuleManifest, GraphError> {
        let graph = crate::formats::repository_to_bytes(repo)?;
        let graph_path = self.module_path(module)?;
        write_file(&graph_path, &graph)?;

        let manifest = ModuleManifest {
            module: module.to_string(),
            top_levels: repo
                .top_levels()
                .filter_map(|id| repo.get(id).map(|node| node.name.clone()))
                .collect(),
            elements: {
                let mut elements: Vec<String> = repo.element_paths().into_values().collect();
                elements.sort();
                elements
            },
            node_count: repo.node_count() as u64,
            graph_length: graph.len() as u64,
        };
        write_file(&self.manifest_path(module)?, &manifest.to_bytes()?)?;

        tracing::debug!(
            module,
            nodes = manifest.node_count,
            bytes = manifest.graph_length,
            path = %graph_path.display(),
            "module written"
        );
        Ok(manifest)
    }

    pub fn read_manifest(&self, module: &str) -> Result<ModuleManifest, GraphError> {
        let bytes = read_file(module, &self.manifest_path(module)?)?;
        ModuleManifest::from_bytes(&bytes)
    }

    /// Load `module` into `repo`; returns serialized id to live id.
    ///
    /// When a manifest is present, the graph file length must match it.
    pub fn read_module(
        &self,
        module: &str,
        repo: &mut Repository,
        options: &BuildOptions<'_>,
    ) -> Result<BTreeMap<i32, NodeId>, GraphError> {
        let graph = read_file(module, &self.module_path(module)?)?;
        if self.manifest_path(module)?.is_file() {
            let manifest = self.read_manifest(module)?;
            if manifest.graph_length != graph.len() as u64 {
                return Err(GraphError::SerializationError(format!(
                    "module {module}: graph file is {} bytes, manifest expects {}",
                    graph.len(),
                    manifest.graph_length
                )));
            }
        }

        let mut reader = SliceReader::new(&graph).with_max_length(self.limits.max_array_length);
        let ids = BinaryRepositorySerializer::with_limits(self.limits).build(
            &mut reader,
            repo,
            options,
        )?;
        if !reader.is_exhausted() {
            return Err(GraphError::SerializationError(format!(
                "module {module}: {} trailing bytes after node table",
                reader.remaining()
            )));
        }
        tracing::debug!(module, nodes = ids.len(), "module read");
        Ok(ids)
    }

    /// Store one instance record under its element path.
    pub fn write_element(&self, obj: &Obj) -> Result<PathBuf, GraphError> {
        let path = self.element_path(&obj.identifier)?;
        write_file(&path, &obj.to_bytes()?)?;
        Ok(path)
    }

    pub fn read_element(&self, element_path: &str) -> Result<Obj, GraphError> {
        let bytes = read_file(element_path, &self.element_path(element_path)?)?;
        Obj::from_bytes(&bytes)
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), GraphError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    Ok(())
}

fn read_file(name: &str, path: &Path) -> Result<Vec<u8>, GraphError> {
    if !path.is_file() {
        return Err(GraphError::FileNotFound {
            name: name.to_string(),
            path: path.to_path_buf(),
        });
    }
    Ok(fs::read(path)?)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::metadata::source::tests::model_repository;
    use crate::metadata::objs_from_repository;
    use tempfile::tempdir;

    #[test]
    fn default_paths() {
        let provider = DefaultFilePathProvider;
        assert_eq!(
            provider.module_file("core").unwrap(),
            PathBuf::from("core.graph")
        );
        assert_eq!(
            provider.module_manifest_file("core").unwrap(),
            PathBuf::from("core.manifest")
        );
        assert_eq!(
            provider.element_file("a::b::C").unwrap(),
            Path::new("a").join("b").join("C.elt")
        );
        assert_eq!(provider.element_file("C").unwrap(), PathBuf::from("C.elt"));
    }

    #[test]
    fn malformed_names_are_rejected() {
        let provider = DefaultFilePathProvider;
        assert!(matches!(
            provider.module_file(""),
            Err(GraphError::InvalidArgument { what: "module name", .. })
        ));
        assert!(provider.element_file("a::::C").is_err());
        assert!(provider.element_file("a::../C").is_err());
        assert!(provider.element_file("a::..::C").is_err());
    }

    #[test]
    fn manifest_header_is_validated() {
        let manifest = ModuleManifest {
            module: "m".to_string(),
            top_levels: vec![],
            elements: vec![],
            node_count: 0,
            graph_length: 0,
        };
        let mut bytes = manifest.to_bytes().unwrap();
        assert_eq!(ModuleManifest::from_bytes(&bytes).unwrap(), manifest);

        bytes[4] = 99;
        assert!(ModuleManifest::from_bytes(&bytes).is_err());
        assert!(ModuleManifest::from_bytes(b"MG").is_err());
    }

    #[test]
    fn module_round_trip() {
        let temp = tempdir().unwrap();
        let store = ModuleStore::new(temp.path());
        let repo = model_repository();

        assert!(!store.module_exists("model").unwrap());
        let manifest = store.write_module(&repo, "model").unwrap();
        assert!(store.module_exists("model").unwrap());
        assert_eq!(manifest.node_count, repo.node_count() as u64);
        assert!(manifest.elements.contains(&"model::Person".to_string()));
        assert_eq!(store.read_manifest("model").unwrap(), manifest);

        let mut loaded = Repository::new();
        let ids = store
            .read_module("model", &mut loaded, &BuildOptions::default())
            .unwrap();
        assert_eq!(ids.len(), repo.node_count());
        assert!(loaded.resolve_path("model::Person").is_some());
    }

    #[test]
    fn truncated_graph_file_is_caught_by_manifest() {
        let temp = tempdir().unwrap();
        let store = ModuleStore::new(temp.path());
        store.write_module(&model_repository(), "model").unwrap();

        let path = store.module_path("model").unwrap();
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() - 1]).unwrap();

        let err = store
            .read_module("model", &mut Repository::new(), &BuildOptions::default())
            .unwrap_err();
        assert!(matches!(err, GraphError::SerializationError(_)));
    }

    #[test]
    fn missing_files_report_their_location() {
        let temp = tempdir().unwrap();
        let store = ModuleStore::new(temp.path());
        let err = store
            .read_module("absent", &mut Repository::new(), &BuildOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            GraphError::FileNotFound { ref name, ref path }
                if name == "absent" && path.ends_with("absent.graph")
        ));
        assert!(matches!(
            store.read_element("model::Nope"),
            Err(GraphError::FileNotFound { .. })
        ));
    }

    #[test]
    fn elements_are_stored_by_path() {
        let temp = tempdir().unwrap();
        let store = ModuleStore::new(temp.path());
        let person = objs_from_repository(&model_repository())
            .unwrap()
            .into_iter()
            .find(|obj| obj.identifier == "model::Person")
            .unwrap();

        let path = store.write_element(&person).unwrap();
        assert!(path.ends_with(Path::new("model").join("Person.elt")));
        assert_eq!(store.read_element("model::Person").unwrap(), person);
    }
}
