//! Directory of ConfigMap manifests used as a resource store.
//!
//! # Storage layout
//!
//! ```text
//! <manifests>/
//!   editor.yaml     (one or more YAML documents, `---` separated)
//!   plugins.yml
//! ```
//!
//! Only documents with `kind: ConfigMap` are read; their `data` map becomes
//! the resource snapshot. `binaryData` and every other kind are ignored.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::StoreError;
use crate::selector::Selector;
use crate::store::ResourceStore;
use crate::types::{Labels, Resource, ResourceId, Snapshot};

/// Namespace assigned to manifests that omit `metadata.namespace`.
pub const DEFAULT_NAMESPACE: &str = "default";

const CONFIG_MAP_KIND: &str = "ConfigMap";

#[derive(Debug, Deserialize)]
struct Manifest {
    kind: Option<String>,
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    data: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    name: Option<String>,
    namespace: Option<String>,
    #[serde(default)]
    labels: Labels,
}

/// Reads ConfigMap manifests from `*.yaml` / `*.yml` files directly inside a directory.
#[derive(Debug, Clone)]
pub struct ManifestDirStore {
    dir: PathBuf,
}

impl ManifestDirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load every ConfigMap in the directory, regardless of selector.
    pub fn load_all(&self) -> Result<Vec<Resource>, StoreError> {
        let unavailable = |path: &Path, source| StoreError::Unavailable {
            path: path.to_path_buf(),
            source,
        };

        let mut files: Vec<PathBuf> = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(|e| unavailable(self.dir.as_path(), e))? {
            let entry = entry.map_err(|e| unavailable(self.dir.as_path(), e))?;
            let path = entry.path();
            if !is_manifest_path(&path) {
                continue;
            }
            let ty = entry.file_type().map_err(|e| unavailable(path.as_path(), e))?;
            let is_file = if ty.is_symlink() {
                match std::fs::metadata(&path) {
                    Ok(meta) => meta.is_file(),
                    // Dangling link.
                    Err(err) if err.kind() == ErrorKind::NotFound => false,
                    Err(err) => return Err(unavailable(path.as_path(), err)),
                }
            } else {
                ty.is_file()
            };
            if is_file {
                files.push(path);
            }
        }
        files.sort();

        let mut resources: BTreeMap<ResourceId, Resource> = BTreeMap::new();
        for path in files {
            for resource in parse_manifest_file(&path)? {
                if resources.contains_key(&resource.id) {
                    return Err(StoreError::DuplicateResource {
                        id: resource.id,
                        path,
                    });
                }
                resources.insert(resource.id.clone(), resource);
            }
        }
        Ok(resources.into_values().collect())
    }
}

impl ResourceStore for ManifestDirStore {
    fn list_matching(&self, selector: &Selector) -> Result<Vec<(ResourceId, Snapshot)>, StoreError> {
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|res| selector.matches(&res.id, &res.labels))
            .map(|res| (res.id, res.data))
            .collect())
    }
}

/// True for `*.yaml` / `*.yml` paths (case-insensitive extension).
pub fn is_manifest_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
        .unwrap_or(false)
}

fn parse_manifest_file(path: &Path) -> Result<Vec<Resource>, StoreError> {
    let contents = std::fs::read_to_string(path).map_err(|source| StoreError::Unavailable {
        path: path.to_path_buf(),
        source,
    })?;

    let mut resources = Vec::new();
    for document in serde_yaml::Deserializer::from_str(&contents) {
        let value = serde_yaml::Value::deserialize(document).map_err(|e| StoreError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        if value.is_null() {
            continue;
        }
        let manifest: Manifest = serde_yaml::from_value(value).map_err(|e| StoreError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        if manifest.kind.as_deref() != Some(CONFIG_MAP_KIND) {
            continue;
        }

        let Some(name) = manifest.metadata.name.filter(|n| !n.is_empty()) else {
            return Err(StoreError::InvalidManifest {
                path: path.to_path_buf(),
                reason: "ConfigMap without metadata.name".to_string(),
            });
        };
        let namespace = manifest
            .metadata
            .namespace
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

        resources.push(Resource {
            id: ResourceId::new(namespace, name),
            labels: manifest.metadata.labels,
            data: manifest
                .data
                .into_iter()
                .map(|(key, value)| (key, value.into_bytes()))
                .collect(),
        });
    }
    Ok(resources)
}
