//! Error types for configbump-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::ResourceId;

/// All errors that can arise while listing resources from a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be read at all (directory missing, permission denied, etc.).
    #[error("resource store unavailable at {path}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error, with the line context from serde_yaml.
    #[error("failed to parse manifest at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Well-formed YAML that does not describe a usable ConfigMap.
    #[error("invalid manifest at {path}: {reason}")]
    InvalidManifest { path: PathBuf, reason: String },

    /// Two manifests declared the same namespace/name.
    #[error("resource {id} is declared more than once (again in {path})")]
    DuplicateResource { id: ResourceId, path: PathBuf },

    /// A label selector expression could not be parsed.
    #[error("invalid label selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },
}
