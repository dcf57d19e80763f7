//! Domain types shared by the store, the sync engine and the daemon.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// File name → raw content, as reported by the store for one resource.
pub type Snapshot = BTreeMap<String, Vec<u8>>;

/// Label key → label value.
pub type Labels = BTreeMap<String, String>;

/// Stable identity of an external configuration resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    pub namespace: String,
    pub name: String,
}

impl ResourceId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A configuration resource: identity, labels, and its flat file map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub id: ResourceId,
    pub labels: Labels,
    pub data: Snapshot,
}

impl Resource {
    pub fn new(id: ResourceId) -> Self {
        Self {
            id,
            labels: Labels::new(),
            data: Snapshot::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_file(mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.data.insert(name.into(), content.into());
        self
    }
}

/// One change notification: the resource's current files, or `None` when it
/// was deleted or no longer matches the selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEvent {
    pub id: ResourceId,
    pub snapshot: Option<Snapshot>,
}

impl ResourceEvent {
    pub fn changed(id: ResourceId, snapshot: Snapshot) -> Self {
        Self {
            id,
            snapshot: Some(snapshot),
        }
    }

    pub fn gone(id: ResourceId) -> Self {
        Self { id, snapshot: None }
    }
}
