//! The resource store seam and its in-memory implementation.

use std::collections::BTreeMap;

use crate::error::StoreError;
use crate::selector::Selector;
use crate::types::{Resource, ResourceId, Snapshot};

/// Source of configuration resources.
///
/// Implementations return every resource matching `selector`, sorted by
/// [`ResourceId`].
pub trait ResourceStore {
    fn list_matching(&self, selector: &Selector) -> Result<Vec<(ResourceId, Snapshot)>, StoreError>;
}

impl<T: ResourceStore + ?Sized> ResourceStore for Box<T> {
    fn list_matching(&self, selector: &Selector) -> Result<Vec<(ResourceId, Snapshot)>, StoreError> {
        (**self).list_matching(selector)
    }
}

/// Resources held in memory. Used when embedding the engine and in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    resources: BTreeMap<ResourceId, Resource>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a resource, returning the previous version.
    pub fn upsert(&mut self, resource: Resource) -> Option<Resource> {
        self.resources.insert(resource.id.clone(), resource)
    }

    pub fn remove(&mut self, id: &ResourceId) -> Option<Resource> {
        self.resources.remove(id)
    }

    pub fn get(&self, id: &ResourceId) -> Option<&Resource> {
        self.resources.get(id)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl ResourceStore for MemoryStore {
    fn list_matching(&self, selector: &Selector) -> Result<Vec<(ResourceId, Snapshot)>, StoreError> {
        Ok(self
            .resources
            .values()
            .filter(|res| selector.matches(&res.id, &res.labels))
            .map(|res| (res.id.clone(), res.data.clone()))
            .collect())
    }
}
