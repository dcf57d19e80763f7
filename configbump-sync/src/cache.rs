//! In-memory record of what was last written for each resource.

use std::collections::{BTreeSet, HashMap};

use configbump_core::ResourceId;

use crate::digest::FileDigests;

/// Resource identity → files last synchronized for it.
///
/// Every name in an entry is expected to exist in the target directory with
/// content matching the stored fingerprint. Never persisted; rebuilt by a
/// full sync on every start.
///
/// A name provided by more than one resource is owned by the one that sorts
/// last. The others record it as shadowed instead of in their entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncCache {
    entries: HashMap<ResourceId, FileDigests>,
    shadowed: HashMap<ResourceId, BTreeSet<String>>,
}

impl SyncCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ResourceId) -> Option<&FileDigests> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.entries.contains_key(id)
    }

    /// Replace the entry for `id`, returning the previous one.
    pub fn insert(&mut self, id: ResourceId, files: FileDigests) -> Option<FileDigests> {
        self.entries.insert(id, files)
    }

    pub fn remove(&mut self, id: &ResourceId) -> Option<FileDigests> {
        self.shadowed.remove(id);
        self.entries.remove(id)
    }

    /// Record that `id` provides `name` but another resource owns it.
    pub fn shadow(&mut self, id: &ResourceId, name: &str) {
        self.shadowed
            .entry(id.clone())
            .or_default()
            .insert(name.to_string());
    }

    /// Names `id` provides that another resource owns.
    pub fn shadowed(&self, id: &ResourceId) -> Option<&BTreeSet<String>> {
        self.shadowed.get(id)
    }

    /// Whether any resource other than `id` owns or shadows `name`.
    pub fn claimed_elsewhere(&self, id: &ResourceId, name: &str) -> bool {
        self.entries
            .iter()
            .any(|(other, files)| other != id && files.contains_key(name))
            || self
                .shadowed
                .iter()
                .any(|(other, names)| other != id && names.contains(name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tracked identities in sorted order.
    pub fn ids(&self) -> Vec<&ResourceId> {
        let mut ids: Vec<_> = self.entries.keys().collect();
        ids.sort();
        ids
    }

    /// Union of file names across every entry.
    pub fn tracked_files(&self) -> BTreeSet<&str> {
        self.entries
            .values()
            .flat_map(|files| files.keys().map(String::as_str))
            .collect()
    }
}
