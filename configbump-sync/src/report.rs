//! Outcome of a sync pass.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use configbump_core::ResourceId;

/// Which engine produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PassKind {
    Full,
    Incremental,
}

/// What happened to one file during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum FileChange {
    /// File did not exist (or was not tracked) and was written.
    Created { path: PathBuf },
    /// File existed with different content and was rewritten.
    Updated { path: PathBuf },
    /// File was no longer expected and was deleted.
    Removed { path: PathBuf },
    /// Content already matched; nothing was written.
    Unchanged { path: PathBuf },
}

impl FileChange {
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Created { path }
            | FileChange::Updated { path }
            | FileChange::Removed { path }
            | FileChange::Unchanged { path } => path,
        }
    }

    /// True when the pass mutated the file.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, FileChange::Unchanged { .. })
    }
}

/// A snapshot key that was not synced because it is not a safe file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub resource: ResourceId,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub pass: PassKind,
    pub changes: Vec<FileChange>,
    pub skipped: Vec<SkippedFile>,
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    pub(crate) fn new(pass: PassKind) -> Self {
        Self {
            pass,
            changes: Vec::new(),
            skipped: Vec::new(),
            finished_at: Utc::now(),
        }
    }

    pub(crate) fn push(&mut self, change: FileChange) {
        self.changes.push(change);
    }

    pub(crate) fn skip(&mut self, resource: &ResourceId, name: &str, reason: impl Into<String>) {
        self.skipped.push(SkippedFile {
            resource: resource.clone(),
            name: name.to_string(),
            reason: reason.into(),
        });
    }

    pub(crate) fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    /// Files created or updated.
    pub fn written(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, FileChange::Created { .. } | FileChange::Updated { .. }))
            .count()
    }

    pub fn removed(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, FileChange::Removed { .. }))
            .count()
    }

    pub fn unchanged(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, FileChange::Unchanged { .. }))
            .count()
    }

    /// True when at least one file was written or removed.
    pub fn has_mutations(&self) -> bool {
        self.changes.iter().any(FileChange::is_mutation)
    }

    /// Paths that were written or removed, in the order the pass touched them.
    pub fn mutated_paths(&self) -> Vec<&Path> {
        self.changes
            .iter()
            .filter(|c| c.is_mutation())
            .map(FileChange::path)
            .collect()
    }
}
