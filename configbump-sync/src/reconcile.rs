//! Incremental reconciliation of a single resource change.
//!
//! | snapshot | cached | outcome                                        |
//! |----------|--------|------------------------------------------------|
//! | `Some`   | yes    | create new names, update changed, delete gone  |
//! | `Some`   | no     | create every name                              |
//! | `None`   | yes    | delete every cached name                       |
//! | `None`   | no     | full resync: nothing to go on                  |
//!
//! Operations are applied deletes first, then creates, then updates. The
//! caller commits `next_entry` to the cache only if every operation succeeded.

use std::path::Path;

use configbump_core::{ResourceId, Snapshot};

use crate::digest::{fingerprint, FileDigests};
use crate::error::SyncError;
use crate::report::{FileChange, SyncReport};
use crate::writer;

/// File operations derived from one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileOps {
    pub deletes: Vec<String>,
    pub creates: Vec<String>,
    pub updates: Vec<String>,
    pub unchanged: Vec<String>,
    /// Snapshot keys rejected as file names, with the reason.
    pub skipped: Vec<(String, String)>,
    /// Cache entry to store after a successful apply. `None` drops the entry.
    pub next_entry: Option<FileDigests>,
}

impl FileOps {
    pub fn is_noop(&self) -> bool {
        self.deletes.is_empty() && self.creates.is_empty() && self.updates.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPlan {
    /// Deletion of a resource the cache never saw.
    FullResync,
    Apply(FileOps),
}

/// Classify the files of one event against the cached entry.
pub fn plan_event(cached: Option<&FileDigests>, snapshot: Option<&Snapshot>) -> EventPlan {
    let Some(snapshot) = snapshot else {
        return match cached {
            Some(files) => EventPlan::Apply(FileOps {
                deletes: files.keys().cloned().collect(),
                next_entry: None,
                ..FileOps::default()
            }),
            None => EventPlan::FullResync,
        };
    };

    let mut ops = FileOps::default();
    let mut next = FileDigests::new();
    for (name, content) in snapshot {
        if let Err(err) = writer::validate_file_name(name) {
            ops.skipped.push((name.clone(), err.to_string()));
            continue;
        }
        let digest = fingerprint(content);
        match cached.and_then(|files| files.get(name)) {
            None => ops.creates.push(name.clone()),
            Some(existing) if *existing != digest => ops.updates.push(name.clone()),
            Some(_) => ops.unchanged.push(name.clone()),
        }
        next.insert(name.clone(), digest);
    }

    if let Some(files) = cached {
        ops.deletes = files
            .keys()
            .filter(|name| !next.contains_key(*name))
            .cloned()
            .collect();
    }

    ops.next_entry = Some(next);
    EventPlan::Apply(ops)
}

/// Apply `ops` to `target_dir`, recording every change in `report`.
///
/// Stops at the first failing operation. Deleting a file that is already
/// gone counts as done, so a replayed event does not fail forever.
pub fn apply(
    target_dir: &Path,
    id: &ResourceId,
    snapshot: Option<&Snapshot>,
    ops: &FileOps,
    report: &mut SyncReport,
) -> Result<(), SyncError> {
    for (name, reason) in &ops.skipped {
        tracing::warn!("skipping '{name}' from {id}: {reason}");
        report.skip(id, name, reason.clone());
    }

    for name in &ops.deletes {
        let path = writer::target_path(target_dir, name)?;
        if writer::remove_file_if_exists(&path)? {
            tracing::info!("removed: {}", path.display());
        } else {
            tracing::debug!("already absent: {}", path.display());
        }
        report.push(FileChange::Removed { path });
    }

    for name in &ops.creates {
        let path = writer::target_path(target_dir, name)?;
        writer::write_file(&path, content_of(snapshot, name))?;
        tracing::info!("created: {}", path.display());
        report.push(FileChange::Created { path });
    }

    for name in &ops.updates {
        let path = writer::target_path(target_dir, name)?;
        writer::write_file(&path, content_of(snapshot, name))?;
        tracing::info!("updated: {}", path.display());
        report.push(FileChange::Updated { path });
    }

    for name in &ops.unchanged {
        report.push(FileChange::Unchanged {
            path: target_dir.join(name),
        });
    }

    Ok(())
}

fn content_of<'a>(snapshot: Option<&'a Snapshot>, name: &str) -> &'a [u8] {
    snapshot
        .and_then(|s| s.get(name))
        .map(Vec::as_slice)
        .unwrap_or_default()
}
