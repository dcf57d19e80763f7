//! Dry-run unified diff support for `configbump diff`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use similar::TextDiff;

use configbump_core::{ResourceStore, Selector};

use crate::digest::fingerprint;
use crate::error::SyncError;
use crate::writer::{self, EntryKind, Existing};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Update,
    Remove,
}

/// A single pending file change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDiff {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub unified_diff: String,
}

/// Compare what a full sync would produce with the current directory contents.
///
/// No files are written and no cache is consulted.
pub fn plan<S: ResourceStore + ?Sized>(
    store: &S,
    selector: &Selector,
    target_dir: &Path,
) -> Result<Vec<FileDiff>, SyncError> {
    let mut desired: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    for (id, snapshot) in store.list_matching(selector)? {
        for (name, content) in snapshot {
            if let Err(err) = writer::validate_file_name(&name) {
                tracing::warn!("skipping '{name}' from {id}: {err}");
                continue;
            }
            desired.insert(name, content);
        }
    }

    let mut diffs = Vec::new();
    for (name, content) in &desired {
        let path = target_dir.join(name);
        let (kind, existing) = match writer::read_existing(&path)? {
            Existing::Missing => (ChangeKind::Create, Vec::new()),
            Existing::Regular(existing) if fingerprint(&existing) == fingerprint(content) => {
                continue
            }
            Existing::Regular(existing) => (ChangeKind::Update, existing),
            // Replaced on sync; its contents are never read.
            Existing::Other(_) => (ChangeKind::Update, Vec::new()),
        };
        diffs.push(file_diff(path, name, kind, &existing, content));
    }

    if target_dir.exists() {
        for entry in writer::list_directory_entries(target_dir)? {
            if desired.contains_key(&entry.name) || entry.kind == EntryKind::Dir {
                continue;
            }
            let existing = match entry.kind {
                EntryKind::File => match writer::read_existing(&entry.path)? {
                    Existing::Regular(content) => content,
                    Existing::Missing | Existing::Other(_) => Vec::new(),
                },
                EntryKind::Dir | EntryKind::Symlink | EntryKind::Other => Vec::new(),
            };
            diffs.push(file_diff(
                entry.path,
                &entry.name,
                ChangeKind::Remove,
                &existing,
                &[],
            ));
        }
    }

    diffs.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(diffs)
}

fn file_diff(path: PathBuf, name: &str, kind: ChangeKind, old: &[u8], new: &[u8]) -> FileDiff {
    let old = String::from_utf8_lossy(old);
    let new = String::from_utf8_lossy(new);
    let old_header = match kind {
        ChangeKind::Create => "/dev/null".to_string(),
        _ => format!("a/{name}"),
    };
    let new_header = match kind {
        ChangeKind::Remove => "/dev/null".to_string(),
        _ => format!("b/{name}"),
    };
    let unified_diff = TextDiff::from_lines(&*old, &*new)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string();
    FileDiff {
        path,
        kind,
        unified_diff,
    }
}
