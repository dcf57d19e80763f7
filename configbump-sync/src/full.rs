//! Full sync: reconcile the whole target directory against the store.
//!
//! 1. List every matching resource and decide which one owns each file name.
//!    When names collide the resource that sorts last owns the file.
//! 2. For each owned (file, content): write only if the path is not a regular
//!    file with the same fingerprint.
//! 3. Remove every regular file, symlink or special file in the directory that
//!    no resource provides. Sub-directories are left alone.
//! 4. Return a freshly built cache. The caller swaps it in only on success.

use std::collections::BTreeMap;
use std::path::Path;

use configbump_core::{ResourceId, ResourceStore, Selector};

use crate::cache::SyncCache;
use crate::digest::{fingerprint, FileDigests};
use crate::error::{io_err, SyncError};
use crate::report::{FileChange, PassKind, SyncReport};
use crate::writer::{self, EntryKind, Existing};

/// Run a full sync of `target_dir` against every resource in `store` matching `selector`.
///
/// Nothing is cached on the caller's side until this returns `Ok`, so an
/// aborted pass leaves the previous cache untouched.
pub fn full_sync<S: ResourceStore + ?Sized>(
    store: &S,
    selector: &Selector,
    target_dir: &Path,
) -> Result<(SyncReport, SyncCache), SyncError> {
    let resources = store.list_matching(selector)?;
    std::fs::create_dir_all(target_dir).map_err(|e| io_err(target_dir, e))?;

    let mut report = SyncReport::new(PassKind::Full);
    let mut owners: BTreeMap<String, ResourceId> = BTreeMap::new();

    for (id, snapshot) in &resources {
        for name in snapshot.keys() {
            if let Err(err) = writer::validate_file_name(name) {
                tracing::warn!("skipping '{name}' from {id}: {err}");
                report.skip(id, name, err.to_string());
                continue;
            }
            if let Some(previous) = owners.insert(name.clone(), id.clone()) {
                tracing::warn!(
                    "file '{name}' is provided by both {previous} and {id}; {id} wins"
                );
            }
        }
    }

    let mut cache = SyncCache::new();
    for (id, snapshot) in resources {
        let mut files = FileDigests::new();
        for (name, content) in &snapshot {
            match owners.get(name) {
                Some(owner) if *owner == id => {}
                Some(_) => {
                    cache.shadow(&id, name);
                    continue;
                }
                None => continue,
            }

            let path = target_dir.join(name);
            let digest = fingerprint(content);
            let change = match writer::read_existing(&path)? {
                Existing::Regular(existing) if fingerprint(&existing) == digest => {
                    tracing::debug!("unchanged: {}", path.display());
                    FileChange::Unchanged { path }
                }
                Existing::Regular(_) | Existing::Other(_) => {
                    writer::write_file(&path, content)?;
                    tracing::info!("updated: {}", path.display());
                    FileChange::Updated { path }
                }
                Existing::Missing => {
                    writer::write_file(&path, content)?;
                    tracing::info!("created: {}", path.display());
                    FileChange::Created { path }
                }
            };
            report.push(change);
            files.insert(name.clone(), digest);
        }
        cache.insert(id, files);
    }

    for entry in writer::list_directory_entries(target_dir)? {
        if owners.contains_key(&entry.name) {
            continue;
        }
        match entry.kind {
            EntryKind::Dir => {
                tracing::debug!("leaving sub-directory in place: {}", entry.path.display());
            }
            EntryKind::File | EntryKind::Symlink | EntryKind::Other => {
                writer::remove_file(&entry.path)?;
                tracing::info!("removed: {}", entry.path.display());
                report.push(FileChange::Removed { path: entry.path });
            }
        }
    }

    Ok((report.finish(), cache))
}
