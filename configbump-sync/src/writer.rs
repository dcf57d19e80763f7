//! Filesystem primitives shared by the full sync and the incremental reconciler.
//!
//! ## `write_file` protocol
//!
//! 1. Create `.configbump.<random>.tmp` next to the target. The name does not
//!    depend on the key, so any key that fits the filesystem fits here too.
//! 2. Write the content and fsync it.
//! 3. Rename over the final path (atomic on POSIX).
//!
//! The temp file is removed on every failure path. A temp file left behind by
//! a crash is an unexpected regular file and the next full sync removes it.
//!
//! No retries happen here; callers decide what a failure means.

use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::{Builder, NamedTempFile};

use crate::error::{io_err, SyncError};

/// Prefix of in-flight temp files.
pub const TMP_PREFIX: &str = ".configbump.";
/// Suffix of in-flight temp files.
pub const TMP_SUFFIX: &str = ".tmp";

/// True for names of the form used by in-flight temp files.
pub fn is_temp_name(name: &str) -> bool {
    name.len() > TMP_PREFIX.len() + TMP_SUFFIX.len()
        && name.starts_with(TMP_PREFIX)
        && name.ends_with(TMP_SUFFIX)
}

/// What kind of filesystem object a directory entry is (symlinks not followed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Other,
}

/// One entry directly inside a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub name: String,
    pub path: PathBuf,
    pub kind: EntryKind,
}

/// Check that `name` is a single, normal path component.
pub fn validate_file_name(name: &str) -> Result<(), SyncError> {
    let reason = if name.is_empty() {
        Some("empty name")
    } else if name.contains('\0') {
        Some("contains a NUL byte")
    } else if name.contains('/') || name.contains('\\') {
        Some("contains a path separator")
    } else if is_temp_name(name) {
        Some("uses the reserved temp-file naming")
    } else {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(c)), None) if c == name => None,
            _ => Some("not a plain file name"),
        }
    };

    match reason {
        Some(reason) => Err(SyncError::InvalidFileName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Validate `name` and join it onto `dir`.
pub fn target_path(dir: &Path, name: &str) -> Result<PathBuf, SyncError> {
    validate_file_name(name)?;
    Ok(dir.join(name))
}

/// Create or replace the file at `path` with `content`.
pub fn write_file(path: &Path, content: &[u8]) -> Result<(), SyncError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = Builder::new()
        .prefix(TMP_PREFIX)
        .suffix(TMP_SUFFIX)
        .tempfile_in(dir)
        .map_err(|e| io_err(dir, e))?;

    if let Err(e) = write_synced(&mut tmp, content) {
        return Err(io_err(tmp.path(), e));
    }

    // On failure the returned handle still owns the temp file and deletes it on drop.
    tmp.persist(path).map_err(|e| io_err(path, e.error))?;

    tracing::debug!("wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

fn write_synced(tmp: &mut NamedTempFile, content: &[u8]) -> std::io::Result<()> {
    tmp.write_all(content)?;
    tmp.as_file().sync_all()
}

/// Remove the file at `path`. A missing file is an error.
pub fn remove_file(path: &Path) -> Result<(), SyncError> {
    std::fs::remove_file(path).map_err(|e| io_err(path, e))
}

/// Remove the file at `path` if present. Returns whether anything was removed.
pub fn remove_file_if_exists(path: &Path) -> Result<bool, SyncError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(io_err(path, err)),
    }
}

/// What currently occupies a target path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Existing {
    Missing,
    /// A regular file and its content.
    Regular(Vec<u8>),
    /// A directory, symlink, FIFO, socket or device. Never read.
    Other(EntryKind),
}

/// Inspect `path` without following symlinks. Only regular files are read,
/// so a FIFO or device in the target directory cannot block the caller.
pub fn read_existing(path: &Path) -> Result<Existing, SyncError> {
    let meta = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Existing::Missing),
        Err(err) => return Err(io_err(path, err)),
    };
    let ty = meta.file_type();
    if ty.is_dir() {
        return Ok(Existing::Other(EntryKind::Dir));
    }
    if ty.is_symlink() {
        return Ok(Existing::Other(EntryKind::Symlink));
    }
    if !ty.is_file() {
        return Ok(Existing::Other(EntryKind::Other));
    }
    match std::fs::read(path) {
        Ok(content) => Ok(Existing::Regular(content)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(Existing::Missing),
        Err(err) => Err(io_err(path, err)),
    }
}

/// List the entries directly inside `dir`, sorted by name.
pub fn list_directory_entries(dir: &Path) -> Result<Vec<DirEntryInfo>, SyncError> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| io_err(dir, e))? {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let ty = entry.file_type().map_err(|e| io_err(entry.path(), e))?;
        let kind = if ty.is_file() {
            EntryKind::File
        } else if ty.is_dir() {
            EntryKind::Dir
        } else if ty.is_symlink() {
            EntryKind::Symlink
        } else {
            EntryKind::Other
        };
        entries.push(DirEntryInfo {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: entry.path(),
            kind,
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
