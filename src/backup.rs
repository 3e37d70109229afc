//! Copy-before-write persistence.
//!
//! Every destructive filesystem operation first copies the current file to a
//! timestamped sibling:
//!
//! ```text
//! docs/guide.md.20240502141503.bak       # before an overwrite
//! docs/guide.md.20240502141503.deleted   # before a delete
//! ```
//!
//! Backups are made synchronously, are never pruned, and are not tracked by
//! version control. If a write or delete cannot be backed up it does not
//! happen. Two operations on the same file within one second get a `-N`
//! counter after the timestamp so neither backup is overwritten.

use chrono::Local;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to create backup of {path}: {source}")]
    BackupFailed { path: PathBuf, source: io::Error },
    #[error("Failed to write {path}: {source}")]
    WriteFailed { path: PathBuf, source: io::Error },
    #[error("Failed to delete {path}: {source}")]
    DeleteFailed { path: PathBuf, source: io::Error },
}

const BACKUP_SUFFIX: &str = "bak";
const DELETED_SUFFIX: &str = "deleted";

/// Write `contents` to `path`, backing up any existing file first.
///
/// Returns the backup path when a backup was made. Parent directories are
/// created as needed.
pub fn write_with_backup(path: &Path, contents: &[u8]) -> Result<Option<PathBuf>, BackupError> {
    let backup = if path.is_file() {
        Some(copy_aside(path, BACKUP_SUFFIX)?)
    } else {
        None
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| BackupError::WriteFailed {
            path: path.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, contents).map_err(|source| BackupError::WriteFailed {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), bytes = contents.len(), "wrote file");
    Ok(backup)
}

/// Remove `path` after copying it to a `.deleted` sibling.
pub fn delete_with_backup(path: &Path) -> Result<PathBuf, BackupError> {
    if !path.is_file() {
        return Err(BackupError::NotFound(path.to_path_buf()));
    }
    let backup = copy_aside(path, DELETED_SUFFIX)?;
    fs::remove_file(path).map_err(|source| BackupError::DeleteFailed {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "deleted file");
    Ok(backup)
}

/// Whether a file name is a backup artifact produced by this module.
pub fn is_backup_artifact(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext == BACKUP_SUFFIX || ext == DELETED_SUFFIX)
}

fn copy_aside(path: &Path, suffix: &str) -> Result<PathBuf, BackupError> {
    let backup = backup_path(path, suffix);
    fs::copy(path, &backup).map_err(|source| BackupError::BackupFailed {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(from = %path.display(), to = %backup.display(), "created backup");
    Ok(backup)
}

/// `<path>.<YYYYMMDDHHMMSS>.<suffix>`, with a counter if that name is taken.
fn backup_path(path: &Path, suffix: &str) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d%H%M%S").to_string();
    let base = path.as_os_str().to_string_lossy().to_string();
    let mut candidate = PathBuf::from(format!("{base}.{stamp}.{suffix}"));
    let mut counter = 1;
    while candidate.exists() {
        candidate = PathBuf::from(format!("{base}.{stamp}-{counter}.{suffix}"));
        counter += 1;
    }
    candidate
}
