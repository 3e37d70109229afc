//! Error type and helpers shared by [`NavStore`](crate::nav_store::NavStore)
//! and [`DocStore`](crate::doc_store::DocStore).
//!
//! Every store failure maps to a stable machine-readable code and an HTTP
//! status, so the API layer never inspects error internals.

use crate::backup::BackupError;
use crate::nav_tree::NavTreeError;
use crate::paths::PathError;
use crate::vcs::VcsError;
use serde::Serialize;
use std::path::Path;
use std::time::UNIX_EPOCH;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    InvalidPath(#[from] PathError),
    #[error("{0}")]
    MalformedInput(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Invalid JSON in navigation file: {0}")]
    CorruptFile(String),
    #[error(transparent)]
    Tree(#[from] NavTreeError),
    #[error(transparent)]
    Vcs(#[from] VcsError),
    #[error(transparent)]
    Backup(#[from] BackupError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Stable identifier for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::InvalidPath(_) => "invalid_path",
            StoreError::MalformedInput(_) => "malformed_input",
            StoreError::NotFound(_) => "not_found",
            StoreError::CorruptFile(_) => "corrupt_file",
            StoreError::Tree(e) => match e {
                NavTreeError::ParentNotFound(_) => "parent_not_found",
                NavTreeError::TargetNotFound(_) => "target_not_found",
                NavTreeError::PathSegmentNotFound(_) => "path_segment_not_found",
                NavTreeError::IncludeConflict(_) => "include_conflict",
                NavTreeError::InvalidUpdates(_) => "invalid_updates",
            },
            StoreError::Vcs(e) => match e {
                VcsError::VersionNotFound { .. } => "version_not_found",
                VcsError::DiffFailed(_) => "diff_failed",
                VcsError::InvalidRevision(_) => "invalid_revision",
            },
            StoreError::Backup(e) => match e {
                BackupError::NotFound(_) => "not_found",
                BackupError::BackupFailed { .. } => "backup_failed",
                BackupError::WriteFailed { .. } => "write_failed",
                BackupError::DeleteFailed { .. } => "delete_failed",
            },
            StoreError::Io(_) => "io_error",
        }
    }

    /// HTTP status the API answers with.
    pub fn status(&self) -> u16 {
        match self.code() {
            "invalid_path" | "malformed_input" | "invalid_revision" | "include_conflict"
            | "invalid_updates" => 400,
            "not_found" | "parent_not_found" | "target_not_found" | "path_segment_not_found"
            | "version_not_found" => 404,
            _ => 500,
        }
    }
}

/// Modification time in unix seconds, 0 when the platform cannot say.
pub(crate) fn modified_secs(path: &Path) -> Result<i64, std::io::Error> {
    let modified = path.metadata()?.modified()?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0))
}

/// `path` relative to `root` with `/` separators, for responses and VCS calls.
pub(crate) fn relative(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// The caller's commit message, or `default` when it is absent or blank.
pub(crate) fn message_or(given: Option<&str>, default: impl FnOnce() -> String) -> String {
    match given.map(str::trim) {
        Some(m) if !m.is_empty() => m.to_string(),
        _ => default(),
    }
}

/// Pretty JSON with two-space indent; slashes and non-ASCII stay unescaped.
pub(crate) fn to_pretty_json<T: Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string_pretty(value).map_err(|e| StoreError::MalformedInput(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn status_mapping() {
        let cases: Vec<(StoreError, &str, u16)> = vec![
            (PathError::Empty.into(), "invalid_path", 400),
            (StoreError::MalformedInput("x".into()), "malformed_input", 400),
            (VcsError::InvalidRevision("-x".into()).into(), "invalid_revision", 400),
            (NavTreeError::IncludeConflict("a".into()).into(), "include_conflict", 400),
            (NavTreeError::InvalidUpdates("a".into()).into(), "invalid_updates", 400),
            (StoreError::NotFound("x".into()), "not_found", 404),
            (NavTreeError::ParentNotFound("a".into()).into(), "parent_not_found", 404),
            (NavTreeError::TargetNotFound("a".into()).into(), "target_not_found", 404),
            (
                NavTreeError::PathSegmentNotFound("a".into()).into(),
                "path_segment_not_found",
                404,
            ),
            (
                VcsError::VersionNotFound {
                    path: "a".into(),
                    revision: "b".into(),
                }
                .into(),
                "version_not_found",
                404,
            ),
            (VcsError::DiffFailed("x".into()).into(), "diff_failed", 500),
            (StoreError::CorruptFile("x".into()), "corrupt_file", 500),
            (BackupError::NotFound(PathBuf::from("a")).into(), "not_found", 404),
            (
                BackupError::BackupFailed {
                    path: PathBuf::from("a"),
                    source: std::io::Error::other("denied"),
                }
                .into(),
                "backup_failed",
                500,
            ),
            (std::io::Error::other("disk").into(), "io_error", 500),
        ];
        for (err, code, status) in cases {
            assert_eq!(err.code(), code, "{err}");
            assert_eq!(err.status(), status, "{err}");
        }
    }

    #[test]
    fn messages_are_kept_verbatim() {
        assert_eq!(
            StoreError::NotFound("Navigation file not found".into()).to_string(),
            "Navigation file not found"
        );
        assert_eq!(
            StoreError::from(PathError::Empty).to_string(),
            "Document path is required"
        );
    }

    #[test]
    fn relative_uses_forward_slashes() {
        let root = Path::new("/srv/site");
        assert_eq!(relative(root, &root.join("nav").join("main.json")), "nav/main.json");
    }

    #[test]
    fn pretty_json_leaves_slashes_and_unicode() {
        let out = to_pretty_json(&serde_json::json!({"path": "docs/a.md", "t": "Überblick"})).unwrap();
        assert!(out.contains("\"docs/a.md\""));
        assert!(out.contains("Überblick"));
        assert!(out.contains("\n  \"path\""));
    }
}
