//! Version-control gateway.
//!
//! Stores never talk to git directly; they go through the [`VersionControl`]
//! trait so the rest of the crate is indifferent to whether history exists.
//!
//! | Implementation | Used when |
//! |---|---|
//! | [`GitCli`] | content root has `.git` and the git binary runs |
//! | [`Disabled`] | `vcs.mode = "off"`, or git is unavailable |
//! | [`MemoryVcs`] | tests; keeps snapshots in memory |
//!
//! Recording a change is best effort: a failed commit is logged and reported
//! as `None`, never as an error, and the file write it follows stands.

mod git;
mod memory;

pub use git::GitCli;
pub use memory::{MemoryCommit, MemoryVcs};

use crate::config::{VcsConfig, VcsMode};
use crate::types::{Attribution, CommitInfo, VersionRecord};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VcsError {
    #[error("Version not found: {revision} of {path}")]
    VersionNotFound { path: String, revision: String },
    #[error("Failed to get diff: {0}")]
    DiffFailed(String),
    #[error("Invalid revision: {0}")]
    InvalidRevision(String),
}

/// Snapshot of how version control is wired up, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VcsStatus {
    pub enabled: bool,
    pub binary: String,
    pub version: Option<String>,
    pub repo_path: String,
    pub git_dir_exists: bool,
}

/// A file change to record. `path` is relative to the content root.
#[derive(Debug, Clone, Copy)]
pub struct Change<'a> {
    pub path: &'a str,
    pub message: &'a str,
    pub is_delete: bool,
    pub attribution: &'a Attribution,
}

pub trait VersionControl: Send + Sync {
    fn status(&self) -> VcsStatus;

    /// Stage and commit one path. `None` when disabled or when the tool fails.
    fn record_change(&self, change: &Change<'_>) -> Option<CommitInfo>;

    /// Commits touching `path`, newest first, at most `limit`.
    fn history(&self, path: &str, limit: usize) -> Vec<VersionRecord>;

    /// File contents at `revision`. `Ok(None)` when disabled.
    fn blob_at(&self, path: &str, revision: &str) -> Result<Option<String>, VcsError>;

    /// Textual diff of `path` between two revisions. `Ok(None)` when disabled.
    fn diff(&self, path: &str, from: &str, to: &str) -> Result<Option<String>, VcsError>;
}

/// Version control switched off: every query is empty.
#[derive(Debug, Clone)]
pub struct Disabled {
    binary: String,
    repo_path: String,
    git_dir_exists: bool,
}

impl Disabled {
    pub fn new(root: &Path, binary: &str) -> Self {
        Self {
            binary: binary.to_string(),
            repo_path: root.display().to_string(),
            git_dir_exists: root.join(".git").is_dir(),
        }
    }
}

impl VersionControl for Disabled {
    fn status(&self) -> VcsStatus {
        VcsStatus {
            enabled: false,
            binary: self.binary.clone(),
            version: None,
            repo_path: self.repo_path.clone(),
            git_dir_exists: self.git_dir_exists,
        }
    }

    fn record_change(&self, _change: &Change<'_>) -> Option<CommitInfo> {
        None
    }

    fn history(&self, _path: &str, _limit: usize) -> Vec<VersionRecord> {
        Vec::new()
    }

    fn blob_at(&self, _path: &str, _revision: &str) -> Result<Option<String>, VcsError> {
        Ok(None)
    }

    fn diff(&self, _path: &str, _from: &str, _to: &str) -> Result<Option<String>, VcsError> {
        Ok(None)
    }
}

/// Pick the gateway for a content root.
pub fn detect(root: &Path, config: &VcsConfig) -> Arc<dyn VersionControl> {
    if config.mode == VcsMode::Off {
        info!("version control disabled by configuration");
        return Arc::new(Disabled::new(root, &config.binary));
    }
    match GitCli::discover(root, config) {
        Some(git) => {
            info!(repo = %root.display(), version = %git.version(), "version control enabled");
            Arc::new(git)
        }
        None => {
            info!(repo = %root.display(), "version control unavailable, history disabled");
            Arc::new(Disabled::new(root, &config.binary))
        }
    }
}

/// The message recorded for a change, tagged with who made it.
pub fn commit_message(message: &str, attribution: &Attribution) -> String {
    format!("{message} [via API by {}]", attribution.name)
}

const MAX_REVISION_LEN: usize = 256;

/// Check an untrusted revision identifier before it reaches a subprocess.
///
/// Accepts hashes, branch and tag names, and relative forms like `HEAD~2`,
/// `main^` or `HEAD@{1}`. Refuses anything that could be read as an option,
/// a range, or a `rev:path` expression.
pub fn validate_revision(revision: &str) -> Result<(), VcsError> {
    let valid = !revision.is_empty()
        && revision.len() <= MAX_REVISION_LEN
        && !revision.starts_with('-')
        && !revision.contains("..")
        && revision.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | '~' | '^' | '@' | '{' | '}' | '-')
        });
    if valid {
        Ok(())
    } else {
        Err(VcsError::InvalidRevision(revision.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn revisions_that_pass() {
        for rev in [
            "HEAD",
            "HEAD~3",
            "main^",
            "HEAD@{2}",
            "release/1.2",
            "a1b2c3d",
            "0123456789abcdef0123456789abcdef01234567",
        ] {
            assert_eq!(validate_revision(rev), Ok(()), "{rev}");
        }
    }

    #[test]
    fn revisions_that_fail() {
        for rev in [
            "",
            "--output=/tmp/x",
            "-p",
            "HEAD..main",
            "HEAD:secret.md",
            "HEAD; rm -rf /",
            "a b",
            "$(id)",
        ] {
            assert!(
                matches!(validate_revision(rev), Err(VcsError::InvalidRevision(_))),
                "{rev} should be rejected"
            );
        }
        assert!(validate_revision(&"a".repeat(MAX_REVISION_LEN + 1)).is_err());
    }

    #[test]
    fn commit_message_names_the_author() {
        let who = Attribution::new("ada");
        assert_eq!(
            commit_message("Updated navigation main", &who),
            "Updated navigation main [via API by ada]"
        );
    }

    #[test]
    fn disabled_is_inert() {
        let tmp = TempDir::new().unwrap();
        let vcs = Disabled::new(tmp.path(), "git");
        let who = Attribution::new("ada");
        let change = Change {
            path: "docs/a.md",
            message: "m",
            is_delete: false,
            attribution: &who,
        };

        assert_eq!(vcs.record_change(&change), None);
        assert!(vcs.history("docs/a.md", 10).is_empty());
        assert_eq!(vcs.blob_at("docs/a.md", "HEAD"), Ok(None));
        assert_eq!(vcs.diff("docs/a.md", "HEAD~1", "HEAD"), Ok(None));

        let status = vcs.status();
        assert!(!status.enabled);
        assert!(!status.git_dir_exists);
    }

    #[test]
    fn detect_honours_off_mode() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join(".git")).unwrap();
        let config = VcsConfig {
            mode: VcsMode::Off,
            ..VcsConfig::default()
        };
        let status = detect(tmp.path(), &config).status();
        assert!(!status.enabled);
        assert!(status.git_dir_exists);
    }

    #[test]
    fn detect_without_repository_is_disabled() {
        let tmp = TempDir::new().unwrap();
        let status = detect(tmp.path(), &VcsConfig::default()).status();
        assert!(!status.enabled);
    }
}
