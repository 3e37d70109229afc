//! In-memory version control for tests and demos.
//!
//! Each recorded change snapshots the file's current contents. Revisions are
//! resolved against the snapshot log: full or abbreviated (4+ chars) hashes,
//! `HEAD`, and `HEAD~N`.

use super::{Change, VcsError, VcsStatus, VersionControl, commit_message, validate_revision};
use crate::types::{CommitInfo, VersionRecord, format_timestamp};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// One entry in the in-memory log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryCommit {
    pub hash: String,
    pub path: String,
    /// `None` when the change removed the file.
    pub content: Option<String>,
    pub message: String,
    pub author: String,
    pub timestamp: i64,
}

#[derive(Debug)]
pub struct MemoryVcs {
    root: PathBuf,
    log: Mutex<Vec<MemoryCommit>>,
    fail_commits: AtomicBool,
}

impl MemoryVcs {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            log: Mutex::new(Vec::new()),
            fail_commits: AtomicBool::new(false),
        }
    }

    /// Make subsequent `record_change` calls fail, as a broken git would.
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// All recorded commits, oldest first.
    pub fn commits(&self) -> Vec<MemoryCommit> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<MemoryCommit>> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Index into the log a revision names.
    fn resolve(log: &[MemoryCommit], revision: &str) -> Option<usize> {
        if log.is_empty() {
            return None;
        }
        let head = log.len() - 1;
        if revision == "HEAD" {
            return Some(head);
        }
        if let Some(back) = revision.strip_prefix("HEAD~") {
            let back: usize = back.parse().ok()?;
            return head.checked_sub(back);
        }
        if revision.len() < 4 {
            return None;
        }
        let matches: Vec<usize> = log
            .iter()
            .enumerate()
            .filter(|(_, c)| c.hash.starts_with(revision))
            .map(|(i, _)| i)
            .collect();
        match matches.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    /// Contents of `path` as of log index `at`, `None` if absent there.
    fn content_at(log: &[MemoryCommit], path: &str, at: usize) -> Option<String> {
        log[..=at]
            .iter()
            .rev()
            .find(|c| c.path == path)
            .and_then(|c| c.content.clone())
    }
}

impl VersionControl for MemoryVcs {
    fn status(&self) -> VcsStatus {
        VcsStatus {
            enabled: true,
            binary: "memory".into(),
            version: None,
            repo_path: self.root.display().to_string(),
            git_dir_exists: false,
        }
    }

    fn record_change(&self, change: &Change<'_>) -> Option<CommitInfo> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return None;
        }
        let content = if change.is_delete {
            None
        } else {
            Some(fs::read_to_string(self.root.join(change.path)).ok()?)
        };

        let mut log = self.lock();
        let unchanged = log
            .iter()
            .rev()
            .find(|c| c.path == change.path)
            .is_some_and(|c| c.content == content);
        if unchanged || (content.is_none() && !log.iter().any(|c| c.path == change.path)) {
            // Nothing to commit.
            return None;
        }

        let message = commit_message(change.message, change.attribution);
        let mut hasher = Sha256::new();
        hasher.update(log.len().to_le_bytes());
        hasher.update(change.path.as_bytes());
        hasher.update(message.as_bytes());
        hasher.update(content.as_deref().unwrap_or("").as_bytes());
        let hash = format!("{:x}", hasher.finalize());

        let commit = MemoryCommit {
            hash: hash.clone(),
            path: change.path.to_string(),
            content,
            message: message.clone(),
            author: change.attribution.name.clone(),
            timestamp: chrono::Utc::now().timestamp(),
        };
        let timestamp = commit.timestamp;
        log.push(commit);

        Some(CommitInfo {
            hash,
            message,
            author: change.attribution.name.clone(),
            timestamp,
        })
    }

    fn history(&self, path: &str, limit: usize) -> Vec<VersionRecord> {
        self.lock()
            .iter()
            .rev()
            .filter(|c| c.path == path)
            .take(limit)
            .map(|c| VersionRecord {
                hash: c.hash.clone(),
                author: c.author.clone(),
                timestamp: c.timestamp,
                date: format_timestamp(c.timestamp),
                message: c.message.clone(),
            })
            .collect()
    }

    fn blob_at(&self, path: &str, revision: &str) -> Result<Option<String>, VcsError> {
        validate_revision(revision)?;
        let log = self.lock();
        Self::resolve(&log, revision)
            .and_then(|at| Self::content_at(&log, path, at))
            .map(Some)
            .ok_or_else(|| VcsError::VersionNotFound {
                path: path.to_string(),
                revision: revision.to_string(),
            })
    }

    fn diff(&self, path: &str, from: &str, to: &str) -> Result<Option<String>, VcsError> {
        validate_revision(from)?;
        validate_revision(to)?;
        let log = self.lock();
        let unresolved = |rev: &str| VcsError::DiffFailed(format!("unknown revision '{rev}'"));
        let a = Self::resolve(&log, from).ok_or_else(|| unresolved(from))?;
        let b = Self::resolve(&log, to).ok_or_else(|| unresolved(to))?;
        let old = Self::content_at(&log, path, a).unwrap_or_default();
        let new = Self::content_at(&log, path, b).unwrap_or_default();
        Ok(Some(line_diff(path, &old, &new)))
    }
}

/// Minimal line diff in unified style (no hunks, whole file as context).
fn line_diff(path: &str, old: &str, new: &str) -> String {
    if old == new {
        return String::new();
    }
    let a: Vec<&str> = old.lines().collect();
    let b: Vec<&str> = new.lines().collect();

    // Longest-common-subsequence table, filled from the end.
    let mut lcs = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for i in (0..a.len()).rev() {
        for j in (0..b.len()).rev() {
            lcs[i][j] = if a[i] == b[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut out = format!("--- a/{path}\n+++ b/{path}\n");
    let (mut i, mut j) = (0, 0);
    while i < a.len() || j < b.len() {
        if i < a.len() && j < b.len() && a[i] == b[j] {
            out.push_str(&format!(" {}\n", a[i]));
            i += 1;
            j += 1;
        } else if j < b.len() && (i == a.len() || lcs[i][j + 1] >= lcs[i + 1][j]) {
            out.push_str(&format!("+{}\n", b[j]));
            j += 1;
        } else {
            out.push_str(&format!("-{}\n", a[i]));
            i += 1;
        }
    }
    out
}
