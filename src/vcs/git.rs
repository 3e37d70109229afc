//! Git through its command-line interface.
//!
//! Every call is `git -C <root> <args...>`, spawned directly (never through a
//! shell) and killed if it outlives the configured timeout. Paths always
//! follow `--`; revisions pass [`validate_revision`] first.

use super::{Change, VcsError, VcsStatus, VersionControl, commit_message, validate_revision};
use crate::config::VcsConfig;
use crate::types::{CommitInfo, VersionRecord, format_timestamp};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

/// Fallback committer address when the attribution has none.
const FALLBACK_EMAIL: &str = "docnav@localhost";

/// Field separator in `git log` output; cannot appear in a subject line.
const FIELD_SEP: char = '\u{1f}';

#[derive(Error, Debug)]
enum GitError {
    #[error("could not start {binary}: {source}")]
    Spawn { binary: String, source: io::Error },
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },
}

#[derive(Debug, Clone)]
pub struct GitCli {
    root: PathBuf,
    binary: String,
    timeout: Duration,
    version: String,
    /// Held across stage + commit; the index is shared by every request.
    index_lock: Arc<Mutex<()>>,
}

impl GitCli {
    /// Use git for `root` if it is a repository and the binary runs.
    pub fn discover(root: &Path, config: &VcsConfig) -> Option<Self> {
        if !root.join(".git").exists() {
            debug!(repo = %root.display(), "no .git directory");
            return None;
        }
        let timeout = Duration::from_secs(config.timeout_secs);
        match run_command(&config.binary, None, &["--version"], timeout) {
            Ok(out) => Some(Self {
                root: root.to_path_buf(),
                binary: config.binary.clone(),
                timeout,
                version: out.trim().to_string(),
                index_lock: Arc::new(Mutex::new(())),
            }),
            Err(e) => {
                warn!(binary = %config.binary, error = %e, "repository found but git is not runnable");
                None
            }
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    fn git(&self, args: &[&str]) -> Result<String, GitError> {
        run_command(&self.binary, Some(&self.root), args, self.timeout)
    }

    fn commit(&self, change: &Change<'_>) -> Result<CommitInfo, GitError> {
        let _guard = self
            .index_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if change.is_delete {
            self.git(&["rm", "--cached", "--quiet", "--ignore-unmatch", "--", change.path])?;
        } else {
            self.git(&["add", "--", change.path])?;
        }

        let who = change.attribution;
        let message = commit_message(change.message, who);
        let author = format!("{} <{}>", who.name, who.email.as_deref().unwrap_or(""));
        let committer_name = format!("user.name={}", who.name);
        let committer_email = format!(
            "user.email={}",
            who.email.as_deref().unwrap_or(FALLBACK_EMAIL)
        );
        self.git(&[
            "-c",
            &committer_name,
            "-c",
            &committer_email,
            "commit",
            "--quiet",
            "-m",
            &message,
            "--author",
            &author,
            "--only",
            "--",
            change.path,
        ])?;

        let hash = self.git(&["rev-parse", "HEAD"])?.trim().to_string();
        Ok(CommitInfo {
            hash,
            message,
            author: who.name.clone(),
            timestamp: chrono::Utc::now().timestamp(),
        })
    }
}

impl VersionControl for GitCli {
    fn status(&self) -> VcsStatus {
        VcsStatus {
            enabled: true,
            binary: self.binary.clone(),
            version: Some(self.version.clone()),
            repo_path: self.root.display().to_string(),
            git_dir_exists: true,
        }
    }

    fn record_change(&self, change: &Change<'_>) -> Option<CommitInfo> {
        match self.commit(change) {
            Ok(info) => {
                info!(path = change.path, hash = %info.hash, author = %info.author, "committed change");
                Some(info)
            }
            Err(e) => {
                warn!(path = change.path, error = %e, "commit failed; file change kept");
                None
            }
        }
    }

    fn history(&self, path: &str, limit: usize) -> Vec<VersionRecord> {
        let limit = limit.to_string();
        let format = "--pretty=format:%H%x1f%an%x1f%at%x1f%s";
        match self.git(&["log", format, "-n", &limit, "--", path]) {
            Ok(out) => parse_log(&out),
            Err(e) => {
                warn!(path, error = %e, "could not read history");
                Vec::new()
            }
        }
    }

    fn blob_at(&self, path: &str, revision: &str) -> Result<Option<String>, VcsError> {
        validate_revision(revision)?;
        let spec = format!("{revision}:{path}");
        self.git(&["show", &spec]).map(Some).map_err(|e| {
            debug!(path, revision, error = %e, "revision lookup failed");
            VcsError::VersionNotFound {
                path: path.to_string(),
                revision: revision.to_string(),
            }
        })
    }

    fn diff(&self, path: &str, from: &str, to: &str) -> Result<Option<String>, VcsError> {
        validate_revision(from)?;
        validate_revision(to)?;
        self.git(&["diff", from, to, "--", path])
            .map(Some)
            .map_err(|e| VcsError::DiffFailed(e.to_string()))
    }
}

/// Parse `hash<US>author<US>unix-time<US>subject` lines.
fn parse_log(out: &str) -> Vec<VersionRecord> {
    out.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let mut parts = line.splitn(4, FIELD_SEP);
            let hash = parts.next()?;
            let author = parts.next()?;
            let timestamp: i64 = parts.next()?.trim().parse().ok()?;
            let message = parts.next().unwrap_or("");
            Some(VersionRecord {
                hash: hash.to_string(),
                author: author.to_string(),
                timestamp,
                date: format_timestamp(timestamp),
                message: message.to_string(),
            })
        })
        .collect()
}

/// Run a command with a deadline, returning stdout on success.
///
/// Output pipes are drained on helper threads so a chatty child cannot block
/// on a full pipe while we wait for it.
fn run_command(
    binary: &str,
    repo: Option<&Path>,
    args: &[&str],
    timeout: Duration,
) -> Result<String, GitError> {
    let mut command = Command::new(binary);
    if let Some(repo) = repo {
        command.arg("-C").arg(repo);
    }
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    debug!(binary, ?args, "running");

    let mut child = command.spawn().map_err(|source| GitError::Spawn {
        binary: binary.to_string(),
        source,
    })?;
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match child.wait_timeout(timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(GitError::Timeout(timeout));
        }
        Err(source) => {
            let _ = child.kill();
            return Err(GitError::Spawn {
                binary: binary.to_string(),
                source,
            });
        }
    };

    let stdout = stdout.join().unwrap_or_default();
    let stderr = stderr.join().unwrap_or_default();
    if status.success() {
        Ok(stdout)
    } else {
        Err(GitError::Failed {
            status,
            stderr: stderr.trim().to_string(),
        })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}
