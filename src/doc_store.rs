//! Flat document files under the allowed document directories.
//!
//! Contents are opaque text. Paths go through [`PathResolver`] before any
//! filesystem access, writes go through the backup primitive, and each change
//! is recorded with version control.

use crate::backup::{delete_with_backup, is_backup_artifact, write_with_backup};
use crate::config::DocnavConfig;
use crate::paths::PathResolver;
use crate::store::{StoreError, message_or, modified_secs, relative};
use crate::types::{Attribution, CommitInfo, VersionRecord};
use crate::vcs::{Change, VersionControl};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use walkdir::WalkDir;

const NOT_FOUND: &str = "Document not found";

#[derive(Debug, Clone, Serialize)]
pub struct DocFile {
    pub path: String,
    pub content: String,
    pub modified: i64,
    pub history: Vec<VersionRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocWrite {
    pub path: String,
    pub backup: Option<String>,
    pub commit: Option<CommitInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocSummary {
    pub path: String,
    pub name: String,
    pub extension: String,
    pub modified: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocHistory {
    pub path: String,
    pub history: Vec<VersionRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocVersion {
    pub path: String,
    pub commit: String,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocComparison {
    pub path: String,
    pub from_commit: String,
    pub to_commit: String,
    pub diff: Option<String>,
}

pub struct DocStore {
    root: PathBuf,
    resolver: PathResolver,
    history_limit: usize,
    vcs: Arc<dyn VersionControl>,
}

impl DocStore {
    pub fn new(root: &Path, config: &DocnavConfig, vcs: Arc<dyn VersionControl>) -> Self {
        Self {
            root: root.to_path_buf(),
            resolver: PathResolver::new(root, &config.content),
            history_limit: config.vcs.history_limit,
            vcs,
        }
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn get(&self, raw: &str) -> Result<DocFile, StoreError> {
        let (path, file) = self.existing(raw)?;
        Ok(DocFile {
            content: fs::read_to_string(&file)?,
            modified: modified_secs(&file)?,
            history: self.vcs.history(&path, self.history_limit),
            path,
        })
    }

    pub fn save(
        &self,
        raw: &str,
        content: &str,
        commit_message: Option<&str>,
        who: &Attribution,
    ) -> Result<DocWrite, StoreError> {
        let (path, file) = self.resolve(raw)?;
        let backup = write_with_backup(&file, content.as_bytes())?;
        info!(doc = %path, bytes = content.len(), "saved document");

        let message = message_or(commit_message, || format!("Updated {path}"));
        let commit = self.vcs.record_change(&Change {
            path: &path,
            message: &message,
            is_delete: false,
            attribution: who,
        });
        Ok(DocWrite {
            backup: backup.map(|b| relative(&self.root, &b)),
            path,
            commit,
        })
    }

    pub fn delete(
        &self,
        raw: &str,
        commit_message: Option<&str>,
        who: &Attribution,
    ) -> Result<DocWrite, StoreError> {
        let (path, file) = self.existing(raw)?;
        let backup = delete_with_backup(&file)?;
        info!(doc = %path, "deleted document");

        let message = message_or(commit_message, || format!("Deleted {path}"));
        let commit = self.vcs.record_change(&Change {
            path: &path,
            message: &message,
            is_delete: true,
            attribution: who,
        });
        Ok(DocWrite {
            backup: Some(relative(&self.root, &backup)),
            path,
            commit,
        })
    }

    /// Documents under `dir`, or under every allowed directory when `None`.
    ///
    /// Backup artifacts and files with disallowed extensions are skipped.
    pub fn list(&self, dir: Option<&str>) -> Result<Vec<DocSummary>, StoreError> {
        let roots = match dir.map(str::trim).filter(|d| !d.is_empty() && *d != "/") {
            Some(raw) => {
                let clean = self.resolver.resolve_dir(raw)?;
                let located = self.resolver.locate(&clean)?;
                if !located.is_dir() {
                    return Err(StoreError::NotFound("Directory not found".into()));
                }
                vec![located]
            }
            None => self
                .resolver
                .allowed_dirs()
                .iter()
                .filter_map(|d| self.resolver.locate(d).ok())
                .filter(|d| d.is_dir())
                .collect(),
        };

        let mut docs = Vec::new();
        for root in roots {
            for entry in WalkDir::new(&root).follow_links(false) {
                let entry = entry.map_err(|e| StoreError::Io(e.into()))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().into_owned();
                if is_backup_artifact(&name) || !self.resolver.has_allowed_extension(&name) {
                    continue;
                }
                let extension = entry
                    .path()
                    .extension()
                    .map(|e| e.to_string_lossy().into_owned())
                    .unwrap_or_default();
                docs.push(DocSummary {
                    path: relative(&self.root, entry.path()),
                    modified: modified_secs(entry.path())?,
                    name,
                    extension,
                });
            }
        }
        docs.sort_by(|a, b| a.path.cmp(&b.path));
        docs.dedup_by(|a, b| a.path == b.path);
        Ok(docs)
    }

    pub fn history(&self, raw: &str, limit: Option<usize>) -> Result<DocHistory, StoreError> {
        let (path, _) = self.existing(raw)?;
        Ok(DocHistory {
            history: self.vcs.history(&path, limit.unwrap_or(self.history_limit)),
            path,
        })
    }

    /// Contents at `revision`, `HEAD` when not given.
    pub fn version(&self, raw: &str, revision: Option<&str>) -> Result<DocVersion, StoreError> {
        let (path, _) = self.resolve(raw)?;
        let revision = revision.unwrap_or("HEAD");
        Ok(DocVersion {
            content: self.vcs.blob_at(&path, revision)?,
            commit: revision.to_string(),
            path,
        })
    }

    pub fn compare(&self, raw: &str, from: &str, to: &str) -> Result<DocComparison, StoreError> {
        let (path, _) = self.resolve(raw)?;
        Ok(DocComparison {
            diff: self.vcs.diff(&path, from, to)?,
            from_commit: from.to_string(),
            to_commit: to.to_string(),
            path,
        })
    }

    fn resolve(&self, raw: &str) -> Result<(String, PathBuf), StoreError> {
        let clean = self.resolver.resolve(raw)?;
        let file = self.resolver.locate(&clean)?;
        Ok((clean, file))
    }

    fn existing(&self, raw: &str) -> Result<(String, PathBuf), StoreError> {
        let (path, file) = self.resolve(raw)?;
        if !file.is_file() {
            return Err(StoreError::NotFound(NOT_FOUND.into()));
        }
        Ok((path, file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VcsMode;
    use crate::test_helpers::{who, workspace};
    use crate::vcs::detect;

    fn paths(docs: &[DocSummary]) -> Vec<&str> {
        docs.iter().map(|d| d.path.as_str()).collect()
    }

    #[test]
    fn save_get_round_trip() {
        let ws = workspace();
        let store = ws.doc_store();

        let written = store.save("/docs/guide.md", "# Guide\n", None, &who()).unwrap();
        assert_eq!(written.path, "docs/guide.md");
        assert_eq!(written.backup, None);
        assert_eq!(
            written.commit.unwrap().message,
            "Updated docs/guide.md [via API by tester]"
        );

        let doc = store.get("docs/guide.md").unwrap();
        assert_eq!(doc.content, "# Guide\n");
        assert_eq!(doc.history.len(), 1);
    }

    #[test]
    fn save_creates_nested_directories() {
        let ws = workspace();
        ws.doc_store()
            .save("docs/a/b/c.txt", "deep", None, &who())
            .unwrap();
        assert_eq!(ws.read("docs/a/b/c.txt"), "deep");
    }

    #[test]
    fn save_overwrite_backs_up() {
        let ws = workspace();
        let store = ws.doc_store();
        store.save("docs/a.md", "v1", None, &who()).unwrap();
        let written = store.save("docs/a.md", "v2", Some("tweak"), &who()).unwrap();

        let backups = ws.artifacts("docs", "bak");
        assert_eq!(backups.len(), 1);
        assert_eq!(fs::read_to_string(&backups[0]).unwrap(), "v1");
        assert!(written.backup.unwrap().starts_with("docs/a.md."));
        assert_eq!(ws.vcs.commits()[1].message, "tweak [via API by tester]");
    }

    #[test]
    fn invalid_paths_touch_nothing() {
        let ws = workspace();
        let store = ws.doc_store();
        for raw in ["docs/../x.md", "secret/a.md", "docs/run.sh", ""] {
            let err = store.save(raw, "x", None, &who()).unwrap_err();
            assert_eq!(err.code(), "invalid_path", "{raw:?}");
            assert_eq!(err.status(), 400);
        }
        assert!(ws.vcs.commits().is_empty());
    }

    #[test]
    fn get_missing_is_not_found() {
        let ws = workspace();
        let err = ws.doc_store().get("docs/missing.md").unwrap_err();
        assert_eq!(err.to_string(), "Document not found");
        assert_eq!(err.status(), 404);
    }

    #[test]
    fn delete_then_get_is_not_found() {
        let ws = workspace();
        let store = ws.doc_store();
        store.save("docs/a.md", "bye", None, &who()).unwrap();

        let gone = store.delete("docs/a.md", None, &who()).unwrap();

        assert_eq!(gone.commit.unwrap().message, "Deleted docs/a.md [via API by tester]");
        let deleted = ws.artifacts("docs", "deleted");
        assert_eq!(deleted.len(), 1);
        assert_eq!(fs::read_to_string(&deleted[0]).unwrap(), "bye");
        assert_eq!(store.get("docs/a.md").unwrap_err().status(), 404);
        assert_eq!(store.delete("docs/a.md", None, &who()).unwrap_err().status(), 404);
    }

    // =========================================================================
    // Listing
    // =========================================================================

    #[test]
    fn list_skips_backups_and_disallowed_extensions() {
        let ws = workspace();
        ws.write("docs/a.md", "a");
        ws.write("docs/a.md.20240101000000.bak", "old");
        ws.write("docs/b.txt", "b");
        ws.write("docs/c.exe", "c");

        let docs = ws.doc_store().list(None).unwrap();
        assert_eq!(paths(&docs), ["docs/a.md", "docs/b.txt"]);
        assert_eq!(docs[0].name, "a.md");
        assert_eq!(docs[0].extension, "md");
    }

    #[test]
    fn list_walks_every_allowed_root_sorted() {
        let ws = workspace();
        ws.write("examples/z.html", "z");
        ws.write("docs/nested/deep.md", "d");
        ws.write("docs/top.md", "t");
        ws.write("other/ignored.md", "x");

        let docs = ws.doc_store().list(None).unwrap();
        assert_eq!(
            paths(&docs),
            ["docs/nested/deep.md", "docs/top.md", "examples/z.html"]
        );
    }

    #[test]
    fn list_subdirectory() {
        let ws = workspace();
        ws.write("docs/nested/deep.md", "d");
        ws.write("docs/top.md", "t");

        let store = ws.doc_store();
        assert_eq!(paths(&store.list(Some("docs/nested")).unwrap()), ["docs/nested/deep.md"]);
        assert_eq!(store.list(Some("docs/missing")).unwrap_err().status(), 404);
        assert_eq!(store.list(Some("../etc")).unwrap_err().status(), 400);
        assert_eq!(store.list(Some("secret")).unwrap_err().status(), 400);
    }

    #[test]
    fn list_with_no_directories_is_empty() {
        let ws = workspace();
        assert!(ws.doc_store().list(None).unwrap().is_empty());
    }

    // =========================================================================
    // Versions
    // =========================================================================

    #[test]
    fn version_defaults_to_head() {
        let ws = workspace();
        let store = ws.doc_store();
        store.save("docs/a.md", "one", None, &who()).unwrap();
        store.save("docs/a.md", "two", None, &who()).unwrap();

        let head = store.version("docs/a.md", None).unwrap();
        assert_eq!(head.commit, "HEAD");
        assert_eq!(head.content.as_deref(), Some("two"));
        let prev = store.version("docs/a.md", Some("HEAD~1")).unwrap();
        assert_eq!(prev.content.as_deref(), Some("one"));
    }

    #[test]
    fn compare_returns_tool_diff() {
        let ws = workspace();
        let store = ws.doc_store();
        store.save("docs/a.md", "one\n", None, &who()).unwrap();
        store.save("docs/a.md", "two\n", None, &who()).unwrap();

        let cmp = store.compare("docs/a.md", "HEAD~1", "HEAD").unwrap();
        let diff = cmp.diff.unwrap();
        assert!(diff.contains("-one"));
        assert!(diff.contains("+two"));
    }

    #[test]
    fn history_limit_and_missing() {
        let ws = workspace();
        let store = ws.doc_store();
        for body in ["1", "2", "3"] {
            store.save("docs/a.md", body, None, &who()).unwrap();
        }
        assert_eq!(store.history("docs/a.md", Some(2)).unwrap().history.len(), 2);
        assert_eq!(store.history("docs/a.md", None).unwrap().history.len(), 3);
        assert_eq!(store.history("docs/b.md", None).unwrap_err().status(), 404);
    }

    #[test]
    fn disabled_vcs_still_saves() {
        let ws = workspace();
        let mut config = ws.config.clone();
        config.vcs.mode = VcsMode::Off;
        let store = DocStore::new(ws.path(), &config, detect(ws.path(), &config.vcs));

        let written = store.save("docs/a.md", "x", None, &who()).unwrap();
        assert!(written.commit.is_none());
        assert!(store.get("docs/a.md").unwrap().history.is_empty());
        assert_eq!(store.version("docs/a.md", None).unwrap().content, None);
        assert_eq!(store.compare("docs/a.md", "HEAD~1", "HEAD").unwrap().diff, None);
    }
}
