//! Named navigation files.
//!
//! Each tree lives at `<root>/<nav_dir>/<name>.json` and is edited as a whole
//! (`save`) or one item at a time (`add_item`, `update_item`, `remove_item`).
//! Every write goes backup → write → commit; a failed commit is logged by the
//! gateway and reported as `commit: null`.
//!
//! ## On-disk shape
//!
//! ```text
//! nav/main.json    {"sidemenu": [...]}   canonical file, wrapper kept
//! nav/api.json     [...]                 every other file, bare array
//! ```
//!
//! Reads accept either shape for any file. The canonical file keeps whichever
//! shape it already has and is created wrapped; all others are written bare.

use crate::backup::{delete_with_backup, write_with_backup};
use crate::config::DocnavConfig;
use crate::nav_tree;
use crate::store::{StoreError, message_or, modified_secs, relative, to_pretty_json};
use crate::types::{Attribution, CommitInfo, NavDocument, NavItem, NavShape, VersionRecord};
use crate::vcs::{Change, VersionControl};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

const NOT_FOUND: &str = "Navigation file not found";

/// A navigation file as read from disk.
#[derive(Debug, Clone, Serialize)]
pub struct NavFile {
    pub path: String,
    pub name: String,
    pub content: Vec<NavItem>,
    pub modified: i64,
    pub history: Vec<VersionRecord>,
}

/// Outcome of a whole-file save or delete.
#[derive(Debug, Clone, Serialize)]
pub struct NavWrite {
    pub path: String,
    pub name: String,
    pub backup: Option<String>,
    pub commit: Option<CommitInfo>,
}

/// Outcome of an item-level edit, with the tree as written.
#[derive(Debug, Clone, Serialize)]
pub struct NavMutation {
    pub path: String,
    pub name: String,
    pub content: Vec<NavItem>,
    pub commit: Option<CommitInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavSummary {
    pub name: String,
    pub path: String,
    pub modified: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NavHistory {
    pub name: String,
    pub path: String,
    pub history: Vec<VersionRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NavVersion {
    pub name: String,
    pub path: String,
    pub commit: String,
    /// `None` when version control is disabled.
    pub content: Option<Vec<NavItem>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NavComparison {
    pub name: String,
    pub path: String,
    pub from_commit: String,
    pub to_commit: String,
    pub diff: Option<String>,
}

pub struct NavStore {
    root: PathBuf,
    nav_dir: PathBuf,
    canonical: String,
    history_limit: usize,
    vcs: Arc<dyn VersionControl>,
}

impl NavStore {
    pub fn new(root: &Path, config: &DocnavConfig, vcs: Arc<dyn VersionControl>) -> Self {
        Self {
            root: root.to_path_buf(),
            nav_dir: root.join(config.content.nav_dir.trim_matches('/')),
            canonical: config.content.canonical_nav.clone(),
            history_limit: config.vcs.history_limit,
            vcs,
        }
    }

    pub fn get(&self, name: &str) -> Result<NavFile, StoreError> {
        let (name, file) = self.locate(name)?;
        if !file.is_file() {
            return Err(StoreError::NotFound(NOT_FOUND.into()));
        }
        let (content, _) = read_tree(&file)?;
        let path = relative(&self.root, &file);
        Ok(NavFile {
            history: self.vcs.history(&path, self.history_limit),
            modified: modified_secs(&file)?,
            path,
            name,
            content,
        })
    }

    /// Replace a whole tree. `content` is an array, a `{"sidemenu": [...]}`
    /// object, or a JSON string holding either.
    pub fn save(
        &self,
        name: &str,
        content: &Value,
        commit_message: Option<&str>,
        who: &Attribution,
    ) -> Result<NavWrite, StoreError> {
        let (name, file) = self.locate(name)?;
        let items = parse_content(content)?;
        let message = message_or(commit_message, || format!("Updated navigation {name}"));
        let (backup, commit) = self.persist(&name, &file, &items, &message, who)?;
        Ok(NavWrite {
            path: relative(&self.root, &file),
            name,
            backup,
            commit,
        })
    }

    pub fn delete(
        &self,
        name: &str,
        commit_message: Option<&str>,
        who: &Attribution,
    ) -> Result<NavWrite, StoreError> {
        let (name, file) = self.locate(name)?;
        if !file.is_file() {
            return Err(StoreError::NotFound(NOT_FOUND.into()));
        }
        let backup = delete_with_backup(&file)?;
        let path = relative(&self.root, &file);
        info!(nav = %name, "deleted navigation file");

        let message = message_or(commit_message, || format!("Deleted navigation {name}"));
        let commit = self.vcs.record_change(&Change {
            path: &path,
            message: &message,
            is_delete: true,
            attribution: who,
        });
        Ok(NavWrite {
            backup: Some(relative(&self.root, &backup)),
            path,
            name,
            commit,
        })
    }

    /// Every `.json` file in the navigation directory, sorted by name.
    pub fn list(&self) -> Result<Vec<NavSummary>, StoreError> {
        if !self.nav_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut navs = Vec::new();
        for entry in fs::read_dir(&self.nav_dir)? {
            let file = entry?.path();
            if !file.is_file() || file.extension().is_none_or(|e| e != "json") {
                continue;
            }
            let Some(stem) = file.file_stem() else { continue };
            navs.push(NavSummary {
                name: stem.to_string_lossy().into_owned(),
                path: relative(&self.root, &file),
                modified: modified_secs(&file)?,
            });
        }
        navs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(navs)
    }

    pub fn history(&self, name: &str, limit: Option<usize>) -> Result<NavHistory, StoreError> {
        let (name, file) = self.locate(name)?;
        if !file.is_file() {
            return Err(StoreError::NotFound(NOT_FOUND.into()));
        }
        let path = relative(&self.root, &file);
        Ok(NavHistory {
            history: self.vcs.history(&path, limit.unwrap_or(self.history_limit)),
            path,
            name,
        })
    }

    /// The tree as it was at `revision`.
    pub fn version(&self, name: &str, revision: &str) -> Result<NavVersion, StoreError> {
        let (name, file) = self.locate(name)?;
        let path = relative(&self.root, &file);
        let content = match self.vcs.blob_at(&path, revision)? {
            Some(text) => Some(
                serde_json::from_str::<NavDocument>(&text)
                    .map_err(|e| StoreError::CorruptFile(e.to_string()))?
                    .into_items(),
            ),
            None => None,
        };
        Ok(NavVersion {
            name,
            path,
            commit: revision.to_string(),
            content,
        })
    }

    pub fn compare(&self, name: &str, from: &str, to: &str) -> Result<NavComparison, StoreError> {
        let (name, file) = self.locate(name)?;
        let path = relative(&self.root, &file);
        let diff = self.vcs.diff(&path, from, to)?;
        Ok(NavComparison {
            name,
            path,
            from_commit: from.to_string(),
            to_commit: to.to_string(),
            diff,
        })
    }

    /// Insert an item; a missing file starts as an empty tree.
    pub fn add_item(
        &self,
        name: &str,
        item: NavItem,
        parent_path: Option<&str>,
        position: Option<i64>,
        commit_message: Option<&str>,
        who: &Attribution,
    ) -> Result<NavMutation, StoreError> {
        let (name, file) = self.locate(name)?;
        let mut tree = if file.is_file() {
            read_tree(&file)?.0
        } else {
            Vec::new()
        };
        nav_tree::add_item(&mut tree, item, parent_path, position)?;
        let message = message_or(commit_message, || format!("Added item to navigation {name}"));
        self.finish_mutation(name, &file, tree, &message, who)
    }

    pub fn update_item(
        &self,
        name: &str,
        item_path: &str,
        updates: &Map<String, Value>,
        commit_message: Option<&str>,
        who: &Attribution,
    ) -> Result<NavMutation, StoreError> {
        let (name, file) = self.locate(name)?;
        let mut tree = self.load_existing(&file)?;
        nav_tree::update_item(&mut tree, item_path, updates)?;
        let message = message_or(commit_message, || format!("Updated item in navigation {name}"));
        self.finish_mutation(name, &file, tree, &message, who)
    }

    pub fn remove_item(
        &self,
        name: &str,
        item_path: &str,
        commit_message: Option<&str>,
        who: &Attribution,
    ) -> Result<NavMutation, StoreError> {
        let (name, file) = self.locate(name)?;
        let mut tree = self.load_existing(&file)?;
        nav_tree::remove_item(&mut tree, item_path)?;
        let message = message_or(commit_message, || {
            format!("Removed item from navigation {name}")
        });
        self.finish_mutation(name, &file, tree, &message, who)
    }

    fn locate(&self, raw: &str) -> Result<(String, PathBuf), StoreError> {
        let name = sanitize_name(raw)?;
        let file = self.nav_dir.join(format!("{name}.json"));
        Ok((name, file))
    }

    fn load_existing(&self, file: &Path) -> Result<Vec<NavItem>, StoreError> {
        if !file.is_file() {
            return Err(StoreError::NotFound(NOT_FOUND.into()));
        }
        Ok(read_tree(file)?.0)
    }

    fn finish_mutation(
        &self,
        name: String,
        file: &Path,
        tree: Vec<NavItem>,
        message: &str,
        who: &Attribution,
    ) -> Result<NavMutation, StoreError> {
        let (_, commit) = self.persist(&name, file, &tree, message, who)?;
        Ok(NavMutation {
            path: relative(&self.root, file),
            name,
            content: tree,
            commit,
        })
    }

    /// Shape to write `name` in, per the canonical-file rule.
    fn shape_for(&self, name: &str, file: &Path) -> NavShape {
        if name != self.canonical {
            return NavShape::Bare;
        }
        match read_tree(file) {
            Ok((_, shape)) => shape,
            Err(_) => NavShape::Sidemenu,
        }
    }

    fn persist(
        &self,
        name: &str,
        file: &Path,
        items: &[NavItem],
        message: &str,
        who: &Attribution,
    ) -> Result<(Option<String>, Option<CommitInfo>), StoreError> {
        let document = NavDocument::from_items(items.to_vec(), self.shape_for(name, file));
        let json = to_pretty_json(&document)?;
        let backup = write_with_backup(file, json.as_bytes())?;
        info!(nav = %name, items = nav_tree::count_items(items), "saved navigation");

        let path = relative(&self.root, file);
        let commit = self.vcs.record_change(&Change {
            path: &path,
            message,
            is_delete: false,
            attribution: who,
        });
        Ok((backup.map(|b| relative(&self.root, &b)), commit))
    }
}

/// Reduce a client-supplied name to a safe file stem.
///
/// Keeps the last path component, drops its extension, then removes every
/// character outside `[A-Za-z0-9_-]`.
pub fn sanitize_name(raw: &str) -> Result<String, StoreError> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let stem = match base.rfind('.') {
        Some(dot) => &base[..dot],
        None => base,
    };
    let name: String = stem
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if name.is_empty() {
        return Err(StoreError::MalformedInput("Navigation name is required".into()));
    }
    Ok(name)
}

fn read_tree(file: &Path) -> Result<(Vec<NavItem>, NavShape), StoreError> {
    let text = fs::read_to_string(file)?;
    let document: NavDocument =
        serde_json::from_str(&text).map_err(|e| StoreError::CorruptFile(e.to_string()))?;
    let shape = document.shape();
    Ok((document.into_items(), shape))
}

fn parse_content(content: &Value) -> Result<Vec<NavItem>, StoreError> {
    let invalid = |detail: String| {
        StoreError::MalformedInput(format!(
            "Navigation content must be an array or a {{\"sidemenu\": [...]}} object: {detail}"
        ))
    };
    let document: NavDocument = match content {
        Value::String(text) => serde_json::from_str(text).map_err(|e| invalid(e.to_string()))?,
        Value::Null => {
            return Err(StoreError::MalformedInput(
                "Navigation content is required".into(),
            ));
        }
        other => serde_json::from_value(other.clone()).map_err(|e| invalid(e.to_string()))?,
    };
    Ok(document.into_items())
}
