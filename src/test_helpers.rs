//! Shared test utilities.
//!
//! A [`Workspace`] is a scratch content root backed by [`MemoryVcs`], so store
//! and API tests can check commits without a git binary. The navigation
//! helpers panic with the available labels on a miss.
//!
//! ```rust
//! let ws = workspace();
//! let store = ws.nav_store();
//! store.add_item("main", NavItem::group("Guides"), None, None, None, &who()).unwrap();
//!
//! assert_nav_shape(&store.get("main").unwrap().content, &[
//!     ("Guides", &[]),
//! ]);
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use crate::api::Api;
use crate::config::DocnavConfig;
use crate::doc_store::DocStore;
use crate::nav_store::NavStore;
use crate::nav_tree::find_item;
use crate::types::{Attribution, NavItem};
use crate::vcs::MemoryVcs;

// =========================================================================
// Workspace
// =========================================================================

pub struct Workspace {
    pub dir: TempDir,
    pub vcs: Arc<MemoryVcs>,
    pub config: DocnavConfig,
}

/// An empty content root with stock config and in-memory version control.
pub fn workspace() -> Workspace {
    let dir = TempDir::new().unwrap();
    let vcs = Arc::new(MemoryVcs::new(dir.path()));
    Workspace {
        dir,
        vcs,
        config: DocnavConfig::default(),
    }
}

impl Workspace {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn nav_store(&self) -> NavStore {
        NavStore::new(self.path(), &self.config, self.vcs.clone())
    }

    pub fn doc_store(&self) -> DocStore {
        DocStore::new(self.path(), &self.config, self.vcs.clone())
    }

    pub fn api(&self) -> Api {
        Api::new(self.path(), &self.config, self.vcs.clone())
    }

    /// Write a file below the root, creating parent directories.
    pub fn write(&self, rel: &str, content: &str) {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path().join(rel))
            .unwrap_or_else(|e| panic!("could not read {rel}: {e}"))
    }

    /// Files directly in `rel_dir` ending in `.<suffix>`, sorted.
    pub fn artifacts(&self, rel_dir: &str, suffix: &str) -> Vec<PathBuf> {
        let dir = self.path().join(rel_dir);
        let Ok(entries) = fs::read_dir(&dir) else {
            return Vec::new();
        };
        let ending = format!(".{suffix}");
        let mut found: Vec<PathBuf> = entries
            .map(|e| e.unwrap().path())
            .filter(|p| p.is_file())
            .filter(|p| p.to_string_lossy().ends_with(&ending))
            .collect();
        found.sort();
        found
    }
}

pub fn who() -> Attribution {
    Attribution::new("tester")
}

// =========================================================================
// Navigation helpers
// =========================================================================

/// Parse a JSON literal into a tree. Panics on a shape mismatch.
pub fn nav_tree(value: serde_json::Value) -> Vec<NavItem> {
    serde_json::from_value(value).unwrap_or_else(|e| panic!("not a navigation tree: {e}"))
}

/// Top-level labels in order.
pub fn nav_titles(tree: &[NavItem]) -> Vec<&str> {
    tree.iter().map(NavItem::label).collect()
}

/// Child labels under the item `target_spec` addresses. Panics if not found.
pub fn titles_under<'a>(tree: &'a [NavItem], target_spec: &str) -> Vec<&'a str> {
    find_item(tree, target_spec)
        .map(|item| nav_titles(item.children()))
        .unwrap_or_else(|| {
            let titles = nav_titles(tree);
            panic!("nav item '{target_spec}' not found. Top level: {titles:?}")
        })
}

/// Assert the top two levels of a tree by label.
///
/// Each entry is `(label, children)`. Use `&[]` for leaves.
///
/// ```rust
/// assert_nav_shape(&tree, &[
///     ("Home", &[]),
///     ("Guides", &["Install", "Linux"]),
/// ]);
/// ```
pub fn assert_nav_shape(tree: &[NavItem], expected: &[(&str, &[&str])]) {
    let expected_titles: Vec<&str> = expected.iter().map(|(t, _)| *t).collect();
    assert_eq!(nav_titles(tree), expected_titles, "nav top-level titles mismatch");

    for (item, (title, children)) in tree.iter().zip(expected) {
        assert_eq!(
            nav_titles(item.children()),
            children.to_vec(),
            "nav children of '{title}' mismatch"
        );
    }
}
