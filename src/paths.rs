//! Validation of user-supplied document paths.
//!
//! Every document path arriving at the API is relative to the content root
//! and must land inside one of the configured document directories with one
//! of the configured extensions:
//!
//! ```text
//! /docs/guide.md          → docs/guide.md
//! docs//api/./intro.MD    → docs/api/intro.MD
//! docs/../secrets.md      → InvalidPath (".." is refused outright)
//! notes/todo.md           → InvalidPath (not an allowed directory)
//! docs/run.sh             → InvalidPath (not an allowed extension)
//! ```
//!
//! Any path containing `..` is refused rather than rewritten, so inputs like
//! `....//` cannot be massaged into a traversal. [`PathResolver::locate`]
//! additionally checks that the resolved file stays under the canonical
//! content root, which catches symlinked directories pointing elsewhere.

use crate::config::ContentConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Document path is required")]
    Empty,
    #[error("Invalid path: {0}")]
    Traversal(String),
    #[error("Invalid directory. Document must be in one of: {allowed}")]
    Directory { path: String, allowed: String },
    #[error("Invalid file type '{path}'. Allowed extensions: {allowed}")]
    Extension { path: String, allowed: String },
    #[error("Path escapes the content root: {0}")]
    OutsideRoot(String),
}

/// Resolves raw paths against the allow-lists and the content root.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    dirs: Vec<Vec<String>>,
    extensions: Vec<String>,
}

impl PathResolver {
    pub fn new(root: &Path, content: &ContentConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            dirs: content
                .doc_dirs
                .iter()
                .map(|d| split_segments(d).into_iter().map(str::to_string).collect())
                .filter(|segments: &Vec<String>| !segments.is_empty())
                .collect(),
            extensions: content
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allowed document directories, as `/`-joined relative paths.
    pub fn allowed_dirs(&self) -> Vec<String> {
        self.dirs.iter().map(|d| d.join("/")).collect()
    }

    /// Validate and normalize a document path. Pure: no filesystem access.
    pub fn resolve(&self, raw: &str) -> Result<String, PathError> {
        let clean = self.resolve_dir(raw)?;
        if !self.has_allowed_extension(&clean) {
            return Err(PathError::Extension {
                path: clean,
                allowed: self.extensions.join(", "),
            });
        }
        Ok(clean)
    }

    /// Like [`resolve`](Self::resolve) but without the extension check, for
    /// directory arguments.
    pub fn resolve_dir(&self, raw: &str) -> Result<String, PathError> {
        let raw = raw.strip_prefix('/').unwrap_or(raw);
        if raw.contains("..") || raw.contains('\\') || raw.contains('\0') {
            return Err(PathError::Traversal(raw.to_string()));
        }
        let segments = split_segments(raw);
        if segments.is_empty() {
            return Err(PathError::Empty);
        }
        let in_allowed_dir = self.dirs.iter().any(|dir| {
            segments.len() >= dir.len() && segments.iter().zip(dir).all(|(s, d)| *s == d.as_str())
        });
        let clean = segments.join("/");
        if !in_allowed_dir {
            return Err(PathError::Directory {
                path: clean,
                allowed: self.allowed_dirs().join(", "),
            });
        }
        Ok(clean)
    }

    pub fn has_allowed_extension(&self, path: &str) -> bool {
        Path::new(path)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|e| self.extensions.iter().any(|allowed| *allowed == e))
    }

    /// Absolute location of an already-resolved path, checked for containment.
    ///
    /// The deepest ancestor that exists on disk is canonicalized and must sit
    /// under the canonicalized root; the remaining components are plain names.
    pub fn locate(&self, clean: &str) -> Result<PathBuf, PathError> {
        let target = self.root.join(clean);
        let root = self
            .root
            .canonicalize()
            .map_err(|_| PathError::OutsideRoot(clean.to_string()))?;

        let mut existing = target.as_path();
        while !existing.exists() {
            existing = match existing.parent() {
                Some(parent) => parent,
                None => return Err(PathError::OutsideRoot(clean.to_string())),
            };
        }
        let anchored = existing
            .canonicalize()
            .map_err(|_| PathError::OutsideRoot(clean.to_string()))?;
        if !anchored.starts_with(&root) {
            return Err(PathError::OutsideRoot(clean.to_string()));
        }
        Ok(target)
    }
}

fn split_segments(raw: &str) -> Vec<&str> {
    raw.split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect()
}
