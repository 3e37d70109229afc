//! # docnav
//!
//! A small content-management backend for a documentation site. It serves a
//! JSON API that reads and edits two kinds of files under one content root:
//!
//! - **Navigation files** (`nav/<name>.json`): trees of items that link to
//!   documents, group other items, or include another navigation file.
//! - **Documents** (`docs/`, `examples/`): markdown, HTML and text files.
//!
//! Every write backs up what it replaces, then records the change in git
//! (when available) with the editor's name in the commit message.
//!
//! ```text
//! HTTP  /api/<resource>/<action>/<args...>
//!   │
//!   ▼
//! api ──► nav_store ──► nav_tree        (item add / update / remove)
//!   │         │
//!   └──► doc_store ──► paths            (validation + containment)
//!             │
//!             ├──► backup               (.bak / .deleted copies)
//!             └──► vcs                  (git CLI, or disabled)
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`server`] | axum router: request data merging, attribution headers, CORS |
//! | [`api`] | Transport-free dispatch of `/api/...` paths to store operations |
//! | [`nav_store`] | Named navigation files: whole-file and item-level edits |
//! | [`nav_tree`] | Pure tree operations: add, update, remove, find |
//! | [`doc_store`] | Document read / write / delete / list |
//! | [`paths`] | Client path validation and containment |
//! | [`backup`] | Timestamped backup before overwrite or delete |
//! | [`vcs`] | Version-control gateway trait, git CLI and in-memory implementations |
//! | [`store`] | Error type and helpers shared by both stores |
//! | [`config`] | `docnav.toml` loading, merging over stock defaults, validation |
//! | [`types`] | Shared wire types (`NavItem`, `CommitInfo`, ...) |
//! | [`output`] | CLI output formatting for `docnav check` |
//!
//! # Design Decisions
//!
//! ## Rejection Over Rewriting
//!
//! Client paths containing `..` are refused outright instead of being
//! stripped, and every accepted path is checked to stay under its allowed
//! directory after symlinks are resolved. A request either names a valid
//! file or fails with `invalid_path`; nothing is silently redirected.
//!
//! ## Version Control Is Optional
//!
//! The content root does not have to be a git repository. Without one (or
//! with `[vcs] mode = "off"`) saves and deletes still work, history is empty
//! and commits come back as `null`. A failing commit never fails the write
//! that triggered it.
//!
//! ## Last Write Wins
//!
//! Concurrent edits to the same file are not merged or detected. The backup
//! taken before each write and the commit history are the recovery path.

pub mod api;
pub mod backup;
pub mod config;
pub mod doc_store;
pub mod nav_store;
pub mod nav_tree;
pub mod output;
pub mod paths;
pub mod server;
pub mod store;
pub mod types;
pub mod vcs;

#[cfg(test)]
pub(crate) mod test_helpers;
