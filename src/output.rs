//! CLI output formatting for `docnav check`.
//!
//! Output is information-first: each navigation item leads with its positional
//! index and label, and what it points at (a document, or another navigation
//! file it includes) follows on the same line.
//!
//! ```text
//! Navigation
//! main (nav/main.json, 5 items)
//! 001 Home → docs/home.md
//! 002 Guides
//!     001 Install → docs/install.md
//!         Icon: class fa-download
//!     002 Linux
//! 003 API ⇢ nav/api.json
//!
//! Documents
//! docs/
//!     001 home.md
//!     002 install.md
//! examples/
//!     001 demo.html
//!
//! Version control
//!     Enabled: yes
//!     Binary: git (git version 2.43.0)
//!     Repository: /srv/site
//! ```
//!
//! Each section has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout.

use crate::config::DocnavConfig;
use crate::doc_store::DocSummary;
use crate::nav_tree::{count_items, walk};
use crate::types::{IconKind, NavItem};
use crate::vcs::VcsStatus;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

// ============================================================================
// Navigation
// ============================================================================

/// Format one navigation file as an indented tree.
pub fn format_nav_tree(name: &str, path: &str, tree: &[NavItem]) -> Vec<String> {
    let mut lines = vec![format!("{name} ({path}, {} items)", count_items(tree))];

    // Positions restart at 1 under every parent; track the counter per depth.
    let mut positions: Vec<usize> = Vec::new();
    walk(tree, &mut |item, depth| {
        positions.truncate(depth + 1);
        if positions.len() <= depth {
            positions.push(0);
        }
        positions[depth] += 1;

        let head = format!("{}{} {}", indent(depth), format_index(positions[depth]), item.label());
        lines.push(match (&item.path, &item.include) {
            (Some(target), _) => format!("{head} → {target}"),
            (None, Some(include)) => format!("{head} ⇢ {include}"),
            (None, None) => head,
        });
        if let Some(icon) = &item.icon {
            let shown = match icon.kind() {
                IconKind::Class(v) => format!("class {v}"),
                IconKind::Text(v) => format!("text {v}"),
                IconKind::Url(v) => format!("url {v}"),
            };
            lines.push(format!("{}Icon: {shown}", indent(depth + 1)));
        }
    });
    lines
}

pub fn print_nav_tree(name: &str, path: &str, tree: &[NavItem]) {
    for line in format_nav_tree(name, path, tree) {
        println!("{}", line);
    }
}

// ============================================================================
// Documents
// ============================================================================

/// Format a document inventory grouped by directory.
///
/// Expects the store's sorted order, so each directory appears once.
pub fn format_doc_list(docs: &[DocSummary]) -> Vec<String> {
    let mut lines = vec!["Documents".to_string()];
    if docs.is_empty() {
        lines.push(format!("{}(none)", indent(1)));
        return lines;
    }

    let mut current_dir: Option<&str> = None;
    let mut position = 0;
    for doc in docs {
        let dir = doc.path.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
        if current_dir != Some(dir) {
            current_dir = Some(dir);
            position = 0;
            lines.push(if dir.is_empty() { "./".to_string() } else { format!("{dir}/") });
        }
        position += 1;
        lines.push(format!("{}{} {}", indent(1), format_index(position), doc.name));
    }
    lines
}

pub fn print_doc_list(docs: &[DocSummary]) {
    for line in format_doc_list(docs) {
        println!("{}", line);
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

pub fn format_vcs_status(status: &VcsStatus) -> Vec<String> {
    let binary = match &status.version {
        Some(version) => format!("{} ({version})", status.binary),
        None => status.binary.clone(),
    };
    let mut lines = vec![
        "Version control".to_string(),
        format!("{}Enabled: {}", indent(1), yes_no(status.enabled)),
        format!("{}Binary: {binary}", indent(1)),
        format!("{}Repository: {}", indent(1), status.repo_path),
    ];
    if !status.git_dir_exists {
        lines.push(format!("{}No .git directory", indent(1)));
    }
    lines
}

pub fn print_vcs_status(status: &VcsStatus) {
    for line in format_vcs_status(status) {
        println!("{}", line);
    }
}

pub fn format_config_summary(config: &DocnavConfig) -> Vec<String> {
    let content = &config.content;
    vec![
        "Config".to_string(),
        format!("{}Document dirs: {}", indent(1), content.doc_dirs.join(", ")),
        format!("{}Extensions: {}", indent(1), content.extensions.join(", ")),
        format!(
            "{}Navigation: {}/ (canonical: {})",
            indent(1),
            content.nav_dir,
            content.canonical_nav
        ),
        format!("{}Listen: {}", indent(1), config.server.bind),
    ]
}

pub fn print_config_summary(config: &DocnavConfig) {
    for line in format_config_summary(config) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::nav_tree;
    use serde_json::json;

    fn doc(path: &str) -> DocSummary {
        let name = path.rsplit('/').next().unwrap().to_string();
        DocSummary {
            path: path.to_string(),
            extension: name.rsplit('.').next().unwrap().to_string(),
            name,
            modified: 0,
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    #[test]
    fn format_index_pads_to_three() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(1000), "1000");
    }

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(1), "    ");
        assert_eq!(indent(2), "        ");
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    #[test]
    fn nav_tree_indexes_restart_per_level() {
        let tree = nav_tree(json!([
            {"title": "Home", "path": "docs/home.md"},
            {"title": "Guides", "children": [
                {"title": "Install", "path": "docs/install.md", "icon": "class: fa-download"},
                {"title": "Linux", "children": []}
            ]},
            {"title": "API", "_include": "nav/api.json"}
        ]));
        let lines = format_nav_tree("main", "nav/main.json", &tree);
        assert_eq!(
            lines,
            vec![
                "main (nav/main.json, 5 items)",
                "001 Home → docs/home.md",
                "002 Guides",
                "    001 Install → docs/install.md",
                "        Icon: class fa-download",
                "    002 Linux",
                "003 API ⇢ nav/api.json",
            ]
        );
    }

    #[test]
    fn nav_tree_positions_reset_after_deeper_branch() {
        let tree = nav_tree(json!([
            {"title": "A", "children": [{"title": "A1", "children": [{"title": "deep"}]}]},
            {"title": "B", "children": [{"title": "B1"}]}
        ]));
        let lines = format_nav_tree("x", "nav/x.json", &tree);
        assert_eq!(lines[3], "        001 deep");
        assert_eq!(lines[4], "002 B");
        assert_eq!(lines[5], "    001 B1");
    }

    #[test]
    fn nav_tree_untitled_items_use_id() {
        let tree = nav_tree(json!([{"id": "only-id"}, {}]));
        let lines = format_nav_tree("x", "nav/x.json", &tree);
        assert_eq!(lines[1], "001 only-id");
        assert_eq!(lines[2], "002 (untitled)");
    }

    // =========================================================================
    // Documents
    // =========================================================================

    #[test]
    fn doc_list_groups_by_directory() {
        let docs = vec![
            doc("docs/a.md"),
            doc("docs/b.txt"),
            doc("docs/nested/deep.md"),
            doc("examples/z.html"),
        ];
        assert_eq!(
            format_doc_list(&docs),
            vec![
                "Documents",
                "docs/",
                "    001 a.md",
                "    002 b.txt",
                "docs/nested/",
                "    001 deep.md",
                "examples/",
                "    001 z.html",
            ]
        );
    }

    #[test]
    fn doc_list_empty() {
        assert_eq!(format_doc_list(&[]), vec!["Documents", "    (none)"]);
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    #[test]
    fn vcs_status_enabled() {
        let status = VcsStatus {
            enabled: true,
            binary: "git".into(),
            version: Some("git version 2.43.0".into()),
            repo_path: "/srv/site".into(),
            git_dir_exists: true,
        };
        assert_eq!(
            format_vcs_status(&status),
            vec![
                "Version control",
                "    Enabled: yes",
                "    Binary: git (git version 2.43.0)",
                "    Repository: /srv/site",
            ]
        );
    }

    #[test]
    fn vcs_status_disabled_without_repo() {
        let status = VcsStatus {
            enabled: false,
            binary: "git".into(),
            version: None,
            repo_path: "/srv/site".into(),
            git_dir_exists: false,
        };
        let lines = format_vcs_status(&status);
        assert_eq!(lines[1], "    Enabled: no");
        assert_eq!(lines[2], "    Binary: git");
        assert_eq!(lines.last().unwrap(), "    No .git directory");
    }

    #[test]
    fn config_summary_lists_sections() {
        let lines = format_config_summary(&DocnavConfig::default());
        assert_eq!(lines[0], "Config");
        assert_eq!(lines[1], "    Document dirs: docs, examples");
        assert_eq!(lines[2], "    Extensions: md, html, txt");
        assert_eq!(lines[3], "    Navigation: nav/ (canonical: main)");
        assert_eq!(lines[4], "    Listen: 127.0.0.1:8080");
    }
}
