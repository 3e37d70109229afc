//! Navigation tree mutation engine.
//!
//! A tree is an ordered `Vec<NavItem>`; nesting lives in each item's
//! `children`. Items are addressed by a *target spec*, a `/`-separated list
//! of identifiers (see [`NavItem::identifier`]):
//!
//! ```text
//! "guides"              flat: first item anywhere whose identifier is "guides"
//! "guides/install"      hierarchical: "install" directly under the root-level "guides"
//! "guides/linux/apt"    hierarchical: one segment per nesting level, no skipping
//! ```
//!
//! ## Traversal order
//!
//! Flat lookups are depth-first pre-order: an item is checked before its
//! children, siblings in list order. [`remove_item`] is the exception: it
//! checks the root list first so a root-level id is never shadowed by a
//! nested item of the same name that pre-order would reach earlier.
//!
//! Duplicate identifiers are allowed in the data; every operation acts on
//! the first match under these rules.
//!
//! ## Failure atomicity
//!
//! Every operation resolves its target into an index path before touching
//! the tree, so an `Err` always leaves the tree exactly as it was.

use crate::types::NavItem;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NavTreeError {
    #[error("Parent path not found: {0}")]
    ParentNotFound(String),
    #[error("Target item not found: {0}")]
    TargetNotFound(String),
    #[error("Path segment not found: {0}")]
    PathSegmentNotFound(String),
    #[error("Item '{0}' has an _include and cannot also hold children")]
    IncludeConflict(String),
    #[error("Invalid item updates: {0}")]
    InvalidUpdates(String),
}

/// A parsed target spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpec<'a> {
    /// Single segment: search the whole tree.
    Flat(&'a str),
    /// Two or more segments: one per nesting level, starting at the root.
    Segments(Vec<&'a str>),
}

impl<'a> TargetSpec<'a> {
    /// Parse a raw spec. Leading/trailing slashes and empty segments are
    /// ignored; returns `None` when nothing is left.
    pub fn parse(raw: &'a str) -> Option<Self> {
        let segments: Vec<&str> = raw
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        match segments.len() {
            0 => None,
            1 => Some(TargetSpec::Flat(segments[0])),
            _ => Some(TargetSpec::Segments(segments)),
        }
    }
}

impl fmt::Display for TargetSpec<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetSpec::Flat(id) => write!(f, "{id}"),
            TargetSpec::Segments(segments) => write!(f, "{}", segments.join("/")),
        }
    }
}

// ============================================================================
// Operations
// ============================================================================

/// Insert `item` into the root list or under the item named by `parent_spec`.
///
/// `position` inserts before the item currently at that index when it is
/// within `0..len`; anything else (negative, too large, `None`) appends.
/// The parent's `children` list is created if it has none.
pub fn add_item(
    tree: &mut Vec<NavItem>,
    item: NavItem,
    parent_spec: Option<&str>,
    position: Option<i64>,
) -> Result<(), NavTreeError> {
    if item.children.is_some() && item.include.is_some() {
        return Err(NavTreeError::IncludeConflict(item.label().to_string()));
    }

    let Some(spec) = parent_spec.and_then(TargetSpec::parse) else {
        insert_at(tree, item, position);
        return Ok(());
    };

    let not_found = || NavTreeError::ParentNotFound(spec.to_string());
    let parent_path = match &spec {
        TargetSpec::Flat(id) => find_flat(tree, id).ok_or_else(not_found)?,
        TargetSpec::Segments(segments) => walk_segments(tree, segments).ok_or_else(not_found)?,
    };

    let parent = item_at_mut(tree, &parent_path).ok_or_else(not_found)?;
    if parent.include.is_some() {
        return Err(NavTreeError::IncludeConflict(parent.label().to_string()));
    }
    insert_at(parent.children.get_or_insert_with(Vec::new), item, position);
    Ok(())
}

/// Shallow-merge `updates` onto the item named by `target_spec`.
///
/// Each key overwrites or adds the same-named field; a `null` clears an
/// optional field. Fields not mentioned are left as they are.
pub fn update_item(
    tree: &mut [NavItem],
    target_spec: &str,
    updates: &Map<String, Value>,
) -> Result<(), NavTreeError> {
    let spec = TargetSpec::parse(target_spec)
        .ok_or_else(|| NavTreeError::TargetNotFound(target_spec.to_string()))?;
    let path = locate(tree, &spec)?;
    let not_found = || NavTreeError::TargetNotFound(spec.to_string());

    let current = item_at(tree, &path).ok_or_else(not_found)?;
    let merged = merge_fields(current, updates)?;
    *item_at_mut(tree, &path).ok_or_else(not_found)? = merged;
    Ok(())
}

/// Remove the item named by `target_spec` and return it.
pub fn remove_item(tree: &mut Vec<NavItem>, target_spec: &str) -> Result<NavItem, NavTreeError> {
    let spec = TargetSpec::parse(target_spec)
        .ok_or_else(|| NavTreeError::TargetNotFound(target_spec.to_string()))?;
    let not_found = || NavTreeError::TargetNotFound(spec.to_string());

    let path = match &spec {
        TargetSpec::Flat(id) => match position_of(tree, id) {
            Some(index) => vec![index],
            None => find_flat(tree, id).ok_or_else(not_found)?,
        },
        TargetSpec::Segments(_) => locate(tree, &spec)?,
    };

    let (&index, parent_path) = path.split_last().ok_or_else(not_found)?;
    let siblings = list_at_mut(tree, parent_path).ok_or_else(not_found)?;
    if index >= siblings.len() {
        return Err(not_found());
    }
    Ok(siblings.remove(index))
}

/// Look up an item with the same addressing rules as [`update_item`].
pub fn find_item<'a>(tree: &'a [NavItem], target_spec: &str) -> Option<&'a NavItem> {
    let spec = TargetSpec::parse(target_spec)?;
    let path = locate(tree, &spec).ok()?;
    item_at(tree, &path)
}

/// Visit every item in pre-order with its depth (root items are depth 0).
pub fn walk<'a>(tree: &'a [NavItem], visit: &mut impl FnMut(&'a NavItem, usize)) {
    fn go<'a>(items: &'a [NavItem], depth: usize, visit: &mut impl FnMut(&'a NavItem, usize)) {
        for item in items {
            visit(item, depth);
            go(item.children(), depth + 1, visit);
        }
    }
    go(tree, 0, visit);
}

/// Total number of items at every depth.
pub fn count_items(tree: &[NavItem]) -> usize {
    let mut count = 0;
    walk(tree, &mut |_, _| count += 1);
    count
}

// ============================================================================
// Resolution: spec -> index path
// ============================================================================

/// Index path of the target for update/remove/find.
///
/// Flat specs search the whole tree. Hierarchical specs walk every segment
/// but the last as a parent (which must match and carry a `children` list),
/// then match the last segment among that parent's direct children.
fn locate(tree: &[NavItem], spec: &TargetSpec<'_>) -> Result<Vec<usize>, NavTreeError> {
    match spec {
        TargetSpec::Flat(id) => {
            find_flat(tree, id).ok_or_else(|| NavTreeError::TargetNotFound(id.to_string()))
        }
        TargetSpec::Segments(segments) => {
            let Some((last, parents)) = segments.split_last() else {
                return Err(NavTreeError::TargetNotFound(spec.to_string()));
            };
            let mut path = Vec::with_capacity(segments.len());
            let mut level = tree;
            for segment in parents {
                let index = position_of(level, segment)
                    .ok_or_else(|| NavTreeError::PathSegmentNotFound(segment.to_string()))?;
                level = level[index]
                    .children
                    .as_deref()
                    .ok_or_else(|| NavTreeError::PathSegmentNotFound(segment.to_string()))?;
                path.push(index);
            }
            let index = position_of(level, last)
                .ok_or_else(|| NavTreeError::TargetNotFound(last.to_string()))?;
            path.push(index);
            Ok(path)
        }
    }
}

/// Pre-order depth-first search by identifier.
fn find_flat(items: &[NavItem], id: &str) -> Option<Vec<usize>> {
    for (index, item) in items.iter().enumerate() {
        if item.identifier() == Some(id) {
            return Some(vec![index]);
        }
        if let Some(mut rest) = find_flat(item.children(), id) {
            rest.insert(0, index);
            return Some(rest);
        }
    }
    None
}

/// Match every segment at its own level; `None` on the first miss.
fn walk_segments(tree: &[NavItem], segments: &[&str]) -> Option<Vec<usize>> {
    let mut path = Vec::with_capacity(segments.len());
    let mut level = tree;
    for segment in segments {
        let index = position_of(level, segment)?;
        path.push(index);
        level = level[index].children();
    }
    Some(path)
}

fn position_of(items: &[NavItem], id: &str) -> Option<usize> {
    items.iter().position(|item| item.identifier() == Some(id))
}

// ============================================================================
// Index-path access
// ============================================================================

fn item_at<'a>(items: &'a [NavItem], path: &[usize]) -> Option<&'a NavItem> {
    let (&first, rest) = path.split_first()?;
    let mut item = items.get(first)?;
    for &index in rest {
        item = item.children.as_deref()?.get(index)?;
    }
    Some(item)
}

fn item_at_mut<'a>(items: &'a mut [NavItem], path: &[usize]) -> Option<&'a mut NavItem> {
    let (&first, rest) = path.split_first()?;
    let mut item = items.get_mut(first)?;
    for &index in rest {
        item = item.children.as_mut()?.get_mut(index)?;
    }
    Some(item)
}

/// The list that holds the item at `parent_path`'s children, or the root
/// list when `parent_path` is empty.
fn list_at_mut<'a>(tree: &'a mut Vec<NavItem>, parent_path: &[usize]) -> Option<&'a mut Vec<NavItem>> {
    if parent_path.is_empty() {
        return Some(tree);
    }
    item_at_mut(tree, parent_path)?.children.as_mut()
}

fn insert_at(list: &mut Vec<NavItem>, item: NavItem, position: Option<i64>) {
    match position.and_then(|p| usize::try_from(p).ok()) {
        Some(index) if index < list.len() => list.insert(index, item),
        _ => list.push(item),
    }
}

fn merge_fields(item: &NavItem, updates: &Map<String, Value>) -> Result<NavItem, NavTreeError> {
    let mut fields = match serde_json::to_value(item) {
        Ok(Value::Object(fields)) => fields,
        Ok(_) => return Err(NavTreeError::InvalidUpdates("item is not an object".into())),
        Err(e) => return Err(NavTreeError::InvalidUpdates(e.to_string())),
    };
    for (key, value) in updates {
        let key = if key == "_children" { "children" } else { key.as_str() };
        fields.insert(key.to_string(), value.clone());
    }
    let merged: NavItem = serde_json::from_value(Value::Object(fields))
        .map_err(|e| NavTreeError::InvalidUpdates(e.to_string()))?;
    if merged.children.is_some() && merged.include.is_some() {
        return Err(NavTreeError::IncludeConflict(merged.label().to_string()));
    }
    Ok(merged)
}
