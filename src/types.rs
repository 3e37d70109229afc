//! Shared types used across the stores, the API, and the CLI.
//!
//! Everything here is serialized into API responses or persisted files, so
//! field names are part of the wire format.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// A node in a navigation tree.
///
/// Only the fields the engine reasons about are typed. Anything else a client
/// stores on an item (colors, badges, flags) lands in `extra` and is written
/// back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ItemText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<ItemText>,
    /// Document this item links to. Absent for grouping nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<Icon>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Nested items. `None` (no list at all) and `Some(vec![])` are distinct:
    /// hierarchical addressing refuses to descend into an item without a list.
    #[serde(default, alias = "_children", skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<NavItem>>,
    /// Another navigation file whose items the client splices in as children.
    /// Never resolved server-side.
    #[serde(rename = "_include", default, skip_serializing_if = "Option::is_none")]
    pub include: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NavItem {
    /// A leaf item with a title and a document path.
    pub fn link(title: &str, path: &str) -> Self {
        Self {
            title: Some(title.into()),
            path: Some(path.to_string()),
            ..Self::default()
        }
    }

    /// A grouping item with a title and an (initially empty) child list.
    pub fn group(title: &str) -> Self {
        Self {
            title: Some(title.into()),
            children: Some(Vec::new()),
            ..Self::default()
        }
    }

    /// The key used to address this item: `id` when present, else `title`.
    pub fn identifier(&self) -> Option<&str> {
        self.id.as_ref().or(self.title.as_ref()).map(ItemText::as_str)
    }

    /// Label for display: `title`, falling back to `id`.
    pub fn label(&self) -> &str {
        self.title
            .as_ref()
            .or(self.id.as_ref())
            .map(ItemText::as_str)
            .unwrap_or("(untitled)")
    }

    /// Direct children, empty when the item has no list.
    pub fn children(&self) -> &[NavItem] {
        self.children.as_deref().unwrap_or(&[])
    }
}

/// An `id` or `title` value.
///
/// Hand-edited files carry numeric ids (`"id": 7`), so any string, number or
/// boolean is accepted. Matching uses the text form; the original JSON value
/// is what gets written back.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemText {
    raw: Value,
    text: String,
}

impl ItemText {
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl From<&str> for ItemText {
    fn from(text: &str) -> Self {
        Self {
            raw: Value::String(text.to_string()),
            text: text.to_string(),
        }
    }
}

impl Serialize for ItemText {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ItemText {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        let text = match &raw {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => {
                return Err(D::Error::custom(format!(
                    "expected a string or number, found {other}"
                )));
            }
        };
        Ok(Self { raw, text })
    }
}

/// Icon reference stored as a tagged string: `class:<v>`, `text:<v>` or `url:<v>`.
///
/// Kept verbatim so files round-trip byte-for-byte; [`Icon::kind`] parses on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Icon(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconKind<'a> {
    Class(&'a str),
    Text(&'a str),
    Url(&'a str),
}

impl Icon {
    /// Parse the tag. Editors have written `class: fa-home` with a space, so
    /// the value is trimmed. Untagged strings are treated as URLs.
    pub fn kind(&self) -> IconKind<'_> {
        let raw = self.0.as_str();
        if let Some(v) = raw.strip_prefix("class:") {
            IconKind::Class(v.trim())
        } else if let Some(v) = raw.strip_prefix("text:") {
            IconKind::Text(v.trim())
        } else if let Some(v) = raw.strip_prefix("url:") {
            IconKind::Url(v.trim())
        } else {
            IconKind::Url(raw.trim())
        }
    }
}

/// Persisted form of a navigation file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NavDocument {
    Items(Vec<NavItem>),
    Wrapped { sidemenu: Vec<NavItem> },
}

/// Which persisted form a navigation file uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavShape {
    Bare,
    Sidemenu,
}

impl NavDocument {
    pub fn from_items(items: Vec<NavItem>, shape: NavShape) -> Self {
        match shape {
            NavShape::Bare => NavDocument::Items(items),
            NavShape::Sidemenu => NavDocument::Wrapped { sidemenu: items },
        }
    }

    pub fn shape(&self) -> NavShape {
        match self {
            NavDocument::Items(_) => NavShape::Bare,
            NavDocument::Wrapped { .. } => NavShape::Sidemenu,
        }
    }

    pub fn into_items(self) -> Vec<NavItem> {
        match self {
            NavDocument::Items(items) => items,
            NavDocument::Wrapped { sidemenu } => sidemenu,
        }
    }
}

/// Who a change is attributed to in the version-control log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribution {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Attribution {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// One historical commit touching a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub hash: String,
    pub author: String,
    pub timestamp: i64,
    /// `timestamp` rendered as `YYYY-MM-DD HH:MM:SS` (UTC).
    pub date: String,
    pub message: String,
}

/// Result of recording a change with the version-control tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub hash: String,
    pub message: String,
    pub author: String,
    pub timestamp: i64,
}

/// Format a unix timestamp the way history entries display it.
pub fn format_timestamp(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}
