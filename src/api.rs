//! Request routing for `/api/<resource>/<action>/<args...>`.
//!
//! The router is transport-free: it takes the trailing path, the merged
//! request data and an attribution, and returns a status plus a JSON
//! envelope. [`server`](crate::server) adapts it to HTTP.
//!
//! | Resource | Actions |
//! |---|---|
//! | `Nav` | `get` `list` `save` `delete` `additem` `updateitem` `removeitem` `history` `version` `compare` |
//! | `Doc` | `get` `list` `save` `delete` `history` `version` `compare` |
//! | `Diagnostic` | `git` |
//!
//! Resource names are matched case-insensitively (`nav`, `NAV`, `Nav`), as
//! are actions (`addItem`, `additem`).
//!
//! ## Envelope
//!
//! ```text
//! 200  {"success": true,  "data": {...}}
//! 4xx  {"success": false, "error": "Navigation file not found", "code": "not_found"}
//! ```

use crate::config::DocnavConfig;
use crate::doc_store::DocStore;
use crate::nav_store::NavStore;
use crate::nav_tree::NavTreeError;
use crate::store::StoreError;
use crate::types::{Attribution, NavItem};
use crate::vcs::VersionControl;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid API request format. Use: /api/resource/action/args")]
    BadRoute,
    #[error("Invalid resource: {0}. Valid resources are: Doc, Nav")]
    UnknownResource(String),
    #[error("Action '{action}' not found in resource '{resource}'")]
    UnknownAction { resource: String, action: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<NavTreeError> for ApiError {
    fn from(e: NavTreeError) -> Self {
        ApiError::Store(e.into())
    }
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRoute => "bad_request",
            ApiError::UnknownResource(_) | ApiError::UnknownAction { .. } => "unknown_route",
            ApiError::Store(e) => e.code(),
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            ApiError::BadRoute => 400,
            ApiError::UnknownResource(_) | ApiError::UnknownAction { .. } => 404,
            ApiError::Store(e) => e.status(),
        }
    }
}

fn malformed(message: &str) -> ApiError {
    ApiError::Store(StoreError::MalformedInput(message.to_string()))
}

/// One API call, already separated from its transport.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// Everything after `/api/`, e.g. `Nav/get/main`.
    pub path: String,
    /// Query, form and JSON body fields, later sources winning.
    pub data: Map<String, Value>,
    pub attribution: Attribution,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    fn ok(data: Value) -> Self {
        Self {
            status: 200,
            body: json!({"success": true, "data": data}),
        }
    }

    fn error(err: &ApiError) -> Self {
        Self {
            status: err.status(),
            body: json!({"success": false, "error": err.to_string(), "code": err.code()}),
        }
    }
}

/// Merge request-data sources in order; later keys overwrite earlier ones.
pub fn merge_request_data(sources: impl IntoIterator<Item = Map<String, Value>>) -> Map<String, Value> {
    let mut merged = Map::new();
    for source in sources {
        merged.extend(source);
    }
    merged
}

/// Interpret a raw request body as JSON request data.
///
/// An empty body contributes nothing; anything other than a JSON object is
/// refused.
pub fn parse_json_body(body: &[u8]) -> Result<Map<String, Value>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(malformed("Request body must be a JSON object")),
        Err(e) => Err(ApiError::Store(StoreError::MalformedInput(format!(
            "Invalid JSON body: {e}"
        )))),
    }
}

pub struct Api {
    nav: NavStore,
    docs: DocStore,
    vcs: Arc<dyn VersionControl>,
}

impl Api {
    pub fn new(root: &Path, config: &DocnavConfig, vcs: Arc<dyn VersionControl>) -> Self {
        Self {
            nav: NavStore::new(root, config, vcs.clone()),
            docs: DocStore::new(root, config, vcs.clone()),
            vcs,
        }
    }

    pub fn handle(&self, request: &ApiRequest) -> ApiResponse {
        match self.dispatch(request) {
            Ok(data) => ApiResponse::ok(data),
            Err(err) => {
                if err.status() >= 500 {
                    warn!(path = %request.path, error = %err, "request failed");
                } else {
                    debug!(path = %request.path, error = %err, "request rejected");
                }
                ApiResponse::error(&err)
            }
        }
    }

    fn dispatch(&self, request: &ApiRequest) -> Result<Value, ApiError> {
        let parts: Vec<&str> = request
            .path
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        let [resource, action, args @ ..] = parts.as_slice() else {
            return Err(ApiError::BadRoute);
        };
        let resource = capitalize(resource);
        let action = action.to_lowercase();
        let data = RequestData(&request.data);
        let who = &request.attribution;

        match resource.as_str() {
            "Nav" => self.nav_action(&action, args, data, who),
            "Doc" => self.doc_action(&action, args, data, who),
            "Diagnostic" if action == "git" => to_data(self.vcs.status()),
            "Diagnostic" => Err(ApiError::UnknownAction {
                resource: resource.clone(),
                action,
            }),
            _ => Err(ApiError::UnknownResource(resource.clone())),
        }
    }

    fn nav_action(
        &self,
        action: &str,
        args: &[&str],
        data: RequestData<'_>,
        who: &Attribution,
    ) -> Result<Value, ApiError> {
        if action == "list" {
            return to_data(self.nav.list()?);
        }
        let known = [
            "get", "save", "delete", "additem", "updateitem", "removeitem", "history", "version",
            "compare",
        ];
        if !known.contains(&action) {
            return Err(ApiError::UnknownAction {
                resource: "Nav".into(),
                action: action.into(),
            });
        }
        let Some((name, rest)) = args.split_first() else {
            return Err(malformed("Navigation name is required"));
        };
        let message = data.str("commit_message");

        match action {
            "get" => to_data(self.nav.get(name)?),
            "save" => {
                let content = data
                    .get("content")
                    .ok_or_else(|| malformed("Navigation content is required"))?;
                to_data(self.nav.save(name, content, message, who)?)
            }
            "delete" => to_data(self.nav.delete(name, message, who)?),
            "additem" => {
                let item = data
                    .json("item")?
                    .ok_or_else(|| malformed("Navigation item data is required"))?;
                let item: NavItem = match item {
                    Value::Object(_) => serde_json::from_value(item)
                        .map_err(|e| malformed(&format!("Invalid navigation item: {e}")))?,
                    _ => return Err(malformed("Navigation item must be an object")),
                };
                let parent = data.str("parent_path").filter(|p| !p.trim().is_empty());
                let position = data.int("position")?;
                to_data(self.nav.add_item(name, item, parent, position, message, who)?)
            }
            "updateitem" => {
                let item_path = item_path(rest)?;
                let updates = data
                    .json("updates")?
                    .ok_or_else(|| malformed("Item updates are required"))?;
                let Value::Object(updates) = updates else {
                    return Err(NavTreeError::InvalidUpdates("updates must be an object".into()).into());
                };
                to_data(self.nav.update_item(name, &item_path, &updates, message, who)?)
            }
            "removeitem" => {
                let item_path = item_path(rest)?;
                to_data(self.nav.remove_item(name, &item_path, message, who)?)
            }
            "history" => {
                let limit = data.limit()?;
                to_data(self.nav.history(name, limit)?)
            }
            "version" => {
                let [revision] = rest else {
                    return Err(malformed("Navigation name and commit hash are required"));
                };
                to_data(self.nav.version(name, revision)?)
            }
            _ => {
                let [from, to] = rest else {
                    return Err(malformed("Navigation name and two commit hashes are required"));
                };
                to_data(self.nav.compare(name, from, to)?)
            }
        }
    }

    fn doc_action(
        &self,
        action: &str,
        args: &[&str],
        data: RequestData<'_>,
        who: &Attribution,
    ) -> Result<Value, ApiError> {
        let joined = args.join("/");
        let message = data.str("commit_message");

        match action {
            "list" => {
                let dir = (!joined.is_empty()).then_some(joined.as_str());
                to_data(self.docs.list(dir)?)
            }
            "get" => to_data(self.docs.get(require_path(&joined)?)?),
            "save" => {
                let path = require_path(&joined)?;
                let content = match data.get("content") {
                    Some(Value::String(text)) => text.as_str(),
                    Some(_) => return Err(malformed("Document content must be a string")),
                    None => return Err(malformed("Document content is required")),
                };
                to_data(self.docs.save(path, content, message, who)?)
            }
            "delete" => to_data(self.docs.delete(require_path(&joined)?, message, who)?),
            "history" => {
                let limit = data.limit()?;
                to_data(self.docs.history(require_path(&joined)?, limit)?)
            }
            "version" => {
                let (path, revision) = self.split_revision(args);
                to_data(self.docs.version(require_path(&path)?, revision)?)
            }
            "compare" => {
                let [path @ .., from, to] = args else {
                    return Err(malformed("Document path and two commit hashes are required"));
                };
                let path = path.join("/");
                to_data(self.docs.compare(require_path(&path)?, from, to)?)
            }
            _ => Err(ApiError::UnknownAction {
                resource: "Doc".into(),
                action: action.into(),
            }),
        }
    }

    /// `docs/a.md` → (path, HEAD); `docs/a.md/abc123` → (path, abc123).
    fn split_revision<'a>(&self, args: &[&'a str]) -> (String, Option<&'a str>) {
        let joined = args.join("/");
        if self.docs.resolver().has_allowed_extension(&joined) {
            return (joined, None);
        }
        match args.split_last() {
            Some((revision, path)) if !path.is_empty() => (path.join("/"), Some(*revision)),
            _ => (joined, None),
        }
    }
}

fn to_data<T: Serialize>(value: T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::Store(StoreError::MalformedInput(e.to_string())))
}

fn require_path(joined: &str) -> Result<&str, ApiError> {
    if joined.is_empty() {
        return Err(malformed("Document path is required"));
    }
    Ok(joined)
}

fn item_path(rest: &[&str]) -> Result<String, ApiError> {
    if rest.is_empty() {
        return Err(malformed("Navigation name and item path are required"));
    }
    Ok(rest.join("/"))
}

/// `nAV` → `Nav`.
fn capitalize(raw: &str) -> String {
    let lower = raw.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Typed access to merged request data.
#[derive(Clone, Copy)]
struct RequestData<'a>(&'a Map<String, Value>);

impl<'a> RequestData<'a> {
    fn get(&self, key: &str) -> Option<&'a Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    fn str(&self, key: &str) -> Option<&'a str> {
        self.get(key).and_then(Value::as_str)
    }

    /// A field that may arrive as JSON or as a JSON-encoded string (form posts).
    fn json(&self, key: &str) -> Result<Option<Value>, ApiError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(text)) => serde_json::from_str(text)
                .map(Some)
                .map_err(|e| malformed(&format!("Invalid JSON in '{key}': {e}"))),
            Some(other) => Ok(Some(other.clone())),
        }
    }

    /// A number, or a string holding one.
    fn int(&self, key: &str) -> Result<Option<i64>, ApiError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .map(Some)
                .ok_or_else(|| malformed(&format!("'{key}' must be an integer"))),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| malformed(&format!("'{key}' must be an integer"))),
            Some(_) => Err(malformed(&format!("'{key}' must be an integer"))),
        }
    }

    fn limit(&self) -> Result<Option<usize>, ApiError> {
        match self.int("limit")? {
            None => Ok(None),
            Some(n) if n > 0 => Ok(Some(n as usize)),
            Some(_) => Err(malformed("'limit' must be positive")),
        }
    }
}
