//! Store configuration module.
//!
//! Handles loading, validating, and merging `docnav.toml`. Stock defaults are
//! the base layer; a `docnav.toml` in the content root (or a file passed with
//! `--config`) overrides any subset of them.
//!
//! ## Keys
//!
//! ```toml
//! # every key optional; stock values shown
//!
//! [content]
//! doc_dirs = ["docs", "examples"]   # Directories documents may live in
//! extensions = ["md", "html", "txt"] # Allowed document extensions
//! nav_dir = "nav"                    # Where navigation files are kept
//! canonical_nav = "main"             # Navigation file using the sidemenu wrapper
//!
//! [vcs]
//! mode = "auto"             # "auto" (use git when available) or "off"
//! binary = "git"            # Version-control executable
//! timeout_secs = 10         # Per-invocation timeout
//! default_author = "system" # Attribution when a request names nobody
//! history_limit = 10        # Default number of history entries
//!
//! [server]
//! bind = "127.0.0.1:8080"
//! ```
//!
//! ## Sparse files
//!
//! Config files are sparse; override just the values you want:
//!
//! ```toml
//! [vcs]
//! mode = "off"
//! ```
//!
//! A misspelled key is an error, not a silent default.

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

/// File name looked up in the content root.
pub const CONFIG_FILE: &str = "docnav.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Store configuration loaded from `docnav.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DocnavConfig {
    /// Where documents and navigation files live.
    pub content: ContentConfig,
    /// Version-control integration.
    pub vcs: VcsConfig,
    /// HTTP listener.
    pub server: ServerConfig,
}

impl DocnavConfig {
    /// Validate config values are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.content.doc_dirs.is_empty() {
            return Err(ConfigError::Validation(
                "content.doc_dirs must not be empty".into(),
            ));
        }
        for dir in &self.content.doc_dirs {
            let trimmed = dir.trim_matches('/');
            if trimmed.is_empty() || trimmed.contains("..") || dir.contains('\\') {
                return Err(ConfigError::Validation(format!(
                    "content.doc_dirs entry '{dir}' must be a relative directory"
                )));
            }
        }
        if self.content.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "content.extensions must not be empty".into(),
            ));
        }
        if self
            .content
            .extensions
            .iter()
            .any(|e| e.trim_start_matches('.').is_empty())
        {
            return Err(ConfigError::Validation(
                "content.extensions entries must not be empty".into(),
            ));
        }
        let nav_dir = self.content.nav_dir.trim_matches('/');
        if nav_dir.is_empty() || nav_dir.contains("..") {
            return Err(ConfigError::Validation(
                "content.nav_dir must be a relative directory".into(),
            ));
        }
        if self.content.canonical_nav.is_empty()
            || !self
                .content
                .canonical_nav
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ConfigError::Validation(
                "content.canonical_nav may only contain letters, digits, '_' and '-'".into(),
            ));
        }
        if self.vcs.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "vcs.timeout_secs must be at least 1".into(),
            ));
        }
        if self.vcs.history_limit == 0 {
            return Err(ConfigError::Validation(
                "vcs.history_limit must be at least 1".into(),
            ));
        }
        if self.vcs.binary.trim().is_empty() {
            return Err(ConfigError::Validation("vcs.binary must not be empty".into()));
        }
        if self.vcs.default_author.trim().is_empty() {
            return Err(ConfigError::Validation(
                "vcs.default_author must not be empty".into(),
            ));
        }
        self.server.socket_addr()?;
        Ok(())
    }
}

/// Content layout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContentConfig {
    /// Directories (relative to the content root) documents may live in.
    pub doc_dirs: Vec<String>,
    /// Allowed document extensions, matched case-insensitively.
    pub extensions: Vec<String>,
    /// Directory holding `<name>.json` navigation files.
    pub nav_dir: String,
    /// Navigation file written with the `{"sidemenu": [...]}` wrapper.
    pub canonical_nav: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            doc_dirs: vec!["docs".into(), "examples".into()],
            extensions: vec!["md".into(), "html".into(), "txt".into()],
            nav_dir: "nav".into(),
            canonical_nav: "main".into(),
        }
    }
}

/// Whether to talk to version control at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VcsMode {
    /// Use git when the content root is a repository and git runs.
    #[default]
    Auto,
    /// Never invoke version control.
    Off,
}

/// Version-control settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VcsConfig {
    pub mode: VcsMode,
    /// Executable name or path.
    pub binary: String,
    /// Each subprocess is killed after this many seconds.
    pub timeout_secs: u64,
    /// Author recorded when a request carries no attribution.
    pub default_author: String,
    /// History entries returned when a request gives no limit.
    pub history_limit: usize,
}

impl Default for VcsConfig {
    fn default() -> Self {
        Self {
            mode: VcsMode::Auto,
            binary: "git".into(),
            timeout_secs: 10,
            default_author: "system".into(),
            history_limit: 10,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Listen address, `host:port`.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".into(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind.parse().map_err(|_| {
            ConfigError::Validation(format!(
                "server.bind '{}' is not a valid host:port address",
                self.bind
            ))
        })
    }
}

// =============================================================================
// Layering: stock defaults < docnav.toml
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> toml::Value {
    let mut table = toml::Table::new();
    let defaults = DocnavConfig::default();

    let mut content = toml::Table::new();
    content.insert("doc_dirs".into(), string_array(&defaults.content.doc_dirs));
    content.insert("extensions".into(), string_array(&defaults.content.extensions));
    content.insert("nav_dir".into(), defaults.content.nav_dir.into());
    content.insert("canonical_nav".into(), defaults.content.canonical_nav.into());
    table.insert("content".into(), toml::Value::Table(content));

    let mut vcs = toml::Table::new();
    vcs.insert("mode".into(), "auto".into());
    vcs.insert("binary".into(), defaults.vcs.binary.into());
    vcs.insert(
        "timeout_secs".into(),
        toml::Value::Integer(defaults.vcs.timeout_secs as i64),
    );
    vcs.insert("default_author".into(), defaults.vcs.default_author.into());
    vcs.insert(
        "history_limit".into(),
        toml::Value::Integer(defaults.vcs.history_limit as i64),
    );
    table.insert("vcs".into(), toml::Value::Table(vcs));

    let mut server = toml::Table::new();
    server.insert("bind".into(), defaults.server.bind.into());
    table.insert("server".into(), toml::Value::Table(server));

    toml::Value::Table(table)
}

fn string_array(values: &[String]) -> toml::Value {
    toml::Value::Array(values.iter().cloned().map(toml::Value::String).collect())
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely, so a list of
///   `doc_dirs` replaces the default list rather than extending it.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `docnav.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the directory has no `docnav.toml`.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    read_toml(&config_path).map(Some)
}

fn read_toml(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(value)
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<DocnavConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: DocnavConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `docnav.toml` in the content root.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(root: &Path) -> Result<DocnavConfig, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(root)?)
}

/// Load config from an explicit file. Unlike [`load_config`], a missing file
/// is an error.
pub fn load_config_file(path: &Path) -> Result<DocnavConfig, ConfigError> {
    resolve_config(stock_defaults_value(), Some(read_toml(path)?))
}

/// Returns a fully-commented stock `docnav.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# docnav Configuration
# ====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file at the content root as docnav.toml, or pass it with
# --config. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Content layout
# ---------------------------------------------------------------------------
[content]
# Directories (relative to the content root) documents may live in.
# Paths outside these are refused by the API.
doc_dirs = ["docs", "examples"]

# Document extensions the API will read and write (case-insensitive).
extensions = ["md", "html", "txt"]

# Directory holding navigation files, one <name>.json per tree.
nav_dir = "nav"

# Navigation file written with the {"sidemenu": [...]} wrapper when created.
# An existing file keeps whichever shape it already has.
canonical_nav = "main"

# ---------------------------------------------------------------------------
# Version control
# ---------------------------------------------------------------------------
[vcs]
# "auto" commits through git when the content root is a repository and git
# is installed; "off" never runs it.
mode = "auto"

# Executable to run.
binary = "git"

# Seconds before a git invocation is killed.
timeout_secs = 10

# Author recorded when a request sends no X-Author-Name header.
default_author = "system"

# History entries returned when a request gives no limit.
history_limit = 10

# ---------------------------------------------------------------------------
# HTTP server
# ---------------------------------------------------------------------------
[server]
# Address `docnav serve` listens on (overridable with --bind).
bind = "127.0.0.1:8080"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_has_content_layout() {
        let config = DocnavConfig::default();
        assert_eq!(config.content.doc_dirs, vec!["docs", "examples"]);
        assert_eq!(config.content.extensions, vec!["md", "html", "txt"]);
        assert_eq!(config.content.nav_dir, "nav");
        assert_eq!(config.content.canonical_nav, "main");
    }

    #[test]
    fn default_config_has_vcs_settings() {
        let config = DocnavConfig::default();
        assert_eq!(config.vcs.mode, VcsMode::Auto);
        assert_eq!(config.vcs.binary, "git");
        assert_eq!(config.vcs.timeout_secs, 10);
        assert_eq!(config.vcs.default_author, "system");
        assert_eq!(config.vcs.history_limit, 10);
    }

    #[test]
    fn sparse_file_keeps_other_defaults() {
        let config: DocnavConfig = toml::from_str(
            r#"
[vcs]
mode = "off"
"#,
        )
        .unwrap();
        assert_eq!(config.vcs.mode, VcsMode::Off);
        assert_eq!(config.vcs.binary, "git");
        assert_eq!(config.content.nav_dir, "nav");
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn missing_file_means_stock_config() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.content.canonical_nav, "main");
    }

    #[test]
    fn root_file_overrides_defaults() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE),
            r#"
[content]
doc_dirs = ["handbook"]

[server]
bind = "0.0.0.0:9000"
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.content.doc_dirs, vec!["handbook"]);
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        // Unspecified values stay at their defaults
        assert_eq!(config.content.extensions, vec!["md", "html", "txt"]);
        assert_eq!(config.vcs.history_limit, 10);
    }

    #[test]
    fn broken_toml_is_reported() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "this is not valid toml [[[").unwrap();

        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_file_requires_the_file() {
        let tmp = TempDir::new().unwrap();
        let result = load_config_file(&tmp.path().join("missing.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn load_config_file_reads_explicit_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("elsewhere.toml");
        fs::write(&path, "[vcs]\nhistory_limit = 3\n").unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.vcs.history_limit, 3);
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn overlay_scalar_wins() {
        let base: toml::Value = toml::from_str("a = 1\nb = 2").unwrap();
        let overlay: toml::Value = toml::from_str("b = 3").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("a").unwrap().as_integer(), Some(1));
        assert_eq!(merged.get("b").unwrap().as_integer(), Some(3));
    }

    #[test]
    fn nested_tables_merge_per_key() {
        let base = stock_defaults_value();
        let overlay: toml::Value = toml::from_str("[vcs]\ntimeout_secs = 30").unwrap();
        let merged = merge_toml(base, overlay);
        let vcs = merged.get("vcs").unwrap();
        assert_eq!(vcs.get("timeout_secs").unwrap().as_integer(), Some(30));
        assert_eq!(vcs.get("binary").unwrap().as_str(), Some("git"));
    }

    #[test]
    fn merge_toml_arrays_replace() {
        let base = stock_defaults_value();
        let overlay: toml::Value = toml::from_str("[content]\nextensions = [\"rst\"]").unwrap();
        let merged = merge_toml(base, overlay);
        let config: DocnavConfig = merged.try_into().unwrap();
        assert_eq!(config.content.extensions, vec!["rst"]);
    }

    // =========================================================================
    // Strict keys
    // =========================================================================

    #[test]
    fn misspelled_vcs_key_fails() {
        let result: Result<DocnavConfig, _> = toml::from_str("[vcs]\nmodee = \"off\"");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_table_fails() {
        let result: Result<DocnavConfig, _> = toml::from_str("[imaging]\nquality = 3");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_mode_rejected() {
        let result: Result<DocnavConfig, _> = toml::from_str("[vcs]\nmode = \"sometimes\"");
        assert!(result.is_err());
    }

    #[test]
    fn misspelled_key_in_file_fails() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "[server]\nport = 80\n").unwrap();
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn stock_config_is_valid() {
        DocnavConfig::default().validate().unwrap();
    }

    #[test]
    fn validate_empty_doc_dirs() {
        let mut config = DocnavConfig::default();
        config.content.doc_dirs.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_doc_dir_traversal() {
        let mut config = DocnavConfig::default();
        config.content.doc_dirs = vec!["../outside".into()];
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_canonical_nav_characters() {
        let mut config = DocnavConfig::default();
        config.content.canonical_nav = "main.json".into();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_zero_timeout() {
        let mut config = DocnavConfig::default();
        config.vcs.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_bind_address() {
        let mut config = DocnavConfig::default();
        config.server.bind = "localhost".into();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn file_values_are_validated() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "[vcs]\nhistory_limit = 0\n").unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    // =========================================================================
    // gen-config output
    // =========================================================================

    #[test]
    fn generated_file_parses() {
        let content = stock_config_toml();
        let _: toml::Value = toml::from_str(content).expect("stock config must be valid TOML");
    }

    #[test]
    fn generated_file_matches_defaults() {
        let config: DocnavConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = DocnavConfig::default();
        assert_eq!(config.content.doc_dirs, defaults.content.doc_dirs);
        assert_eq!(config.content.extensions, defaults.content.extensions);
        assert_eq!(config.vcs.mode, defaults.vcs.mode);
        assert_eq!(config.vcs.timeout_secs, defaults.vcs.timeout_secs);
        assert_eq!(config.server.bind, defaults.server.bind);
    }

    #[test]
    fn stock_defaults_value_deserializes_to_defaults() {
        let config: DocnavConfig = stock_defaults_value().try_into().unwrap();
        assert_eq!(config.content.nav_dir, "nav");
        assert_eq!(config.vcs.default_author, "system");
        config.validate().unwrap();
    }
}
