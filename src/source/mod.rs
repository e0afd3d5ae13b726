//! Configuration Sources
//!
//! This module loads raw database settings from one candidate location on the
//! deployment target and merges caller overrides on top.
//!
//! # Source Kinds
//! - `.php`: a script is staged remotely that includes the file and prints
//!   `serialize($databases)`; the output is decoded with [`php::unserialize`]
//! - `.yml` / `.yaml`: the file is read remotely and parsed as YAML, with
//!   symbol-style keys (`:driver`) normalized to plain names
//!
//! # Locations
//! - `~/...` is resolved against the remote `$HOME`
//! - `/...` is used as is
//! - anything else is relative to the current release
//!
//! A missing file, or a PHP file that defines no `$databases`, loads as an
//! empty mapping. Each location is loaded at most once per [`SourceLoader`].

use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::{DbDeployError, Result};
use crate::exec::{shell_quote, stage_file, ExecutionContext};

pub mod php;

/// Raw, unvalidated settings mapping
pub type RawSettings = Map<String, Value>;

/// How a candidate location is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// PHP file defining `$databases`
    Php,
    /// YAML document
    Yaml,
}

impl SourceKind {
    /// Classify a candidate by extension
    pub fn from_path(path: &str) -> Result<Self> {
        if path.ends_with(".php") {
            Ok(Self::Php)
        } else if path.ends_with(".yml") || path.ends_with(".yaml") {
            Ok(Self::Yaml)
        } else {
            Err(DbDeployError::unsupported_source_kind(path))
        }
    }
}

/// A candidate path resolved against the deployment target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// Path below the remote user's home directory (starts with `/`)
    Home(String),
    /// Absolute path
    Absolute(String),
}

impl SourceLocation {
    /// Resolve `~` and release-relative paths
    #[must_use]
    pub fn resolve(path: &str, release_path: &str) -> Self {
        if let Some(rest) = path.strip_prefix('~') {
            Self::Home(rest.to_string())
        } else if path.starts_with('/') {
            Self::Absolute(path.to_string())
        } else {
            Self::Absolute(format!("{}/{}", release_path.trim_end_matches('/'), path))
        }
    }

    /// Shell word naming this location
    #[must_use]
    pub fn shell_path(&self) -> String {
        match self {
            Self::Home(rest) => format!("\"$HOME\"{}", shell_quote(rest)),
            Self::Absolute(path) => shell_quote(path),
        }
    }

    /// PHP expression naming this location
    #[must_use]
    pub fn php_path(&self) -> String {
        match self {
            Self::Home(rest) => format!("getenv('HOME').'{}'", php::single_quote(rest)),
            Self::Absolute(path) => format!("'{}'", php::single_quote(path)),
        }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Home(rest) => write!(f, "~{rest}"),
            Self::Absolute(path) => write!(f, "{path}"),
        }
    }
}

/// Deep-merge `overlay` onto `base`
///
/// Nested mappings merge key by key; any other value in `overlay` replaces
/// the one in `base`.
#[must_use]
pub fn deep_merge(base: &RawSettings, overlay: &RawSettings) -> RawSettings {
    let mut merged = base.clone();
    for (key, value) in overlay {
        let next = match (merged.get(key), value) {
            (Some(Value::Object(current)), Value::Object(incoming)) => {
                Value::Object(deep_merge(current, incoming))
            }
            _ => value.clone(),
        };
        merged.insert(key.clone(), next);
    }
    merged
}

/// Convert a YAML document into settings, normalizing keys
fn yaml_to_json(value: serde_yaml::Value) -> Result<Value> {
    use serde_yaml::Value as Yaml;

    Ok(match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64().and_then(serde_json::Number::from_f64).map_or(Value::Null, Value::Number)
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => {
            Value::Array(items.into_iter().map(yaml_to_json).collect::<Result<_>>()?)
        }
        Yaml::Mapping(mapping) => {
            let mut map = Map::new();
            for (key, item) in mapping {
                map.insert(normalize_key(&key)?, yaml_to_json(item)?);
            }
            Value::Object(map)
        }
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

/// Canonical form of a mapping key: `:driver`, `driver` and `"driver"` are the same key
fn normalize_key(key: &serde_yaml::Value) -> Result<String> {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => Ok(s.strip_prefix(':').unwrap_or(s).to_string()),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Tagged(tagged) => normalize_key(&tagged.value),
        other => Err(DbDeployError::serialization(format!("Unsupported YAML key: {other:?}"))),
    }
}

/// Parse a YAML settings document
pub fn parse_yaml(text: &str) -> Result<RawSettings> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(text)
        .map_err(|e| DbDeployError::serialization(format!("Invalid YAML: {e}")))?;
    match yaml_to_json(yaml)? {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map),
        other => Err(DbDeployError::invalid_config_shape(format!(
            "Expected a mapping of database settings, found {other}"
        ))),
    }
}

/// Decode the output of the PHP dump script
pub fn parse_php_dump(output: &str) -> Result<RawSettings> {
    let output = output.trim();
    if output.is_empty() {
        return Ok(Map::new());
    }
    match php::unserialize(output)? {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map),
        other => Err(DbDeployError::invalid_config_shape(format!(
            "Expected $databases to be an array, found {other}"
        ))),
    }
}

/// Script printing `serialize($databases)` if `location` exists and defines it
#[must_use]
pub fn php_dump_script(location: &SourceLocation) -> String {
    format!(
        "<?php\n\
         $filename = {};\n\
         if (file_exists($filename)) {{\n\
         \x20 require_once($filename);\n\
         \x20 if (isset($databases)) {{\n\
         \x20   print serialize($databases);\n\
         \x20 }}\n\
         }}\n",
        location.php_path()
    )
}

/// Command printing the file at `location`, or nothing when it is absent
#[must_use]
pub fn read_file_command(location: &SourceLocation) -> String {
    let path = location.shell_path();
    format!("[ ! -e {path} ] || cat {path}")
}

/// Loads candidate sources through an [`ExecutionContext`], caching each location
pub struct SourceLoader<E: ExecutionContext> {
    ctx: E,
    drush_bin: String,
    seen: HashMap<String, RawSettings>,
}

impl<E: ExecutionContext> SourceLoader<E> {
    pub fn new(ctx: E, drush_bin: impl Into<String>) -> Self {
        Self { ctx, drush_bin: drush_bin.into(), seen: HashMap::new() }
    }

    #[must_use]
    pub fn context(&self) -> &E {
        &self.ctx
    }

    /// Number of distinct locations loaded so far
    #[must_use]
    pub fn cached_locations(&self) -> usize {
        self.seen.len()
    }

    /// Load `path` and deep-merge `overrides` on top
    ///
    /// The cache keeps the value as loaded, before overrides.
    pub fn load(&mut self, path: &str, overrides: &RawSettings) -> Result<RawSettings> {
        let kind = SourceKind::from_path(path)?;
        let location = SourceLocation::resolve(path, self.ctx.current_release_path());
        let key = location.to_string();

        if !self.seen.contains_key(&key) {
            self.ctx.log_info(&format!("Trying to load database settings from {key:?}"));
            let loaded = match kind {
                SourceKind::Php => self.load_php(&location)?,
                SourceKind::Yaml => self.load_yaml(&location)?,
            };
            tracing::debug!(location = %key, entries = loaded.len(), "loaded source");
            self.seen.insert(key.clone(), loaded);
        }

        let raw = self.seen.get(&key).cloned().unwrap_or_default();
        Ok(deep_merge(&raw, overrides))
    }

    fn load_php(&self, location: &SourceLocation) -> Result<RawSettings> {
        let tmp = stage_file(&self.ctx, &php_dump_script(location))?;
        let tmp = shell_quote(&tmp);
        let output =
            self.ctx.capture(&format!("{} php-script {tmp} && rm -f {tmp}", self.drush_bin))?;
        parse_php_dump(&output)
    }

    fn load_yaml(&self, location: &SourceLocation) -> Result<RawSettings> {
        let text = self.ctx.capture(&read_file_command(location))?;
        if text.trim().is_empty() {
            return Ok(Map::new());
        }
        parse_yaml(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn map(value: Value) -> RawSettings {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_deep_merge_adds_nested_keys() {
        let merged = deep_merge(&map(json!({"a": {"x": 1}})), &map(json!({"a": {"y": 2}})));
        assert_eq!(Value::Object(merged), json!({"a": {"x": 1, "y": 2}}));
    }

    #[test]
    fn test_deep_merge_overlay_wins_on_leaf_conflict() {
        let merged = deep_merge(&map(json!({"a": {"x": 1}})), &map(json!({"a": {"x": 2}})));
        assert_eq!(Value::Object(merged), json!({"a": {"x": 2}}));
    }

    #[test]
    fn test_deep_merge_scalar_replaces_mapping() {
        let merged = deep_merge(&map(json!({"a": {"x": 1}, "b": 1})), &map(json!({"a": 3})));
        assert_eq!(Value::Object(merged), json!({"a": 3, "b": 1}));
    }

    #[test]
    fn test_source_kind() {
        assert_eq!(SourceKind::from_path("sites/default/settings.php").unwrap(), SourceKind::Php);
        assert_eq!(SourceKind::from_path("/etc/drush/database.yml").unwrap(), SourceKind::Yaml);
        assert!(matches!(
            SourceKind::from_path("database.ini"),
            Err(DbDeployError::UnsupportedSourceKind(_))
        ));
    }

    #[test]
    fn test_location_resolution() {
        let release = "/var/www/releases/20240101";
        assert_eq!(
            SourceLocation::resolve("sites/default/settings.php", release),
            SourceLocation::Absolute(format!("{release}/sites/default/settings.php"))
        );
        assert_eq!(
            SourceLocation::resolve("~/.drush/database.yml", release),
            SourceLocation::Home("/.drush/database.yml".to_string())
        );
        assert_eq!(
            SourceLocation::resolve("/etc/drush/database.yml", release),
            SourceLocation::Absolute("/etc/drush/database.yml".to_string())
        );
    }

    #[test]
    fn test_location_rendering() {
        let home = SourceLocation::Home("/.drush/database.php".to_string());
        assert_eq!(home.shell_path(), r#""$HOME"'/.drush/database.php'"#);
        assert_eq!(home.php_path(), "getenv('HOME').'/.drush/database.php'");
        assert_eq!(home.to_string(), "~/.drush/database.php");

        let abs = SourceLocation::Absolute("/etc/drush/database.yml".to_string());
        assert_eq!(
            read_file_command(&abs),
            "[ ! -e '/etc/drush/database.yml' ] || cat '/etc/drush/database.yml'"
        );
    }

    #[test]
    fn test_parse_yaml_normalizes_symbol_keys() {
        let text = "default:\n  default:\n    :driver: mysql\n    database: app\n    port: 3306\n";
        let settings = parse_yaml(text).unwrap();
        assert_eq!(
            Value::Object(settings),
            json!({"default": {"default": {"driver": "mysql", "database": "app", "port": 3306}}})
        );
    }

    #[test]
    fn test_parse_yaml_empty_and_invalid_shape() {
        assert!(parse_yaml("---\n").unwrap().is_empty());
        assert!(matches!(parse_yaml("- a\n- b\n"), Err(DbDeployError::InvalidConfigShape(_))));
    }

    #[test]
    fn test_parse_php_dump() {
        assert!(parse_php_dump("").unwrap().is_empty());
        assert!(parse_php_dump("a:0:{}").unwrap().is_empty());
        let settings = parse_php_dump(r#"a:1:{s:7:"default";a:0:{}}"#).unwrap();
        assert_eq!(Value::Object(settings), json!({"default": {}}));
        assert!(parse_php_dump("s:3:\"abc\";").is_err());
    }

    #[test]
    fn test_php_dump_script() {
        let script = php_dump_script(&SourceLocation::Absolute("/srv/settings.php".to_string()));
        assert!(script.starts_with("<?php\n$filename = '/srv/settings.php';\n"));
        assert!(script.contains("  require_once($filename);\n"));
        assert!(script.contains("print serialize($databases);"));
    }
}
