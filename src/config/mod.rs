//! Configuration Management
//!
//! This module loads the deployment configuration: where the release lives,
//! how to reach it, and which credential sources to try.
//!
//! # Configuration Locations
//! - Local: `.dbdeploy/config.json` (team-shareable, per-project)
//! - Global: `~/.config/dbdeploy/config.json` (per-user)
//!
//! # Resolution Precedence
//! 1. Explicit `--config <path>` (used alone)
//! 2. Local config file (`.dbdeploy/config.json`)
//! 3. Global config file (`~/.config/dbdeploy/config.json`)
//!
//! Local and global files are deep-merged, local keys winning. The
//! `databases` override mappings therefore merge per site and role.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::admin::{DatabaseTarget, DEFAULT_ROLE, DEFAULT_SITE};
use crate::admin::settings::DEFAULT_TEMPLATE;
use crate::engine::DatabasePorts;
use crate::error::{DbDeployError, Result};
use crate::exec::ShellExecutor;
use crate::source::deep_merge;

/// Candidate credential sources tried when none are configured
pub const DEFAULT_DATABASES_PATH: &[&str] = &[
    "sites/default/settings.php",
    "~/.drush/database.php",
    "~/.drush/database.yml",
    "/etc/drush/database.php",
    "/etc/drush/database.yml",
];

fn default_drush_bin() -> String {
    "drush".to_string()
}

fn default_databases_path() -> Vec<String> {
    DEFAULT_DATABASES_PATH.iter().map(|path| (*path).to_string()).collect()
}

fn default_site() -> String {
    DEFAULT_SITE.to_string()
}

fn default_role() -> String {
    DEFAULT_ROLE.to_string()
}

fn default_settings_template() -> String {
    DEFAULT_TEMPLATE.to_string()
}

/// Deployment configuration (stored in `config.json`)
///
/// Example:
/// ```json
/// {
///   "release_path": "/var/www/app/current",
///   "host": "deploy@web1",
///   "databases_path": ["sites/default/settings.php", "/etc/drush/database.yml"],
///   "databases": { "default": { "default": { "database": "app" } } }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Current release root on the target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_path: Option<String>,

    /// SSH destination; commands run locally when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default = "default_drush_bin")]
    pub drush_bin: String,

    /// Ordered credential sources
    #[serde(default = "default_databases_path")]
    pub databases_path: Vec<String>,

    /// Initial overrides, site -> role -> settings
    #[serde(default)]
    pub databases: Value,

    #[serde(default)]
    pub database_ports: DatabasePorts,

    #[serde(default = "default_site")]
    pub site: String,

    #[serde(default = "default_role")]
    pub role: String,

    #[serde(default = "default_settings_template")]
    pub settings_template: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            release_path: None,
            host: None,
            drush_bin: default_drush_bin(),
            databases_path: default_databases_path(),
            databases: Value::Null,
            database_ports: DatabasePorts::default(),
            site: default_site(),
            role: default_role(),
            settings_template: default_settings_template(),
        }
    }
}

impl DeployConfig {
    /// Release path, required by every command touching the target
    pub fn release_path(&self) -> Result<&str> {
        self.release_path.as_deref().ok_or_else(|| {
            DbDeployError::config_error(
                "No release_path configured. Set it in .dbdeploy/config.json or pass --config.",
            )
        })
    }

    /// Executor for the configured target
    pub fn executor(&self) -> Result<ShellExecutor> {
        let release = self.release_path()?;
        Ok(match &self.host {
            Some(host) => ShellExecutor::ssh(host, release),
            None => ShellExecutor::local(release),
        })
    }

    #[must_use]
    pub fn target(&self) -> DatabaseTarget {
        DatabaseTarget::new(&self.site, &self.role)
    }
}

/// Get path to local config file (`.dbdeploy/config.json`)
pub fn local_config_path() -> Result<PathBuf> {
    let current_dir = std::env::current_dir().map_err(|e| {
        DbDeployError::config_error(format!("Could not determine current directory: {e}"))
    })?;

    Ok(current_dir.join(".dbdeploy").join("config.json"))
}

/// Get path to global config file (`~/.config/dbdeploy/config.json`)
pub fn global_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| DbDeployError::config_error("Could not determine user config directory"))?;

    Ok(config_dir.join("dbdeploy").join("config.json"))
}

/// Read a config file as a raw JSON object; a missing file is empty
fn load_raw(path: &Path) -> Result<Map<String, Value>> {
    if !path.exists() {
        return Ok(Map::new());
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        DbDeployError::config_error(format!("Could not read config file {}: {e}", path.display()))
    })?;

    match serde_json::from_str::<Value>(&contents) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(DbDeployError::config_error(format!(
            "Config file {} must contain a JSON object",
            path.display()
        ))),
        Err(e) => Err(DbDeployError::config_error(format!(
            "Invalid config file format in {}: {e}",
            path.display()
        ))),
    }
}

fn from_raw(raw: Map<String, Value>) -> Result<DeployConfig> {
    serde_json::from_value(Value::Object(raw))
        .map_err(|e| DbDeployError::config_error(format!("Invalid configuration: {e}")))
}

/// Load a single config file
pub fn load_config(path: &Path) -> Result<DeployConfig> {
    if !path.exists() {
        return Err(DbDeployError::config_error(format!(
            "Config file {} does not exist",
            path.display()
        )));
    }
    from_raw(load_raw(path)?)
}

/// Merge raw global and local configs, local keys winning
pub fn merge_layers(
    global: &Map<String, Value>,
    local: &Map<String, Value>,
) -> Result<DeployConfig> {
    from_raw(deep_merge(global, local))
}

/// Load the deployment configuration with precedence
///
/// An explicit path is used on its own. Otherwise the global and local files
/// are merged; when neither exists the defaults apply.
pub fn load_with_precedence(explicit: Option<&Path>) -> Result<DeployConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }

    let global = load_raw(&global_config_path()?)?;
    let local = load_raw(&local_config_path()?)?;
    merge_layers(&global, &local)
}
