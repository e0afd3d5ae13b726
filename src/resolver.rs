//! Configuration Resolution
//!
//! The resolver walks an ordered list of candidate sources and stops at the
//! first one whose merged result is *management-complete*: every database
//! entry carries the keys needed to administer it, not just connect to it.
//!
//! # Merge Order
//! Each candidate is merged with everything accumulated so far, and the
//! accumulated settings win. Earlier candidates and caller overrides therefore
//! take precedence; later candidates only fill in missing keys.
//!
//! # Degraded Result
//! When no candidate is management-complete the last merged result is adopted
//! anyway. Ordinary connections still work; administrative operations fail
//! later with `MissingAdminCredentials`.

use serde_json::Value;

use crate::engine::MANAGE_KEYS;
use crate::error::{DbDeployError, Result};
use crate::exec::ExecutionContext;
use crate::source::{RawSettings, SourceLoader};

/// Whether every database entry in `tree` carries all management keys
///
/// Only key presence is checked; an empty `admin_username` still counts.
/// A tree without any database entry is never complete.
#[must_use]
pub fn is_management_complete(tree: &RawSettings) -> bool {
    let mut leaves = 0;
    for site in tree.values() {
        let Value::Object(roles) = site else { return false };
        for entry in roles.values() {
            let Value::Object(settings) = entry else { return false };
            if !MANAGE_KEYS.iter().all(|key| settings.contains_key(*key)) {
                return false;
            }
            leaves += 1;
        }
    }
    leaves > 0
}

/// Check that `tree` is shaped site -> role -> settings mapping
pub fn validate_shape(tree: &RawSettings) -> Result<()> {
    for (site, roles) in tree {
        let Value::Object(roles) = roles else {
            return Err(DbDeployError::invalid_config_shape(format!(
                "Site '{site}' must map database roles to settings, found {roles}"
            )));
        };
        for (role, settings) in roles {
            if !settings.is_object() {
                return Err(DbDeployError::invalid_config_shape(format!(
                    "Database '{site}.{role}' must be a mapping of settings"
                )));
            }
        }
    }
    Ok(())
}

/// Interpret caller overrides; `null` means none
pub fn overrides_from_value(overrides: &Value) -> Result<RawSettings> {
    match overrides {
        Value::Null => Ok(RawSettings::new()),
        Value::Object(map) => Ok(map.clone()),
        other => Err(DbDeployError::invalid_config_shape(format!(
            "Invalid value for databases: {other}"
        ))),
    }
}

/// Resolves database settings from candidate sources
pub struct ConfigResolver<E: ExecutionContext> {
    loader: SourceLoader<E>,
}

impl<E: ExecutionContext> ConfigResolver<E> {
    pub fn new(ctx: E, drush_bin: impl Into<String>) -> Self {
        Self { loader: SourceLoader::new(ctx, drush_bin) }
    }

    #[must_use]
    pub fn loader(&self) -> &SourceLoader<E> {
        &self.loader
    }

    /// Resolve settings from `candidates` in order, starting from `overrides`
    pub fn resolve(&mut self, candidates: &[String], overrides: &Value) -> Result<RawSettings> {
        let mut databases = overrides_from_value(overrides)?;
        let mut adopted = None;

        for candidate in candidates {
            databases = self.loader.load(candidate, &databases)?;
            if is_management_complete(&databases) {
                adopted = Some(candidate.as_str());
                break;
            }
        }

        validate_shape(&databases)?;

        match adopted {
            Some(candidate) => {
                tracing::info!(source = candidate, "adopted management-complete database settings");
            }
            None => {
                tracing::warn!(
                    "no source provided admin credentials; using partial database settings"
                );
            }
        }

        Ok(databases)
    }
}
