//! Error Handling Infrastructure
//!
//! This module defines all error types used throughout dbdeploy.
//! All errors are structured and map to specific error codes for JSON output.
//!
//! # Error Categories
//! - `UnsupportedSourceKind`: A candidate source with an unknown file extension
//! - `InvalidConfigShape`: Database settings that are not mapping-shaped
//! - `RemoteExecution`: A remote command exited non-zero
//! - `MissingAdminCredentials`: An administrative operation without admin credentials
//! - `UnknownDatabase`: The selected site/role pair is not configured
//! - `Serialization`: A PHP-serialized or YAML payload that cannot be decoded
//! - `ConfigError`: Deployment configuration file errors

use thiserror::Error;

/// Main error type for dbdeploy operations
#[derive(Error, Debug)]
pub enum DbDeployError {
    /// Candidate source has an extension we cannot load
    #[error("Unsupported source kind: {0}")]
    UnsupportedSourceKind(String),

    /// Database settings are not shaped as site -> role -> settings mappings
    #[error("Invalid configuration shape: {0}")]
    InvalidConfigShape(String),

    /// Remote command exited non-zero
    #[error("Remote command failed: {command}\n{output}")]
    RemoteExecution { command: String, output: String },

    /// Administrative operation requested without admin credentials
    #[error("Missing admin credentials for database '{site}.{role}'")]
    MissingAdminCredentials { site: String, role: String },

    /// Selected database is not present in the resolved configuration
    #[error("No database configured for '{site}.{role}'")]
    UnknownDatabase { site: String, role: String },

    /// Payload could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (file not readable, invalid JSON, etc.)
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl DbDeployError {
    /// Convert error to error code string for JSON output
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::UnsupportedSourceKind(_) => "UNSUPPORTED_SOURCE_KIND",
            Self::InvalidConfigShape(_) => "INVALID_CONFIG_SHAPE",
            Self::RemoteExecution { .. } => "REMOTE_EXECUTION_FAILED",
            Self::MissingAdminCredentials { .. } => "MISSING_ADMIN_CREDENTIALS",
            Self::UnknownDatabase { .. } => "UNKNOWN_DATABASE",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::ConfigError(_) => "CONFIG_ERROR",
        }
    }

    /// Human-readable error message
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    pub fn unsupported_source_kind(path: impl Into<String>) -> Self {
        Self::UnsupportedSourceKind(path.into())
    }

    pub fn invalid_config_shape(detail: impl Into<String>) -> Self {
        Self::InvalidConfigShape(detail.into())
    }

    /// Create a remote execution error carrying the failing command's output
    pub fn remote_execution(command: impl Into<String>, output: impl Into<String>) -> Self {
        Self::RemoteExecution { command: command.into(), output: output.into() }
    }

    pub fn missing_admin_credentials(site: impl Into<String>, role: impl Into<String>) -> Self {
        Self::MissingAdminCredentials { site: site.into(), role: role.into() }
    }

    pub fn unknown_database(site: impl Into<String>, role: impl Into<String>) -> Self {
        Self::UnknownDatabase { site: site.into(), role: role.into() }
    }

    pub fn serialization(detail: impl Into<String>) -> Self {
        Self::Serialization(detail.into())
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }
}

/// Result type alias for dbdeploy operations
pub type Result<T> = std::result::Result<T, DbDeployError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            DbDeployError::unsupported_source_kind("x.ini").error_code(),
            "UNSUPPORTED_SOURCE_KIND"
        );
        assert_eq!(
            DbDeployError::invalid_config_shape("test").error_code(),
            "INVALID_CONFIG_SHAPE"
        );
        assert_eq!(
            DbDeployError::remote_execution("false", "").error_code(),
            "REMOTE_EXECUTION_FAILED"
        );
        assert_eq!(
            DbDeployError::missing_admin_credentials("default", "default").error_code(),
            "MISSING_ADMIN_CREDENTIALS"
        );
        assert_eq!(DbDeployError::unknown_database("a", "b").error_code(), "UNKNOWN_DATABASE");
        assert_eq!(DbDeployError::serialization("test").error_code(), "SERIALIZATION_ERROR");
        assert_eq!(DbDeployError::config_error("test").error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_error_messages() {
        let err = DbDeployError::remote_execution("drush sql-cli", "ERROR 1045: Access denied");
        assert!(err.message().contains("drush sql-cli"));
        assert!(err.message().contains("Access denied"));

        let err = DbDeployError::missing_admin_credentials("default", "slave");
        assert!(err.message().contains("default.slave"));
    }

    #[test]
    fn test_error_constructors() {
        let err = DbDeployError::unsupported_source_kind("settings.ini");
        assert!(matches!(err, DbDeployError::UnsupportedSourceKind(_)));

        let err = DbDeployError::invalid_config_shape("test");
        assert!(matches!(err, DbDeployError::InvalidConfigShape(_)));

        let err = DbDeployError::remote_execution("ls", "boom");
        assert!(matches!(err, DbDeployError::RemoteExecution { .. }));

        let err = DbDeployError::config_error("test");
        assert!(matches!(err, DbDeployError::ConfigError(_)));
    }
}
