//! JSON Output Envelope Types
//!
//! Every `dbdeploy` command prints exactly one envelope on stdout.
//!
//! # Output Contract
//! - Success: `{"ok": true, "command": "...", "site": "...", "data": {...}, "meta": {...}}`
//! - Error: `{"ok": false, "command": "...", "site": "...", "error": {"code", "message"}}`

use serde::{Deserialize, Serialize};

use crate::error::DbDeployError;

/// Success envelope for command results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessEnvelope<T> {
    /// Always true for success envelopes
    pub ok: bool,

    /// Command that was executed (configure, exists, copy, ...)
    pub command: String,

    /// Selected database, as `site.role`
    pub site: String,

    /// Command-specific data
    pub data: T,

    pub meta: Metadata,
}

impl<T> SuccessEnvelope<T> {
    pub fn new(
        command: impl Into<String>,
        site: impl Into<String>,
        data: T,
        meta: Metadata,
    ) -> Self {
        Self { ok: true, command: command.into(), site: site.into(), data, meta }
    }
}

/// Error envelope for command failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Always false for error envelopes
    pub ok: bool,

    pub command: String,

    pub site: String,

    pub error: ErrorInfo,
}

impl ErrorEnvelope {
    pub fn new(command: impl Into<String>, site: impl Into<String>, error: ErrorInfo) -> Self {
        Self { ok: false, command: command.into(), site: site.into(), error }
    }

    /// Create error envelope from a `DbDeployError`
    pub fn from_error(
        command: impl Into<String>,
        site: impl Into<String>,
        err: &DbDeployError,
    ) -> Self {
        Self::new(command, site, ErrorInfo::new(err.error_code(), err.message()))
    }
}

/// Error information structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable error code (e.g., "REMOTE_EXECUTION_FAILED")
    pub code: String,

    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into() }
    }
}

/// Execution metadata included in all success responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    /// Execution time in milliseconds
    pub execution_ms: u64,

    /// Number of items returned (tables, versions), None for other commands
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_returned: Option<usize>,
}

impl Metadata {
    pub fn new(execution_ms: u64) -> Self {
        Self { execution_ms, items_returned: None }
    }

    pub fn with_items(execution_ms: u64, items_returned: usize) -> Self {
        Self { execution_ms, items_returned: Some(items_returned) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_serialization() {
        let envelope = SuccessEnvelope::new(
            "versions",
            "default.default",
            serde_json::json!(["app_2", "app_1"]),
            Metadata::with_items(42, 2),
        );

        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains(r#""ok":true"#));
        assert!(json.contains(r#""command":"versions"#));
        assert!(json.contains(r#""site":"default.default"#));
        assert!(json.contains(r#""execution_ms":42"#));
        assert!(json.contains(r#""items_returned":2"#));
    }

    #[test]
    fn test_error_envelope_from_error() {
        let err = DbDeployError::missing_admin_credentials("default", "default");
        let envelope = ErrorEnvelope::from_error("drop", "default.default", &err);

        assert!(!envelope.ok);
        assert_eq!(envelope.command, "drop");
        assert_eq!(envelope.error.code, "MISSING_ADMIN_CREDENTIALS");
        assert!(envelope.error.message.contains("default.default"));
    }

    #[test]
    fn test_metadata_without_items() {
        let json = serde_json::to_string(&Metadata::new(100)).unwrap();
        assert!(json.contains(r#""execution_ms":100"#));
        assert!(!json.contains("items_returned"));
    }
}
