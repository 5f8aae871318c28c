//! Error types for the host probe.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for automation
//! - Remediation suggestions for humans
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Ruleset Unreadable
//!   Reason: cannot read watch ruleset /etc/audit/audit.rules: permission denied
//!   Fix: Run as root or pass '--rules <path>' pointing at a readable ruleset.
//! ```
//!
//! # Agent-Facing Output
//!
//! ```json
//! {
//!   "code": 12,
//!   "category": "config",
//!   "message": "cannot read watch ruleset /etc/audit/audit.rules: permission denied",
//!   "recoverable": true,
//!   "suggested_action": "elevate",
//!   "context": { "path": "/etc/audit/audit.rules" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for host probe operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Probe configuration and ruleset files.
    Config,
    /// Evidence source adapters (process table, utmp, /proc/net).
    Collection,
    /// Login watch loop.
    Watch,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Collection => write!(f, "collection"),
            ErrorCategory::Watch => write!(f, "watch"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Suggested actions for agents to take in response to errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    /// Retry the operation.
    Retry,
    /// Run validation on the configuration.
    RunCheck,
    /// Request elevated privileges.
    Elevate,
    /// Skip this item and continue.
    Skip,
    /// Abort the operation.
    Abort,
    /// No action needed (informational).
    None,
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestedAction::Retry => write!(f, "retry"),
            SuggestedAction::RunCheck => write!(f, "run_check"),
            SuggestedAction::Elevate => write!(f, "elevate"),
            SuggestedAction::Skip => write!(f, "skip"),
            SuggestedAction::Abort => write!(f, "abort"),
            SuggestedAction::None => write!(f, "none"),
        }
    }
}

/// Unified error type for the host probe.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid probe configuration: {0}")]
    InvalidConfig(String),

    #[error("cannot read watch ruleset {path}: {reason}")]
    RulesetUnreadable { path: PathBuf, reason: String },

    // Collection errors (20-29)
    #[error("evidence source {source_name} unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    #[error("evidence source {source_name} timed out after {millis}ms")]
    SourceTimeout { source_name: String, millis: u64 },

    #[error("permission denied reading {path}")]
    PermissionDenied { path: PathBuf },

    // Watch errors (30-39)
    #[error("login callback failed: {0}")]
    CallbackFailed(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Collection errors
    /// - 30-39: Watch errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidConfig(_) => 11,
            Error::RulesetUnreadable { .. } => 12,
            Error::SourceUnavailable { .. } => 20,
            Error::SourceTimeout { .. } => 21,
            Error::PermissionDenied { .. } => 22,
            Error::CallbackFailed(_) => 30,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidConfig(_) | Error::RulesetUnreadable { .. } => {
                ErrorCategory::Config
            }

            Error::SourceUnavailable { .. }
            | Error::SourceTimeout { .. }
            | Error::PermissionDenied { .. } => ErrorCategory::Collection,

            Error::CallbackFailed(_) => ErrorCategory::Watch,

            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,

        }
    }

    /// Returns whether this error is potentially recoverable.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_) => true,
            Error::InvalidConfig(_) => true,
            Error::RulesetUnreadable { .. } => true,

            // Transient: the next snapshot may succeed
            Error::SourceUnavailable { .. } => true,
            Error::SourceTimeout { .. } => true,
            Error::PermissionDenied { .. } => true,

            Error::CallbackFailed(_) => true,

            Error::Io(_) => true,
            Error::Json(_) => false,

        }
    }

    /// Returns the suggested action for agents.
    pub fn suggested_action(&self) -> SuggestedAction {
        match self {
            Error::Config(_) | Error::InvalidConfig(_) => SuggestedAction::RunCheck,
            Error::RulesetUnreadable { .. } => SuggestedAction::Elevate,

            Error::SourceUnavailable { .. } => SuggestedAction::Skip,
            Error::SourceTimeout { .. } => SuggestedAction::Retry,
            Error::PermissionDenied { .. } => SuggestedAction::Elevate,

            Error::CallbackFailed(_) => SuggestedAction::None,

            Error::Io(_) => SuggestedAction::Retry,
            Error::Json(_) => SuggestedAction::Abort,

        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) => "Check the probe configuration file syntax (probe.json).",
            Error::InvalidConfig(_) => {
                "Fix the reported field in probe.json, or remove the file to use built-in defaults."
            }
            Error::RulesetUnreadable { .. } => {
                "Run as root or pass '--rules <path>' pointing at a readable ruleset."
            }

            Error::SourceUnavailable { .. } => {
                "The probe continues without this evidence. Check /proc is mounted and readable."
            }
            Error::SourceTimeout { .. } => {
                "The system is slow to answer. Raise sources.snapshot_timeout_ms or retry later."
            }
            Error::PermissionDenied { .. } => "Run with elevated privileges to read this file.",

            Error::CallbackFailed(_) => "The login watch keeps polling; inspect the callback output.",

            Error::Io(_) => "Check permissions and that the referenced paths exist. Retry the operation.",
            Error::Json(_) => "Invalid JSON. Check syntax with 'jq .' or restore from backup.",

        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::InvalidConfig(_) => "Invalid Probe Configuration",
            Error::RulesetUnreadable { .. } => "Ruleset Unreadable",
            Error::SourceUnavailable { .. } => "Evidence Source Unavailable",
            Error::SourceTimeout { .. } => "Evidence Source Timeout",
            Error::PermissionDenied { .. } => "Permission Denied",
            Error::CallbackFailed(_) => "Login Callback Failed",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Parse Error",
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Suggested action for agents.
    pub suggested_action: SuggestedAction,

    /// Additional structured context (e.g., file path, source name).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::RulesetUnreadable { path, .. } | Error::PermissionDenied { path } => {
                context.insert("path".to_string(), serde_json::json!(path));
            }
            Error::SourceUnavailable { source_name, .. } => {
                context.insert("source".to_string(), serde_json::json!(source_name));
            }
            Error::SourceTimeout {
                source_name,
                millis,
            } => {
                context.insert("source".to_string(), serde_json::json!(source_name));
                context.insert("timeout_ms".to_string(), serde_json::json!(millis));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action(),
            context,
        }
    }
}

impl StructuredError {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}

/// Format an error for human-readable stderr output.
///
/// Output format:
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        red = red,
        cyan = cyan,
        reset = reset,
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}
