//! Configuration validation errors and semantic validation.

use thiserror::Error;

use crate::probe::ProbeConfig;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Longest accepted per-file delay; anything larger is almost certainly a unit mistake.
const MAX_INTER_FILE_DELAY_MS: u64 = 60_000;

/// Validate a probe configuration semantically.
pub fn validate_probe_config(config: &ProbeConfig) -> ValidationResult<()> {
    if config.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    if config.credentials.roots.is_empty() {
        return Err(ValidationError::invalid(
            "credentials.roots",
            "at least one directory is required",
        ));
    }
    if let Some(root) = config
        .credentials
        .roots
        .iter()
        .find(|r| r.as_os_str().is_empty())
    {
        return Err(ValidationError::invalid(
            "credentials.roots",
            format!("empty path in list ({:?})", root),
        ));
    }
    if config.credentials.inter_file_delay_ms > MAX_INTER_FILE_DELAY_MS {
        return Err(ValidationError::invalid(
            "credentials.inter_file_delay_ms",
            format!("must be at most {}", MAX_INTER_FILE_DELAY_MS),
        ));
    }

    if config.sources.snapshot_timeout_ms == 0 {
        return Err(ValidationError::invalid(
            "sources.snapshot_timeout_ms",
            "must be positive",
        ));
    }

    if config.watch.interval_ms == 0 {
        return Err(ValidationError::invalid("watch.interval_ms", "must be positive"));
    }

    Ok(())
}
