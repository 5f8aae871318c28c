//! Host probe configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for probe.json
//! - Config resolution (CLI → env → XDG → /etc → defaults)
//! - Semantic validation
//! - Config snapshots recorded alongside probe reports

pub mod probe;
pub mod resolve;
pub mod snapshot;
pub mod validate;

pub use probe::{CredentialSettings, ProbeConfig, SourceSettings, WatchSettings};
pub use resolve::{resolve_config, ConfigPath, ConfigSource};
pub use snapshot::ConfigSnapshot;
pub use validate::{validate_probe_config, ValidationError, ValidationResult};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid JSON in config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Semantic validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration with provenance information.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The validated probe configuration.
    pub config: ProbeConfig,
    /// Where it came from.
    pub origin: ConfigPath,
    /// Frozen snapshot for reports.
    pub snapshot: ConfigSnapshot,
}

/// Load the probe configuration with the standard resolution order.
///
/// A missing file anywhere in the chain falls through to the next level;
/// a file that exists but fails to parse or validate is an error.
pub fn load_config(cli_path: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    let origin = resolve_config(cli_path);

    let (config, raw) = match &origin.path {
        Some(path) => {
            let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
                path: path.clone(),
                source: e,
            })?;
            let config = ProbeConfig::from_json(&raw).map_err(|e| ConfigError::ParseError {
                path: path.clone(),
                source: e,
            })?;
            (config, Some(raw))
        }
        None => (ProbeConfig::default(), None),
    };

    validate_probe_config(&config)?;

    let snapshot = ConfigSnapshot::new(&config, &origin, raw.as_deref());
    Ok(LoadedConfig {
        config,
        origin,
        snapshot,
    })
}
