//! Typed probe configuration (probe.json).
//!
//! Every section and field has a default, so a partial file only needs to
//! name the knobs it changes:
//!
//! ```json
//! {
//!   "schema_version": "1.0.0",
//!   "credentials": { "roots": ["/home"], "inter_file_delay_ms": 25 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root of probe.json.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Schema version of this file.
    pub schema_version: String,

    /// Private-key scan settings.
    pub credentials: CredentialSettings,

    /// Locations of the evidence sources and the per-fetch bound.
    pub sources: SourceSettings,

    /// Login watch settings.
    pub watch: WatchSettings,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            credentials: CredentialSettings::default(),
            sources: SourceSettings::default(),
            watch: WatchSettings::default(),
        }
    }
}

impl ProbeConfig {
    /// Parse a configuration from JSON text.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Read and parse a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, crate::ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| crate::ConfigError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&raw).map_err(|e| crate::ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Private-key scan settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialSettings {
    /// Directories walked for private keys.
    pub roots: Vec<PathBuf>,

    /// Pause before opening each regular file (milliseconds).
    pub inter_file_delay_ms: u64,
}

impl Default for CredentialSettings {
    fn default() -> Self {
        Self {
            roots: vec![PathBuf::from("/root"), PathBuf::from("/home")],
            inter_file_delay_ms: 0,
        }
    }
}

impl CredentialSettings {
    pub fn inter_file_delay(&self) -> Duration {
        Duration::from_millis(self.inter_file_delay_ms)
    }
}

/// Evidence source locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Mount point of procfs.
    pub proc_root: PathBuf,

    /// Binary login-record file.
    pub utmp_path: PathBuf,

    /// auditd ruleset read by the watch-rule parser.
    pub audit_rules_path: PathBuf,

    /// Upper bound on any single snapshot fetch (milliseconds).
    pub snapshot_timeout_ms: u64,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            utmp_path: PathBuf::from("/var/run/utmp"),
            audit_rules_path: PathBuf::from("/etc/audit/audit.rules"),
            snapshot_timeout_ms: 5_000,
        }
    }
}

impl SourceSettings {
    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_millis(self.snapshot_timeout_ms)
    }
}

/// Login watch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSettings {
    /// Poll interval (milliseconds).
    pub interval_ms: u64,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self { interval_ms: 1_000 }
    }
}

impl WatchSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}
