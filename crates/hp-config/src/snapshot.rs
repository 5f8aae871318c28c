//! Configuration snapshots embedded in probe reports.
//!
//! A snapshot captures the configuration a run used, so a report can be
//! matched to the exact knobs that produced it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::probe::ProbeConfig;
use crate::resolve::ConfigPath;

/// A frozen snapshot of configuration state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// Hostname where snapshot was taken.
    #[serde(default)]
    pub hostname: Option<String>,

    /// Schema version of the configuration.
    pub schema_version: String,

    /// Path where probe.json was loaded from.
    #[serde(default)]
    pub config_path: Option<String>,

    /// Resolution level that produced the config.
    pub config_source: String,

    /// SHA-256 hash of the probe.json content.
    #[serde(default)]
    pub config_hash: Option<String>,

    /// Effective values.
    pub effective: ProbeConfig,
}

impl ConfigSnapshot {
    /// Create a new snapshot from loaded configuration.
    pub fn new(config: &ProbeConfig, origin: &ConfigPath, raw_json: Option<&str>) -> Self {
        ConfigSnapshot {
            timestamp: Utc::now(),
            hostname: hostname::get()
                .ok()
                .map(|h| h.to_string_lossy().to_string()),
            schema_version: config.schema_version.clone(),
            config_path: origin.path.as_ref().map(|p| p.display().to_string()),
            config_source: origin.source.to_string(),
            config_hash: raw_json.map(hash_content),
            effective: config.clone(),
        }
    }

    /// Serialize snapshot to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Compute SHA-256 hash of content as lowercase hex.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::ConfigSource;

    #[test]
    fn test_hash_content_is_sha256() {
        assert_eq!(
            hash_content(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_defaults_snapshot_has_no_hash() {
        let snapshot = ConfigSnapshot::new(&ProbeConfig::default(), &ConfigPath::default(), None);
        assert!(snapshot.config_hash.is_none());
        assert!(snapshot.config_path.is_none());
        assert_eq!(snapshot.config_source, ConfigSource::BuiltinDefault.to_string());
        assert!(snapshot.to_json().unwrap().contains("\"effective\""));
    }
}
