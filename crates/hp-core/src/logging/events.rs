//! Structured event vocabulary.
//!
//! Every log line the probe emits carries an `event` field drawn from
//! [`event_names`], plus the `run_id` and `host_id` of the enclosing run span.

use serde::{Deserialize, Serialize};

/// Log levels as they appear in JSONL output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Probe component an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    Container,
    Credentials,
    Discover,
    Network,
    Watches,
    Users,
    Watch,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::Container => "container",
            Stage::Credentials => "credentials",
            Stage::Discover => "discover",
            Stage::Network => "network",
            Stage::Watches => "watches",
            Stage::Users => "users",
            Stage::Watch => "watch",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Run lifecycle
    pub const PROBE_STARTED: &str = "probe.started";
    pub const PROBE_FINISHED: &str = "probe.finished";

    // Config
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_ERROR: &str = "config.error";

    // Evidence sources
    pub const SOURCE_FAILED: &str = "source.failed";
    pub const SOURCE_TIMEOUT: &str = "source.timeout";

    // Discoverer registry
    pub const DISCOVER_MATCH: &str = "discover.match";
    pub const DISCOVER_FINISHED: &str = "discover.finished";

    // Credential scan
    pub const CREDENTIALS_FILE_SKIPPED: &str = "credentials.file_skipped";
    pub const CREDENTIALS_KEY_FOUND: &str = "credentials.key_found";
    pub const CREDENTIALS_FINISHED: &str = "credentials.finished";

    // Watch rules
    pub const WATCHES_PARSED: &str = "watches.parsed";
    pub const WATCHES_UNREADABLE: &str = "watches.unreadable";

    // Container check
    pub const CONTAINER_VERDICT: &str = "container.verdict";

    // Login watch
    pub const WATCH_STARTED: &str = "watch.started";
    pub const WATCH_TICK: &str = "watch.tick";
    pub const WATCH_MATCH: &str = "watch.match";
    pub const WATCH_CALLBACK_FAILED: &str = "watch.callback_failed";
    pub const WATCH_STOPPED: &str = "watch.stopped";
}

/// Correlation ids shared by every event of one invocation.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub run_id: String,
    pub host_id: String,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>, host_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
            host_id: host_id.into(),
        }
    }

    /// Root span for one invocation; events inside inherit its ids.
    pub fn span(&self, command: &str) -> tracing::Span {
        tracing::info_span!(
            "probe",
            run_id = %self.run_id,
            host_id = %self.host_id,
            command = command
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_serialization() {
        assert_eq!(
            serde_json::to_string(&Stage::Credentials).unwrap(),
            "\"credentials\""
        );
        assert_eq!(Stage::Watch.to_string(), "watch");
    }

    #[test]
    fn test_level_from_tracing() {
        assert_eq!(Level::from(tracing::Level::INFO), Level::Info);
        assert_eq!(Level::from(tracing::Level::WARN), Level::Warn);
    }

    #[test]
    fn test_event_names_are_dotted() {
        for name in [
            event_names::PROBE_STARTED,
            event_names::DISCOVER_FINISHED,
            event_names::WATCH_TICK,
            event_names::CREDENTIALS_KEY_FOUND,
        ] {
            let (component, action) = name.split_once('.').unwrap();
            assert!(!component.is_empty() && !action.is_empty());
        }
    }
}
