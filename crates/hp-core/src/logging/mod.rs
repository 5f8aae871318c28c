//! Structured logging for the probe.
//!
//! Provides dual-mode logging on stderr:
//! - Human-readable console output for interactive use
//! - JSONL for agents and log shippers
//!
//! stdout is reserved for the probe report.
//!
//! ```ignore
//! use hp_core::logging::{init_logging, event_names, LogConfig, LogContext};
//!
//! init_logging(&LogConfig::from_env(None, None));
//! let ctx = LogContext::new(generate_run_id(), get_host_id());
//! let _run = ctx.span("all").entered();
//! tracing::info!(event = event_names::PROBE_STARTED, "probe started");
//! ```

pub mod config;
pub mod events;
pub mod layer;

pub use config::{LogConfig, LogFormat, LogLevel};
pub use events::{event_names, Level, LogContext, Stage};
pub use layer::JsonlLayer;

use std::io::IsTerminal;
use std::path::Path;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global subscriber. Later calls are no-ops.
///
/// `RUST_LOG` directives, when present, replace the level from `config`.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from(config.level).into())
        .from_env_lossy();

    let result = match config.format {
        LogFormat::Human => {
            let use_ansi = config.color && std::io::stderr().is_terminal();
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(use_ansi);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
        }
        LogFormat::Jsonl => tracing_subscriber::registry()
            .with(filter)
            .with(JsonlLayer::stderr())
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("logging already initialized");
    }
}

/// Generate a unique run ID for this invocation.
pub fn generate_run_id() -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("run-{}", &uuid[..12])
}

/// Host identifier for log correlation.
///
/// First 8 characters of the machine-id, else a random id.
pub fn get_host_id() -> String {
    host_id_from(Path::new("/etc/machine-id"))
        .unwrap_or_else(|| format!("host-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]))
}

fn host_id_from(machine_id_path: &Path) -> Option<String> {
    let raw = std::fs::read_to_string(machine_id_path).ok()?;
    let id = raw.trim();
    if id.len() >= 8 && id.is_ascii() {
        Some(format!("host-{}", &id[..8]))
    } else {
        None
    }
}
