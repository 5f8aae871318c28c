//! Heuristic container detection.
//!
//! The verdict is decided by the first signal that fires:
//! - A nearly empty process table (10 processes or fewer)
//! - The `/.dockerenv` marker file
//! - A PID 1 cgroup line mentioning `docker`
//! - A PID 1 cgroup line whose path is not the cgroup root
//!
//! Sources that cannot be read contribute no signal.

use super::EvidenceSource;
use crate::logging::event_names;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Process tables this small are treated as a container.
pub const FEW_PROCESSES_THRESHOLD: usize = 10;

pub const DOCKER_ENV_MARKER: &str = "/.dockerenv";

/// Which heuristic decided the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerSignal {
    FewProcesses,
    MarkerFile,
    DockerCgroup,
    NonRootCgroup,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerVerdict {
    pub in_container: bool,
    pub signal: ContainerSignal,
    /// Evidence behind the signal (process count, marker path, cgroup line).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ContainerVerdict {
    fn positive(signal: ContainerSignal, detail: String) -> Self {
        Self {
            in_container: true,
            signal,
            detail: Some(detail),
        }
    }

    fn negative() -> Self {
        Self {
            in_container: false,
            signal: ContainerSignal::None,
            detail: None,
        }
    }
}

/// Few processes, then `/.dockerenv`, then the PID 1 cgroup. A process table
/// that cannot be read ends the check with a negative verdict.
pub fn is_container<S: EvidenceSource + ?Sized>(source: &S) -> ContainerVerdict {
    match source.list_processes() {
        Ok(processes) if processes.len() <= FEW_PROCESSES_THRESHOLD => {
            return ContainerVerdict::positive(
                ContainerSignal::FewProcesses,
                format!("{} processes", processes.len()),
            );
        }
        Ok(_) => {}
        Err(e) => {
            debug!(
                event = event_names::SOURCE_FAILED,
                error = %e,
                "process table unavailable for container check"
            );
            return ContainerVerdict::negative();
        }
    }

    if source.path_exists(Path::new(DOCKER_ENV_MARKER)) {
        return ContainerVerdict::positive(
            ContainerSignal::MarkerFile,
            DOCKER_ENV_MARKER.to_string(),
        );
    }

    match source.init_cgroup() {
        Ok(content) => {
            if let Some((signal, line)) = classify_cgroup(&content) {
                return ContainerVerdict::positive(signal, line.to_string());
            }
        }
        Err(e) => debug!(
            event = event_names::SOURCE_FAILED,
            error = %e,
            "init cgroup unavailable for container check"
        ),
    }

    ContainerVerdict::negative()
}

/// Find the first `/proc/1/cgroup` line that points at a container.
pub fn classify_cgroup(content: &str) -> Option<(ContainerSignal, &str)> {
    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.contains("docker") {
            return Some((ContainerSignal::DockerCgroup, line));
        }
        if !is_root_cgroup_line(line) {
            return Some((ContainerSignal::NonRootCgroup, line));
        }
    }
    None
}

// `hierarchy-ID:controllers:path`; `/` and systemd's `/init.scope` are the host root.
fn is_root_cgroup_line(line: &str) -> bool {
    match line.rsplit_once(':') {
        Some((_, path)) => path == "/" || path == "/init.scope",
        None => true,
    }
}
