//! Evidence source adapters.
//!
//! Every piece of OS state the probe looks at is fetched through the
//! [`EvidenceSource`] trait and returned as a structured snapshot:
//! - Process table and loaded kernel modules (`/proc`, `/proc/modules`)
//! - TCP/UDP sockets for both IP versions (`/proc/net/{tcp,udp}{,6}`)
//! - ARP neighbours (`/proc/net/arp`)
//! - Logged-in users (binary utmp)
//!
//! [`LiveSource`] reads the running host. [`TimedSource`] wraps any source and
//! bounds each snapshot fetch with a timeout.

pub mod container;
mod live;
pub mod login;
pub mod neighbors;
pub mod network;
pub mod process;
mod timed;

pub use container::{is_container, ContainerSignal, ContainerVerdict};
pub use live::LiveSource;
pub use login::{parse_utmp_bytes, LoginRecord};
pub use neighbors::Neighbor;
pub use network::{TcpConnection, TcpState, UdpSocket};
pub use process::{KernelModule, ProcessEntry};
pub use timed::{TimedSource, DEFAULT_SNAPSHOT_TIMEOUT};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Address family selector for socket snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    pub const ALL: [IpVersion; 2] = [IpVersion::V4, IpVersion::V6];

    pub fn is_v6(self) -> bool {
        matches!(self, IpVersion::V6)
    }
}

impl std::fmt::Display for IpVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IpVersion::V4 => write!(f, "ipv4"),
            IpVersion::V6 => write!(f, "ipv6"),
        }
    }
}

/// Failure of a single snapshot fetch.
///
/// Callers degrade to "no evidence" for the affected snapshot and keep going.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{source_name} snapshot timed out after {}ms", .timeout.as_millis())]
    Timeout {
        source_name: &'static str,
        timeout: Duration,
    },

    #[error("{source_name} unavailable: {reason}")]
    Unavailable {
        source_name: &'static str,
        reason: String,
    },
}

impl SourceError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        SourceError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl From<&SourceError> for hp_common::Error {
    fn from(err: &SourceError) -> Self {
        match err {
            SourceError::Io { path, source }
                if source.kind() == std::io::ErrorKind::PermissionDenied =>
            {
                hp_common::Error::PermissionDenied { path: path.clone() }
            }
            SourceError::Io { path, source } => hp_common::Error::SourceUnavailable {
                source_name: path.display().to_string(),
                reason: source.to_string(),
            },
            SourceError::Timeout {
                source_name,
                timeout,
            } => hp_common::Error::SourceTimeout {
                source_name: source_name.to_string(),
                millis: timeout.as_millis() as u64,
            },
            SourceError::Unavailable {
                source_name,
                reason,
            } => hp_common::Error::SourceUnavailable {
                source_name: source_name.to_string(),
                reason: reason.clone(),
            },
        }
    }
}

/// Provider of point-in-time OS snapshots.
///
/// Implementations must be shareable across threads so that [`TimedSource`]
/// can run a fetch on a helper thread.
pub trait EvidenceSource: Send + Sync {
    /// Every running process, in process-table order.
    fn list_processes(&self) -> Result<Vec<ProcessEntry>, SourceError>;

    /// Whether `path` exists (any file type).
    fn path_exists(&self, path: &Path) -> bool;

    /// Loaded kernel modules.
    fn list_kernel_modules(&self) -> Result<Vec<KernelModule>, SourceError>;

    fn list_tcp(&self, version: IpVersion) -> Result<Vec<TcpConnection>, SourceError>;

    fn list_udp(&self, version: IpVersion) -> Result<Vec<UdpSocket>, SourceError>;

    /// ARP neighbour table.
    fn list_neighbors(&self) -> Result<Vec<Neighbor>, SourceError>;

    /// Current login sessions.
    fn list_login_records(&self) -> Result<Vec<LoginRecord>, SourceError>;

    /// Raw cgroup membership of PID 1.
    fn init_cgroup(&self) -> Result<String, SourceError>;
}
