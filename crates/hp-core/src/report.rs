//! One-shot probe sections and their rendering.
//!
//! [`Probe`] runs each section against an [`EvidenceSource`] and collects the
//! results in a [`ProbeReport`]. A section that cannot be produced is
//! recorded as failed; the other sections still run.

use crate::collect::{
    is_container, ContainerVerdict, EvidenceSource, IpVersion, LoginRecord, Neighbor,
    SourceError, TcpConnection, UdpSocket,
};
use crate::credentials::{CredentialScanner, PrivateKeyRecord};
use crate::discover::{evaluate, DetectionResult, DetectorDescriptor};
use crate::logging::{event_names, Stage};
use crate::watches::{parse_rules, WatchRule};
use chrono::{DateTime, Utc};
use hp_common::{StructuredError, SCHEMA_VERSION};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, info_span, warn};

/// Outcome of a section that can fail as a whole.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SectionResult<T> {
    Ok { items: Vec<T> },
    Failed { error: StructuredError },
}

impl<T> SectionResult<T> {
    pub fn items(&self) -> &[T] {
        match self {
            SectionResult::Ok { items } => items,
            SectionResult::Failed { .. } => &[],
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SectionResult::Failed { .. })
    }
}

/// Established connections, per protocol. Tables that could not be read
/// are listed in `errors`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NetworkSection {
    pub tcp: Vec<TcpConnection>,
    pub udp: Vec<UdpSocket>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<StructuredError>,
}

/// Everything one invocation produced. Sections that were not requested
/// are omitted.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub schema_version: String,
    pub run_id: String,
    pub command: String,
    pub generated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerVerdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_keys: Option<Vec<PrivateKeyRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub av: Option<Vec<DetectionResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watches: Option<SectionResult<WatchRule>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arp: Option<SectionResult<Neighbor>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<SectionResult<LoginRecord>>,
}

impl ProbeReport {
    pub fn new(run_id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            run_id: run_id.into(),
            command: command.into(),
            generated_at: Utc::now(),
            container: None,
            private_keys: None,
            av: None,
            network: None,
            watches: None,
            arp: None,
            users: None,
        }
    }

    /// Whether the report contains anything an operator should look at:
    /// a container verdict, a private key or a detected product.
    pub fn has_findings(&self) -> bool {
        self.container.as_ref().is_some_and(|v| v.in_container)
            || self.private_keys.as_ref().is_some_and(|k| !k.is_empty())
            || self.av.as_ref().is_some_and(|d| !d.is_empty())
    }
}

/// Section runner bound to one evidence source.
pub struct Probe<'a, S: EvidenceSource + ?Sized> {
    source: &'a S,
    detectors: Vec<DetectorDescriptor>,
}

impl<'a, S: EvidenceSource + ?Sized> Probe<'a, S> {
    pub fn new(source: &'a S, detectors: Vec<DetectorDescriptor>) -> Self {
        Self { source, detectors }
    }

    pub fn container(&self) -> ContainerVerdict {
        let _section = info_span!("section", stage = %Stage::Container).entered();
        let verdict = is_container(self.source);
        info!(
            event = event_names::CONTAINER_VERDICT,
            in_container = verdict.in_container,
            signal = ?verdict.signal,
            "container check finished"
        );
        verdict
    }

    pub fn private_keys(&self, roots: &[PathBuf], inter_file_delay: Duration) -> Vec<PrivateKeyRecord> {
        let _section = info_span!("section", stage = %Stage::Credentials).entered();
        CredentialScanner::new()
            .with_delay(inter_file_delay)
            .scan_roots(roots)
    }

    pub fn av(&self) -> Vec<DetectionResult> {
        let _section = info_span!("section", stage = %Stage::Discover).entered();
        evaluate(&self.detectors, self.source)
    }

    /// Established TCP connections and connected UDP sockets, IPv4 first.
    pub fn network(&self) -> NetworkSection {
        let _section = info_span!("section", stage = %Stage::Network).entered();
        let mut section = NetworkSection::default();
        for version in IpVersion::ALL {
            match self.source.list_tcp(version) {
                Ok(conns) => section
                    .tcp
                    .extend(conns.into_iter().filter(|c| c.state.is_established())),
                Err(e) => section.errors.push(source_failure(&e)),
            }
            match self.source.list_udp(version) {
                Ok(socks) => section
                    .udp
                    .extend(socks.into_iter().filter(|s| s.state.is_established())),
                Err(e) => section.errors.push(source_failure(&e)),
            }
        }
        section
    }

    /// Watch rules from `rules_path`. An unreadable ruleset becomes a failed
    /// section, never an abort.
    pub fn watches(&self, rules_path: &Path) -> SectionResult<WatchRule> {
        let _section = info_span!("section", stage = %Stage::Watches).entered();
        match parse_rules(rules_path) {
            Ok(items) => SectionResult::Ok { items },
            Err(e) => SectionResult::Failed {
                error: StructuredError::from(&hp_common::Error::from(&e)),
            },
        }
    }

    pub fn arp(&self) -> SectionResult<Neighbor> {
        let _section = info_span!("section", stage = %Stage::Network).entered();
        section_from(self.source.list_neighbors())
    }

    pub fn users(&self) -> SectionResult<LoginRecord> {
        let _section = info_span!("section", stage = %Stage::Users).entered();
        section_from(self.source.list_login_records())
    }
}

fn source_failure(err: &SourceError) -> StructuredError {
    warn!(
        event = event_names::SOURCE_FAILED,
        error = %err,
        "evidence source failed"
    );
    StructuredError::from(&hp_common::Error::from(err))
}

fn section_from<T>(snapshot: Result<Vec<T>, SourceError>) -> SectionResult<T> {
    match snapshot {
        Ok(items) => SectionResult::Ok { items },
        Err(e) => SectionResult::Failed {
            error: source_failure(&e),
        },
    }
}

/// Render the report as indented text, one heading per section.
pub fn render_human(report: &ProbeReport) -> String {
    let mut out = String::new();

    if let Some(verdict) = &report.container {
        let _ = write!(out, "isContainer: {}", verdict.in_container);
        if let Some(detail) = &verdict.detail {
            let _ = write!(out, " ({detail})");
        }
        out.push('\n');
    }

    if let Some(keys) = &report.private_keys {
        out.push_str("ssh keys:");
        for key in keys {
            let _ = write!(
                out,
                "\n\tfile={} encrypted={}",
                key.path.display(),
                key.encrypted
            );
        }
        out.push('\n');
    }

    if let Some(detections) = &report.av {
        out.push_str("AV:");
        for d in detections {
            let paths: Vec<String> = d.paths.iter().map(|p| p.display().to_string()).collect();
            let procs: Vec<String> = d
                .processes
                .iter()
                .map(|p| format!("{}({})", p.name, p.pid))
                .collect();
            let mods: Vec<&str> = d.kernel_modules.iter().map(|m| m.name.as_str()).collect();
            let _ = write!(
                out,
                "\n\tname={} files={:?} procs={:?} modules={:?}",
                d.name, paths, procs, mods
            );
        }
        out.push('\n');
    }

    if let Some(net) = &report.network {
        for (heading, version) in [("ipv4 connections:", IpVersion::V4), ("ipv6 connections:", IpVersion::V6)] {
            out.push_str(heading);
            let suffix = if version.is_v6() { "6" } else { "4" };
            for c in net.tcp.iter().filter(|c| c.ip_version == version) {
                let _ = write!(
                    out,
                    "\n\t tcp{suffix}: {} <> {}",
                    endpoint(c.local_addr, c.local_port),
                    endpoint(c.remote_addr, c.remote_port)
                );
            }
            for s in net.udp.iter().filter(|s| s.ip_version == version) {
                let _ = write!(
                    out,
                    "\n\t udp{suffix}: {} <> {}",
                    endpoint(s.local_addr, s.local_port),
                    endpoint(s.remote_addr, s.remote_port)
                );
            }
            out.push('\n');
        }
        for err in &net.errors {
            let _ = writeln!(out, "\terror: {}", err.message);
        }
    }

    if let Some(watches) = &report.watches {
        out.push_str("Watches:");
        match watches {
            SectionResult::Ok { items } => {
                for rule in items {
                    let _ = write!(out, "\n\tpath={} action={}", rule.path, rule.action);
                }
            }
            SectionResult::Failed { error } => {
                let _ = write!(out, "\n\tError checking watches: {}", error.message);
            }
        }
        out.push('\n');
    }

    if let Some(arp) = &report.arp {
        out.push_str("ARP table:");
        match arp {
            SectionResult::Ok { items } => {
                for n in items {
                    let _ = write!(out, "\n\tmac={} ip={} dev={}", n.mac, n.ip, n.device);
                }
            }
            SectionResult::Failed { error } => {
                let _ = write!(out, "\n\terror: {}", error.message);
            }
        }
        out.push('\n');
    }

    if let Some(users) = &report.users {
        out.push_str("Logged in:");
        match users {
            SectionResult::Ok { items } => {
                for w in items {
                    let _ = write!(
                        out,
                        "\n\tuser={} host={} line={} pid={} login_time={} ({})",
                        w.user,
                        w.host,
                        w.line,
                        w.pid,
                        w.login_time.timestamp(),
                        w.login_time.to_rfc3339()
                    );
                }
            }
            SectionResult::Failed { error } => {
                let _ = write!(out, "\n\terror: {}", error.message);
            }
        }
        out.push('\n');
    }

    out
}

fn endpoint(addr: std::net::IpAddr, port: u16) -> String {
    std::net::SocketAddr::new(addr, port).to_string()
}
