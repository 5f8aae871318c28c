//! Test utilities for hp-core.
//!
//! [`FakeSource`] is a scriptable [`EvidenceSource`] for unit tests: every
//! snapshot can be filled, made to fail, or delayed.

use crate::collect::{
    EvidenceSource, IpVersion, KernelModule, LoginRecord, Neighbor, ProcessEntry, SourceError,
    TcpConnection, UdpSocket,
};
use chrono::{DateTime, TimeZone, Utc};
use hp_common::ProcessId;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

fn unavailable(source_name: &'static str) -> SourceError {
    SourceError::Unavailable {
        source_name,
        reason: "scripted failure".to_string(),
    }
}

/// In-memory evidence source.
#[derive(Default)]
pub struct FakeSource {
    processes: Option<Vec<ProcessEntry>>,
    paths: HashSet<PathBuf>,
    modules: Option<Vec<KernelModule>>,
    tcp: Vec<TcpConnection>,
    neighbors: Vec<Neighbor>,
    cgroup: Option<String>,
    logins: Mutex<VecDeque<Option<Vec<LoginRecord>>>>,
    delay: Duration,
    process_calls: AtomicUsize,
    module_calls: AtomicUsize,
    login_calls: AtomicUsize,
    fetches_started: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            processes: Some(Vec::new()),
            modules: Some(Vec::new()),
            cgroup: Some("0::/\n".to_string()),
            ..Self::default()
        }
    }

    pub fn with_process(mut self, pid: u32, name: &str) -> Self {
        self.processes
            .get_or_insert_with(Vec::new)
            .push(ProcessEntry::new(pid, name));
        self
    }

    /// Fill the table with `count` anonymous processes.
    pub fn with_process_count(mut self, count: u32) -> Self {
        let table = self.processes.get_or_insert_with(Vec::new);
        for pid in 1..=count {
            table.push(ProcessEntry::new(10_000 + pid, format!("worker{pid}")));
        }
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.insert(path.into());
        self
    }

    pub fn with_module(mut self, name: &str) -> Self {
        self.modules.get_or_insert_with(Vec::new).push(KernelModule {
            name: name.to_string(),
            size: 4096,
            address: 0,
        });
        self
    }

    pub fn with_tcp(mut self, conn: TcpConnection) -> Self {
        self.tcp.push(conn);
        self
    }

    pub fn with_neighbor(mut self, neighbor: Neighbor) -> Self {
        self.neighbors.push(neighbor);
        self
    }

    pub fn with_cgroup(mut self, content: &str) -> Self {
        self.cgroup = Some(content.to_string());
        self
    }

    pub fn failing_processes(mut self) -> Self {
        self.processes = None;
        self
    }

    pub fn failing_modules(mut self) -> Self {
        self.modules = None;
        self
    }

    pub fn failing_cgroup(mut self) -> Self {
        self.cgroup = None;
        self
    }

    /// Queue one login snapshot. The last queued snapshot repeats forever.
    pub fn push_logins(self, records: Vec<LoginRecord>) -> Self {
        self.queue_logins(Some(records));
        self
    }

    /// Queue one failing login fetch.
    pub fn push_login_failure(self) -> Self {
        self.queue_logins(None);
        self
    }

    fn queue_logins(&self, entry: Option<Vec<LoginRecord>>) {
        self.logins
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(entry);
    }

    /// Make every snapshot fetch sleep first.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn process_calls(&self) -> usize {
        self.process_calls.load(Ordering::SeqCst)
    }

    pub fn module_calls(&self) -> usize {
        self.module_calls.load(Ordering::SeqCst)
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    /// Snapshot fetches entered, counted before any scripted delay.
    pub fn fetches_started(&self) -> usize {
        self.fetches_started.load(Ordering::SeqCst)
    }

    fn pause(&self) {
        self.fetches_started.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
    }
}

impl EvidenceSource for FakeSource {
    fn list_processes(&self) -> Result<Vec<ProcessEntry>, SourceError> {
        self.pause();
        self.process_calls.fetch_add(1, Ordering::SeqCst);
        self.processes.clone().ok_or_else(|| unavailable("processes"))
    }

    fn path_exists(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    fn list_kernel_modules(&self) -> Result<Vec<KernelModule>, SourceError> {
        self.pause();
        self.module_calls.fetch_add(1, Ordering::SeqCst);
        self.modules.clone().ok_or_else(|| unavailable("kernel_modules"))
    }

    fn list_tcp(&self, version: IpVersion) -> Result<Vec<TcpConnection>, SourceError> {
        self.pause();
        Ok(self
            .tcp
            .iter()
            .filter(|c| c.ip_version == version)
            .cloned()
            .collect())
    }

    fn list_udp(&self, _version: IpVersion) -> Result<Vec<UdpSocket>, SourceError> {
        self.pause();
        Ok(Vec::new())
    }

    fn list_neighbors(&self) -> Result<Vec<Neighbor>, SourceError> {
        self.pause();
        Ok(self.neighbors.clone())
    }

    fn list_login_records(&self) -> Result<Vec<LoginRecord>, SourceError> {
        self.pause();
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        let mut queue = self.logins.lock().unwrap_or_else(|e| e.into_inner());
        let next = if queue.len() > 1 {
            queue.pop_front().flatten()
        } else {
            queue.front().cloned().unwrap_or(Some(Vec::new()))
        };
        next.ok_or_else(|| unavailable("login_records"))
    }

    fn init_cgroup(&self) -> Result<String, SourceError> {
        self.pause();
        self.cgroup.clone().ok_or_else(|| unavailable("init_cgroup"))
    }
}

/// Timestamp `secs` seconds after 2023-11-14T22:13:20Z.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0)
        .single()
        .unwrap_or_default()
}

pub fn login(user: &str, secs: i64) -> LoginRecord {
    LoginRecord {
        user: user.to_string(),
        line: "pts/0".to_string(),
        host: String::new(),
        pid: ProcessId(1000),
        login_time: at(secs),
        addr: None,
    }
}
