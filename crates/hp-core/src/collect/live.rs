//! Evidence source backed by the running host.

use super::{
    login, neighbors, network, process, EvidenceSource, IpVersion, KernelModule, LoginRecord,
    Neighbor, ProcessEntry, SourceError, TcpConnection, UdpSocket,
};
use hp_config::SourceSettings;
use std::fs;
use std::path::{Path, PathBuf};

/// Reads procfs and the utmp file directly.
#[derive(Debug, Clone)]
pub struct LiveSource {
    proc_root: PathBuf,
    utmp_path: PathBuf,
}

impl LiveSource {
    pub fn new(proc_root: impl Into<PathBuf>, utmp_path: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            utmp_path: utmp_path.into(),
        }
    }

    pub fn from_settings(settings: &SourceSettings) -> Self {
        Self::new(&settings.proc_root, &settings.utmp_path)
    }

    pub fn proc_root(&self) -> &Path {
        &self.proc_root
    }
}

impl Default for LiveSource {
    fn default() -> Self {
        Self::from_settings(&SourceSettings::default())
    }
}

impl EvidenceSource for LiveSource {
    fn list_processes(&self) -> Result<Vec<ProcessEntry>, SourceError> {
        process::read_process_table(&self.proc_root)
    }

    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn list_kernel_modules(&self) -> Result<Vec<KernelModule>, SourceError> {
        process::read_kernel_modules(&self.proc_root)
    }

    fn list_tcp(&self, version: IpVersion) -> Result<Vec<TcpConnection>, SourceError> {
        network::read_tcp(&self.proc_root, version)
    }

    fn list_udp(&self, version: IpVersion) -> Result<Vec<UdpSocket>, SourceError> {
        network::read_udp(&self.proc_root, version)
    }

    fn list_neighbors(&self) -> Result<Vec<Neighbor>, SourceError> {
        neighbors::read_neighbors(&self.proc_root)
    }

    fn list_login_records(&self) -> Result<Vec<LoginRecord>, SourceError> {
        login::read_login_records(&self.utmp_path)
    }

    fn init_cgroup(&self) -> Result<String, SourceError> {
        let path = self.proc_root.join("1").join("cgroup");
        fs::read_to_string(&path).map_err(|e| SourceError::io(&path, e))
    }
}
