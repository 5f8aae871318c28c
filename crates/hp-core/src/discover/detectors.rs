//! Built-in detectors.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Evidence that identifies one monitored product.
///
/// Candidate lists keep their construction order; matches are reported in
/// that order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorDescriptor {
    name: String,
    paths: Vec<PathBuf>,
    processes: Vec<String>,
    kernel_modules: Vec<String>,
}

impl DetectorDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            paths: Vec::new(),
            processes: Vec::new(),
            kernel_modules: Vec::new(),
        }
    }

    pub fn with_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.paths.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn with_processes<I, N>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        self.processes.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_kernel_modules<I, N>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        self.kernel_modules.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().map(PathBuf::as_path)
    }

    pub fn processes(&self) -> &[String] {
        &self.processes
    }

    pub fn kernel_modules(&self) -> &[String] {
        &self.kernel_modules
    }
}

/// Products the probe knows how to recognise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Detector {
    Ossec,
    Sophos,
    CrowdStrikeFalcon,
}

impl Detector {
    pub const ALL: [Detector; 3] = [
        Detector::Ossec,
        Detector::Sophos,
        Detector::CrowdStrikeFalcon,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Detector::Ossec => "OSSEC",
            Detector::Sophos => "Sophos",
            Detector::CrowdStrikeFalcon => "CrowdStrike Falcon",
        }
    }

    pub fn descriptor(self) -> DetectorDescriptor {
        let base = DetectorDescriptor::new(self.name());
        match self {
            Detector::Ossec => base
                .with_paths(["/var/ossec"])
                .with_processes(["ossec-agentd", "ossec-syscheckd"]),
            Detector::Sophos => base
                .with_paths([
                    "/etc/init.d/sav-protect",
                    "/etc/init.d/sav-rms",
                    "/lib/systemd/system/sav-protect.service",
                    "/lib/systemd/system/sav-rms.service",
                    "/opt/sophos-av",
                ])
                .with_processes(["savd", "savscand"]),
            Detector::CrowdStrikeFalcon => base
                .with_paths(["/opt/CrowdStrike"])
                .with_processes(["falcon-sensor"])
                .with_kernel_modules(["falcon_lsm_serviceable", "falcon_nf_netcontain"]),
        }
    }
}

/// Descriptors for every built-in detector, in declaration order.
pub fn default_registry() -> Vec<DetectorDescriptor> {
    Detector::ALL.iter().map(|d| d.descriptor()).collect()
}
