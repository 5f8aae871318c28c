//! Discoverer registry.
//!
//! A detector names the filesystem paths, process names and kernel modules
//! that betray one product. [`evaluate`] checks every detector against a
//! single snapshot of the host and reports only detectors with evidence.

mod detectors;

pub use detectors::{default_registry, Detector, DetectorDescriptor};

use crate::collect::{EvidenceSource, KernelModule, ProcessEntry, SourceError};
use crate::logging::event_names;
use hp_common::ProcessId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// A running process that matched a candidate name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessMatch {
    pub pid: ProcessId,
    pub name: String,
}

/// Evidence found for one detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub name: String,
    pub paths: Vec<PathBuf>,
    pub processes: Vec<ProcessMatch>,
    pub kernel_modules: Vec<KernelModule>,
}

impl DetectionResult {
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty() && self.processes.is_empty() && self.kernel_modules.is_empty()
    }
}

/// Evaluate `detectors` against `source`.
///
/// The process table and the kernel-module list are each fetched at most
/// once per call and shared by all detectors. A failed fetch counts as "no
/// matches" for that kind of evidence only. Results keep detector order and
/// detectors without evidence are dropped.
pub fn evaluate<S: EvidenceSource + ?Sized>(
    detectors: &[DetectorDescriptor],
    source: &S,
) -> Vec<DetectionResult> {
    let processes = if detectors.iter().any(|d| !d.processes().is_empty()) {
        snapshot_or_empty("processes", source.list_processes())
    } else {
        Vec::new()
    };
    let modules = if detectors.iter().any(|d| !d.kernel_modules().is_empty()) {
        snapshot_or_empty("kernel_modules", source.list_kernel_modules())
    } else {
        Vec::new()
    };

    let results: Vec<DetectionResult> = detectors
        .iter()
        .map(|detector| match_detector(detector, source, &processes, &modules))
        .filter(|result| !result.is_empty())
        .collect();

    for result in &results {
        debug!(
            event = event_names::DISCOVER_MATCH,
            detector = %result.name,
            paths = result.paths.len(),
            processes = result.processes.len(),
            kernel_modules = result.kernel_modules.len(),
            "detector matched"
        );
    }
    info!(
        event = event_names::DISCOVER_FINISHED,
        detectors = detectors.len(),
        detections = results.len(),
        "discovery finished"
    );

    results
}

fn snapshot_or_empty<T>(source_name: &str, snapshot: Result<Vec<T>, SourceError>) -> Vec<T> {
    snapshot.unwrap_or_else(|e| {
        warn!(
            event = event_names::SOURCE_FAILED,
            source = source_name,
            error = %e,
            "evidence source failed; treating as no matches"
        );
        Vec::new()
    })
}

fn match_detector<S: EvidenceSource + ?Sized>(
    detector: &DetectorDescriptor,
    source: &S,
    processes: &[ProcessEntry],
    modules: &[KernelModule],
) -> DetectionResult {
    let paths = detector
        .paths()
        .filter(|p| source.path_exists(p))
        .map(PathBuf::from)
        .collect();

    let candidates = detector.processes();
    let processes = processes
        .iter()
        .filter(|p| candidates.iter().any(|c| *c == p.name))
        .map(|p| ProcessMatch {
            pid: p.pid,
            name: p.name.clone(),
        })
        .collect();

    let kernel_modules = detector
        .kernel_modules()
        .iter()
        .filter_map(|name| modules.iter().find(|m| &m.name == name))
        .cloned()
        .collect();

    DetectionResult {
        name: detector.name().to_string(),
        paths,
        processes,
        kernel_modules,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeSource;

    #[test]
    fn test_no_evidence_no_results() {
        let source = FakeSource::new().with_process(1, "init");
        assert!(evaluate(&default_registry(), &source).is_empty());
    }

    #[test]
    fn test_path_only_match() {
        let source = FakeSource::new().with_path("/var/ossec");
        let results = evaluate(&default_registry(), &source);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "OSSEC");
        assert_eq!(results[0].paths, vec![PathBuf::from("/var/ossec")]);
        assert!(results[0].processes.is_empty());
    }

    #[test]
    fn test_every_instance_reported_in_table_order() {
        let source = FakeSource::new()
            .with_process(10, "savscand")
            .with_process(20, "bash")
            .with_process(30, "savd")
            .with_process(40, "savscand");
        let results = evaluate(&[Detector::Sophos.descriptor()], &source);
        let pids: Vec<u32> = results[0].processes.iter().map(|m| m.pid.0).collect();
        assert_eq!(pids, vec![10, 30, 40]);
    }

    #[test]
    fn test_process_names_match_exactly() {
        let source = FakeSource::new()
            .with_process(5, "savd-helper")
            .with_process(6, "SAVD");
        assert!(evaluate(&[Detector::Sophos.descriptor()], &source).is_empty());
    }

    #[test]
    fn test_snapshots_taken_once_per_call() {
        let source = FakeSource::new()
            .with_process(7, "ossec-agentd")
            .with_module("falcon_nf_netcontain");
        let results = evaluate(&default_registry(), &source);
        assert_eq!(results.len(), 2);
        assert_eq!(source.process_calls(), 1);
        assert_eq!(source.module_calls(), 1);
    }

    #[test]
    fn test_modules_not_fetched_without_candidates() {
        let source = FakeSource::new();
        evaluate(&[Detector::Ossec.descriptor()], &source);
        assert_eq!(source.module_calls(), 0);
    }

    #[test]
    fn test_failing_process_source_keeps_path_matches() {
        let source = FakeSource::new()
            .failing_processes()
            .with_path("/opt/sophos-av")
            .with_path("/var/ossec");
        let results = evaluate(&default_registry(), &source);
        let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["OSSEC", "Sophos"]);
        assert!(results.iter().all(|r| r.processes.is_empty()));
    }

    #[test]
    fn test_kernel_module_alone_surfaces_detector() {
        let source = FakeSource::new().with_module("falcon_lsm_serviceable");
        let results = evaluate(&default_registry(), &source);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "CrowdStrike Falcon");
        assert_eq!(results[0].kernel_modules[0].name, "falcon_lsm_serviceable");
    }

    #[test]
    fn test_repeated_evaluation_is_stable() {
        let source = FakeSource::new()
            .with_path("/etc/init.d/sav-rms")
            .with_process(3, "savd")
            .with_module("falcon_nf_netcontain");
        let registry = default_registry();
        assert_eq!(evaluate(&registry, &source), evaluate(&registry, &source));
    }
}
