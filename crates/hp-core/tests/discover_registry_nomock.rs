//! Discoverer registry against an on-disk fake host.

mod support;

use hp_core::collect::{TimedSource, DEFAULT_SNAPSHOT_TIMEOUT};
use hp_core::discover::{default_registry, evaluate, DetectorDescriptor};
use support::fake_host::FakeHost;

fn agent_detector(host: &FakeHost) -> DetectorDescriptor {
    DetectorDescriptor::new("Agent")
        .with_paths([host.root().join("opt/agent"), host.root().join("etc/agent.conf")])
        .with_processes(["agentd", "agent-updater"])
        .with_kernel_modules(["agent_lsm"])
}

#[test]
fn reports_every_kind_of_evidence() {
    let host = FakeHost::new()
        .with_file("opt/agent/bin/agentd")
        .with_process(1, "init")
        .with_process(812, "agentd")
        .with_process(901, "agent-updater")
        .with_module("agent_lsm");

    let results = evaluate(&[agent_detector(&host)], &host.source());
    assert_eq!(results.len(), 1);

    let found = &results[0];
    assert_eq!(found.name, "Agent");
    assert_eq!(found.paths, vec![host.root().join("opt/agent")]);
    let pids: Vec<u32> = found.processes.iter().map(|p| p.pid.0).collect();
    assert_eq!(pids, vec![812, 901]);
    assert_eq!(found.kernel_modules[0].name, "agent_lsm");
    assert_eq!(found.kernel_modules[0].size, 16384);
}

#[test]
fn detector_without_evidence_is_omitted() {
    let host = FakeHost::new().with_process(1, "init");
    let registry = vec![
        agent_detector(&host),
        DetectorDescriptor::new("Other").with_processes(["init"]),
    ];

    let results = evaluate(&registry, &host.source());
    let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Other"]);
}

#[test]
fn missing_module_table_keeps_process_matches() {
    let host = FakeHost::new().with_process(77, "agentd");
    std::fs::remove_file(host.proc_root().join("modules")).unwrap();

    let results = evaluate(&[agent_detector(&host)], &host.source());
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].processes.len(), 1);
    assert!(results[0].kernel_modules.is_empty());
}

#[test]
fn built_in_registry_finds_sophos_process() {
    let host = FakeHost::new()
        .with_process(1, "systemd")
        .with_process(1200, "savd");
    let source = TimedSource::new(host.source(), DEFAULT_SNAPSHOT_TIMEOUT);

    let results = evaluate(&default_registry(), &source);
    let sophos = results.iter().find(|r| r.name == "Sophos").unwrap();
    assert_eq!(sophos.processes[0].name, "savd");
}
