//! Process table and kernel module snapshots from procfs.

use super::SourceError;
use hp_common::ProcessId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One row of the process table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessEntry {
    pub pid: ProcessId,
    /// Executable name as the kernel reports it (`comm`, at most 15 bytes).
    pub name: String,
}

impl ProcessEntry {
    pub fn new(pid: u32, name: impl Into<String>) -> Self {
        Self {
            pid: ProcessId(pid),
            name: name.into(),
        }
    }
}

/// A loaded kernel module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelModule {
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Load address; reads as zero for unprivileged callers.
    pub address: u64,
}

/// Read the process table under `proc_root`, ordered by pid.
///
/// Processes that exit while the table is being read are skipped.
pub fn read_process_table(proc_root: &Path) -> Result<Vec<ProcessEntry>, SourceError> {
    let dir = fs::read_dir(proc_root).map_err(|e| SourceError::io(proc_root, e))?;

    let mut entries = Vec::new();
    for entry in dir.flatten() {
        let file_name = entry.file_name();
        let Some(pid) = file_name.to_str().and_then(|s| s.parse::<u32>().ok()) else {
            continue;
        };
        let name = match fs::read_to_string(entry.path().join("stat")) {
            Ok(stat) => match parse_stat_comm(&stat) {
                Some(name) => name.to_string(),
                None => continue,
            },
            Err(_) => continue,
        };
        entries.push(ProcessEntry::new(pid, name));
    }

    entries.sort_by_key(|e| e.pid);
    Ok(entries)
}

/// Extract the command name from `/proc/[pid]/stat` content.
///
/// The name sits between the first `(` and the last `)` and may itself
/// contain spaces or parentheses.
pub fn parse_stat_comm(stat: &str) -> Option<&str> {
    let open = stat.find('(')?;
    let close = stat.rfind(')')?;
    if close <= open {
        return None;
    }
    Some(&stat[open + 1..close])
}

/// Read `/proc/modules` under `proc_root`.
pub fn read_kernel_modules(proc_root: &Path) -> Result<Vec<KernelModule>, SourceError> {
    let path = proc_root.join("modules");
    let content = fs::read_to_string(&path).map_err(|e| SourceError::io(&path, e))?;
    Ok(parse_proc_modules_content(&content))
}

/// Parse `/proc/modules` content (for testing).
///
/// Line format: `name size refcount deps state address`.
pub fn parse_proc_modules_content(content: &str) -> Vec<KernelModule> {
    let mut modules = Vec::new();

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 {
            continue;
        }
        let Ok(size) = parts[1].parse::<u64>() else {
            continue;
        };
        let address = parts
            .get(5)
            .and_then(|a| u64::from_str_radix(a.trim_start_matches("0x"), 16).ok())
            .unwrap_or(0);

        modules.push(KernelModule {
            name: parts[0].to_string(),
            size,
            address,
        });
    }

    modules
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_stat_comm() {
        assert_eq!(
            parse_stat_comm("1234 (savscand) S 1 1234 1234 0 -1"),
            Some("savscand")
        );
        assert_eq!(
            parse_stat_comm("77 (tmux: server) S 1 77 77 0 -1"),
            Some("tmux: server")
        );
        assert_eq!(parse_stat_comm("99 (a)b) R 1"), Some("a)b"));
        assert_eq!(parse_stat_comm("garbage"), None);
    }

    #[test]
    fn test_parse_proc_modules_content() {
        let content = "\
falcon_lsm_serviceable 458752 1 - Live 0xffffffffc0a00000 (OE)
nf_tables 270336 0 - Live 0x0000000000000000
short_line
bogus notanumber 0 - Live 0x0
";
        let modules = parse_proc_modules_content(content);
        assert_eq!(modules.len(), 2);
        assert_eq!(modules[0].name, "falcon_lsm_serviceable");
        assert_eq!(modules[0].size, 458752);
        assert_eq!(modules[0].address, 0xffffffffc0a00000);
        assert_eq!(modules[1].name, "nf_tables");
        assert_eq!(modules[1].address, 0);
    }

    #[test]
    fn test_read_process_table_from_fake_procfs() {
        let dir = TempDir::new().unwrap();
        for (pid, name) in [(42, "ossec-agentd"), (7, "init"), (100, "sshd")] {
            let pdir = dir.path().join(pid.to_string());
            fs::create_dir(&pdir).unwrap();
            fs::write(pdir.join("stat"), format!("{pid} ({name}) S 1 1 1 0")).unwrap();
        }
        fs::create_dir(dir.path().join("self")).unwrap();
        fs::create_dir(dir.path().join("555")).unwrap(); // exited: no stat

        let table = read_process_table(dir.path()).unwrap();
        let pids: Vec<u32> = table.iter().map(|e| e.pid.0).collect();
        assert_eq!(pids, vec![7, 42, 100]);
        assert_eq!(table[1].name, "ossec-agentd");
    }

    #[test]
    fn test_read_process_table_missing_root() {
        let dir = TempDir::new().unwrap();
        let err = read_process_table(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
    }
}
