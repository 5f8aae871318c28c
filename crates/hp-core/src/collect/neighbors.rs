//! ARP neighbour table from `/proc/net/arp` (IPv4 only).

use super::SourceError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;

/// ATF_COM: the entry has a resolved hardware address.
const ATF_COMPLETE: u32 = 0x2;

/// One ARP cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighbor {
    pub ip: Ipv4Addr,
    /// Hardware address, colon separated.
    pub mac: String,
    pub device: String,
    /// Whether the kernel has resolved the hardware address.
    pub complete: bool,
}

pub fn read_neighbors(proc_root: &Path) -> Result<Vec<Neighbor>, SourceError> {
    let path = proc_root.join("net").join("arp");
    let content = fs::read_to_string(&path).map_err(|e| SourceError::io(&path, e))?;
    Ok(parse_proc_net_arp_content(&content))
}

/// Parse ARP table content (for testing).
///
/// Columns: `IP address  HW type  Flags  HW address  Mask  Device`.
pub fn parse_proc_net_arp_content(content: &str) -> Vec<Neighbor> {
    let mut neighbors = Vec::new();

    for line in content.lines().skip(1) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 6 {
            continue;
        }
        let Ok(ip) = parts[0].parse::<Ipv4Addr>() else {
            continue;
        };
        let flags = u32::from_str_radix(parts[2].trim_start_matches("0x"), 16).unwrap_or(0);

        neighbors.push(Neighbor {
            ip,
            mac: parts[3].to_ascii_lowercase(),
            device: parts[5].to_string(),
            complete: flags & ATF_COMPLETE != 0,
        });
    }

    neighbors
}
