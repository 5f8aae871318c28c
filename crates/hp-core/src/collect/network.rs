//! Socket tables from `/proc/net/{tcp,tcp6,udp,udp6}`.
//!
//! Addresses are hex encoded in host byte order; IPv6 addresses are four
//! 32-bit words, each stored little-endian.

use super::{IpVersion, SourceError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;

/// TCP connection information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpConnection {
    pub local_addr: IpAddr,
    pub local_port: u16,
    pub remote_addr: IpAddr,
    pub remote_port: u16,
    pub state: TcpState,
    /// Owning user id.
    pub uid: u32,
    pub inode: u64,
    pub ip_version: IpVersion,
}

/// UDP socket information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UdpSocket {
    pub local_addr: IpAddr,
    pub local_port: u16,
    pub remote_addr: IpAddr,
    pub remote_port: u16,
    /// The kernel reuses TCP state numbers: connected sockets are `ESTABLISHED`.
    pub state: TcpState,
    pub uid: u32,
    pub inode: u64,
    pub ip_version: IpVersion,
}

/// TCP connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TcpState {
    Established,
    SynSent,
    SynRecv,
    FinWait1,
    FinWait2,
    TimeWait,
    Close,
    CloseWait,
    LastAck,
    Listen,
    Closing,
    Unknown,
}

impl TcpState {
    /// Parse TCP state from /proc/net/tcp hex value.
    pub fn from_hex(hex: u8) -> Self {
        match hex {
            0x01 => TcpState::Established,
            0x02 => TcpState::SynSent,
            0x03 => TcpState::SynRecv,
            0x04 => TcpState::FinWait1,
            0x05 => TcpState::FinWait2,
            0x06 => TcpState::TimeWait,
            0x07 => TcpState::Close,
            0x08 => TcpState::CloseWait,
            0x09 => TcpState::LastAck,
            0x0A => TcpState::Listen,
            0x0B => TcpState::Closing,
            _ => TcpState::Unknown,
        }
    }

    pub fn is_established(&self) -> bool {
        matches!(self, TcpState::Established)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TcpState::Established => "ESTABLISHED",
            TcpState::SynSent => "SYN_SENT",
            TcpState::SynRecv => "SYN_RECV",
            TcpState::FinWait1 => "FIN_WAIT1",
            TcpState::FinWait2 => "FIN_WAIT2",
            TcpState::TimeWait => "TIME_WAIT",
            TcpState::Close => "CLOSE",
            TcpState::CloseWait => "CLOSE_WAIT",
            TcpState::LastAck => "LAST_ACK",
            TcpState::Listen => "LISTEN",
            TcpState::Closing => "CLOSING",
            TcpState::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for TcpState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn table_path(proc_root: &Path, proto: &str, version: IpVersion) -> std::path::PathBuf {
    let suffix = if version.is_v6() { "6" } else { "" };
    proc_root.join("net").join(format!("{proto}{suffix}"))
}

/// Read the TCP table for one address family.
pub fn read_tcp(proc_root: &Path, version: IpVersion) -> Result<Vec<TcpConnection>, SourceError> {
    let path = table_path(proc_root, "tcp", version);
    let content = fs::read_to_string(&path).map_err(|e| SourceError::io(&path, e))?;
    Ok(parse_proc_net_tcp_content(&content, version))
}

/// Read the UDP table for one address family.
pub fn read_udp(proc_root: &Path, version: IpVersion) -> Result<Vec<UdpSocket>, SourceError> {
    let path = table_path(proc_root, "udp", version);
    let content = fs::read_to_string(&path).map_err(|e| SourceError::io(&path, e))?;
    Ok(parse_proc_net_udp_content(&content, version))
}

struct SocketLine {
    local: (IpAddr, u16),
    remote: (IpAddr, u16),
    state: u8,
    uid: u32,
    inode: u64,
}

// Format: sl local_address rem_address st tx_queue:rx_queue tr:tm->when retrnsmt uid timeout inode
fn parse_socket_line(line: &str, version: IpVersion) -> Option<SocketLine> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 10 {
        return None;
    }

    Some(SocketLine {
        local: parse_addr_port(parts[1], version)?,
        remote: parse_addr_port(parts[2], version)?,
        state: u8::from_str_radix(parts[3], 16).ok()?,
        uid: parts[7].parse().unwrap_or(0),
        inode: parts[9].parse().unwrap_or(0),
    })
}

/// Parse TCP table content (for testing). Malformed lines are skipped.
pub fn parse_proc_net_tcp_content(content: &str, version: IpVersion) -> Vec<TcpConnection> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| parse_socket_line(line, version))
        .map(|s| TcpConnection {
            local_addr: s.local.0,
            local_port: s.local.1,
            remote_addr: s.remote.0,
            remote_port: s.remote.1,
            state: TcpState::from_hex(s.state),
            uid: s.uid,
            inode: s.inode,
            ip_version: version,
        })
        .collect()
}

/// Parse UDP table content (for testing). Malformed lines are skipped.
pub fn parse_proc_net_udp_content(content: &str, version: IpVersion) -> Vec<UdpSocket> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| parse_socket_line(line, version))
        .map(|s| UdpSocket {
            local_addr: s.local.0,
            local_port: s.local.1,
            remote_addr: s.remote.0,
            remote_port: s.remote.1,
            state: TcpState::from_hex(s.state),
            uid: s.uid,
            inode: s.inode,
            ip_version: version,
        })
        .collect()
}

/// Parse `ADDR:PORT` in /proc/net hex encoding.
fn parse_addr_port(addr_port: &str, version: IpVersion) -> Option<(IpAddr, u16)> {
    let (addr_hex, port_hex) = addr_port.split_once(':')?;
    let port = u16::from_str_radix(port_hex, 16).ok()?;
    let addr = match version {
        IpVersion::V4 => IpAddr::V4(parse_ipv4_addr(addr_hex)?),
        IpVersion::V6 => IpAddr::V6(parse_ipv6_addr(addr_hex)?),
    };
    Some((addr, port))
}

fn parse_ipv4_addr(hex: &str) -> Option<Ipv4Addr> {
    if hex.len() != 8 {
        return None;
    }
    let word = u32::from_str_radix(hex, 16).ok()?;
    Some(Ipv4Addr::from(word.swap_bytes()))
}

fn parse_ipv6_addr(hex: &str) -> Option<Ipv6Addr> {
    if hex.len() != 32 || !hex.is_ascii() {
        return None;
    }

    let mut segments = [0u16; 8];
    for i in 0..4 {
        let word = u32::from_str_radix(&hex[i * 8..(i + 1) * 8], 16).ok()?;
        let word = word.swap_bytes();
        segments[i * 2] = (word >> 16) as u16;
        segments[i * 2 + 1] = (word & 0xFFFF) as u16;
    }

    Some(Ipv6Addr::from(segments))
}
