//! Login sessions from the binary utmp file.
//!
//! Records use the glibc layout for 64-bit Linux (384 bytes, native endian):
//!
//! ```text
//! offset size field
//!      0    2 ut_type (+2 padding)
//!      4    4 ut_pid
//!      8   32 ut_line
//!     40    4 ut_id
//!     44   32 ut_user
//!     76  256 ut_host
//!    332    4 ut_exit
//!    336    4 ut_session
//!    340    8 ut_tv (tv_sec, tv_usec as i32)
//!    348   16 ut_addr_v6
//!    364   20 reserved
//! ```

use super::SourceError;
use chrono::{DateTime, TimeZone, Utc};
use hp_common::ProcessId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;

pub const UTMP_RECORD_SIZE: usize = 384;

/// `ut_type` of a normal user session.
pub const USER_PROCESS: i16 = 7;

/// One logged-in session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRecord {
    pub user: String,
    /// Terminal line (tty/pty name).
    pub line: String,
    /// Originating host, empty for local logins.
    pub host: String,
    pub pid: ProcessId,
    pub login_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addr: Option<IpAddr>,
}

pub fn read_login_records(utmp_path: &Path) -> Result<Vec<LoginRecord>, SourceError> {
    let bytes = fs::read(utmp_path).map_err(|e| SourceError::io(utmp_path, e))?;
    Ok(parse_utmp_bytes(&bytes))
}

/// Decode every `USER_PROCESS` record in a utmp image.
///
/// A trailing partial record (file being rewritten) is ignored.
pub fn parse_utmp_bytes(bytes: &[u8]) -> Vec<LoginRecord> {
    bytes
        .chunks_exact(UTMP_RECORD_SIZE)
        .filter_map(parse_utmp_record)
        .collect()
}

fn parse_utmp_record(rec: &[u8]) -> Option<LoginRecord> {
    if read_i16(rec, 0) != USER_PROCESS {
        return None;
    }

    let pid = read_i32(rec, 4);
    // Whole seconds only; tv_usec is ignored.
    let tv_sec = read_i32(rec, 340);
    let login_time = Utc.timestamp_opt(i64::from(tv_sec), 0).single()?;

    Some(LoginRecord {
        user: c_string(&rec[44..76]),
        line: c_string(&rec[8..40]),
        host: c_string(&rec[76..332]),
        pid: ProcessId(u32::try_from(pid).unwrap_or(0)),
        login_time,
        addr: decode_addr(&rec[348..364]),
    })
}

fn read_i16(rec: &[u8], offset: usize) -> i16 {
    i16::from_ne_bytes([rec[offset], rec[offset + 1]])
}

fn read_i32(rec: &[u8], offset: usize) -> i32 {
    i32::from_ne_bytes([rec[offset], rec[offset + 1], rec[offset + 2], rec[offset + 3]])
}

fn c_string(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// `ut_addr_v6` holds an IPv4 address in its first word when the rest is zero.
fn decode_addr(raw: &[u8]) -> Option<IpAddr> {
    if raw.iter().all(|&b| b == 0) {
        return None;
    }
    if raw[4..].iter().all(|&b| b == 0) {
        return Some(IpAddr::V4(Ipv4Addr::new(raw[0], raw[1], raw[2], raw[3])));
    }
    let mut octets = [0u8; 16];
    octets.copy_from_slice(raw);
    Some(IpAddr::V6(Ipv6Addr::from(octets)))
}

/// Encode a raw utmp record with the given fields; all others are zero.
///
/// Text fields longer than their slot are truncated.
pub fn encode_utmp_record(
    ut_type: i16,
    user: &str,
    line: &str,
    host: &str,
    pid: i32,
    tv_sec: i32,
) -> Vec<u8> {
    let mut rec = vec![0u8; UTMP_RECORD_SIZE];
    rec[0..2].copy_from_slice(&ut_type.to_ne_bytes());
    rec[4..8].copy_from_slice(&pid.to_ne_bytes());
    put_c_string(&mut rec[8..40], line);
    put_c_string(&mut rec[44..76], user);
    put_c_string(&mut rec[76..332], host);
    rec[340..344].copy_from_slice(&tv_sec.to_ne_bytes());
    rec
}

fn put_c_string(slot: &mut [u8], value: &str) {
    let n = value.len().min(slot.len());
    slot[..n].copy_from_slice(&value.as_bytes()[..n]);
}
