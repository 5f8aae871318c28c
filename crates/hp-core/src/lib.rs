//! Host Probe Core Library
//!
//! This library provides the host introspection probes:
//! - Evidence sources over procfs and utmp, with bounded fetches
//! - Discoverer registry for security products
//! - Private-key scan
//! - auditd watch-rule parsing
//! - Login watch
//! - Structured logging and exit codes
//!
//! The binary entry point is in `main.rs`.

pub mod collect;
pub mod credentials;
pub mod discover;
pub mod exit_codes;
pub mod logging;
pub mod login_watch;
pub mod report;
pub mod watches;

#[cfg(test)]
pub mod test_utils;
