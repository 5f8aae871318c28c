//! Exit codes for the hp-core CLI.
//!
//! Exit codes communicate the outcome without requiring output parsing.
//!
//! Exit code ranges:
//! - 0-9: Operational outcomes
//! - 10-19: User/environment errors (recoverable by user action)
//! - 20-29: Internal errors

use hp_common::Error;

/// Exit codes for hp-core operations.
///
/// These codes are a stable contract for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    // ========================================================================
    // Operational Outcomes (0-9)
    // ========================================================================
    /// Probe ran and found nothing of interest
    Clean = 0,

    /// Probe ran and reported findings (keys, detectors, container)
    Findings = 1,

    /// Login watch stopped after the requested matches or duration
    WatchStopped = 2,

    // ========================================================================
    // User / Environment Errors (10-19)
    // ========================================================================
    /// Invalid arguments or probe configuration
    ArgsError = 10,

    /// A required input (ruleset, source) could not be read
    InputError = 11,

    /// Permission denied
    PermissionError = 12,

    // ========================================================================
    // Internal Errors (20-29)
    // ========================================================================
    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error
    IoError = 21,

    /// Evidence source timed out
    TimeoutError = 22,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Codes 0-9 are outcomes, not errors.
    pub fn is_operational(self) -> bool {
        (self as i32) < 10
    }

    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    pub fn is_error(self) -> bool {
        (self as i32) >= 10
    }

    /// Exit code for a probe that either found something or did not.
    pub fn from_findings(found: bool) -> Self {
        if found {
            ExitCode::Findings
        } else {
            ExitCode::Clean
        }
    }

    /// Get the error code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::Findings => "OK_FINDINGS",
            ExitCode::WatchStopped => "OK_WATCH_STOPPED",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::InputError => "ERR_INPUT",
            ExitCode::PermissionError => "ERR_PERMISSION",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
            ExitCode::TimeoutError => "ERR_TIMEOUT",
        }
    }
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        match err {
            Error::Config(_) | Error::InvalidConfig(_) => ExitCode::ArgsError,
            Error::RulesetUnreadable { .. } | Error::SourceUnavailable { .. } => {
                ExitCode::InputError
            }
            Error::PermissionDenied { .. } => ExitCode::PermissionError,
            Error::SourceTimeout { .. } => ExitCode::TimeoutError,
            Error::Io(_) | Error::Json(_) => ExitCode::IoError,
            Error::CallbackFailed(_) => ExitCode::InternalError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_ranges() {
        assert!(ExitCode::Clean.is_operational());
        assert!(ExitCode::WatchStopped.is_operational());
        assert!(ExitCode::ArgsError.is_user_error());
        assert!(ExitCode::IoError.is_error());
        assert!(!ExitCode::IoError.is_user_error());
    }

    #[test]
    fn test_from_findings() {
        assert_eq!(ExitCode::from_findings(false), ExitCode::Clean);
        assert_eq!(ExitCode::from_findings(true).as_i32(), 1);
    }

    #[test]
    fn test_error_mapping() {
        let err = Error::RulesetUnreadable {
            path: PathBuf::from("/etc/audit/audit.rules"),
            reason: "No such file or directory".to_string(),
        };
        assert_eq!(ExitCode::from(&err), ExitCode::InputError);
        assert_eq!(
            ExitCode::from(&Error::InvalidConfig("interval_ms must be > 0".into())),
            ExitCode::ArgsError
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(ExitCode::ArgsError.to_string(), "ERR_ARGS (10)");
    }
}
