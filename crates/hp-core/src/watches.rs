//! Filesystem watch rules from an auditd ruleset.
//!
//! Only file watches are extracted: lines of the form
//! `-w <path> ... -p <permissions>`. Everything else in the ruleset
//! (syscall rules, control directives, comments) is ignored.

use crate::logging::event_names;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{info, warn};

/// A watched path and its permission filter (`r`, `w`, `x`, `a`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchRule {
    pub path: String,
    pub action: String,
}

#[derive(Debug, Error)]
pub enum WatchRuleError {
    #[error("cannot read watch ruleset {path}: {source}")]
    ConfigUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<&WatchRuleError> for hp_common::Error {
    fn from(err: &WatchRuleError) -> Self {
        match err {
            WatchRuleError::ConfigUnreadable { path, source } => {
                hp_common::Error::RulesetUnreadable {
                    path: path.clone(),
                    reason: source.to_string(),
                }
            }
        }
    }
}

fn rule_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"-w ([^[:space:]]+).* -p ([[:alpha:]]+)").expect("watch rule pattern is valid")
    })
}

/// Read and parse the ruleset at `path`.
pub fn parse_rules(path: &Path) -> Result<Vec<WatchRule>, WatchRuleError> {
    let content = std::fs::read_to_string(path).map_err(|source| {
        warn!(
            event = event_names::WATCHES_UNREADABLE,
            path = %path.display(),
            error = %source,
            "watch ruleset unreadable"
        );
        WatchRuleError::ConfigUnreadable {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let rules = parse_rules_str(&content);
    info!(
        event = event_names::WATCHES_PARSED,
        path = %path.display(),
        rules = rules.len(),
        "watch ruleset parsed"
    );
    Ok(rules)
}

/// Parse ruleset text (for testing). Output keeps file order.
pub fn parse_rules_str(content: &str) -> Vec<WatchRule> {
    content.lines().filter_map(parse_rule_line).collect()
}

/// Extract the watch rule from one line, if it has both markers.
pub fn parse_rule_line(line: &str) -> Option<WatchRule> {
    let caps = rule_regex().captures(line)?;
    Some(WatchRule {
        path: caps.get(1)?.as_str().to_string(),
        action: caps.get(2)?.as_str().to_string(),
    })
}
