//! Fuzz target for auditd ruleset parsing.

#![no_main]

use hp_core::watches::parse_rules_str;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        let _ = parse_rules_str(content);
    }
});
