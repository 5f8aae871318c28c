//! Fuzz target for probe.json parsing and validation.

#![no_main]

use hp_config::{validate_probe_config, ProbeConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(config) = serde_json::from_slice::<ProbeConfig>(data) {
        let _ = validate_probe_config(&config);
    }
});
