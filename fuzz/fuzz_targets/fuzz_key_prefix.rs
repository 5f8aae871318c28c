//! Fuzz target for the private-key header classifier.

#![no_main]

use hp_core::credentials::classify_key_prefix;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = classify_key_prefix(data);
});
