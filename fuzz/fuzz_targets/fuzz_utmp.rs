//! Fuzz target for binary utmp parsing.
//!
//! Arbitrary bytes, including a trailing partial record, must never panic.

#![no_main]

use hp_core::collect::parse_utmp_bytes;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = parse_utmp_bytes(data);
});
