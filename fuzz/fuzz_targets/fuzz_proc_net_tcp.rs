//! Fuzz target for /proc/net/{tcp,udp} parsing.

#![no_main]

use hp_core::collect::network::{parse_proc_net_tcp_content, parse_proc_net_udp_content};
use hp_core::collect::IpVersion;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let content = String::from_utf8_lossy(data);
    for version in IpVersion::ALL {
        let _ = parse_proc_net_tcp_content(&content, version);
        let _ = parse_proc_net_udp_content(&content, version);
    }
});
