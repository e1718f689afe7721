//! Fuzz target for the daemon settings parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_settings_parser

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = rebootmgr_config::AppConfig::parse(s);
    }
});
