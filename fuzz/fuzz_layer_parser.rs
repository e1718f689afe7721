//! Fuzz target for configuration layer files.
//!
//! Run with: cargo +nightly fuzz run fuzz_layer_parser
//!
//! Feeds arbitrary text to `LayerFile::parse` and, for accepted input, reads
//! back every recognised key.

#![no_main]

use libfuzzer_sys::fuzz_target;
use rebootmgr_config::layer::LayerFile;
use rebootmgr_config::resolver::{GROUP, KEY_STRATEGY, KEY_WINDOW_DURATION, KEY_WINDOW_START};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data)
        && let Ok(layer) = LayerFile::parse("fuzz.conf", s)
    {
        for key in [KEY_STRATEGY, KEY_WINDOW_START, KEY_WINDOW_DURATION] {
            let _ = layer.get(GROUP, key);
        }
    }
});
