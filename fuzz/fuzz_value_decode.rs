//! Fuzz target for value decoding.
//!
//! Run with: cargo +nightly fuzz run fuzz_value_decode
//!
//! Decodes arbitrary strings as strategy, method, duration and calendar
//! expression. Accepted durations must survive a format/parse round trip.

#![no_main]

use libfuzzer_sys::fuzz_target;
use rebootmgr_config::{
    CalendarParser, Codec, RebootMethod, RebootStrategy, SystemdCalendar, format_duration,
    parse_duration,
};

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    let _ = RebootStrategy::decode(Some(s));
    let _ = RebootMethod::decode(Some(s));
    let _ = SystemdCalendar.parse(s);

    if let Ok(duration) = parse_duration(s) {
        let again = parse_duration(&format_duration(duration));
        assert_eq!(again.ok(), Some(duration));
    }
});
