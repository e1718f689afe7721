//! Compact string form for maintenance window durations.
//!
//! Output is always `HHhMMm`, with a trailing `SSs` only when the duration is
//! not a whole number of minutes. Input accepts:
//!
//! - a bare integer, read as seconds (`5400`)
//! - clock notation `H:MM` or `H:MM:SS` (`1:30`)
//! - a sequence of number/unit pairs (`1h30m`, `90 min`, `1d 2h`)

use std::time::Duration;

use crate::codec::{DecodeError, Decoded};

/// Window length assumed when a start is configured without a duration.
pub const DEFAULT_WINDOW_DURATION: Duration = Duration::from_secs(60 * 60);

/// Render a duration in the compact `HHhMMm` form.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, secs % 3600 / 60, secs % 60);
    if seconds == 0 {
        format!("{hours:02}h{minutes:02}m")
    } else {
        format!("{hours:02}h{minutes:02}m{seconds:02}s")
    }
}

/// Strictly parse a duration string.
pub fn parse_duration(raw: &str) -> Result<Duration, DecodeError> {
    let input = raw.trim();
    let invalid = || DecodeError::Duration(raw.to_string());

    if input.is_empty() {
        return Err(invalid());
    }

    let secs = if input.bytes().all(|b| b.is_ascii_digit()) {
        input.parse::<u64>().ok()
    } else if input.contains(':') {
        parse_clock(input)
    } else {
        parse_units(input)
    };

    secs.map(Duration::from_secs).ok_or_else(invalid)
}

/// Leniently decode an optional duration, falling back to
/// [`DEFAULT_WINDOW_DURATION`].
pub fn decode_duration(raw: Option<&str>) -> Decoded<Duration> {
    match raw {
        None => Decoded::Absent(DEFAULT_WINDOW_DURATION),
        Some(s) => match parse_duration(s) {
            Ok(d) => Decoded::Parsed(d),
            Err(_) => Decoded::Invalid {
                value: DEFAULT_WINDOW_DURATION,
                raw: s.to_string(),
            },
        },
    }
}

fn parse_clock(input: &str) -> Option<u64> {
    let parts: Vec<&str> = input.split(':').collect();
    if !(2..=3).contains(&parts.len()) {
        return None;
    }
    let mut fields = Vec::with_capacity(parts.len());
    for part in &parts {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        fields.push(part.parse::<u64>().ok()?);
    }
    if fields[1..].iter().any(|&v| v >= 60) {
        return None;
    }
    let seconds = fields.get(2).copied().unwrap_or(0);
    fields[0]
        .checked_mul(3600)?
        .checked_add(fields[1] * 60)?
        .checked_add(seconds)
}

fn parse_units(input: &str) -> Option<u64> {
    let mut total: u64 = 0;
    let mut rest = input;

    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits == 0 {
            return None;
        }
        let value: u64 = rest[..digits].parse().ok()?;
        rest = rest[digits..].trim_start();

        let unit_len = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        let factor = unit_factor(&rest[..unit_len])?;
        total = total.checked_add(value.checked_mul(factor)?)?;
        rest = rest[unit_len..].trim_start();
    }

    Some(total)
}

fn unit_factor(unit: &str) -> Option<u64> {
    let unit = unit.to_ascii_lowercase();
    match unit.as_str() {
        "d" | "day" | "days" => Some(86_400),
        "h" | "hr" | "hour" | "hours" => Some(3600),
        "m" | "min" | "mins" | "minute" | "minutes" => Some(60),
        "s" | "sec" | "secs" | "second" | "seconds" => Some(1),
        _ => None,
    }
}
