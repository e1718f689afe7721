//! Calendar expressions and the maintenance window.
//!
//! Deciding whether "now" falls inside a window is the job of an external
//! calendar engine. This crate only needs to know whether an expression is
//! acceptable, so that nothing invalid is ever persisted or transmitted. The
//! [`CalendarParser`] trait is that seam; [`SystemdCalendar`] is a structural
//! validator for systemd-style expressions such as `Mon..Fri 03:30`,
//! `*-*-* 02:00:00` or `weekly`.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A validated calendar expression. Opaque to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalendarSpec(String);

impl CalendarSpec {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CalendarSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A calendar expression was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid calendar expression {expr:?}: {reason}")]
pub struct CalendarError {
    pub expr: String,
    pub reason: String,
}

/// Parses calendar expressions into [`CalendarSpec`] values.
pub trait CalendarParser: Send + Sync {
    fn parse(&self, expr: &str) -> Result<CalendarSpec, CalendarError>;
}

/// A recurring time range during which a maint-window reboot may execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceWindow {
    pub start: CalendarSpec,
    pub duration: Duration,
}

/// Structural validator for systemd calendar expressions.
///
/// Accepts the named shorthands and expressions of the form
/// `[WEEKDAYS] [[YYYY-]MM-DD] [HH:MM[:SS]]` where each numeric component may
/// be `*`, a value, a `a..b` range, a `/step` repetition, or a comma list of
/// those. Whitespace is normalised; case is preserved.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemdCalendar;

const SHORTHANDS: &[&str] = &[
    "minutely",
    "hourly",
    "daily",
    "weekly",
    "monthly",
    "yearly",
    "annually",
    "quarterly",
    "semiannually",
];

const WEEKDAYS: &[(&str, &str)] = &[
    ("mon", "monday"),
    ("tue", "tuesday"),
    ("wed", "wednesday"),
    ("thu", "thursday"),
    ("fri", "friday"),
    ("sat", "saturday"),
    ("sun", "sunday"),
];

impl CalendarParser for SystemdCalendar {
    fn parse(&self, expr: &str) -> Result<CalendarSpec, CalendarError> {
        let reject = |reason: &str| CalendarError {
            expr: expr.to_string(),
            reason: reason.to_string(),
        };

        let tokens: Vec<&str> = expr.split_whitespace().collect();
        match tokens.as_slice() {
            [] => return Err(reject("expression is empty")),
            [single] if SHORTHANDS.iter().any(|s| s.eq_ignore_ascii_case(single)) => {
                return Ok(CalendarSpec(single.to_ascii_lowercase()));
            }
            _ => {}
        }

        let mut rest = tokens.as_slice();
        if let Some(first) = rest.first()
            && first.starts_with(|c: char| c.is_ascii_alphabetic())
        {
            if !first.eq_ignore_ascii_case("utc") {
                check_weekdays(first).map_err(|r| reject(&r))?;
                rest = &rest[1..];
            }
        }
        if let Some(last) = rest.last()
            && last.eq_ignore_ascii_case("utc")
        {
            rest = &rest[..rest.len() - 1];
        }

        let mut seen_date = false;
        let mut seen_time = false;
        for token in rest {
            if token.contains(':') && !seen_time {
                check_time(token).map_err(|r| reject(&r))?;
                seen_time = true;
            } else if token.contains('-') && !seen_date && !seen_time {
                check_date(token).map_err(|r| reject(&r))?;
                seen_date = true;
            } else {
                return Err(reject(&format!("unexpected token {token:?}")));
            }
        }

        if rest.is_empty() && tokens.len() == 1 && tokens[0].eq_ignore_ascii_case("utc") {
            return Err(reject("no date, time or weekday given"));
        }

        Ok(CalendarSpec(tokens.join(" ")))
    }
}

fn weekday_index(name: &str) -> Option<usize> {
    WEEKDAYS.iter().position(|(short, long)| {
        short.eq_ignore_ascii_case(name) || long.eq_ignore_ascii_case(name)
    })
}

fn check_weekdays(token: &str) -> Result<(), String> {
    for item in token.split(',') {
        match item.split_once("..") {
            Some((lo, hi)) => {
                let lo = weekday_index(lo).ok_or_else(|| format!("unknown weekday {lo:?}"))?;
                let hi = weekday_index(hi).ok_or_else(|| format!("unknown weekday {hi:?}"))?;
                if lo > hi {
                    return Err(format!("weekday range {item:?} is reversed"));
                }
            }
            None => {
                weekday_index(item).ok_or_else(|| format!("unknown weekday {item:?}"))?;
            }
        }
    }
    Ok(())
}

fn check_date(token: &str) -> Result<(), String> {
    let parts: Vec<&str> = token.split('-').collect();
    let (year, month, day) = match parts.as_slice() {
        [month, day] => (None, *month, *day),
        [year, month, day] => (Some(*year), *month, *day),
        _ => return Err(format!("malformed date {token:?}")),
    };
    if let Some(year) = year {
        check_component(year, 1970, 2199, "year")?;
    }
    check_component(month, 1, 12, "month")?;
    check_component(day, 1, 31, "day")
}

fn check_time(token: &str) -> Result<(), String> {
    let parts: Vec<&str> = token.split(':').collect();
    match parts.as_slice() {
        [hour, minute] => {
            check_component(hour, 0, 23, "hour")?;
            check_component(minute, 0, 59, "minute")
        }
        [hour, minute, second] => {
            check_component(hour, 0, 23, "hour")?;
            check_component(minute, 0, 59, "minute")?;
            check_component(second, 0, 59, "second")
        }
        _ => Err(format!("malformed time {token:?}")),
    }
}

fn check_component(part: &str, min: u32, max: u32, what: &str) -> Result<(), String> {
    let number = |s: &str| -> Result<u32, String> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("invalid {what} {s:?}"));
        }
        let v: u32 = s.parse().map_err(|_| format!("invalid {what} {s:?}"))?;
        if v < min || v > max {
            return Err(format!("{what} {v} outside {min}..{max}"));
        }
        Ok(v)
    };

    for item in part.split(',') {
        let (base, step) = match item.split_once('/') {
            Some((base, step)) => (base, Some(step)),
            None => (item, None),
        };
        if let Some(step) = step {
            let step: u32 = step
                .parse()
                .map_err(|_| format!("invalid {what} repetition {step:?}"))?;
            if step == 0 {
                return Err(format!("{what} repetition must be non-zero"));
            }
        }
        if base == "*" {
            continue;
        }
        match base.split_once("..") {
            Some((lo, hi)) => {
                if number(lo)? > number(hi)? {
                    return Err(format!("{what} range {base:?} is reversed"));
                }
            }
            None => {
                number(base)?;
            }
        }
    }
    Ok(())
}
