//! Reboot strategy, method and status enumerations with their string and wire forms.
//!
//! Every enumeration has a canonical spelling (used when writing configuration
//! and rendering output) plus legacy aliases accepted on input. Parsing is
//! case-insensitive. On the control protocol the enumerations travel as small
//! integers; see the `TryFrom<i64>` impls.
//!
//! Two decoding entry points exist:
//!
//! - [`FromStr`] is strict and fails on anything unrecognised. Use it to
//!   validate operator input before it goes anywhere.
//! - [`Codec::decode`] is lenient and always yields a usable value, tagged with
//!   a [`Decoded`] variant so the caller can tell "not configured" apart from
//!   "configured with garbage".

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Errors from strict decoding of enumeration and duration values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown reboot strategy {0:?}")]
    Strategy(String),

    #[error("unknown reboot method {0:?}")]
    Method(String),

    #[error("unknown reboot status {0:?}")]
    Status(String),

    #[error("invalid duration {0:?}")]
    Duration(String),

    #[error("{kind} value {value} is out of range")]
    OutOfRange { kind: &'static str, value: i64 },
}

/// Result of a lenient decode.
///
/// Each variant carries the value the caller should use. `Absent` and
/// `Invalid` both carry the codec default, but they are reported at different
/// severities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded<T> {
    /// The input named a known value.
    Parsed(T),
    /// No input was given; the default applies.
    Absent(T),
    /// Input was given but not recognised; the default applies.
    Invalid { value: T, raw: String },
}

impl<T: Copy> Decoded<T> {
    /// The value to use, whichever way it was obtained.
    pub fn value(&self) -> T {
        match self {
            Decoded::Parsed(v) | Decoded::Absent(v) => *v,
            Decoded::Invalid { value, .. } => *value,
        }
    }
}

impl<T> Decoded<T> {
    pub fn is_parsed(&self) -> bool {
        matches!(self, Decoded::Parsed(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Decoded::Absent(_))
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Decoded::Invalid { .. })
    }
}

/// Lenient string decoding on top of a strict [`FromStr`] implementation.
pub trait Codec: Copy + FromStr<Err = DecodeError> {
    /// Value substituted when input is absent or unrecognised.
    const DEFAULT: Self;

    /// Canonical string form.
    fn as_str(&self) -> &'static str;

    /// Decode an optional raw value, never failing.
    ///
    /// An empty string counts as invalid, not absent.
    fn decode(raw: Option<&str>) -> Decoded<Self> {
        match raw {
            None => Decoded::Absent(Self::DEFAULT),
            Some(s) => match s.parse() {
                Ok(v) => Decoded::Parsed(v),
                Err(_) => Decoded::Invalid {
                    value: Self::DEFAULT,
                    raw: s.to_string(),
                },
            },
        }
    }
}

fn matches_any(input: &str, spellings: &[&str]) -> bool {
    let input = input.trim();
    spellings.iter().any(|s| s.eq_ignore_ascii_case(input))
}

// ── RebootStrategy ──────────────────────────────────────────────────────

/// Policy deciding whether and when a requested reboot may execute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum RebootStrategy {
    /// Reboot as soon as possible once requested.
    #[default]
    BestEffort,
    /// Reboot immediately when requested.
    Instantly,
    /// Reboot only inside the configured maintenance window.
    MaintWindow,
    /// Never reboot automatically.
    Off,
    /// Not set or not decodable. Never written to configuration.
    Unknown,
}

impl RebootStrategy {
    /// All strategies that may be configured.
    pub const VALID: [RebootStrategy; 4] = [
        RebootStrategy::BestEffort,
        RebootStrategy::Instantly,
        RebootStrategy::MaintWindow,
        RebootStrategy::Off,
    ];
}

impl Codec for RebootStrategy {
    const DEFAULT: Self = RebootStrategy::BestEffort;

    fn as_str(&self) -> &'static str {
        match self {
            RebootStrategy::BestEffort => "best-effort",
            RebootStrategy::Instantly => "instantly",
            RebootStrategy::MaintWindow => "maint-window",
            RebootStrategy::Off => "off",
            RebootStrategy::Unknown => "unknown",
        }
    }
}

impl FromStr for RebootStrategy {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if matches_any(s, &["best-effort", "best_effort"]) {
            Ok(RebootStrategy::BestEffort)
        } else if matches_any(s, &["instantly", "instant"]) {
            Ok(RebootStrategy::Instantly)
        } else if matches_any(s, &["maint-window", "maint_window"]) {
            Ok(RebootStrategy::MaintWindow)
        } else if matches_any(s, &["off", "disabled"]) {
            Ok(RebootStrategy::Off)
        } else {
            Err(DecodeError::Strategy(s.to_string()))
        }
    }
}

impl fmt::Display for RebootStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RebootStrategy> for i64 {
    fn from(value: RebootStrategy) -> Self {
        match value {
            RebootStrategy::BestEffort => 0,
            RebootStrategy::Instantly => 1,
            RebootStrategy::MaintWindow => 2,
            RebootStrategy::Off => 3,
            RebootStrategy::Unknown => -1,
        }
    }
}

impl TryFrom<i64> for RebootStrategy {
    type Error = DecodeError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RebootStrategy::BestEffort),
            1 => Ok(RebootStrategy::Instantly),
            2 => Ok(RebootStrategy::MaintWindow),
            3 => Ok(RebootStrategy::Off),
            _ => Err(DecodeError::OutOfRange {
                kind: "reboot strategy",
                value,
            }),
        }
    }
}

// ── RebootMethod ────────────────────────────────────────────────────────

/// Which reboot primitive the executor should use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum RebootMethod {
    /// Full system reboot.
    #[default]
    Hard,
    /// Userspace-only soft reboot.
    Soft,
    Unknown,
}

impl Codec for RebootMethod {
    const DEFAULT: Self = RebootMethod::Hard;

    fn as_str(&self) -> &'static str {
        match self {
            RebootMethod::Hard => "reboot",
            RebootMethod::Soft => "soft-reboot",
            RebootMethod::Unknown => "unknown",
        }
    }
}

impl FromStr for RebootMethod {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if matches_any(s, &["reboot", "hard", "hard-reboot", "hard_reboot"]) {
            Ok(RebootMethod::Hard)
        } else if matches_any(s, &["soft-reboot", "soft_reboot", "soft"]) {
            Ok(RebootMethod::Soft)
        } else {
            Err(DecodeError::Method(s.to_string()))
        }
    }
}

impl fmt::Display for RebootMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RebootMethod> for i64 {
    fn from(value: RebootMethod) -> Self {
        match value {
            RebootMethod::Hard => 0,
            RebootMethod::Soft => 1,
            RebootMethod::Unknown => -1,
        }
    }
}

impl TryFrom<i64> for RebootMethod {
    type Error = DecodeError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RebootMethod::Hard),
            1 => Ok(RebootMethod::Soft),
            _ => Err(DecodeError::OutOfRange {
                kind: "reboot method",
                value,
            }),
        }
    }
}

// ── RebootStatus ────────────────────────────────────────────────────────

/// The daemon's current disposition. Runtime only, never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum RebootStatus {
    #[default]
    NotRequested,
    Requested,
    WaitingWindow,
}

impl RebootStatus {
    /// Numeric code, also used as the `status --quiet` exit code.
    pub fn code(self) -> u8 {
        match self {
            RebootStatus::NotRequested => 0,
            RebootStatus::Requested => 1,
            RebootStatus::WaitingWindow => 2,
        }
    }

    /// Human-readable description. The wording depends on the pending method.
    pub fn describe(self, method: RebootMethod) -> &'static str {
        let soft = method == RebootMethod::Soft;
        match self {
            RebootStatus::NotRequested => "Reboot not requested",
            RebootStatus::Requested if soft => "Soft-reboot requested",
            RebootStatus::Requested => "Reboot requested",
            RebootStatus::WaitingWindow if soft => {
                "Soft-reboot requested, waiting for maintenance window"
            }
            RebootStatus::WaitingWindow => "Reboot requested, waiting for maintenance window",
        }
    }

    pub fn is_pending(self) -> bool {
        self != RebootStatus::NotRequested
    }
}

impl Codec for RebootStatus {
    const DEFAULT: Self = RebootStatus::NotRequested;

    fn as_str(&self) -> &'static str {
        match self {
            RebootStatus::NotRequested => "not-requested",
            RebootStatus::Requested => "requested",
            RebootStatus::WaitingWindow => "waiting-window",
        }
    }
}

impl FromStr for RebootStatus {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if matches_any(s, &["not-requested", "not_requested"]) {
            Ok(RebootStatus::NotRequested)
        } else if matches_any(s, &["requested", "reboot-requested", "reboot_requested"]) {
            Ok(RebootStatus::Requested)
        } else if matches_any(s, &["waiting-window", "waiting_window"]) {
            Ok(RebootStatus::WaitingWindow)
        } else {
            Err(DecodeError::Status(s.to_string()))
        }
    }
}

impl fmt::Display for RebootStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RebootStatus> for i64 {
    fn from(value: RebootStatus) -> Self {
        i64::from(value.code())
    }
}

impl TryFrom<i64> for RebootStatus {
    type Error = DecodeError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RebootStatus::NotRequested),
            1 => Ok(RebootStatus::Requested),
            2 => Ok(RebootStatus::WaitingWindow),
            _ => Err(DecodeError::OutOfRange {
                kind: "reboot status",
                value,
            }),
        }
    }
}
