#![deny(unsafe_code)]

//! Reboot policy model and configuration handling for rebootmgr.
//!
//! Provides the strategy/method/status enumerations and their codecs, the
//! layered resolver that turns vendor, runtime and administrator layers into
//! one effective configuration, and the writer that persists a single change
//! as a drop-in override. The daemon's own process settings live in
//! [`settings`].

/// Calendar expression seam and the maintenance window type.
pub mod calendar;
/// Strategy, method and status enumerations with string and wire codecs.
pub mod codec;
/// Compact duration strings.
pub mod duration;
/// Directory creation helpers.
pub mod fs;
/// Single layer file parsing and rendering.
pub mod layer;
/// Layer discovery and key-by-key merge.
pub mod resolver;
/// Daemon process settings (TOML).
pub mod settings;
/// Drop-in override persistence.
pub mod writer;

use std::path::PathBuf;

pub use calendar::{CalendarError, CalendarParser, CalendarSpec, MaintenanceWindow, SystemdCalendar};
pub use codec::{Codec, DecodeError, Decoded, RebootMethod, RebootStatus, RebootStrategy};
pub use duration::{DEFAULT_WINDOW_DURATION, decode_duration, format_duration, parse_duration};
pub use resolver::{ConfigPaths, ConfigResolver, RawSettings, ResolvedConfig, Setting};
pub use settings::AppConfig;
pub use writer::{ConfigChange, ConfigWriter};

/// Errors from configuration resolution, persistence and settings loading.
///
/// An absent layer is not an error and has no variant here.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("cannot read configuration layer {}: {source}", .path.display())]
    SourceUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{}:{line}: {reason}", .path.display())]
    SourceMalformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("cannot write {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{} exists but is not a directory", .0.display())]
    NotADirectory(PathBuf),
}
