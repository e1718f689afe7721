//! Process settings for the daemon itself.
//!
//! These are separate from the reboot policy layers: they say where the
//! control socket lives, where the layer search roots are, and how verbose to
//! log. Stored as TOML.
//!
//! ```toml
//! [daemon]
//! socket_path = "/run/rebootmgr/rebootmgrd.sock"
//!
//! [paths]
//! vendor_dir = "/usr/etc"
//! runtime_dir = "/run"
//! admin_dir = "/etc"
//!
//! [logging]
//! level = "info"
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ConfigError;
use crate::resolver::ConfigPaths;

/// Default location of the control socket.
pub const DEFAULT_SOCKET_PATH: &str = "/run/rebootmgr/rebootmgrd.sock";

/// Default location of the settings file.
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/rebootmgr/rebootmgrd.toml";

const VALID_LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Top-level daemon settings.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Layer search roots.
    #[serde(default)]
    pub paths: ConfigPaths,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Unix socket the control protocol is served on.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
        }
    }
}

fn default_socket_path() -> PathBuf {
    PathBuf::from(DEFAULT_SOCKET_PATH)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load settings from a TOML file.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Load settings, falling back to defaults if the file does not exist.
    pub async fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "Settings file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Parse settings from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.daemon.socket_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "daemon.socket_path must not be empty".to_string(),
            ));
        }
        for (name, root) in [
            ("vendor_dir", &self.paths.vendor_dir),
            ("runtime_dir", &self.paths.runtime_dir),
            ("admin_dir", &self.paths.admin_dir),
        ] {
            if !root.is_absolute() {
                return Err(ConfigError::Validation(format!(
                    "paths.{name} must be absolute, got {:?}",
                    root.display().to_string()
                )));
            }
        }
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                VALID_LOG_LEVELS, self.logging.level
            )));
        }
        Ok(())
    }
}
