//! Persistence of single logical changes as drop-in override files.
//!
//! Each kind of change owns one fixed file name in the override directory, so
//! repeated writes of the same kind replace each other instead of piling up.
//! Files are written under a temporary name and renamed into place.

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::ConfigError;
use crate::calendar::MaintenanceWindow;
use crate::codec::{Codec, RebootStrategy};
use crate::duration::format_duration;
use crate::fs::mkdir_p;
use crate::layer::render;
use crate::resolver::{ConfigPaths, GROUP, KEY_STRATEGY, KEY_WINDOW_DURATION, KEY_WINDOW_START};

/// Override file written for strategy changes.
pub const STRATEGY_DROPIN: &str = "50-strategy.conf";
/// Override file written for maintenance window changes.
pub const WINDOW_DROPIN: &str = "50-maintenance-window.conf";

/// Permission bits for directories created along the override path.
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// One logical configuration change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigChange {
    Strategy(RebootStrategy),
    /// `None` clears the window.
    MaintenanceWindow(Option<MaintenanceWindow>),
}

impl ConfigChange {
    /// File name this change is written to.
    pub fn file_name(&self) -> &'static str {
        match self {
            ConfigChange::Strategy(_) => STRATEGY_DROPIN,
            ConfigChange::MaintenanceWindow(_) => WINDOW_DROPIN,
        }
    }

    fn entries(&self) -> Result<Vec<(&'static str, String)>, ConfigError> {
        match self {
            ConfigChange::Strategy(RebootStrategy::Unknown) => Err(ConfigError::Validation(
                "refusing to persist an unknown strategy".to_string(),
            )),
            ConfigChange::Strategy(strategy) => {
                Ok(vec![(KEY_STRATEGY, strategy.as_str().to_string())])
            }
            ConfigChange::MaintenanceWindow(None) => Ok(vec![(KEY_WINDOW_START, String::new())]),
            ConfigChange::MaintenanceWindow(Some(window)) => Ok(vec![
                (KEY_WINDOW_START, window.start.to_string()),
                (KEY_WINDOW_DURATION, format_duration(window.duration)),
            ]),
        }
    }
}

/// Writes [`ConfigChange`]s into an override directory.
#[derive(Debug, Clone)]
pub struct ConfigWriter {
    dir: PathBuf,
    mode: u32,
}

impl ConfigWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            mode: DEFAULT_DIR_MODE,
        }
    }

    /// Writer targeting the administrator drop-in directory.
    pub fn for_paths(paths: &ConfigPaths) -> Self {
        Self::new(paths.override_dir())
    }

    /// Permission bits for any directories that need creating.
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist one change, returning the path written.
    ///
    /// Any failure is returned as-is; nothing is retried and a failed write
    /// leaves the previous file for that kind in place.
    pub async fn write(&self, change: &ConfigChange) -> Result<PathBuf, ConfigError> {
        let content = render(GROUP, &change.entries()?);

        mkdir_p(&self.dir, self.mode).await.inspect_err(|e| {
            error!(dir = %self.dir.display(), error = %e, "Cannot create override directory");
        })?;

        let target = self.dir.join(change.file_name());
        let staging = self.dir.join(format!(".{}.tmp", change.file_name()));
        let persist = |source| ConfigError::Persist {
            path: target.clone(),
            source,
        };

        if let Err(e) = tokio::fs::write(&staging, content.as_bytes()).await {
            tokio::fs::remove_file(&staging).await.ok();
            error!(path = %staging.display(), error = %e, "Cannot write override file");
            return Err(persist(e));
        }
        if let Err(e) = tokio::fs::rename(&staging, &target).await {
            tokio::fs::remove_file(&staging).await.ok();
            error!(path = %target.display(), error = %e, "Cannot move override file into place");
            return Err(persist(e));
        }

        info!(path = %target.display(), "Configuration override written");
        Ok(target)
    }
}
