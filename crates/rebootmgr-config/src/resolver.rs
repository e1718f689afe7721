//! Layered configuration resolution.
//!
//! Three search roots contribute layers, lowest priority first:
//!
//! | Root | Default | Meaning |
//! |---|---|---|
//! | vendor | `/usr/etc` | package defaults |
//! | runtime | `/run` | generated at boot |
//! | admin | `/etc` | administrator changes |
//!
//! Each root may hold `rebootmgr/rebootmgr.conf` and any number of drop-ins
//! in `rebootmgr/rebootmgr.conf.d/*.conf`. Main files apply first in root
//! order, then drop-ins sorted by file name across all roots. A drop-in in a
//! higher root shadows a drop-in with the same name in a lower one. Values
//! merge key by key, the last layer that defines a key winning.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::ConfigError;
use crate::calendar::{CalendarParser, MaintenanceWindow};
use crate::codec::{Codec, Decoded, RebootStrategy};
use crate::duration::decode_duration;
use crate::layer::LayerFile;

/// Group all recognised keys live in.
pub const GROUP: &str = "rebootmgr";
pub const KEY_STRATEGY: &str = "strategy";
pub const KEY_WINDOW_START: &str = "window-start";
pub const KEY_WINDOW_DURATION: &str = "window-duration";

const PROJECT: &str = "rebootmgr";
const MAIN_FILE: &str = "rebootmgr.conf";
const DROPIN_DIR: &str = "rebootmgr.conf.d";
const DROPIN_SUFFIX: &str = "conf";

/// Search roots for configuration layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigPaths {
    pub vendor_dir: PathBuf,
    pub runtime_dir: PathBuf,
    pub admin_dir: PathBuf,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self {
            vendor_dir: PathBuf::from("/usr/etc"),
            runtime_dir: PathBuf::from("/run"),
            admin_dir: PathBuf::from("/etc"),
        }
    }
}

impl ConfigPaths {
    /// Roots in priority order, lowest first.
    pub fn roots(&self) -> [&Path; 3] {
        [&self.vendor_dir, &self.runtime_dir, &self.admin_dir]
    }

    pub fn main_file(root: &Path) -> PathBuf {
        root.join(PROJECT).join(MAIN_FILE)
    }

    pub fn dropin_dir(root: &Path) -> PathBuf {
        root.join(PROJECT).join(DROPIN_DIR)
    }

    /// Directory the writer places override files in.
    pub fn override_dir(&self) -> PathBuf {
        Self::dropin_dir(&self.admin_dir)
    }

    /// Enumerate existing layer files, lowest priority first.
    pub async fn discover(&self) -> Result<Vec<PathBuf>, ConfigError> {
        let mut layers: Vec<PathBuf> = self
            .roots()
            .iter()
            .map(|root| Self::main_file(root))
            .collect();

        let mut dropins: BTreeMap<OsString, PathBuf> = BTreeMap::new();
        for root in self.roots() {
            for path in list_dropins(&Self::dropin_dir(root)).await? {
                if let Some(name) = path.file_name() {
                    dropins.insert(name.to_os_string(), path);
                }
            }
        }
        layers.extend(dropins.into_values());
        Ok(layers)
    }
}

async fn list_dropins(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let unreadable = |source| ConfigError::SourceUnreadable {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(dir = %dir.display(), "Drop-in directory absent");
            return Ok(Vec::new());
        }
        Err(e) => return Err(unreadable(e)),
    };

    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == DROPIN_SUFFIX) {
            found.push(path);
        }
    }
    Ok(found)
}

/// A raw value together with the layer that supplied it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setting {
    pub value: String,
    pub source: PathBuf,
}

/// Merged raw strings, one per recognised key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSettings {
    pub strategy: Option<Setting>,
    pub window_start: Option<Setting>,
    pub window_duration: Option<Setting>,
}

impl RawSettings {
    fn apply(&mut self, layer: &LayerFile) {
        let pick = |key: &str| {
            layer.get(GROUP, key).map(|value| Setting {
                value: value.to_string(),
                source: layer.path().to_path_buf(),
            })
        };
        if let Some(s) = pick(KEY_STRATEGY) {
            self.strategy = Some(s);
        }
        if let Some(s) = pick(KEY_WINDOW_START) {
            self.window_start = Some(s);
        }
        if let Some(s) = pick(KEY_WINDOW_DURATION) {
            self.window_duration = Some(s);
        }
    }

    /// An empty start means "no window"; a duration without a start is dropped.
    fn settle(&mut self) {
        if self
            .window_start
            .as_ref()
            .is_some_and(|s| s.value.trim().is_empty())
        {
            self.window_start = None;
        }
        if self.window_start.is_none()
            && let Some(orphan) = self.window_duration.take()
        {
            debug!(
                source = %orphan.source.display(),
                "Discarding window-duration without window-start"
            );
        }
    }

    /// Decode the merged strings into typed values.
    ///
    /// Decode problems are logged, never returned: an unrecognised strategy
    /// falls back to the default, an unparsable start drops the window, an
    /// unparsable duration falls back to the default length.
    pub fn interpret(&self, calendar: &dyn CalendarParser) -> ResolvedConfig {
        let strategy = RebootStrategy::decode(self.strategy.as_ref().map(|s| s.value.as_str()));
        match (&strategy, &self.strategy) {
            (Decoded::Invalid { raw, value }, Some(setting)) => warn!(
                source = %setting.source.display(),
                value = %raw,
                fallback = %value,
                "Cannot decode strategy"
            ),
            (Decoded::Absent(value), _) => debug!(fallback = %value, "No strategy configured"),
            _ => {}
        }

        let window = self.window_start.as_ref().and_then(|start| {
            let spec = match calendar.parse(&start.value) {
                Ok(spec) => spec,
                Err(e) => {
                    error!(source = %start.source.display(), error = %e, "Cannot parse window-start");
                    return None;
                }
            };
            let duration = decode_duration(self.window_duration.as_ref().map(|d| d.value.as_str()));
            if let (Decoded::Invalid { raw, .. }, Some(setting)) =
                (&duration, &self.window_duration)
            {
                error!(
                    source = %setting.source.display(),
                    value = %raw,
                    "Cannot parse window-duration, using default"
                );
            }
            Some(MaintenanceWindow {
                start: spec,
                duration: duration.value(),
            })
        });

        ResolvedConfig { strategy, window }
    }
}

/// Typed result of resolution; the seed for the daemon's control state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    /// Decoded strategy. The caller decides whether `Invalid` is fatal.
    pub strategy: Decoded<RebootStrategy>,
    pub window: Option<MaintenanceWindow>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            strategy: Decoded::Absent(RebootStrategy::DEFAULT),
            window: None,
        }
    }
}

/// Merges an ordered list of layer files.
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    layers: Vec<PathBuf>,
}

impl ConfigResolver {
    /// Use an explicit layer list, lowest priority first.
    pub fn from_layers(layers: Vec<PathBuf>) -> Self {
        Self { layers }
    }

    /// Discover layers under the given search roots.
    pub async fn discover(paths: &ConfigPaths) -> Result<Self, ConfigError> {
        Ok(Self::from_layers(paths.discover().await?))
    }

    pub fn layers(&self) -> &[PathBuf] {
        &self.layers
    }

    /// Read every layer and merge the recognised keys.
    ///
    /// Absent layers are skipped. Unreadable or malformed layers abort.
    pub async fn merge(&self) -> Result<RawSettings, ConfigError> {
        let mut merged = RawSettings::default();
        for path in &self.layers {
            let content = match tokio::fs::read_to_string(path).await {
                Ok(content) => content,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(path = %path.display(), "Configuration layer absent");
                    continue;
                }
                Err(source) => {
                    error!(path = %path.display(), error = %source, "Cannot read configuration layer");
                    return Err(ConfigError::SourceUnreadable {
                        path: path.clone(),
                        source,
                    });
                }
            };
            let layer = LayerFile::parse(path, &content).inspect_err(|e| {
                error!(error = %e, "Malformed configuration layer");
            })?;
            debug!(path = %path.display(), "Applying configuration layer");
            merged.apply(&layer);
        }
        merged.settle();
        Ok(merged)
    }

    /// Merge and decode in one step.
    pub async fn resolve(&self, calendar: &dyn CalendarParser) -> Result<ResolvedConfig, ConfigError> {
        Ok(self.merge().await?.interpret(calendar))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::SystemdCalendar;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Tree {
        _tmp: TempDir,
        paths: ConfigPaths,
    }

    impl Tree {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let paths = ConfigPaths {
                vendor_dir: tmp.path().join("usr/etc"),
                runtime_dir: tmp.path().join("run"),
                admin_dir: tmp.path().join("etc"),
            };
            Self { _tmp: tmp, paths }
        }

        fn main(&self, root: &Path, content: &str) {
            let path = ConfigPaths::main_file(root);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }

        fn dropin(&self, root: &Path, name: &str, content: &str) {
            let dir = ConfigPaths::dropin_dir(root);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join(name), content).unwrap();
        }

        async fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
            ConfigResolver::discover(&self.paths)
                .await?
                .resolve(&SystemdCalendar)
                .await
        }
    }

    #[tokio::test]
    async fn test_no_configuration_yields_defaults() {
        let tree = Tree::new();
        let resolved = tree.resolve().await.unwrap();
        assert_eq!(resolved, ResolvedConfig::default());
        assert_eq!(resolved.strategy.value(), RebootStrategy::BestEffort);
        assert!(resolved.window.is_none());
    }

    #[tokio::test]
    async fn test_later_layer_wins_per_key() {
        let tree = Tree::new();
        tree.main(
            &tree.paths.vendor_dir,
            "[rebootmgr]\nstrategy=off\nwindow-start=03:30\nwindow-duration=1h\n",
        );
        tree.main(&tree.paths.admin_dir, "[rebootmgr]\nstrategy=instantly\n");

        let resolved = tree.resolve().await.unwrap();
        assert_eq!(resolved.strategy, Decoded::Parsed(RebootStrategy::Instantly));
        let window = resolved.window.unwrap();
        assert_eq!(window.start.as_str(), "03:30");
        assert_eq!(window.duration, Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_dropins_apply_after_main_files_in_name_order() {
        let tree = Tree::new();
        tree.main(&tree.paths.admin_dir, "[rebootmgr]\nstrategy=off\n");
        tree.dropin(&tree.paths.vendor_dir, "10-vendor.conf", "[rebootmgr]\nstrategy=instantly\n");
        tree.dropin(&tree.paths.runtime_dir, "20-runtime.conf", "[rebootmgr]\nstrategy=maint-window\n");

        let resolved = tree.resolve().await.unwrap();
        assert_eq!(resolved.strategy.value(), RebootStrategy::MaintWindow);
    }

    #[tokio::test]
    async fn test_higher_root_shadows_same_named_dropin() {
        let tree = Tree::new();
        tree.dropin(&tree.paths.vendor_dir, "50-strategy.conf", "[rebootmgr]\nstrategy=off\n");
        tree.dropin(&tree.paths.admin_dir, "50-strategy.conf", "[rebootmgr]\nwindow-start=daily\n");

        let layers = tree.paths.discover().await.unwrap();
        let dropins: Vec<_> = layers.iter().filter(|p| p.ends_with("50-strategy.conf")).collect();
        assert_eq!(dropins.len(), 1);
        assert!(dropins[0].starts_with(&tree.paths.admin_dir));

        let resolved = tree.resolve().await.unwrap();
        assert!(resolved.strategy.is_absent());
        assert_eq!(resolved.window.unwrap().start.as_str(), "daily");
    }

    #[tokio::test]
    async fn test_non_conf_files_are_ignored() {
        let tree = Tree::new();
        tree.dropin(&tree.paths.admin_dir, "50-strategy.conf.rpmsave", "garbage without equals\n");
        assert!(tree.resolve().await.is_ok());
    }

    #[tokio::test]
    async fn test_duration_without_start_is_discarded() {
        let tree = Tree::new();
        tree.main(&tree.paths.vendor_dir, "[rebootmgr]\nwindow-duration=2h\n");

        let resolver = ConfigResolver::discover(&tree.paths).await.unwrap();
        let raw = resolver.merge().await.unwrap();
        assert!(raw.window_start.is_none());
        assert!(raw.window_duration.is_none());
        assert!(raw.interpret(&SystemdCalendar).window.is_none());
    }

    #[tokio::test]
    async fn test_empty_start_in_higher_layer_clears_window() {
        let tree = Tree::new();
        tree.main(
            &tree.paths.vendor_dir,
            "[rebootmgr]\nwindow-start=03:30\nwindow-duration=2h\n",
        );
        tree.dropin(&tree.paths.admin_dir, "50-maintenance-window.conf", "[rebootmgr]\nwindow-start=\n");

        let resolved = tree.resolve().await.unwrap();
        assert!(resolved.window.is_none());
    }

    #[test_log::test(tokio::test)]
    async fn test_invalid_strategy_is_flagged_not_fatal() {
        let tree = Tree::new();
        tree.main(&tree.paths.admin_dir, "[rebootmgr]\nstrategy=bogus\n");

        let resolved = tree.resolve().await.unwrap();
        assert!(resolved.strategy.is_invalid());
        assert_eq!(resolved.strategy.value(), RebootStrategy::BestEffort);
    }

    #[test_log::test(tokio::test)]
    async fn test_invalid_start_drops_window() {
        let tree = Tree::new();
        tree.main(
            &tree.paths.admin_dir,
            "[rebootmgr]\nwindow-start=whenever\nwindow-duration=1h\n",
        );
        let resolved = tree.resolve().await.unwrap();
        assert!(resolved.window.is_none());
    }

    #[test_log::test(tokio::test)]
    async fn test_invalid_duration_uses_default_length() {
        let tree = Tree::new();
        tree.main(
            &tree.paths.admin_dir,
            "[rebootmgr]\nwindow-start=03:30\nwindow-duration=forever\n",
        );
        let resolved = tree.resolve().await.unwrap();
        assert_eq!(
            resolved.window.unwrap().duration,
            crate::duration::DEFAULT_WINDOW_DURATION
        );
    }

    #[tokio::test]
    async fn test_malformed_layer_is_fatal() {
        let tree = Tree::new();
        tree.main(&tree.paths.vendor_dir, "[rebootmgr]\nstrategy=off\n");
        tree.dropin(&tree.paths.admin_dir, "90-broken.conf", "[rebootmgr]\nthis is not valid\n");

        let err = tree.resolve().await.unwrap_err();
        assert!(matches!(err, ConfigError::SourceMalformed { line: 2, .. }));
    }

    #[tokio::test]
    async fn test_unreadable_layer_is_fatal() {
        let tree = Tree::new();
        // A directory where a main file is expected cannot be read as text.
        std::fs::create_dir_all(ConfigPaths::main_file(&tree.paths.admin_dir)).unwrap();

        let err = tree.resolve().await.unwrap_err();
        assert!(matches!(err, ConfigError::SourceUnreadable { .. }));
    }

    #[tokio::test]
    async fn test_explicit_layer_list_with_missing_entries() {
        let tmp = TempDir::new().unwrap();
        let low = tmp.path().join("low.conf");
        let high = tmp.path().join("high.conf");
        std::fs::write(&low, "[rebootmgr]\nstrategy=off\n").unwrap();

        let resolver =
            ConfigResolver::from_layers(vec![low.clone(), tmp.path().join("gone.conf"), high.clone()]);
        let raw = resolver.merge().await.unwrap();
        assert_eq!(raw.strategy.unwrap().source, low);

        std::fs::write(&high, "[rebootmgr]\nstrategy=instantly\n").unwrap();
        let resolved = resolver.resolve(&SystemdCalendar).await.unwrap();
        assert_eq!(resolved.strategy.value(), RebootStrategy::Instantly);
    }
}
