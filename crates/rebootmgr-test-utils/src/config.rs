//! Settings builders for tests.
//!
//! Use [`TestConfigBuilder`] to create [`AppConfig`] values that point at
//! temporary sockets and configuration trees.

use std::path::PathBuf;

use rebootmgr_config::{AppConfig, ConfigPaths};

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let tree = ConfigTree::new();
/// let config = TestConfigBuilder::new()
///     .paths(tree.paths().clone())
///     .socket_path(tree.path().join("rebootmgrd.sock"))
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.daemon.socket_path = path.into();
        self
    }

    pub fn paths(mut self, paths: ConfigPaths) -> Self {
        self.config.paths = paths;
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
