//! Configuration layer trees in temporary directories.

use std::path::{Path, PathBuf};

use rebootmgr_config::ConfigPaths;
use rebootmgr_config::resolver::GROUP;
use tempfile::TempDir;

/// Which search root a layer file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Root {
    Vendor,
    Runtime,
    Admin,
}

/// A vendor/runtime/admin layout under one temporary directory.
///
/// The directory is removed when the tree is dropped.
pub struct ConfigTree {
    dir: TempDir,
    paths: ConfigPaths,
}

impl ConfigTree {
    /// An empty tree. No layer file exists yet.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let paths = ConfigPaths {
            vendor_dir: dir.path().join("usr/etc"),
            runtime_dir: dir.path().join("run"),
            admin_dir: dir.path().join("etc"),
        };
        Self { dir, paths }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn root(&self, root: Root) -> &Path {
        match root {
            Root::Vendor => &self.paths.vendor_dir,
            Root::Runtime => &self.paths.runtime_dir,
            Root::Admin => &self.paths.admin_dir,
        }
    }

    /// Write `<root>/rebootmgr/rebootmgr.conf` verbatim.
    pub fn write_main(&self, root: Root, content: &str) -> PathBuf {
        write_file(&ConfigPaths::main_file(self.root(root)), content)
    }

    /// Write a drop-in under `<root>/rebootmgr/rebootmgr.conf.d` verbatim.
    pub fn write_dropin(&self, root: Root, name: &str, content: &str) -> PathBuf {
        write_file(&ConfigPaths::dropin_dir(self.root(root)).join(name), content)
    }

    /// Write a main file holding the given pairs under the rebootmgr group.
    pub fn write_pairs(&self, root: Root, pairs: &[(&str, &str)]) -> PathBuf {
        let mut content = format!("[{GROUP}]\n");
        for (key, value) in pairs {
            content.push_str(&format!("{key}={value}\n"));
        }
        self.write_main(root, &content)
    }

    /// The administrator override directory written by `ConfigWriter`.
    pub fn override_dir(&self) -> PathBuf {
        self.paths.override_dir()
    }
}

impl Default for ConfigTree {
    fn default() -> Self {
        Self::new()
    }
}

fn write_file(path: &Path, content: &str) -> PathBuf {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("failed to create layer directory");
    }
    std::fs::write(path, content).expect("failed to write layer file");
    path.to_path_buf()
}
