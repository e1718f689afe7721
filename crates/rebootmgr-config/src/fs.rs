//! Directory creation for the override tree.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::ConfigError;

/// Create `path` and every missing parent with the given permission bits.
///
/// Existing directories along the way are left untouched. An existing
/// non-directory at any segment fails with [`ConfigError::NotADirectory`].
pub async fn mkdir_p(path: &Path, mode: u32) -> Result<(), ConfigError> {
    let mut current = PathBuf::new();
    for component in path.components() {
        current.push(component);
        if matches!(component, Component::Prefix(_) | Component::RootDir | Component::CurDir) {
            continue;
        }
        try_mkdir(&current, mode).await?;
    }
    Ok(())
}

async fn try_mkdir(path: &Path, mode: u32) -> Result<(), ConfigError> {
    let mut builder = tokio::fs::DirBuilder::new();
    #[cfg(unix)]
    builder.mode(mode);
    #[cfg(not(unix))]
    let _ = mode;

    match builder.create(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let meta = tokio::fs::metadata(path)
                .await
                .map_err(|source| ConfigError::Persist {
                    path: path.to_path_buf(),
                    source,
                })?;
            if meta.is_dir() {
                Ok(())
            } else {
                Err(ConfigError::NotADirectory(path.to_path_buf()))
            }
        }
        Err(source) => Err(ConfigError::Persist {
            path: path.to_path_buf(),
            source,
        }),
    }
}
