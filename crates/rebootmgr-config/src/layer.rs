//! Parser and renderer for one configuration layer file.
//!
//! The format is group-scoped `key=value` text:
//!
//! ```text
//! # comment
//! [rebootmgr]
//! strategy=maint-window
//! window-start=Mon..Fri 03:30
//! window-duration=1h30m
//! ```
//!
//! Keys that appear before any group header belong to the unnamed group.
//! Within one file the last assignment of a key wins.

use std::path::{Path, PathBuf};

use crate::ConfigError;

/// Parsed contents of one layer file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerFile {
    path: PathBuf,
    entries: Vec<Entry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    group: String,
    key: String,
    value: String,
}

impl LayerFile {
    /// Parse layer text. `path` is only used for error reporting.
    pub fn parse(path: impl Into<PathBuf>, content: &str) -> Result<Self, ConfigError> {
        let path = path.into();
        let mut group = String::new();
        let mut entries = Vec::new();

        for (idx, raw_line) in content.lines().enumerate() {
            let line = raw_line.trim();
            let malformed = |reason: &str| ConfigError::SourceMalformed {
                path: path.clone(),
                line: idx + 1,
                reason: reason.to_string(),
            };

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                let name = header
                    .strip_suffix(']')
                    .ok_or_else(|| malformed("unterminated group header"))?
                    .trim();
                if name.is_empty() {
                    return Err(malformed("empty group name"));
                }
                group = name.to_string();
                continue;
            }

            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| malformed("expected key=value"))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(malformed("empty key"));
            }

            entries.push(Entry {
                group: group.clone(),
                key: key.to_string(),
                value: unquote(value.trim()).to_string(),
            });
        }

        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up a key within a group.
    pub fn get(&self, group: &str, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.group == group && e.key == key)
            .map(|e| e.value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Render a single-group layer file.
pub fn render(group: &str, entries: &[(&str, String)]) -> String {
    let mut out = String::from("# Written by rebootmgr. Local changes may be overwritten.\n");
    out.push('[');
    out.push_str(group);
    out.push_str("]\n");
    for (key, value) in entries {
        out.push_str(key);
        out.push('=');
        out.push_str(value);
        out.push('\n');
    }
    out
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}
