//! The hydration manifest: component name → public bundle path.
//!
//! On disk it is a bare JSON object with one string property per component:
//!
//! ```json
//! { "AboutCounter": "/islands/AboutCounter.3f2a91c0.js" }
//! ```

use super::BundleError;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, String>,
}

impl Manifest {
    /// Read a manifest from disk.
    pub fn load(path: &Path) -> Result<Self, BundleError> {
        let content = fs::read_to_string(path).map_err(|source| BundleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| BundleError::Manifest {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read a manifest, treating a missing file as empty.
    pub fn load_or_default(path: &Path) -> Result<Self, BundleError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write the manifest through a temporary sibling file and a rename, so
    /// readers never observe a partial file.
    pub fn write_atomic(&self, path: &Path) -> Result<(), BundleError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| BundleError::Io { path, source }
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|source| BundleError::Manifest {
            path: path.to_path_buf(),
            source,
        })?;

        let tmp = tmp_path(path);
        fs::write(&tmp, json).map_err(io_err(&tmp))?;
        fs::rename(&tmp, path).map_err(|source| {
            let _ = fs::remove_file(&tmp);
            BundleError::Io {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Insert or replace the bundle path of a component, returning the old one.
    pub fn upsert(&mut self, name: impl Into<String>, path: impl Into<String>) -> Option<String> {
        self.entries.insert(name.into(), path.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries.remove(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
