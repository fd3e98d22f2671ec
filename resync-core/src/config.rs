//! Run configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.resync/
//!   config.yaml   (optional; every field has a default)
//!   status.json   (incremental status, owned by resync-sync)
//! ```
//!
//! As with every home-rooted file in this workspace, `load_at(home)` takes an
//! explicit home and `load()` derives it from `dirs::home_dir()`. Tests must
//! only call the `_at` form.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{HashAlgorithm, DEFAULT_MAX_ENTRIES_PER_PAGE};

/// Configuration held by a client for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Compare content checksums in addition to timestamps.
    pub checksum: bool,
    /// Algorithm used when publishing lists with checksums.
    pub hash_algorithm: HashAlgorithm,
    pub max_entries_per_page: usize,
    pub allow_deletion: bool,
    /// Accept resources outside the source's authority (logged as warnings).
    pub noauth: bool,
    /// Transfer worker threads.
    pub workers: usize,
    /// Per-request timeout for remote fetches.
    pub timeout_secs: u64,
    pub resource_list_name: String,
    pub change_list_name: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            checksum: false,
            hash_algorithm: HashAlgorithm::default(),
            max_entries_per_page: DEFAULT_MAX_ENTRIES_PER_PAGE,
            allow_deletion: false,
            noauth: false,
            workers: 4,
            timeout_secs: 30,
            resource_list_name: "resourcelist.xml".to_string(),
            change_list_name: "changelist.xml".to_string(),
        }
    }
}

/// `<home>/.resync/`
pub fn state_dir_at(home: &Path) -> PathBuf {
    home.join(".resync")
}

/// `<home>/.resync/config.yaml`
pub fn config_path_at(home: &Path) -> PathBuf {
    state_dir_at(home).join("config.yaml")
}

/// Load configuration from `<home>/.resync/config.yaml`.
///
/// A missing file yields the defaults; a malformed one is a
/// [`ConfigError::Parse`] carrying the file path.
pub fn load_at(home: &Path) -> Result<SyncConfig, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(SyncConfig::default());
    }
    load_file(&path)
}

/// Load configuration from an explicit file.
pub fn load_file(path: &Path) -> Result<SyncConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(SyncConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<SyncConfig, ConfigError> {
    load_at(&home()?)
}

/// The user's home directory.
pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let home = TempDir::new().unwrap();
        let cfg = load_at(home.path()).unwrap();
        assert_eq!(cfg, SyncConfig::default());
        assert_eq!(cfg.resource_list_name, "resourcelist.xml");
        assert!(!cfg.checksum);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let home = TempDir::new().unwrap();
        let path = config_path_at(home.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "checksum: true\nhash_algorithm: md5\nworkers: 1\n").unwrap();

        let cfg = load_at(home.path()).unwrap();
        assert!(cfg.checksum);
        assert_eq!(cfg.hash_algorithm, HashAlgorithm::Md5);
        assert_eq!(cfg.workers, 1);
        assert_eq!(cfg.max_entries_per_page, DEFAULT_MAX_ENTRIES_PER_PAGE);
    }

    #[test]
    fn malformed_file_reports_path() {
        let home = TempDir::new().unwrap();
        let path = config_path_at(home.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "workers: [not, a, number]\n").unwrap();

        let err = load_at(home.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.yaml"));
    }
}
