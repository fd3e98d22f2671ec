//! Incremental status store.
//!
//! Persists, per mapping (source URI root and destination path root), the
//! datetime from which the next incremental run starts:
//! `<home>/.resync/status.json`. Two destinations fed from one source keep
//! separate start points. Writes use the atomic `.tmp` + rename pattern.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use resync_core::Mapping;

use crate::error::{io_err, SyncError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStatus {
    /// Start point for the next incremental run.
    pub from: DateTime<Utc>,
    /// When this entry was written.
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusStore {
    #[serde(default)]
    pub sources: BTreeMap<String, SourceStatus>,
}

impl StatusStore {
    pub fn from_for(&self, mapping: &Mapping) -> Option<DateTime<Utc>> {
        self.sources.get(&key(mapping)).map(|s| s.from)
    }

    pub fn record(&mut self, mapping: &Mapping, from: DateTime<Utc>) {
        self.sources.insert(
            key(mapping),
            SourceStatus {
                from,
                recorded_at: Utc::now(),
            },
        );
    }
}

/// `<uri_root> -> <path_root>`
fn key(mapping: &Mapping) -> String {
    mapping.to_string()
}

/// `<home>/.resync/status.json`
pub fn store_path_at(home: &Path) -> PathBuf {
    resync_core::config::state_dir_at(home).join("status.json")
}

/// Load the store; a missing file is an empty store.
pub fn load_at(home: &Path) -> Result<StatusStore, SyncError> {
    let path = store_path_at(home);
    if !path.exists() {
        return Ok(StatusStore::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    Ok(serde_json::from_str(&contents)?)
}

/// Save the store atomically.
pub fn save_at(home: &Path, store: &StatusStore) -> Result<(), SyncError> {
    let path = store_path_at(home);
    let Some(dir) = path.parent() else {
        return Err(io_err(
            path,
            std::io::Error::other("invalid status store path"),
        ));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let json = serde_json::to_string_pretty(store)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}

/// Load, record one mapping, save.
pub fn record_at(home: &Path, mapping: &Mapping, from: DateTime<Utc>) -> Result<(), SyncError> {
    let mut store = load_at(home)?;
    store.record(mapping, from);
    save_at(home, &store)
}
