//! Persisted descriptor records for installed modules.
//!
//! Descriptors are created at install time and mutated on status changes;
//! persisting them is what lets `list` and `enable` survive a host
//! restart, since live instances are never persisted. Records live in a
//! subdirectory of the configuration directory (the config store's scan
//! skips subdirectories) with the same locking and atomic-write discipline
//! as the store.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use kedge_plugin_sdk::PluginInfo;

use super::{PluginError, Result};

/// Concurrency-safe store of installed-module descriptors.
pub struct PluginCatalog {
    catalog_dir: PathBuf,
    records: RwLock<HashMap<String, PluginInfo>>,
}

impl PluginCatalog {
    /// Create a catalog over `catalog_dir`, creating the directory if
    /// needed.
    pub fn new(catalog_dir: impl Into<PathBuf>) -> Result<Self> {
        let catalog_dir = catalog_dir.into();
        fs::create_dir_all(&catalog_dir).map_err(|source| PluginError::ConfigIo {
            path: catalog_dir.clone(),
            source,
        })?;
        Ok(Self {
            catalog_dir,
            records: RwLock::new(HashMap::new()),
        })
    }

    /// Clear in-memory state and re-populate it from disk; unreadable
    /// records are logged and skipped.
    pub fn load_all(&self) -> Result<()> {
        let mut records = self.records.write();
        records.clear();

        let entries = fs::read_dir(&self.catalog_dir).map_err(|source| PluginError::ConfigIo {
            path: self.catalog_dir.clone(),
            source,
        })?;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            match read_record(&path) {
                Ok(info) => {
                    records.insert(info.id.clone(), info);
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable module descriptor");
                }
            }
        }

        Ok(())
    }

    /// Get one descriptor.
    pub fn get(&self, id: &str) -> Option<PluginInfo> {
        self.records.read().get(id).cloned()
    }

    /// All descriptors, ordered by module id.
    pub fn list(&self) -> Vec<PluginInfo> {
        let mut records: Vec<PluginInfo> = self.records.read().values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    /// Upsert a descriptor in memory and on disk.
    pub fn save(&self, info: &PluginInfo) -> Result<()> {
        let mut records = self.records.write();

        let path = self.record_path(&info.id);
        let data = serde_json::to_vec_pretty(info).map_err(|source| PluginError::ConfigParse {
            path: path.clone(),
            source,
        })?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &data).map_err(|source| PluginError::ConfigIo {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| PluginError::ConfigIo {
            path: path.clone(),
            source,
        })?;

        records.insert(info.id.clone(), info.clone());
        Ok(())
    }

    /// Delete a descriptor. Deleting an unknown id is a no-op success.
    pub fn delete(&self, id: &str) -> Result<()> {
        let mut records = self.records.write();

        let path = self.record_path(id);
        if let Err(source) = fs::remove_file(&path) {
            if source.kind() != io::ErrorKind::NotFound {
                return Err(PluginError::ConfigIo { path, source });
            }
        }

        records.remove(id);
        Ok(())
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.catalog_dir.join(format!("{id}.json"))
    }
}

fn read_record(path: &Path) -> Result<PluginInfo> {
    let data = fs::read(path).map_err(|source| PluginError::ConfigIo {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&data).map_err(|source| PluginError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}
