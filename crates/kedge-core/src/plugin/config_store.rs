//! Durable per-module configuration records.
//!
//! One JSON record per module id, file name derived from the id, all under
//! a single reader/writer lock guarding both the id→config and id→file
//! mappings. Writes go through a temp-file-then-rename so a failed write
//! never leaves a corrupt record behind.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{PluginError, Result};

/// Persisted user intent for one module.
///
/// A config's lifecycle is independent of the in-memory loaded instance: a
/// record can exist with no live instance, and transiently the other way
/// around while a load is failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Module id this record belongs to.
    pub id: String,

    /// Whether the module is allowed to run.
    #[serde(default)]
    pub enabled: bool,

    /// Whether the module starts automatically at bootstrap.
    #[serde(default)]
    pub auto_start: bool,

    /// Free-form module settings.
    #[serde(default)]
    pub settings: serde_json::Map<String, Value>,

    /// Ids of modules this module requires present and started first.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl PluginConfig {
    /// Default record for a module: enabled, no autostart, empty settings.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            auto_start: false,
            settings: serde_json::Map::new(),
            dependencies: Vec::new(),
        }
    }
}

#[derive(Default)]
struct StoreState {
    configs: HashMap<String, PluginConfig>,
    files: HashMap<String, PathBuf>,
}

/// Concurrency-safe store of per-module configuration records.
pub struct ConfigStore {
    config_dir: PathBuf,
    state: RwLock<StoreState>,
}

impl ConfigStore {
    /// Create a store over `config_dir`, creating the directory if needed.
    pub fn new(config_dir: impl Into<PathBuf>) -> Result<Self> {
        let config_dir = config_dir.into();
        fs::create_dir_all(&config_dir).map_err(|source| PluginError::ConfigIo {
            path: config_dir.clone(),
            source,
        })?;
        Ok(Self {
            config_dir,
            state: RwLock::new(StoreState::default()),
        })
    }

    /// The directory records live in.
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Clear in-memory state and re-populate it from the directory.
    ///
    /// A record that fails to read or parse is logged and skipped; the
    /// scan continues.
    pub fn load_all(&self) -> Result<()> {
        let mut state = self.state.write();
        state.configs.clear();
        state.files.clear();

        let entries = fs::read_dir(&self.config_dir).map_err(|source| PluginError::ConfigIo {
            path: self.config_dir.clone(),
            source,
        })?;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            match read_record(&path) {
                Ok(config) => {
                    state.files.insert(config.id.clone(), path);
                    state.configs.insert(config.id.clone(), config);
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable module config");
                }
            }
        }

        tracing::debug!(count = state.configs.len(), "module configs loaded");
        Ok(())
    }

    /// Get a module's config.
    pub fn get(&self, id: &str) -> Option<PluginConfig> {
        self.state.read().configs.get(id).cloned()
    }

    /// Upsert a record in memory and write it to its backing file.
    pub fn save(&self, config: &PluginConfig) -> Result<()> {
        let mut state = self.state.write();
        self.save_locked(&mut state, config.clone())
    }

    /// Delete a module's record. Removing an id with no backing file is a
    /// no-op success.
    pub fn delete(&self, id: &str) -> Result<()> {
        let mut state = self.state.write();

        let Some(path) = state.files.get(id).cloned() else {
            return Ok(());
        };

        if let Err(source) = fs::remove_file(&path) {
            if source.kind() != io::ErrorKind::NotFound {
                return Err(PluginError::ConfigIo { path, source });
            }
        }

        state.files.remove(id);
        state.configs.remove(id);
        Ok(())
    }

    /// Ids of every module with `enabled && auto_start`.
    pub fn auto_start_ids(&self) -> Vec<String> {
        self.state
            .read()
            .configs
            .values()
            .filter(|config| config.enabled && config.auto_start)
            .map(|config| config.id.clone())
            .collect()
    }

    /// Read one setting value.
    pub fn get_setting(&self, id: &str, key: &str) -> Option<Value> {
        self.state
            .read()
            .configs
            .get(id)
            .and_then(|config| config.settings.get(key).cloned())
    }

    /// Write one setting value, creating a default record for the module
    /// if none exists, and persist the result.
    pub fn set_setting(&self, id: &str, key: &str, value: Value) -> Result<()> {
        let mut state = self.state.write();
        let mut config = state
            .configs
            .get(id)
            .cloned()
            .unwrap_or_else(|| PluginConfig::new(id));
        config.settings.insert(key.to_string(), value);
        self.save_locked(&mut state, config)
    }

    /// Upsert under an already-held write lock. `save` and `set_setting`
    /// both funnel through here so each public call locks exactly once.
    fn save_locked(&self, state: &mut StoreState, config: PluginConfig) -> Result<()> {
        let path = state
            .files
            .get(&config.id)
            .cloned()
            .unwrap_or_else(|| self.config_dir.join(format!("{}.json", config.id)));

        let data =
            serde_json::to_vec_pretty(&config).map_err(|source| PluginError::ConfigParse {
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

        state.files.insert(config.id.clone(), path);
        state.configs.insert(config.id.clone(), config);
        Ok(())
    }
}

fn read_record(path: &Path) -> Result<PluginConfig> {
    let data = fs::read(path).map_err(|source| PluginError::ConfigIo {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&data).map_err(|source| PluginError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_record() {
        let config = PluginConfig::new("p1");
        assert!(config.enabled);
        assert!(!config.auto_start);
        assert!(config.settings.is_empty());
        assert!(config.dependencies.is_empty());
    }

    #[test]
    fn test_missing_fields_default_on_parse() {
        let config: PluginConfig = serde_json::from_str(r#"{"id": "p1"}"#).unwrap();
        assert_eq!(config.id, "p1");
        assert!(!config.enabled);
        assert!(!config.auto_start);
    }
}
