//! Composition root for the plugin runtime.
//!
//! The manager is the administrative surface consumed by the API layer:
//! install, uninstall, enable, disable, list, per-module configuration.
//! It drives load/start/stop through the hook registry and independently
//! persists user intent in the configuration store and the descriptor
//! catalog. All collaborators are passed in at construction.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use kedge_plugin_sdk::{PluginCapability, PluginInfo, PluginStatus, PluginType};

use super::catalog::PluginCatalog;
use super::config_store::{ConfigStore, PluginConfig};
use super::hooks::HookRegistry;
use super::loader::PluginLoader;
use super::{PluginError, Result};

use crate::config::RuntimeConfig;

/// One module as presented to callers: descriptor merged with persisted
/// intent and, when the instance is loaded and capability-aware, its
/// category and capabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub author: String,
    pub status: PluginStatus,
    pub enabled: bool,
    pub auto_start: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_type: Option<PluginType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Vec<PluginCapability>>,
}

/// Partial update for a module's configuration record.
///
/// `settings` merges key-by-key: incoming keys overwrite existing keys of
/// the same name, all others are preserved. `dependencies` replaces the
/// whole list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigPatch {
    pub auto_start: Option<bool>,
    pub settings: Option<serde_json::Map<String, Value>>,
    pub dependencies: Option<Vec<String>>,
}

/// Administrative entry point for the plugin runtime.
pub struct PluginManager {
    loader: Arc<PluginLoader>,
    hooks: Arc<HookRegistry>,
    configs: Arc<ConfigStore>,
    catalog: Arc<PluginCatalog>,
}

impl PluginManager {
    /// Compose a manager from explicitly constructed collaborators.
    pub fn new(
        loader: Arc<PluginLoader>,
        hooks: Arc<HookRegistry>,
        configs: Arc<ConfigStore>,
        catalog: Arc<PluginCatalog>,
    ) -> Self {
        Self {
            loader,
            hooks,
            configs,
            catalog,
        }
    }

    /// Build the default component graph from runtime settings and load
    /// the persisted state.
    pub fn from_settings(settings: &RuntimeConfig) -> Result<Self> {
        let loader = Arc::new(PluginLoader::new(
            &settings.plugin_dir,
            settings.lifecycle_timeout(),
        ));
        let hooks = Arc::new(HookRegistry::new(loader.clone()));

        let configs = Arc::new(ConfigStore::new(&settings.config_dir)?);
        configs.load_all()?;

        let catalog = Arc::new(PluginCatalog::new(settings.config_dir.join("catalog"))?);
        catalog.load_all()?;

        Ok(Self::new(loader, hooks, configs, catalog))
    }

    /// The loader and runtime instance table.
    pub fn loader(&self) -> &Arc<PluginLoader> {
        &self.loader
    }

    /// The hook registry, for callers that register interception hooks.
    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    /// The configuration store.
    pub fn configs(&self) -> &Arc<ConfigStore> {
        &self.configs
    }

    /// Install the module at `path`.
    ///
    /// The candidate is validated before anything is written; only then
    /// are the descriptor and a fresh config record (enabled, with the
    /// requested autostart flag) persisted. With `auto_start` the module
    /// is immediately loaded and started through the hook registry. A
    /// failure there is returned to the caller, but the records remain and
    /// the module stays installed in a stopped, errored state.
    pub async fn install(&self, path: &str, auto_start: bool) -> Result<PluginInfo> {
        let mut info = self.loader.install_candidate(path)?;

        self.catalog.save(&info)?;

        let mut config = PluginConfig::new(&info.id);
        config.auto_start = auto_start;
        self.configs.save(&config)?;

        if auto_start {
            if let Err(err) = self.activate(&info).await {
                self.mark_error(&mut info);
                return Err(err);
            }
        }

        tracing::info!(plugin = %info.id, path, auto_start, "module installed");
        Ok(info)
    }

    /// Uninstall a module: stop it if loaded, drop it from the runtime
    /// table, then delete its persisted records.
    ///
    /// A stop failure aborts the uninstall: the records and the instance
    /// are kept, so no config is orphaned while its module still runs.
    pub async fn uninstall(&self, id: &str) -> Result<()> {
        if self.loader.contains(id) {
            self.hooks.stop_plugin(id).await?;
            self.loader.remove(id);
        }

        self.catalog.delete(id)?;
        self.configs.delete(id)?;

        tracing::info!(plugin = %id, "module uninstalled");
        Ok(())
    }

    /// Enable a module: persist `enabled = true`, then load and start it
    /// through the hook registry.
    pub async fn enable(&self, id: &str) -> Result<()> {
        let mut info = self
            .catalog
            .get(id)
            .ok_or_else(|| PluginError::ConfigNotFound(id.to_string()))?;

        let mut config = self
            .configs
            .get(id)
            .unwrap_or_else(|| PluginConfig::new(id));
        config.enabled = true;
        self.configs.save(&config)?;

        match self.activate(&info).await {
            Ok(()) => {
                info.status = PluginStatus::Enabled;
                info.updated_at = Utc::now();
                self.catalog.save(&info)?;
                tracing::info!(plugin = %id, "module enabled");
                Ok(())
            }
            Err(err) => {
                self.mark_error(&mut info);
                Err(err)
            }
        }
    }

    /// Disable a module: persist `enabled = false` and stop the runtime
    /// instance. A module with no live instance is already in the
    /// requested state.
    pub async fn disable(&self, id: &str) -> Result<()> {
        let mut config = self
            .configs
            .get(id)
            .unwrap_or_else(|| PluginConfig::new(id));
        config.enabled = false;
        self.configs.save(&config)?;

        if self.loader.contains(id) {
            self.hooks.stop_plugin(id).await?;
            self.loader.remove(id);
        }

        if let Some(mut info) = self.catalog.get(id) {
            info.status = PluginStatus::Disabled;
            info.updated_at = Utc::now();
            self.catalog.save(&info)?;
        }

        tracing::info!(plugin = %id, "module disabled");
        Ok(())
    }

    /// Every installed module, merged with config and capability state.
    pub fn list(&self) -> Vec<PluginSummary> {
        self.catalog
            .list()
            .into_iter()
            .map(|info| self.summarize(info))
            .collect()
    }

    /// One installed module, merged with config and capability state.
    pub fn get(&self, id: &str) -> Option<PluginSummary> {
        self.catalog.get(id).map(|info| self.summarize(info))
    }

    /// A module's configuration record.
    pub fn get_config(&self, id: &str) -> Result<PluginConfig> {
        self.configs
            .get(id)
            .ok_or_else(|| PluginError::ConfigNotFound(id.to_string()))
    }

    /// Apply a partial configuration update and persist the result,
    /// creating a default record when none exists.
    pub fn update_config(&self, id: &str, patch: ConfigPatch) -> Result<PluginConfig> {
        let mut config = self
            .configs
            .get(id)
            .unwrap_or_else(|| PluginConfig::new(id));

        if let Some(auto_start) = patch.auto_start {
            config.auto_start = auto_start;
        }
        if let Some(settings) = patch.settings {
            for (key, value) in settings {
                config.settings.insert(key, value);
            }
        }
        if let Some(dependencies) = patch.dependencies {
            config.dependencies = dependencies;
        }

        self.configs.save(&config)?;
        Ok(config)
    }

    /// Load and start every module in the autostart set. Failures are
    /// logged and skipped so one broken module cannot block bootstrap;
    /// returns the number of modules started.
    pub async fn start_autostart(&self) -> usize {
        let mut started = 0;

        for id in self.configs.auto_start_ids() {
            let Some(mut info) = self.catalog.get(&id) else {
                tracing::warn!(plugin = %id, "autostart config without a catalog record");
                continue;
            };

            match self.activate(&info).await {
                Ok(()) => started += 1,
                Err(err) => {
                    tracing::warn!(plugin = %id, error = %err, "autostart failed");
                    self.mark_error(&mut info);
                }
            }
        }

        started
    }

    /// Load (unless already resident) and start one module through the
    /// hook registry.
    async fn activate(&self, info: &PluginInfo) -> Result<()> {
        if !self.loader.contains(&info.id) {
            self.hooks.load_plugin(info).await?;
        }
        self.hooks.start_plugin(&info.id).await
    }

    /// Flip a descriptor to the error status, best-effort.
    fn mark_error(&self, info: &mut PluginInfo) {
        info.status = PluginStatus::Error;
        info.updated_at = Utc::now();
        if let Err(err) = self.catalog.save(info) {
            tracing::warn!(plugin = %info.id, error = %err, "failed to record error status");
        }
    }

    fn summarize(&self, info: PluginInfo) -> PluginSummary {
        let (enabled, auto_start) = self
            .configs
            .get(&info.id)
            .map(|config| (config.enabled, config.auto_start))
            .unwrap_or((false, false));

        let (plugin_type, capabilities) = match self.loader.get(&info.id) {
            Some(instance) => instance.with_capability(|capability| match capability {
                Some(capability) => (
                    Some(capability.plugin_type()),
                    Some(capability.capabilities().to_vec()),
                ),
                None => (None, None),
            }),
            None => (None, None),
        };

        PluginSummary {
            id: info.id,
            name: info.name,
            description: info.description,
            version: info.version,
            author: info.author,
            status: info.status,
            enabled,
            auto_start,
            plugin_type,
            capabilities,
        }
    }
}
