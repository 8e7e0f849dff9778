//! Module loader: turns a descriptor into a running in-process instance.
//!
//! Modules are dynamic libraries exporting the SDK's factory symbols.
//! Builtin modules (factories registered at construction time instead of
//! loaded from disk) share the same load path, so a deployment can ship
//! pre-linked extensions where dynamic loading is not wanted.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use libloading::{Library, Symbol};
use parking_lot::RwLock;

use kedge_plugin_sdk::{
    CapabilityPlugin, LifecycleResult, PluginHandle, PluginInfo, PluginStatus,
    PLUGIN_ABI_VERSION, PLUGIN_ABI_VERSION_SYMBOL, PLUGIN_CREATE_SYMBOL,
};

use super::{call_lifecycle, LifecyclePhase, PluginError, Result};

/// Exported ABI version function signature.
type AbiVersionFn = unsafe extern "C" fn() -> u32;

/// Exported factory function signature.
type PluginCreateFn = unsafe extern "C" fn() -> *mut PluginHandle;

/// Factory for a builtin (pre-linked) module.
type PluginFactory = Box<dyn Fn() -> PluginHandle + Send + Sync>;

/// A live module instance together with the library that backs it.
///
/// The library handle is dropped only after the instance, so module code
/// stays mapped for as long as the instance is reachable, including
/// clones held briefly by hooks.
pub struct PluginCell {
    plugin: Mutex<PluginHandle>,
    _library: Option<Library>,
}

/// Shared handle to a live module instance.
pub type SharedPlugin = Arc<PluginCell>;

impl PluginCell {
    fn new(plugin: PluginHandle, library: Option<Library>) -> Self {
        Self {
            plugin: Mutex::new(plugin),
            _library: library,
        }
    }

    /// Lock the instance, recovering from a poisoned lock if a lifecycle
    /// call panicked while holding it.
    fn lock(&self) -> std::sync::MutexGuard<'_, PluginHandle> {
        match self.plugin.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Identity metadata reported by the module.
    pub fn info(&self) -> PluginInfo {
        self.lock().info()
    }

    /// Checked access to the extended capability contract.
    ///
    /// The closure receives `None` when the module only implements the
    /// base lifecycle contract.
    pub fn with_capability<R>(&self, f: impl FnOnce(Option<&dyn CapabilityPlugin>) -> R) -> R {
        let guard = self.lock();
        f(guard.as_capability())
    }

    pub(crate) fn call_init(&self) -> LifecycleResult {
        self.lock().init()
    }

    pub(crate) fn call_start(&self) -> LifecycleResult {
        self.lock().start()
    }

    pub(crate) fn call_stop(&self) -> LifecycleResult {
        self.lock().stop()
    }
}

impl std::fmt::Debug for PluginCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginCell")
            .field("dynamic", &self._library.is_some())
            .finish()
    }
}

/// Loader and runtime instance table for extension modules.
pub struct PluginLoader {
    /// Directory under which relative module paths resolve.
    plugin_dir: PathBuf,

    /// Upper bound on a single lifecycle call.
    lifecycle_timeout: Duration,

    /// Live instances keyed by module id.
    instances: RwLock<HashMap<String, SharedPlugin>>,

    /// Builtin factories keyed by install path.
    builtins: RwLock<HashMap<String, PluginFactory>>,
}

impl PluginLoader {
    /// Create a loader rooted at `plugin_dir`.
    pub fn new(plugin_dir: impl Into<PathBuf>, lifecycle_timeout: Duration) -> Self {
        Self {
            plugin_dir: plugin_dir.into(),
            lifecycle_timeout,
            instances: RwLock::new(HashMap::new()),
            builtins: RwLock::new(HashMap::new()),
        }
    }

    /// Directory under which relative module paths resolve.
    pub fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }

    /// Upper bound on a single lifecycle call.
    pub fn lifecycle_timeout(&self) -> Duration {
        self.lifecycle_timeout
    }

    /// Register a pre-linked module factory under an install path key.
    ///
    /// `install` and `load` consult this table before touching the
    /// filesystem, so builtins behave exactly like on-disk modules.
    pub fn register_builtin(
        &self,
        path: impl Into<String>,
        factory: impl Fn() -> PluginHandle + Send + Sync + 'static,
    ) {
        self.builtins
            .write()
            .insert(path.into(), Box::new(factory));
    }

    /// Resolve a module path: absolute paths are used as-is, anything else
    /// is joined to the plugin directory.
    fn resolve_path(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.plugin_dir.join(candidate)
        }
    }

    /// Open the unit at `path` and construct an instance, without driving
    /// any lifecycle method.
    fn open(&self, path: &str) -> Result<(PluginHandle, Option<Library>)> {
        if let Some(factory) = self.builtins.read().get(path) {
            return Ok((factory(), None));
        }

        let resolved = self.resolve_path(path);

        let library = unsafe {
            Library::new(&resolved).map_err(|source| PluginError::OpenFailure {
                path: resolved.clone(),
                source,
            })?
        };

        let abi_version: AbiVersionFn = unsafe {
            let symbol: Symbol<AbiVersionFn> =
                library
                    .get(PLUGIN_ABI_VERSION_SYMBOL.as_bytes())
                    .map_err(|source| PluginError::SymbolNotFound {
                        path: resolved.clone(),
                        symbol: PLUGIN_ABI_VERSION_SYMBOL,
                        source,
                    })?;
            *symbol
        };

        let reported = unsafe { abi_version() };
        if reported != PLUGIN_ABI_VERSION {
            return Err(PluginError::InterfaceMismatch {
                path: resolved,
                reason: format!(
                    "module reports ABI version {reported}, host requires {PLUGIN_ABI_VERSION}"
                ),
            });
        }

        let create: PluginCreateFn = unsafe {
            let symbol: Symbol<PluginCreateFn> =
                library
                    .get(PLUGIN_CREATE_SYMBOL.as_bytes())
                    .map_err(|source| PluginError::SymbolNotFound {
                        path: resolved.clone(),
                        symbol: PLUGIN_CREATE_SYMBOL,
                        source,
                    })?;
            *symbol
        };

        let raw = unsafe { create() };
        if raw.is_null() {
            return Err(PluginError::InterfaceMismatch {
                path: resolved,
                reason: "module constructor returned null".to_string(),
            });
        }

        // The factory hands over ownership; host and module are built
        // against the same SDK and allocator.
        let plugin = unsafe { *Box::from_raw(raw) };

        Ok((plugin, Some(library)))
    }

    /// Validate the candidate module at `path` and extract its descriptor
    /// without initializing or starting it.
    ///
    /// The returned descriptor carries status [`PluginStatus::Enabled`],
    /// fresh timestamps, and `path` set to the argument that was actually
    /// opened.
    pub fn install_candidate(&self, path: &str) -> Result<PluginInfo> {
        let (plugin, library) = self.open(path)?;

        let mut info = plugin.info();
        info.status = PluginStatus::Enabled;
        info.path = path.to_string();
        let now = Utc::now();
        info.created_at = now;
        info.updated_at = now;

        // Instance code must be unmapped only after the instance is gone.
        drop(plugin);
        drop(library);

        tracing::debug!(plugin = %info.id, path, "validated module candidate");
        Ok(info)
    }

    /// Load the module described by `descriptor`: open it, verify the
    /// contract, run `init` under the lifecycle bound, and register the
    /// instance in the runtime table, overwriting any prior entry for the
    /// same id.
    ///
    /// An `init` failure leaves the table untouched. Starting the instance
    /// is the hook registry's job.
    pub async fn load(&self, descriptor: &PluginInfo) -> Result<()> {
        let (plugin, library) = self.open(&descriptor.path)?;
        let instance: SharedPlugin = Arc::new(PluginCell::new(plugin, library));

        call_lifecycle(instance.clone(), LifecyclePhase::Init, self.lifecycle_timeout)
            .await
            .map_err(|source| PluginError::InitFailure {
                id: descriptor.id.clone(),
                source,
            })?;

        self.instances
            .write()
            .insert(descriptor.id.clone(), instance);

        tracing::info!(plugin = %descriptor.id, path = %descriptor.path, "module loaded");
        Ok(())
    }

    /// Get the live instance for a module id.
    pub fn get(&self, id: &str) -> Option<SharedPlugin> {
        self.instances.read().get(id).cloned()
    }

    /// Remove a module from the runtime table, returning the instance.
    pub fn remove(&self, id: &str) -> Option<SharedPlugin> {
        let removed = self.instances.write().remove(id);
        if removed.is_some() {
            tracing::info!(plugin = %id, "module removed from runtime table");
        }
        removed
    }

    /// Whether a live instance exists for the module id.
    pub fn contains(&self, id: &str) -> bool {
        self.instances.read().contains_key(id)
    }

    /// Ids of all live instances.
    pub fn loaded_ids(&self) -> Vec<String> {
        self.instances.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kedge_plugin_sdk::Plugin;

    struct NullPlugin;

    impl Plugin for NullPlugin {
        fn info(&self) -> PluginInfo {
            PluginInfo::new("null-plugin", "Null Plugin").with_version("0.0.1")
        }
        fn init(&mut self) -> LifecycleResult {
            Ok(())
        }
        fn start(&mut self) -> LifecycleResult {
            Ok(())
        }
        fn stop(&mut self) -> LifecycleResult {
            Ok(())
        }
    }

    fn loader() -> PluginLoader {
        PluginLoader::new("/opt/kedge/plugins", Duration::from_secs(5))
    }

    #[test]
    fn test_relative_path_joins_plugin_dir() {
        let loader = loader();
        assert_eq!(
            loader.resolve_path("monitor.so"),
            PathBuf::from("/opt/kedge/plugins/monitor.so")
        );
    }

    #[test]
    fn test_absolute_path_used_as_is() {
        let loader = loader();
        assert_eq!(
            loader.resolve_path("/usr/lib/kedge/monitor.so"),
            PathBuf::from("/usr/lib/kedge/monitor.so")
        );
    }

    #[test]
    fn test_install_candidate_from_builtin() {
        let loader = loader();
        loader.register_builtin("builtin:null", || Box::new(NullPlugin));

        let info = loader.install_candidate("builtin:null").unwrap();
        assert_eq!(info.id, "null-plugin");
        assert_eq!(info.status, PluginStatus::Enabled);
        assert_eq!(info.path, "builtin:null");
        assert!(!loader.contains("null-plugin"));
    }

    #[tokio::test]
    async fn test_load_registers_builtin_instance() {
        let loader = loader();
        loader.register_builtin("builtin:null", || Box::new(NullPlugin));

        let descriptor = loader.install_candidate("builtin:null").unwrap();
        loader.load(&descriptor).await.unwrap();

        assert!(loader.contains("null-plugin"));
        assert_eq!(loader.loaded_ids(), vec!["null-plugin".to_string()]);

        // Re-loading overwrites the prior entry for the same id.
        loader.load(&descriptor).await.unwrap();
        assert_eq!(loader.loaded_ids().len(), 1);

        loader.remove("null-plugin");
        assert!(!loader.contains("null-plugin"));
    }

    #[test]
    fn test_open_failure_for_missing_file() {
        let loader = loader();
        let err = loader.install_candidate("no-such-module.so").unwrap_err();
        assert!(matches!(err, PluginError::OpenFailure { .. }));
    }
}
