//! Lifecycle interception: named, ordered hook chains around the loader.
//!
//! Hooks let cross-cutting behavior (telemetry, validation, dependency
//! checks) attach to lifecycle transitions without modifying the loader or
//! the modules. Chains run in registration order and fail fast: the first
//! failing hook aborts the remainder and its error is returned unmodified.
//! Hooks that already ran are not rolled back, and a failing After hook
//! cannot undo the lifecycle action that preceded it: the action stands
//! and only the error propagates.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use kedge_plugin_sdk::PluginInfo;

use super::loader::{PluginLoader, SharedPlugin};
use super::{call_lifecycle, ConfigStore, LifecyclePhase, PluginError, Result};

/// The six interception points around module lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    /// Before `init`; no instance exists yet.
    BeforeInit,
    /// After a successful `init`.
    AfterInit,
    /// Before `start`.
    BeforeStart,
    /// After a successful `start`.
    AfterStart,
    /// Before `stop`.
    BeforeStop,
    /// After a successful `stop`.
    AfterStop,
}

impl HookPhase {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            HookPhase::BeforeInit => "before_init",
            HookPhase::AfterInit => "after_init",
            HookPhase::BeforeStart => "before_start",
            HookPhase::AfterStart => "after_start",
            HookPhase::BeforeStop => "before_stop",
            HookPhase::AfterStop => "after_stop",
        }
    }
}

impl std::fmt::Display for HookPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A hook: receives the instance (absent for [`HookPhase::BeforeInit`],
/// where none exists yet) and may veto the transition by failing.
pub type HookFn = Arc<dyn Fn(Option<&SharedPlugin>) -> Result<()> + Send + Sync>;

/// Hook registry wrapping a [`PluginLoader`] with interception chains.
pub struct HookRegistry {
    loader: Arc<PluginLoader>,
    hooks: RwLock<HashMap<HookPhase, Vec<HookFn>>>,
}

impl HookRegistry {
    /// Create a registry over the given loader.
    pub fn new(loader: Arc<PluginLoader>) -> Self {
        Self {
            loader,
            hooks: RwLock::new(HashMap::new()),
        }
    }

    /// The wrapped loader.
    pub fn loader(&self) -> &Arc<PluginLoader> {
        &self.loader
    }

    /// Append a hook to a phase's chain. Execution order is registration
    /// order.
    pub fn register_hook(
        &self,
        phase: HookPhase,
        hook: impl Fn(Option<&SharedPlugin>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.hooks
            .write()
            .entry(phase)
            .or_default()
            .push(Arc::new(hook));
    }

    /// Run a phase's chain sequentially, aborting on the first failure.
    pub fn execute_hooks(&self, phase: HookPhase, instance: Option<&SharedPlugin>) -> Result<()> {
        // Clone the chain out of the lock so a slow hook does not block
        // registration or unrelated phases.
        let chain: Vec<HookFn> = match self.hooks.read().get(&phase) {
            Some(chain) => chain.clone(),
            None => return Ok(()),
        };

        for hook in &chain {
            hook(instance)?;
        }
        Ok(())
    }

    /// Load a module through the loader, firing [`HookPhase::BeforeInit`]
    /// (with no instance) and [`HookPhase::AfterInit`] around it.
    pub async fn load_plugin(&self, descriptor: &PluginInfo) -> Result<()> {
        self.execute_hooks(HookPhase::BeforeInit, None)?;

        self.loader.load(descriptor).await?;

        let instance = self
            .loader
            .get(&descriptor.id)
            .ok_or_else(|| PluginError::NotLoaded(descriptor.id.clone()))?;
        self.execute_hooks(HookPhase::AfterInit, Some(&instance))
    }

    /// Start a loaded module, firing the start hooks around the call.
    ///
    /// On a start failure the instance is stopped best-effort (its own
    /// errors only logged) and removed from the runtime table, so a failed
    /// activation leaves no half-started resident instance; the After hook
    /// runs only after a successful start.
    pub async fn start_plugin(&self, id: &str) -> Result<()> {
        let instance = self
            .loader
            .get(id)
            .ok_or_else(|| PluginError::NotLoaded(id.to_string()))?;

        self.execute_hooks(HookPhase::BeforeStart, Some(&instance))?;

        let timeout = self.loader.lifecycle_timeout();
        if let Err(source) = call_lifecycle(instance.clone(), LifecyclePhase::Start, timeout).await
        {
            if let Err(stop_err) =
                call_lifecycle(instance.clone(), LifecyclePhase::Stop, timeout).await
            {
                tracing::warn!(plugin = %id, error = %stop_err, "cleanup stop after failed start also failed");
            }
            self.loader.remove(id);
            return Err(PluginError::StartFailure {
                id: id.to_string(),
                source,
            });
        }

        tracing::info!(plugin = %id, "module started");
        self.execute_hooks(HookPhase::AfterStart, Some(&instance))
    }

    /// Stop a loaded module, firing the stop hooks around the call. The
    /// instance stays in the runtime table; removal is the caller's call.
    pub async fn stop_plugin(&self, id: &str) -> Result<()> {
        let instance = self
            .loader
            .get(id)
            .ok_or_else(|| PluginError::NotLoaded(id.to_string()))?;

        self.execute_hooks(HookPhase::BeforeStop, Some(&instance))?;

        call_lifecycle(
            instance.clone(),
            LifecyclePhase::Stop,
            self.loader.lifecycle_timeout(),
        )
        .await
        .map_err(|source| PluginError::StopFailure {
            id: id.to_string(),
            source,
        })?;

        tracing::info!(plugin = %id, "module stopped");
        self.execute_hooks(HookPhase::AfterStop, Some(&instance))
    }
}

/// Register hooks that log every lifecycle transition.
pub fn register_tracing_hooks(registry: &HookRegistry) {
    for phase in [
        HookPhase::BeforeInit,
        HookPhase::AfterInit,
        HookPhase::BeforeStart,
        HookPhase::AfterStart,
        HookPhase::BeforeStop,
        HookPhase::AfterStop,
    ] {
        registry.register_hook(phase, move |instance| {
            match instance {
                Some(cell) => {
                    tracing::info!(phase = %phase, plugin = %cell.info().id, "lifecycle transition")
                }
                None => tracing::info!(phase = %phase, "lifecycle transition"),
            }
            Ok(())
        });
    }
}

/// Register a [`HookPhase::BeforeStart`] gate refusing to start a module
/// whose declared dependencies are not present in the runtime table.
pub fn register_dependency_gate(
    registry: &HookRegistry,
    configs: Arc<ConfigStore>,
    loader: Arc<PluginLoader>,
) {
    registry.register_hook(HookPhase::BeforeStart, move |instance| {
        let Some(cell) = instance else {
            return Ok(());
        };
        let id = cell.info().id;
        let Some(config) = configs.get(&id) else {
            return Ok(());
        };
        for dependency in &config.dependencies {
            if !loader.contains(dependency) {
                return Err(PluginError::NotLoaded(format!(
                    "{dependency} (required by {id})"
                )));
            }
        }
        Ok(())
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    fn registry() -> HookRegistry {
        HookRegistry::new(Arc::new(PluginLoader::new(
            "plugins",
            Duration::from_secs(5),
        )))
    }

    #[test]
    fn test_hooks_run_in_registration_order() {
        let registry = registry();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["h1", "h2", "h3"] {
            let order = order.clone();
            registry.register_hook(HookPhase::AfterStart, move |_| {
                order.lock().unwrap().push(tag);
                Ok(())
            });
        }

        registry.execute_hooks(HookPhase::AfterStart, None).unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["h1", "h2", "h3"]);
    }

    #[test]
    fn test_failing_hook_aborts_chain() {
        let registry = registry();
        let order = Arc::new(Mutex::new(Vec::new()));

        {
            let order = order.clone();
            registry.register_hook(HookPhase::AfterInit, move |_| {
                order.lock().unwrap().push("h1");
                Ok(())
            });
        }
        registry.register_hook(HookPhase::AfterInit, |_| {
            Err(PluginError::Other(anyhow::anyhow!("h2 rejected")))
        });
        {
            let order = order.clone();
            registry.register_hook(HookPhase::AfterInit, move |_| {
                order.lock().unwrap().push("h3");
                Ok(())
            });
        }

        let err = registry
            .execute_hooks(HookPhase::AfterInit, None)
            .unwrap_err();
        assert_eq!(err.to_string(), "h2 rejected");
        assert_eq!(*order.lock().unwrap(), vec!["h1"]);
    }

    #[test]
    fn test_empty_phase_succeeds() {
        let registry = registry();
        assert!(registry.execute_hooks(HookPhase::BeforeStop, None).is_ok());
    }

    #[tokio::test]
    async fn test_start_unloaded_module_fails() {
        let registry = registry();
        let err = registry.start_plugin("ghost").await.unwrap_err();
        assert!(matches!(err, PluginError::NotLoaded(_)));
    }
}
