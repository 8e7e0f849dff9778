//! Shared fixtures for the plugin runtime tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kedge_plugin_sdk::{
    CapabilityPlugin, CapabilityProfile, LifecycleError, LifecycleResult, Plugin, PluginInfo,
};

/// Observable side effects of one mock module, shared with the test body.
#[derive(Default)]
pub struct MockProbe {
    pub started: AtomicBool,
    pub stopped: AtomicBool,
}

impl MockProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Base-contract mock with injectable failures.
pub struct MockPlugin {
    id: String,
    fail_init: bool,
    fail_start: bool,
    fail_stop: bool,
    block_start: Option<Duration>,
    probe: Arc<MockProbe>,
}

impl MockPlugin {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            fail_init: false,
            fail_start: false,
            fail_stop: false,
            block_start: None,
            probe: MockProbe::new(),
        }
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    pub fn blocking_start(mut self, delay: Duration) -> Self {
        self.block_start = Some(delay);
        self
    }

    pub fn with_probe(mut self, probe: Arc<MockProbe>) -> Self {
        self.probe = probe;
        self
    }
}

impl Plugin for MockPlugin {
    fn info(&self) -> PluginInfo {
        PluginInfo::new(&self.id, "Mock Plugin")
            .with_description("test module")
            .with_version("1.0.0")
            .with_author("tests")
    }

    fn init(&mut self) -> LifecycleResult {
        if self.fail_init {
            return Err(LifecycleError::failed("init refused"));
        }
        Ok(())
    }

    fn start(&mut self) -> LifecycleResult {
        if let Some(delay) = self.block_start {
            std::thread::sleep(delay);
        }
        if self.fail_start {
            return Err(LifecycleError::failed("start refused"));
        }
        self.probe.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> LifecycleResult {
        self.probe.stopped.store(true, Ordering::SeqCst);
        if self.fail_stop {
            return Err(LifecycleError::failed("stop refused"));
        }
        self.probe.started.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Capability-aware mock implementing the extended contract.
pub struct MonitorMock {
    inner: MockPlugin,
    profile: CapabilityProfile,
}

impl MonitorMock {
    pub fn new(id: &str, profile: CapabilityProfile) -> Self {
        Self {
            inner: MockPlugin::new(id),
            profile,
        }
    }
}

impl Plugin for MonitorMock {
    fn info(&self) -> PluginInfo {
        self.inner.info()
    }

    fn init(&mut self) -> LifecycleResult {
        self.inner.init()
    }

    fn start(&mut self) -> LifecycleResult {
        self.inner.start()
    }

    fn stop(&mut self) -> LifecycleResult {
        self.inner.stop()
    }

    fn as_capability(&self) -> Option<&dyn CapabilityPlugin> {
        Some(self)
    }
}

impl CapabilityPlugin for MonitorMock {
    fn plugin_type(&self) -> kedge_plugin_sdk::PluginType {
        self.profile.plugin_type()
    }

    fn capabilities(&self) -> &[kedge_plugin_sdk::PluginCapability] {
        self.profile.capabilities()
    }
}
