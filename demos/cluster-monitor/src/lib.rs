//! Cluster monitoring plugin for Kedge.
//!
//! Samples cluster resource usage on a fixed interval and counts threshold
//! breaches. The sampling loop runs on a thread owned by the plugin;
//! `stop()` signals it through a channel so shutdown is prompt and
//! idempotent.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use kedge_plugin_sdk::prelude::*;
use kedge_plugin_sdk::export_plugin;

/// Alert thresholds, in percent.
#[derive(Debug, Clone, Copy)]
struct Thresholds {
    cpu_usage: f64,
    memory_usage: f64,
    disk_usage: f64,
}

/// Monitoring settings.
#[derive(Debug, Clone, Copy)]
struct MonitorConfig {
    interval: Duration,
    alerting: bool,
    thresholds: Thresholds,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            alerting: true,
            thresholds: Thresholds {
                cpu_usage: 80.0,
                memory_usage: 80.0,
                disk_usage: 85.0,
            },
        }
    }
}

struct Worker {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

/// Monitoring plugin instance.
pub struct ClusterMonitor {
    config: MonitorConfig,
    profile: CapabilityProfile,
    breaches: Arc<AtomicU64>,
    worker: Option<Worker>,
}

impl ClusterMonitor {
    pub fn new() -> Self {
        Self::with_config(MonitorConfig::default())
    }

    fn with_config(config: MonitorConfig) -> Self {
        Self {
            config,
            profile: CapabilityProfile::new(PluginType::Monitoring)
                .with_capability(PluginCapability::ClusterMonitor),
            breaches: Arc::new(AtomicU64::new(0)),
            worker: None,
        }
    }

    /// Number of threshold breaches observed since start.
    pub fn breach_count(&self) -> u64 {
        self.breaches.load(Ordering::Relaxed)
    }

    /// Current resource readings across managed clusters.
    // TODO: replace the canned readings once the cluster client service
    // exposes node metrics.
    fn sample() -> [(&'static str, f64); 3] {
        [
            ("cpu_usage", 45.5),
            ("memory_usage", 60.2),
            ("disk_usage", 55.8),
        ]
    }
}

impl Default for ClusterMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for ClusterMonitor {
    fn info(&self) -> PluginInfo {
        PluginInfo::new("cluster-monitor", "Cluster Monitor")
            .with_description("Watches cluster resource usage and raises threshold alerts")
            .with_version("1.0.0")
            .with_author("Kedge Contributors")
            .with_path("cluster-monitor.so")
    }

    fn init(&mut self) -> LifecycleResult {
        if self.config.interval.is_zero() {
            return Err(LifecycleError::InvalidConfiguration(
                "monitor interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    fn start(&mut self) -> LifecycleResult {
        if self.worker.is_some() {
            return Ok(());
        }

        let (shutdown, wake) = mpsc::channel();
        let config = self.config;
        let breaches = self.breaches.clone();
        let handle = std::thread::spawn(move || run_monitor(wake, config, breaches));

        self.worker = Some(Worker { shutdown, handle });
        Ok(())
    }

    fn stop(&mut self) -> LifecycleResult {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        // Dropping the sender wakes the worker immediately.
        drop(worker.shutdown);
        worker
            .handle
            .join()
            .map_err(|_| LifecycleError::failed("monitor worker panicked"))?;
        Ok(())
    }

    fn as_capability(&self) -> Option<&dyn CapabilityPlugin> {
        Some(self)
    }
}

impl CapabilityPlugin for ClusterMonitor {
    fn plugin_type(&self) -> PluginType {
        self.profile.plugin_type()
    }

    fn capabilities(&self) -> &[PluginCapability] {
        self.profile.capabilities()
    }
}

fn run_monitor(wake: Receiver<()>, config: MonitorConfig, breaches: Arc<AtomicU64>) {
    loop {
        match wake.recv_timeout(config.interval) {
            Err(RecvTimeoutError::Timeout) => {
                if !config.alerting {
                    continue;
                }
                for (metric, value) in ClusterMonitor::sample() {
                    let threshold = match metric {
                        "cpu_usage" => config.thresholds.cpu_usage,
                        "memory_usage" => config.thresholds.memory_usage,
                        _ => config.thresholds.disk_usage,
                    };
                    if value > threshold {
                        breaches.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

export_plugin!(ClusterMonitor::new());

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> MonitorConfig {
        MonitorConfig {
            interval: Duration::from_millis(5),
            alerting: true,
            thresholds: Thresholds {
                cpu_usage: 0.0,
                memory_usage: 0.0,
                disk_usage: 0.0,
            },
        }
    }

    #[test]
    fn test_declares_monitoring_capability() {
        let plugin = ClusterMonitor::new();
        let capability = plugin.as_capability().unwrap();
        assert_eq!(capability.plugin_type(), PluginType::Monitoring);
        assert!(capability.has_capability(PluginCapability::ClusterMonitor));
        assert!(!capability.has_capability(PluginCapability::DeployK8s));
    }

    #[test]
    fn test_breaches_accumulate_and_stop_is_prompt() {
        let mut plugin = ClusterMonitor::with_config(fast_config());
        plugin.init().unwrap();
        plugin.start().unwrap();

        std::thread::sleep(Duration::from_millis(50));
        plugin.stop().unwrap();

        assert!(plugin.breach_count() > 0);
        // Stopping again is a no-op.
        plugin.stop().unwrap();
    }

    #[test]
    fn test_start_twice_keeps_single_worker() {
        let mut plugin = ClusterMonitor::with_config(fast_config());
        plugin.init().unwrap();
        plugin.start().unwrap();
        plugin.start().unwrap();
        plugin.stop().unwrap();
    }

    #[test]
    fn test_zero_interval_rejected_at_init() {
        let mut config = fast_config();
        config.interval = Duration::ZERO;
        let mut plugin = ClusterMonitor::with_config(config);
        assert!(plugin.init().is_err());
    }
}
