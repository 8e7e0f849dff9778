//! Extended capability contract.
//!
//! Modules may declare a category and a set of fine-grained feature tags on
//! top of the base lifecycle contract. Callers reach this surface through
//! [`Plugin::as_capability`](crate::Plugin::as_capability); a module that
//! does not implement it simply reports no capability information.

use serde::{Deserialize, Serialize};

use crate::Plugin;

/// Fixed category a capability-aware module belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginType {
    /// Cluster lifecycle management.
    ClusterManager,
    /// Cluster deployment.
    Deployment,
    /// Application delivery.
    Delivery,
    /// Monitoring and alerting.
    Monitoring,
    /// Security tooling.
    Security,
    /// Backup and restore.
    Backup,
    /// Anything else.
    General,
}

impl PluginType {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginType::ClusterManager => "cluster_manager",
            PluginType::Deployment => "deployment",
            PluginType::Delivery => "delivery",
            PluginType::Monitoring => "monitoring",
            PluginType::Security => "security",
            PluginType::Backup => "backup",
            PluginType::General => "general",
        }
    }

    /// Parse from string, defaulting to [`PluginType::General`] for
    /// unknown input.
    pub fn from_str(s: &str) -> Self {
        match s {
            "cluster_manager" => PluginType::ClusterManager,
            "deployment" => PluginType::Deployment,
            "delivery" => PluginType::Delivery,
            "monitoring" => PluginType::Monitoring,
            "security" => PluginType::Security,
            "backup" => PluginType::Backup,
            _ => PluginType::General,
        }
    }
}

impl std::fmt::Display for PluginType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fine-grained feature tag a module can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginCapability {
    /// Can create clusters.
    ClusterCreate,
    /// Can monitor cluster resource usage.
    ClusterMonitor,
    /// Can back up cluster state.
    ClusterBackup,
    /// Can deploy Kubernetes.
    DeployK8s,
    /// Can deploy in air-gapped environments.
    DeployOffline,
    /// Delivers workloads via Helm charts.
    DeliveryHelm,
    /// Delivers workloads via Kustomize.
    DeliveryKustomize,
    /// Delivers workloads via raw YAML manifests.
    DeliveryYaml,
}

impl PluginCapability {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginCapability::ClusterCreate => "cluster_create",
            PluginCapability::ClusterMonitor => "cluster_monitor",
            PluginCapability::ClusterBackup => "cluster_backup",
            PluginCapability::DeployK8s => "deploy_k8s",
            PluginCapability::DeployOffline => "deploy_offline",
            PluginCapability::DeliveryHelm => "delivery_helm",
            PluginCapability::DeliveryKustomize => "delivery_kustomize",
            PluginCapability::DeliveryYaml => "delivery_yaml",
        }
    }
}

impl std::fmt::Display for PluginCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Extended contract for modules that declare a category and capabilities.
pub trait CapabilityPlugin: Plugin {
    /// The category this module belongs to.
    fn plugin_type(&self) -> PluginType;

    /// The capabilities this module declares.
    fn capabilities(&self) -> &[PluginCapability];

    /// Membership test over the declared capability set.
    fn has_capability(&self, capability: PluginCapability) -> bool {
        self.capabilities().contains(&capability)
    }
}

/// Reusable capability declaration for embedding in plugin structs.
///
/// A module holds one of these and forwards the [`CapabilityPlugin`]
/// accessors to it instead of re-implementing the bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityProfile {
    plugin_type: PluginType,
    capabilities: Vec<PluginCapability>,
}

impl CapabilityProfile {
    /// Create a profile for the given category with no capabilities.
    pub fn new(plugin_type: PluginType) -> Self {
        Self {
            plugin_type,
            capabilities: Vec::new(),
        }
    }

    /// Declare an additional capability.
    pub fn with_capability(mut self, capability: PluginCapability) -> Self {
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
        self
    }

    /// The declared category.
    pub fn plugin_type(&self) -> PluginType {
        self.plugin_type
    }

    /// The declared capability set.
    pub fn capabilities(&self) -> &[PluginCapability] {
        &self.capabilities
    }

    /// Membership test over the declared capability set.
    pub fn has(&self, capability: PluginCapability) -> bool {
        self.capabilities.contains(&capability)
    }
}
