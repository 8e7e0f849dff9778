//! Core runtime for the Kedge cluster-management platform.
//!
//! The one subsystem implemented here is the extension runtime: dynamic
//! loading of independently built modules, a capability-typed contract, a
//! hook-based lifecycle interception registry, and a persistent per-module
//! configuration store. Transport, cluster clients and delivery executors
//! live in separate services that consume this crate's [`plugin`] surface.

pub mod config;
pub mod plugin;

pub use config::RuntimeConfig;

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::config::RuntimeConfig;
    pub use crate::plugin::{
        ConfigPatch, ConfigStore, HookPhase, HookRegistry, PluginCatalog, PluginConfig,
        PluginError, PluginLoader, PluginManager, PluginSummary, Result, SharedPlugin,
    };
    pub use kedge_plugin_sdk::{
        CapabilityPlugin, CapabilityProfile, Plugin, PluginCapability, PluginInfo, PluginStatus,
        PluginType,
    };
}
