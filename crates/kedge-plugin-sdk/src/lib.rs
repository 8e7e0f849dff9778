//! Kedge Plugin SDK
//!
//! This crate defines the contract between the Kedge host process and
//! dynamically loaded extension modules (.so, .dylib, .dll). It is the one
//! crate both sides link against: the host's loader resolves the exported
//! symbols declared here, and plugin authors implement the [`Plugin`] trait
//! and emit those symbols with [`export_plugin!`].
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use kedge_plugin_sdk::prelude::*;
//!
//! struct MyPlugin;
//!
//! impl Plugin for MyPlugin {
//!     fn info(&self) -> PluginInfo {
//!         PluginInfo::new("my-plugin", "My Plugin").with_version("1.0.0")
//!     }
//!     fn init(&mut self) -> LifecycleResult { Ok(()) }
//!     fn start(&mut self) -> LifecycleResult { Ok(()) }
//!     fn stop(&mut self) -> LifecycleResult { Ok(()) }
//! }
//!
//! kedge_plugin_sdk::export_plugin!(MyPlugin);
//! ```

pub mod capability;
pub mod error;
#[macro_use]
pub mod macros;
pub mod types;

pub use capability::{CapabilityPlugin, CapabilityProfile, PluginCapability, PluginType};
pub use error::{LifecycleError, LifecycleResult};
pub use types::{PluginInfo, PluginStatus};

/// Prelude module with common imports for plugin authors.
pub mod prelude {
    pub use crate::capability::{CapabilityPlugin, CapabilityProfile, PluginCapability, PluginType};
    pub use crate::error::{LifecycleError, LifecycleResult};
    pub use crate::types::{PluginInfo, PluginStatus};
    pub use crate::{Plugin, PluginHandle};
}

/// Current plugin ABI version.
///
/// The host refuses to load a module whose exported
/// [`PLUGIN_ABI_VERSION_SYMBOL`] reports a different value.
pub const PLUGIN_ABI_VERSION: u32 = 1;

/// Name of the exported ABI version function.
pub const PLUGIN_ABI_VERSION_SYMBOL: &str = "kedge_plugin_abi_version";

/// Name of the exported factory function.
pub const PLUGIN_CREATE_SYMBOL: &str = "kedge_plugin_create";

/// Name of the exported destructor function.
pub const PLUGIN_DESTROY_SYMBOL: &str = "kedge_plugin_destroy";

/// The object a plugin factory hands to the host.
pub type PluginHandle = Box<dyn Plugin>;

/// Base lifecycle contract every extension module must satisfy.
///
/// Lifecycle methods are synchronous: the host drives them from a blocking
/// worker and bounds their runtime, so implementations should do their own
/// long-running work on threads they own and tear that work down promptly
/// when [`stop`](Plugin::stop) is called.
pub trait Plugin: Send + Sync {
    /// Static identifying metadata for this module.
    fn info(&self) -> PluginInfo;

    /// Initialize the module. Called once, before `start`.
    fn init(&mut self) -> LifecycleResult;

    /// Start the module's active work.
    fn start(&mut self) -> LifecycleResult;

    /// Stop the module and release its internal work. Must be idempotent.
    fn stop(&mut self) -> LifecycleResult;

    /// Checked access to the extended capability contract.
    ///
    /// Base modules keep the default and report no category or
    /// capabilities; modules implementing [`CapabilityPlugin`] override
    /// this with `Some(self)`.
    fn as_capability(&self) -> Option<&dyn CapabilityPlugin> {
        None
    }
}
