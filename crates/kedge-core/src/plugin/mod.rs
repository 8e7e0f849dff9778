//! Plugin runtime for Kedge.
//!
//! This module turns installable extension modules into running in-process
//! instances and keeps user intent about them durable across restarts.
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │                   PluginManager                    │
//! │   install / uninstall / enable / disable / list    │
//! └───────────────────────────────────────────────────┘
//!        │                 │                  │
//!        ▼                 ▼                  ▼
//! ┌──────────────┐  ┌──────────────┐  ┌───────────────┐
//! │ HookRegistry │  │ ConfigStore  │  │ PluginCatalog │
//! │ before/after │  │ per-module   │  │ persisted     │
//! │ interception │  │ settings     │  │ descriptors   │
//! └──────────────┘  └──────────────┘  └───────────────┘
//!        │
//!        ▼
//! ┌──────────────┐
//! │ PluginLoader │  dlopen, contract checks, instance table
//! └──────────────┘
//! ```
//!
//! All components are safe for concurrent use from multiple request
//! handlers and are wired together by explicit construction; there is no
//! process-wide state.

use std::time::Duration;

use kedge_plugin_sdk::LifecycleError;

pub mod catalog;
pub mod config_store;
pub mod hooks;
pub mod loader;
pub mod manager;

pub use catalog::PluginCatalog;
pub use config_store::{ConfigStore, PluginConfig};
pub use hooks::{register_dependency_gate, register_tracing_hooks, HookFn, HookPhase, HookRegistry};
pub use loader::{PluginCell, PluginLoader, SharedPlugin};
pub use manager::{ConfigPatch, PluginManager, PluginSummary};

/// Result type for plugin runtime operations.
pub type Result<T> = std::result::Result<T, PluginError>;

/// Plugin runtime error taxonomy.
///
/// Loader and hook registry errors are wrapped with operation context and
/// surface unmodified through the manager; nothing is retried
/// automatically.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// The module library could not be located or loaded.
    #[error("failed to open module library {path}: {source}")]
    OpenFailure {
        path: std::path::PathBuf,
        #[source]
        source: libloading::Error,
    },

    /// A required export is missing from the loaded library.
    #[error("module library {path} does not export `{symbol}`: {source}")]
    SymbolNotFound {
        path: std::path::PathBuf,
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },

    /// The loaded unit does not satisfy the plugin contract.
    #[error("module at {path} does not satisfy the plugin contract: {reason}")]
    InterfaceMismatch {
        path: std::path::PathBuf,
        reason: String,
    },

    /// `init` failed; the instance was not registered.
    #[error("module {id} failed to initialize: {source}")]
    InitFailure {
        id: String,
        #[source]
        source: CallError,
    },

    /// `start` failed.
    #[error("module {id} failed to start: {source}")]
    StartFailure {
        id: String,
        #[source]
        source: CallError,
    },

    /// `stop` failed.
    #[error("module {id} failed to stop: {source}")]
    StopFailure {
        id: String,
        #[source]
        source: CallError,
    },

    /// No live instance exists for the module id.
    #[error("module not loaded: {0}")]
    NotLoaded(String),

    /// No persisted record exists for the module id.
    #[error("no configuration record for module {0}")]
    ConfigNotFound(String),

    /// The configuration store could not read or write a record.
    #[error("configuration store i/o failure at {path}: {source}")]
    ConfigIo {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration record could not be encoded or decoded.
    #[error("configuration record {path} is not valid: {source}")]
    ConfigParse {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Other error; the usual carrier for ad-hoc hook failures.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// How a bounded lifecycle invocation failed.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// The module itself reported a failure.
    #[error(transparent)]
    Module(#[from] LifecycleError),

    /// The call exceeded the configured bound and was abandoned.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The module panicked during the call.
    #[error("panicked during the call")]
    Panicked,
}

/// Lifecycle methods a bounded call can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LifecyclePhase {
    Init,
    Start,
    Stop,
}

/// Run one lifecycle method on a blocking worker, bounded by `timeout`.
///
/// A module that hangs past the bound leaves its worker thread behind; the
/// call itself returns [`CallError::Timeout`] so the invoking request is
/// never blocked indefinitely.
pub(crate) async fn call_lifecycle(
    instance: SharedPlugin,
    phase: LifecyclePhase,
    timeout: Duration,
) -> std::result::Result<(), CallError> {
    let task = tokio::task::spawn_blocking(move || match phase {
        LifecyclePhase::Init => instance.call_init(),
        LifecyclePhase::Start => instance.call_start(),
        LifecyclePhase::Stop => instance.call_stop(),
    });

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result.map_err(CallError::Module),
        Ok(Err(_join)) => Err(CallError::Panicked),
        Err(_elapsed) => Err(CallError::Timeout(timeout)),
    }
}
