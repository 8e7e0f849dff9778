//! Descriptor types shared between the host and loaded modules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Administrative status of an installed module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginStatus {
    /// Module is installed and allowed to run.
    Enabled,
    /// Module is installed but administratively disabled.
    Disabled,
    /// The last load, init or start attempt failed.
    Error,
}

impl PluginStatus {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginStatus::Enabled => "enabled",
            PluginStatus::Disabled => "disabled",
            PluginStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Static identifying metadata for an installable module.
///
/// Created by the host at install time and mutated by the host on status
/// changes; a module reports its identity fields through
/// [`Plugin::info`](crate::Plugin::info) but never mutates the installed
/// record itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Unique, stable, externally assigned identifier.
    pub id: String,

    /// Human-readable module name.
    pub name: String,

    /// Module description.
    pub description: String,

    /// Module version string.
    pub version: String,

    /// Module author.
    pub author: String,

    /// Load location: absolute, or relative to the host's module root.
    pub path: String,

    /// Administrative status.
    pub status: PluginStatus,

    /// When the module was installed.
    pub created_at: DateTime<Utc>,

    /// When the record last changed.
    pub updated_at: DateTime<Utc>,
}

impl PluginInfo {
    /// Create a new descriptor with fresh timestamps.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            version: String::new(),
            author: String::new(),
            path: String::new(),
            status: PluginStatus::Disabled,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the author.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Set the load path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }
}
