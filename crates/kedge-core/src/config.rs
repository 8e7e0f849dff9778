//! Runtime settings for the extension subsystem.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for the plugin runtime, usually deserialized from the host
/// process configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Directory under which relative module paths resolve.
    #[serde(default = "default_plugin_dir")]
    pub plugin_dir: PathBuf,

    /// Directory holding one configuration record per module id.
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// Upper bound, in seconds, on a single `init`/`start`/`stop` call.
    #[serde(default = "default_lifecycle_timeout_secs")]
    pub lifecycle_timeout_secs: u64,
}

fn default_plugin_dir() -> PathBuf {
    PathBuf::from("plugins")
}

fn default_config_dir() -> PathBuf {
    PathBuf::from("configs/plugins")
}

fn default_lifecycle_timeout_secs() -> u64 {
    30
}

impl RuntimeConfig {
    /// Lifecycle call bound as a [`Duration`].
    pub fn lifecycle_timeout(&self) -> Duration {
        Duration::from_secs(self.lifecycle_timeout_secs)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            plugin_dir: default_plugin_dir(),
            config_dir: default_config_dir(),
            lifecycle_timeout_secs: default_lifecycle_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.plugin_dir, PathBuf::from("plugins"));
        assert_eq!(config.config_dir, PathBuf::from("configs/plugins"));
        assert_eq!(config.lifecycle_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_default_matches_empty_document() {
        let from_empty: RuntimeConfig = serde_json::from_str("{}").unwrap();
        let default = RuntimeConfig::default();
        assert_eq!(default.plugin_dir, from_empty.plugin_dir);
        assert_eq!(default.config_dir, from_empty.config_dir);
        assert_eq!(
            default.lifecycle_timeout_secs,
            from_empty.lifecycle_timeout_secs
        );
    }

    #[test]
    fn test_explicit_values_win() {
        let config: RuntimeConfig =
            serde_json::from_str(r#"{"plugin_dir": "/opt/kedge/plugins", "lifecycle_timeout_secs": 5}"#)
                .unwrap();
        assert_eq!(config.plugin_dir, PathBuf::from("/opt/kedge/plugins"));
        assert_eq!(config.lifecycle_timeout(), Duration::from_secs(5));
    }
}
