//! TabVolume configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::coordinator::CoordinatorConfig;
use crate::delivery::DeliveryConfig;

/// Main TabVolume configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level when `--log-level` is not given
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Coordinator identity and channel sizes
    pub coordinator: CoordinatorConfig,

    /// Page command delivery and retry
    pub delivery: DeliveryConfig,

    /// Storage configuration
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .tabvolume.yml
        let local_config = PathBuf::from(".tabvolume.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/tabvolume/tabvolume.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("tabvolume").join("tabvolume.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file
    #[serde(rename = "db-path")]
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tabvolume")
            .join("volumes.db");
        Self { db_path }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.log_level, None);
        assert!(config.coordinator.extension_id.is_empty());
        assert_eq!(config.delivery.max_attempts, 3);
        assert!(config.storage.db_path.ends_with("tabvolume/volumes.db"));
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
log-level: debug

coordinator:
  extension-id: abcdefghijklmnopabcdefghijklmnop
  channel-buffer: 32

delivery:
  sweep-interval-ms: 500
  max-pending: 4

storage:
  db-path: /tmp/volumes.db
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.coordinator.extension_id, "abcdefghijklmnopabcdefghijklmnop");
        assert_eq!(config.coordinator.channel_buffer, 32);
        assert_eq!(config.coordinator.event_buffer, 64);
        assert_eq!(config.delivery.sweep_interval_ms, 500);
        assert_eq!(config.delivery.max_pending, 4);
        assert_eq!(config.delivery.expiry_ms, 60_000);
        assert_eq!(config.storage.db_path, PathBuf::from("/tmp/volumes.db"));
    }

    #[test]
    fn test_load_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "delivery:\n  settle-delay-ms: 250").unwrap();

        let config = Config::load(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(config.delivery.settle_delay_ms, 250);
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let path = PathBuf::from("/definitely/not/here/tabvolume.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config, back);
    }
}
