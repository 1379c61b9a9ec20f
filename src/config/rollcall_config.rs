//! Rollcall Configuration - broker, storage and delivery settings as TOML values
//!
//! Each section implements `Default` with the values in [`super::defaults`],
//! so a deployment with no config file behaves exactly like the stock
//! reader setup (local broker, CSV files in the working directory).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::defaults;

/// Environment variable naming a config file to load.
pub const CONFIG_ENV_VAR: &str = "ROLLCALL_CONFIG";

/// Config file looked up in the working directory when no path is given.
pub const LOCAL_CONFIG_FILE: &str = "rollcall.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one reader station.
///
/// Load with `RollcallConfig::load()` which searches:
/// 1. `$ROLLCALL_CONFIG` env var
/// 2. `./rollcall.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollcallConfig {
    /// MQTT broker connection and topics
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Data file locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Remote endpoint, probe and sync cadence
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Scan payload decoding
    #[serde(default)]
    pub scan: ScanConfig,
}

impl RollcallConfig {
    /// Load configuration using the standard search order:
    /// 1. `$ROLLCALL_CONFIG` environment variable
    /// 2. `./rollcall.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from ROLLCALL_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from ROLLCALL_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "ROLLCALL_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./rollcall.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./rollcall.toml, using defaults");
                }
            }
        }

        info!("No rollcall.toml found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Check every field that would make the bridge misbehave at runtime.
    ///
    /// All problems are collected so the operator sees them in one pass.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.broker.host.trim().is_empty() {
            errors.push("broker.host must not be empty".to_string());
        }
        if self.broker.port == 0 {
            errors.push("broker.port must be non-zero".to_string());
        }
        if self.broker.client_id.trim().is_empty() {
            errors.push("broker.client_id must not be empty".to_string());
        }
        if self.broker.scan_topic.trim().is_empty() {
            errors.push("broker.scan_topic must not be empty".to_string());
        }
        if self.broker.response_topic.trim().is_empty() {
            errors.push("broker.response_topic must not be empty".to_string());
        }
        if self.broker.keep_alive_secs < 5 {
            errors.push(format!(
                "broker.keep_alive_secs must be at least 5 (got {})",
                self.broker.keep_alive_secs
            ));
        }
        if self.broker.connect_timeout_secs == 0 {
            errors.push("broker.connect_timeout_secs must be non-zero".to_string());
        }

        for (key, value) in [
            ("storage.roster_file", &self.storage.roster_file),
            ("storage.unknown_file", &self.storage.unknown_file),
            ("storage.pending_file", &self.storage.pending_file),
            ("storage.attendance_prefix", &self.storage.attendance_prefix),
        ] {
            if value.trim().is_empty() {
                errors.push(format!("{key} must not be empty"));
            }
        }

        for (key, value) in [
            ("delivery.endpoint_url", &self.delivery.endpoint_url),
            ("delivery.probe_url", &self.delivery.probe_url),
        ] {
            if let Err(e) = reqwest::Url::parse(value) {
                errors.push(format!("{key} is not a valid URL ({value}): {e}"));
            }
        }
        if self.delivery.probe_timeout_secs == 0 {
            errors.push("delivery.probe_timeout_secs must be non-zero".to_string());
        }
        if self.delivery.request_timeout_secs == 0 {
            errors.push("delivery.request_timeout_secs must be non-zero".to_string());
        }
        if self.delivery.sync_interval_secs == 0 {
            errors.push("delivery.sync_interval_secs must be non-zero".to_string());
        }

        if self.scan.max_uid_len == 0 {
            errors.push("scan.max_uid_len must be non-zero".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

/// MQTT broker connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive_secs: u64,
    /// Topic the readers publish raw UIDs on
    pub scan_topic: String,
    /// Topic lookup results are published on
    pub response_topic: String,
    pub connect_timeout_secs: u64,
    pub reconnect_delay_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: defaults::BROKER_HOST.to_string(),
            port: defaults::BROKER_PORT,
            client_id: defaults::BROKER_CLIENT_ID.to_string(),
            keep_alive_secs: defaults::BROKER_KEEP_ALIVE_SECS,
            scan_topic: defaults::SCAN_TOPIC.to_string(),
            response_topic: defaults::RESPONSE_TOPIC.to_string(),
            connect_timeout_secs: defaults::BROKER_CONNECT_TIMEOUT_SECS,
            reconnect_delay_secs: defaults::BROKER_RECONNECT_DELAY_SECS,
        }
    }
}

/// Data file locations. Relative file names resolve against `data_dir`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub roster_file: String,
    pub unknown_file: String,
    pub pending_file: String,
    pub attendance_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(defaults::DATA_DIR),
            roster_file: defaults::ROSTER_FILE.to_string(),
            unknown_file: defaults::UNKNOWN_FILE.to_string(),
            pending_file: defaults::PENDING_FILE.to_string(),
            attendance_prefix: defaults::ATTENDANCE_PREFIX.to_string(),
        }
    }
}

impl StorageConfig {
    pub fn roster_path(&self) -> PathBuf {
        self.data_dir.join(&self.roster_file)
    }

    pub fn unknown_path(&self) -> PathBuf {
        self.data_dir.join(&self.unknown_file)
    }

    pub fn pending_path(&self) -> PathBuf {
        self.data_dir.join(&self.pending_file)
    }
}

/// Remote endpoint, connectivity probe and sync cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub endpoint_url: String,
    pub probe_url: String,
    pub probe_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub sync_interval_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            endpoint_url: defaults::ENDPOINT_URL.to_string(),
            probe_url: defaults::PROBE_URL.to_string(),
            probe_timeout_secs: defaults::PROBE_TIMEOUT_SECS,
            request_timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
            sync_interval_secs: defaults::SYNC_INTERVAL_SECS,
        }
    }
}

impl DeliveryConfig {
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub const fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }
}

/// Scan payload decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Payload bytes beyond this bound are dropped
    pub max_uid_len: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_uid_len: defaults::MAX_UID_LEN,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, std::io::Error),
    #[error("Config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, toml::de::Error),
    #[error("Config serialization error: {0}")]
    Serialize(toml::ser::Error),
    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RollcallConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.broker.scan_topic, "rfid/uid");
        assert_eq!(config.broker.response_topic, "rfid/response");
        assert_eq!(config.delivery.sync_interval(), Duration::from_secs(30));
        assert_eq!(config.scan.max_uid_len, 63);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml_str = r#"
[broker]
host = "10.0.0.5"

[storage]
data_dir = "/var/lib/rollcall"
"#;
        let config: RollcallConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.broker.host, "10.0.0.5");
        assert_eq!(config.broker.port, 1883);
        assert_eq!(
            config.storage.pending_path(),
            PathBuf::from("/var/lib/rollcall/pending_upload.csv")
        );
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut config = RollcallConfig::default();
        config.broker.scan_topic = String::new();
        config.delivery.sync_interval_secs = 0;
        config.delivery.endpoint_url = "not a url".to_string();

        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors.len(), 3, "{errors:?}");
                assert!(errors.iter().any(|e| e.contains("scan_topic")));
                assert!(errors.iter().any(|e| e.contains("endpoint_url")));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_from_file_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("rollcall.toml");

        let mut config = RollcallConfig::default();
        config.broker.host = "broker.lan".to_string();
        config.delivery.sync_interval_secs = 10;
        std::fs::write(&path, config.to_toml().unwrap()).unwrap();

        let loaded = RollcallConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_from_file_rejects_invalid() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("rollcall.toml");
        std::fs::write(&path, "[scan]\nmax_uid_len = 0\n").unwrap();

        assert!(matches!(
            RollcallConfig::load_from_file(&path),
            Err(ConfigError::Validation(_))
        ));
    }
}
