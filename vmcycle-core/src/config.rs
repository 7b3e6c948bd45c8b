//! Configuration management.

use crate::error::{CycleError, Result};
use crate::facade::FacadeConfig;
use crate::harness::{DEFAULT_CLEANUP_TIMEOUT_MS, DEFAULT_TIMEOUT_MS};
use crate::paths;
use crate::plan::{DEFAULT_CYCLES, MAX_CYCLES};
use crate::types::DEFAULT_BRAND;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Persistent configuration for vmcycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Start/stop pairs per run
    pub cycles: usize,
    /// Outer timeout for a whole run
    pub timeout_ms: u64,
    /// Bound on VM cleanup after the outer timeout fires
    pub cleanup_timeout_ms: u64,
    pub brand: String,
    /// "vmadm" or "simulated"
    pub backend: String,
    pub vmadm_path: Option<PathBuf>,
    /// Default image to provision from
    pub image_uuid: Option<String>,
    pub log_level: String,
    pub simulated_latency_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cycles: DEFAULT_CYCLES,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            cleanup_timeout_ms: DEFAULT_CLEANUP_TIMEOUT_MS,
            brand: DEFAULT_BRAND.to_string(),
            backend: "vmadm".to_string(),
            vmadm_path: None,
            image_uuid: None,
            log_level: "debug".to_string(),
            simulated_latency_ms: 0,
        }
    }
}

impl Config {
    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        paths::config_path()
    }

    /// Load configuration from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| CycleError::IoError { path: path.to_path_buf(), source: e })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| CycleError::InvalidConfig {
            reason: format!("Failed to parse {}: {}", path.display(), e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CycleError::IoError { path: parent.to_path_buf(), source: e })?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| CycleError::InvalidConfig {
            reason: format!("Failed to serialize config: {}", e),
        })?;
        std::fs::write(path, content)
            .map_err(|e| CycleError::IoError { path: path.to_path_buf(), source: e })
    }

    /// Set one field from its string form, as given to `vmcycle config set`.
    ///
    /// An empty value clears the optional fields (`vmadm_path`, `image_uuid`).
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        fn number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
            value.parse().map_err(|_| CycleError::InvalidConfig {
                reason: format!("{} expects a non-negative integer, got '{}'", key, value),
            })
        }
        let optional = |value: &str| (!value.is_empty()).then(|| value.to_string());

        match key {
            "cycles" => self.cycles = number(key, value)?,
            "timeout_ms" => self.timeout_ms = number(key, value)?,
            "cleanup_timeout_ms" => self.cleanup_timeout_ms = number(key, value)?,
            "simulated_latency_ms" => self.simulated_latency_ms = number(key, value)?,
            "brand" => self.brand = value.to_string(),
            "backend" => self.backend = value.to_string(),
            "log_level" => self.log_level = value.to_string(),
            "vmadm_path" => self.vmadm_path = optional(value).map(PathBuf::from),
            "image_uuid" => self.image_uuid = optional(value),
            _ => {
                return Err(CycleError::InvalidConfig {
                    reason: format!("Unknown config key '{}'", key),
                })
            }
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(CycleError::InvalidConfig {
                reason: "timeout_ms must be greater than zero".to_string(),
            });
        }
        if self.cleanup_timeout_ms == 0 {
            return Err(CycleError::InvalidConfig {
                reason: "cleanup_timeout_ms must be greater than zero".to_string(),
            });
        }
        if self.cycles > MAX_CYCLES {
            return Err(CycleError::InvalidConfig {
                reason: format!("cycles must be at most {}, got {}", MAX_CYCLES, self.cycles),
            });
        }
        if self.brand.trim().is_empty() {
            return Err(CycleError::InvalidConfig { reason: "brand must not be empty".to_string() });
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn cleanup_timeout(&self) -> Duration {
        Duration::from_millis(self.cleanup_timeout_ms)
    }

    pub fn facade_config(&self) -> FacadeConfig {
        FacadeConfig {
            backend: self.backend.clone(),
            vmadm_path: self.vmadm_path.clone(),
            simulated_latency: Duration::from_millis(self.simulated_latency_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cycles, 10);
        assert_eq!(config.timeout_ms, 240_000);
        assert_eq!(config.brand, "joyent-minimal");
        assert_eq!(config.backend, "vmadm");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"cycles": 3, "backend": "simulated"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.cycles, 3);
        assert_eq!(config.backend, "simulated");
        assert_eq!(config.timeout_ms, 240_000);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            image_uuid: Some("01b2c898-945f-11e1-a523-af1afbe22822".to_string()),
            ..Default::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Config::load_from(&path), Err(CycleError::InvalidConfig { .. })));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = Config { timeout_ms: 0, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cycles_upper_bound() {
        let config = Config { cycles: MAX_CYCLES, ..Default::default() };
        assert!(config.validate().is_ok());

        let config = Config { cycles: MAX_CYCLES + 1, ..Default::default() };
        assert!(matches!(config.validate(), Err(CycleError::InvalidConfig { .. })));

        let config = Config { cycles: usize::MAX, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_set_fields() {
        let mut config = Config::default();
        config.set("cycles", "25").unwrap();
        config.set("backend", "simulated").unwrap();
        config.set("image_uuid", "01b2c898-945f-11e1-a523-af1afbe22822").unwrap();
        config.set("vmadm_path", "/opt/bin/vmadm").unwrap();

        assert_eq!(config.cycles, 25);
        assert_eq!(config.backend, "simulated");
        assert_eq!(config.image_uuid.as_deref(), Some("01b2c898-945f-11e1-a523-af1afbe22822"));
        assert_eq!(config.vmadm_path, Some(PathBuf::from("/opt/bin/vmadm")));

        config.set("image_uuid", "").unwrap();
        assert_eq!(config.image_uuid, None);
    }

    #[test]
    fn test_set_rejects_bad_input() {
        let mut config = Config::default();
        assert!(config.set("cycles", "many").is_err());
        assert!(config.set("timeout_ms", "0").is_err());
        assert!(config.set("colour", "blue").is_err());
        assert!(config.set("cycles", &(MAX_CYCLES + 1).to_string()).is_err());
    }

    #[test]
    fn test_set_then_save_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::load_from(&path).unwrap();
        config.set("timeout_ms", "90000").unwrap();
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap().timeout_ms, 90_000);
    }
}
