//! Bootstrap configuration loading
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Command-line and environment values both arrive through
//! [`ConfigOverrides`]; this module handles the TOML layer and defaults.
//! A missing default config file is not an error: the service logs a warning
//! and starts with compiled defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "HIFI_SHIM_CONFIG";

/// Which device adapter the process drives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// HifiBerry AudioControl REST API
    #[default]
    HifiBerry,
    /// In-memory device, for development and tests
    Mock,
}

impl std::str::FromStr for DeviceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "hifiberry" => Ok(DeviceKind::HifiBerry),
            "mock" => Ok(DeviceKind::Mock),
            other => Err(Error::Config(format!("Unknown device kind: {}", other))),
        }
    }
}

/// Device section of the TOML file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub kind: DeviceKind,

    /// Base URL of the vendor API (HifiBerry only)
    pub base_url: String,

    /// Connect timeout for device requests, in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            kind: DeviceKind::default(),
            base_url: default_base_url(),
            connect_timeout_ms: 5000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Bootstrap configuration loaded from TOML
///
/// These settings cannot change while the service runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// HTTP/WebSocket listen port
    pub port: u16,

    /// Listen address
    pub bind_address: String,

    pub device: DeviceConfig,

    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: "0.0.0.0".to_string(),
            device: DeviceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_port() -> u16 {
    3000
}

fn default_base_url() -> String {
    "http://localhost:81".to_string()
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub bind_address: Option<String>,
    pub device_kind: Option<DeviceKind>,
    pub device_url: Option<String>,
    pub log_level: Option<String>,
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file that must exist
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Locate and load the configuration file
    ///
    /// An explicit path (argument, then [`CONFIG_ENV_VAR`]) must exist.
    /// Otherwise the platform default location is tried, and compiled
    /// defaults are used when nothing is found there.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::load(Path::new(&path));
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            Some(path) => {
                warn!(
                    "No config file at {}, using built-in defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            None => {
                warn!("Could not determine config directory, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Apply command-line/environment values on top of the file values
    pub fn apply_overrides(mut self, overrides: ConfigOverrides) -> Result<Self> {
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(addr) = overrides.bind_address {
            self.bind_address = addr;
        }
        if let Some(kind) = overrides.device_kind {
            self.device.kind = kind;
        }
        if let Some(url) = overrides.device_url {
            self.device.base_url = url;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.device.kind == DeviceKind::HifiBerry
            && !(self.device.base_url.starts_with("http://")
                || self.device.base_url.starts_with("https://"))
        {
            return Err(Error::Config(format!(
                "device.base_url must be an http(s) URL, got '{}'",
                self.device.base_url
            )));
        }
        if self.bind_address.trim().is_empty() {
            return Err(Error::Config("bind_address must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Platform default config file: `<config_dir>/hifi-shim/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("hifi-shim").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.device.kind, DeviceKind::HifiBerry);
        assert_eq!(config.device.base_url, "http://localhost:81");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = TomlConfig::from_toml_str("port = 8080\n").unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.device, DeviceConfig::default());
    }

    #[test]
    fn test_device_section() {
        let config = TomlConfig::from_toml_str(
            r#"
            [device]
            kind = "mock"
            base_url = "http://hifiberry.local"
            "#,
        )
        .unwrap();
        assert_eq!(config.device.kind, DeviceKind::Mock);
        assert_eq!(config.device.base_url, "http://hifiberry.local");
        assert_eq!(config.device.connect_timeout_ms, 5000);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(TomlConfig::from_toml_str("port = \"abc\"").is_err());
        assert!(TomlConfig::from_toml_str("[device]\nkind = \"sonos\"").is_err());
        assert!(TomlConfig::from_toml_str("[device]\nbase_url = \"hifiberry.local\"").is_err());
    }

    #[test]
    fn test_overrides_win() {
        let config = TomlConfig::from_toml_str("port = 8080\n")
            .unwrap()
            .apply_overrides(ConfigOverrides {
                port: Some(9000),
                device_kind: Some(DeviceKind::Mock),
                log_level: Some("debug".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.device.kind, DeviceKind::Mock);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.bind_address, "0.0.0.0");
    }

    #[test]
    fn test_device_kind_from_str() {
        assert_eq!("HifiBerry".parse::<DeviceKind>().unwrap(), DeviceKind::HifiBerry);
        assert_eq!("mock".parse::<DeviceKind>().unwrap(), DeviceKind::Mock);
        assert!("sonos".parse::<DeviceKind>().is_err());
    }
}
