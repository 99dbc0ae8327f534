//! Link configuration
//!
//! Sources, lowest to highest priority:
//! 1. Built-in defaults
//! 2. Optional config file (TOML, YAML or JSON by extension)
//! 3. `AURORA_` prefixed environment variables (e.g. `AURORA_URI`)

use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BAUD_RATE, DEFAULT_PROGRESS_INTERVAL_SECS, DEFAULT_READ_RETRIES, DEFAULT_TIMEOUT_MS,
    DEFAULT_UNIT_ID,
};
use crate::error::{AbcError, Result};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "AURORA_";

/// Connection and transaction settings for one ABC link
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AbcConfig {
    /// Serial device path, or `tcp://host:port` for a network bridge
    pub uri: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    /// "even", "odd" or "none"
    pub parity: String,
    /// Modbus slave address of the ABC
    pub unit_id: u8,
    /// Per-attempt response deadline
    pub timeout_ms: u64,
    pub connect_timeout_ms: u64,
    /// Extra attempts for reads that time out; writes are never retried
    pub read_retries: u32,
    pub progress_interval_secs: u64,
}

impl Default for AbcConfig {
    fn default() -> Self {
        Self {
            uri: "/dev/ttyUSB0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: 8,
            stop_bits: 1,
            parity: "even".to_string(),
            unit_id: DEFAULT_UNIT_ID,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            connect_timeout_ms: 5_000,
            read_retries: DEFAULT_READ_RETRIES,
            progress_interval_secs: DEFAULT_PROGRESS_INTERVAL_SECS,
        }
    }
}

impl AbcConfig {
    /// Load from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(AbcConfig::default()));

        if let Some(path) = path {
            figment = match path.extension().and_then(|s| s.to_str()) {
                Some("toml") => figment.merge(Toml::file(path)),
                Some("yaml") | Some("yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                other => {
                    return Err(AbcError::config(format!(
                        "Unsupported config file format: {}",
                        other.unwrap_or("<none>")
                    )))
                }
            };
        }

        let config: AbcConfig = figment
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(|e| AbcError::config(format!("Failed to load configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.uri.trim().is_empty() {
            return Err(AbcError::config("uri must not be empty"));
        }
        if self.unit_id == 0 || self.unit_id > 247 {
            return Err(AbcError::config(format!(
                "unit_id {} outside 1..=247",
                self.unit_id
            )));
        }
        if self.timeout_ms == 0 {
            return Err(AbcError::config("timeout_ms must be positive"));
        }
        if self.baud_rate == 0 {
            return Err(AbcError::config("baud_rate must be positive"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = AbcConfig::default();
        config.validate().unwrap();
        assert_eq!(config.baud_rate, 19_200);
        assert_eq!(config.timeout(), Duration::from_secs(15));
        assert_eq!(config.read_retries, 2);
    }

    #[test]
    fn test_load_yaml_file_over_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "uri: tcp://192.168.1.20:2000").unwrap();
        writeln!(file, "timeout_ms: 2500").unwrap();

        let config = AbcConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.uri, "tcp://192.168.1.20:2000");
        assert_eq!(config.timeout_ms, 2500);
        assert_eq!(config.parity, "even");
    }

    #[test]
    fn test_load_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "uri = \"/dev/ttyAMA0\"").unwrap();
        writeln!(file, "progress_interval_secs = 10").unwrap();

        let config = AbcConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.uri, "/dev/ttyAMA0");
        assert_eq!(config.progress_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(matches!(
            AbcConfig::load(Some(file.path())),
            Err(AbcError::ConfigError(_))
        ));
    }

    #[test]
    fn test_validation() {
        let config = AbcConfig {
            timeout_ms: 0,
            ..AbcConfig::default()
        };
        assert!(config.validate().is_err());

        let config = AbcConfig {
            unit_id: 0,
            ..AbcConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
