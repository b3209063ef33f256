//! # Service Configuration
//!
//! [`AppConfig`] is read from YAML and then overridden from the environment.
//! Every field has a default, so an empty file (or no file) is valid.
//!
//! ```yaml
//! service_name: inventory
//! max_body_bytes: 0x100000
//! allow_header: true
//! log:
//!   level: debug
//!   format: pretty
//! ```
//!
//! ## Environment Variables
//!
//! - `FASTROUTE_SERVICE_NAME`
//! - `FASTROUTE_MAX_BODY_BYTES`: decimal (`1048576`) or hexadecimal (`0x100000`);
//!   `0` disables the limit
//! - `FASTROUTE_LOG_*`: see [`crate::logging`]

use crate::logging::LogConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::env;
use std::path::Path;

/// Request bodies above this size are answered with 413.
pub const DEFAULT_MAX_BODY_BYTES: usize = 0x10_0000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    /// Largest accepted request body; 0 means unlimited
    #[serde(deserialize_with = "deserialize_size")]
    pub max_body_bytes: usize,
    /// Whether 405 responses list the permitted methods in `Allow`
    pub allow_header: bool,
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: "fastroute".to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            allow_header: true,
            log: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from a YAML file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = Self::from_yaml(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.apply_overrides_from(|key| env::var(key).ok())
    }

    /// Parse YAML without consulting the environment. Empty input yields
    /// the defaults.
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).context("invalid configuration YAML")
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<Self> {
        Self::default().apply_overrides_from(|key| env::var(key).ok())
    }

    /// Apply `FASTROUTE_*` overrides read through `lookup`.
    pub fn apply_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup("FASTROUTE_SERVICE_NAME") {
            self.service_name = name;
        }
        if let Some(raw) = lookup("FASTROUTE_MAX_BODY_BYTES") {
            self.max_body_bytes = parse_size(&raw)
                .with_context(|| format!("invalid FASTROUTE_MAX_BODY_BYTES '{raw}'"))?;
        }
        self.log = self.log.with_overrides_from(&lookup);
        Ok(self)
    }
}

/// Parse a byte count written in decimal or with a `0x` prefix.
pub fn parse_size(raw: &str) -> Result<usize> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).context("not a hexadecimal size"),
        None => raw.parse().context("not a decimal size"),
    }
}

fn deserialize_size<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Number(usize),
        Text(String),
    }

    match Size::deserialize(deserializer)? {
        Size::Number(n) => Ok(n),
        Size::Text(s) => parse_size(&s).map_err(|e| serde::de::Error::custom(format!("{e:#}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogFormat;

    #[test]
    fn test_parse_size_decimal_and_hex() {
        assert_eq!(parse_size("4096").unwrap(), 4096);
        assert_eq!(parse_size("0x1000").unwrap(), 4096);
        assert_eq!(parse_size(" 0X10 ").unwrap(), 16);
        assert!(parse_size("lots").is_err());
    }

    #[test]
    fn test_yaml_partial_uses_defaults() {
        let config = AppConfig::from_yaml("service_name: inventory\n").unwrap();
        assert_eq!(config.service_name, "inventory");
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert!(config.allow_header);
        assert_eq!(config.log, LogConfig::default());
    }

    #[test]
    fn test_yaml_hex_body_limit_and_log() {
        let yaml = "max_body_bytes: \"0x400\"\nallow_header: false\nlog:\n  format: pretty\n";
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.max_body_bytes, 1024);
        assert!(!config.allow_header);
        assert_eq!(config.log.format, LogFormat::Pretty);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(AppConfig::from_yaml("  \n").unwrap(), AppConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let config = AppConfig::default()
            .apply_overrides_from(|key| match key {
                "FASTROUTE_MAX_BODY_BYTES" => Some("0x20".to_string()),
                "FASTROUTE_SERVICE_NAME" => Some("orders".to_string()),
                "FASTROUTE_LOG_LEVEL" => Some("warn".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.max_body_bytes, 32);
        assert_eq!(config.service_name, "orders");
        assert_eq!(config.log.level, "warn");
    }

    #[test]
    fn test_bad_env_size_is_error() {
        let err = AppConfig::default()
            .apply_overrides_from(|key| {
                (key == "FASTROUTE_MAX_BODY_BYTES").then(|| "big".to_string())
            })
            .unwrap_err();
        assert!(err.to_string().contains("FASTROUTE_MAX_BODY_BYTES"));
    }
}
