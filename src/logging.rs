//! Structured logging setup.
//!
//! Every component logs through `tracing` with key/value fields
//! (`request_id`, `method`, `path`, `status`, `duration_us`, ...).
//! [`init_logging`] installs the subscriber that turns those events into
//! output: JSON lines for production, pretty text for development.
//!
//! ## Environment Variables
//!
//! - `FASTROUTE_LOG_LEVEL`: `trace`, `debug`, `info` (default), `warn`, `error`
//! - `FASTROUTE_LOG_FORMAT`: `json` (default) or `pretty`
//! - `FASTROUTE_LOG_TARGET_FILTER`: extra comma-separated directives such as
//!   `fastroute::binder=debug`
//! - `FASTROUTE_LOG_INCLUDE_LOCATION`: `true` to add file and line

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Log format: JSON for production, pretty-print for development
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl LogFormat {
    /// Unknown values fall back to JSON.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// trace/debug/info/warn/error
    pub level: String,
    pub format: LogFormat,
    /// Extra filter directives, comma-separated
    pub target_filter: Option<String>,
    /// Include file:line location (dev only)
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            target_filter: None,
            include_location: false,
        }
    }
}

impl LogConfig {
    /// Defaults overridden by `FASTROUTE_LOG_*` variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_overrides_from(|key| env::var(key).ok())
    }

    /// Apply `FASTROUTE_LOG_*` overrides read through `lookup`.
    #[must_use]
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("FASTROUTE_LOG_LEVEL") {
            self.level = level;
        }
        if let Some(format) = lookup("FASTROUTE_LOG_FORMAT") {
            self.format = LogFormat::parse(&format);
        }
        if let Some(filter) = lookup("FASTROUTE_LOG_TARGET_FILTER") {
            self.target_filter = Some(filter);
        }
        if let Some(flag) = lookup("FASTROUTE_LOG_INCLUDE_LOCATION").and_then(|s| s.parse().ok()) {
            self.include_location = flag;
        }
        self
    }

    /// The `EnvFilter` this configuration describes.
    ///
    /// Invalid extra directives are skipped with a warning on stderr; an
    /// invalid base level is an error.
    pub fn env_filter(&self) -> Result<EnvFilter> {
        let mut filter = EnvFilter::try_new(&self.level)
            .with_context(|| format!("invalid log level '{}'", self.level))?;
        if let Some(target_filter) = &self.target_filter {
            for directive in target_filter.split(',').map(str::trim) {
                if directive.is_empty() {
                    continue;
                }
                match directive.parse() {
                    Ok(d) => filter = filter.add_directive(d),
                    Err(_) => eprintln!("Warning: Invalid log filter directive: {directive}"),
                }
            }
        }
        Ok(filter)
    }
}

/// Install the global subscriber.
///
/// Fails when the configuration is invalid or a global subscriber is
/// already installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = config.env_filter()?;

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("PRETTY"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("xml"), LogFormat::Json);
    }

    #[test]
    fn test_overrides_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("FASTROUTE_LOG_LEVEL", "debug"),
            ("FASTROUTE_LOG_FORMAT", "pretty"),
            ("FASTROUTE_LOG_INCLUDE_LOCATION", "true"),
        ]
        .into_iter()
        .collect();
        let config =
            LogConfig::default().with_overrides_from(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.include_location);
        assert_eq!(config.target_filter, None);
    }

    #[test]
    fn test_env_filter_skips_bad_directives() {
        let config = LogConfig {
            target_filter: Some("fastroute::router=debug, ,[[bad".to_string()),
            ..LogConfig::default()
        };
        assert!(config.env_filter().is_ok());
    }
}
