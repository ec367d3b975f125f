// src/logging.rs

//! Logging setup for the command-line tool. The library itself only emits
//! `tracing` events; installing a subscriber is left to the binary.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing_subscriber::{fmt as tfmt, prelude::*, EnvFilter};

/// Log level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event
    Json,
    /// Multi-line, human-readable
    Pretty,
    /// One line per event
    #[default]
    Compact,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Directive string such as `blackbox_analysis=debug`; overrides `level`.
    pub filter: Option<String>,
    /// Include source file and line.
    pub source_location: bool,
}

impl LogConfig {
    /// Verbose preset used by `--verbose`.
    pub fn verbose() -> Self {
        Self {
            level: LogLevel::Debug,
            source_location: true,
            ..Default::default()
        }
    }

    fn env_filter(&self) -> EnvFilter {
        match &self.filter {
            Some(custom) => EnvFilter::try_new(custom).unwrap_or_else(|_| EnvFilter::new(self.level.to_string())),
            // RUST_LOG wins over the configured level.
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.to_string())),
        }
    }
}

/// Installs the global subscriber, writing to stderr so stdout stays free for
/// analysis output. Returns `false` when a subscriber was already installed;
/// the existing one stays in place.
pub fn init_logging(config: &LogConfig) -> bool {
    let filter = config.env_filter();
    let layer = tfmt::layer()
        .with_writer(std::io::stderr)
        .with_file(config.source_location)
        .with_line_number(config.source_location);

    let result = match config.format {
        LogFormat::Json => tracing_subscriber::registry().with(filter).with(layer.json()).try_init(),
        LogFormat::Pretty => tracing_subscriber::registry().with(filter).with(layer.pretty()).try_init(),
        LogFormat::Compact => tracing_subscriber::registry().with(filter).with(layer.compact()).try_init(),
    };
    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(error = %e, "Global subscriber already set; keeping it");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_display() {
        assert_eq!(LogLevel::Debug.to_string(), "debug");
        assert_eq!(LogLevel::Warn.to_string(), "warn");
    }

    #[test]
    fn test_partial_json_config() {
        let cfg: LogConfig = serde_json::from_str(r#"{"format":"json"}"#).unwrap();
        assert_eq!(cfg.format, LogFormat::Json);
        assert_eq!(cfg.level, LogLevel::Info);
        assert!(cfg.filter.is_none());
    }

    #[test]
    fn test_second_init_is_reported() {
        let config = LogConfig { level: LogLevel::Warn, ..Default::default() };
        init_logging(&config);
        assert!(!init_logging(&config));
    }

    #[test]
    fn test_verbose_preset() {
        let cfg = LogConfig::verbose();
        assert_eq!(cfg.level, LogLevel::Debug);
        assert!(cfg.source_location);
    }
}
