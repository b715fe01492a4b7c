//! Centralized logging configuration for the Feedcast bot
//!
//! Provides consistent logging setup with support for:
//! - Text, JSON, and pretty-printed output
//! - Environment variable configuration
//! - Logging to stderr or to an append-only log file
//!
//! # Examples
//!
//! ```no_run
//! use libfeedcast::logging::{LoggingConfig, LogFormat};
//!
//! let config = LoggingConfig::new(LogFormat::Json, "info".to_string(), false);
//! config.init().expect("logging");
//! ```

use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text output (no colors, for piping)
    Text,
    /// Machine-parseable JSON (one JSON object per line)
    Json,
    /// Pretty-printed with colors (for development)
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!(
                "Invalid log format: '{}'. Valid options: text, json, pretty",
                s
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
            LogFormat::Pretty => write!(f, "pretty"),
        }
    }
}

/// Configuration for logging initialization
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
    pub verbose: bool,
    /// Append to this file instead of writing to stderr
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Create a new logging configuration
    ///
    /// # Arguments
    ///
    /// * `format` - Log output format (text, json, or pretty)
    /// * `level` - Minimum log level (error, warn, info, debug, trace)
    /// * `verbose` - If true, defaults to debug level
    pub fn new(format: LogFormat, level: String, verbose: bool) -> Self {
        Self {
            format,
            level,
            verbose,
            file: None,
        }
    }

    /// Send log output to a file opened in append mode
    pub fn with_file(mut self, file: Option<PathBuf>) -> Self {
        self.file = file;
        self
    }

    /// Apply `FEEDCAST_LOG_FORMAT` and `FEEDCAST_LOG_LEVEL` overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(format) = std::env::var("FEEDCAST_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.format = format;
        }
        if let Ok(level) = std::env::var("FEEDCAST_LOG_LEVEL") {
            self.level = level;
        }
        self
    }

    fn writer(&self) -> Result<BoxMakeWriter> {
        match &self.file {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(ConfigError::ReadError)?;
                }
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(ConfigError::ReadError)?;
                Ok(BoxMakeWriter::new(Mutex::new(file)))
            }
            None => Ok(BoxMakeWriter::new(std::io::stderr)),
        }
    }

    /// Initialize logging with the configured settings
    ///
    /// This should be called once at the start of your program. A second
    /// call leaves the first subscriber in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the log file cannot be opened
    pub fn init(&self) -> Result<()> {
        use tracing_subscriber::EnvFilter;

        let filter = if self.verbose {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))
        };
        let writer = self.writer()?;
        let ansi = self.file.is_none();

        // try_init: tests and embedders may already own the global subscriber
        let _ = match self.format {
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_current_span(true)
                .with_span_list(true)
                .flatten_event(true)
                .with_target(true)
                .with_line_number(true)
                .with_file(true)
                .try_init(),
            LogFormat::Pretty => tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(ansi)
                .with_target(true)
                .with_line_number(true)
                .with_file(true)
                .try_init(),
            LogFormat::Text => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(ansi)
                .with_target(false)
                .with_level(true)
                .try_init(),
        };

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_log_format_names() {
        for format in [LogFormat::Text, LogFormat::Json, LogFormat::Pretty] {
            assert_eq!(format.to_string().parse::<LogFormat>().unwrap(), format);
        }
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);

        let error = "syslog".parse::<LogFormat>().unwrap_err();
        assert!(error.contains("'syslog'"));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var("FEEDCAST_LOG_FORMAT", "json");
        std::env::set_var("FEEDCAST_LOG_LEVEL", "warn");

        let config = LoggingConfig::new(LogFormat::Text, "info".to_string(), false)
            .with_env_overrides();

        std::env::remove_var("FEEDCAST_LOG_FORMAT");
        std::env::remove_var("FEEDCAST_LOG_LEVEL");

        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, "warn");
    }

    #[test]
    #[serial]
    fn test_env_override_ignores_unknown_format() {
        std::env::set_var("FEEDCAST_LOG_FORMAT", "xml");

        let config = LoggingConfig::new(LogFormat::Pretty, "info".to_string(), false)
            .with_env_overrides();

        std::env::remove_var("FEEDCAST_LOG_FORMAT");

        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn test_logging_config_with_file() {
        let config = LoggingConfig::new(LogFormat::Text, "info".to_string(), false)
            .with_file(Some(PathBuf::from("/tmp/feedcast.log")));
        assert_eq!(config.file, Some(PathBuf::from("/tmp/feedcast.log")));
        assert!(!config.verbose);
    }

    #[test]
    fn test_file_writer_creates_parent_directory() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("logs").join("feedcast.log");

        let config = LoggingConfig::new(LogFormat::Text, "info".to_string(), false)
            .with_file(Some(path.clone()));
        config.writer().unwrap();

        assert!(path.exists());
    }
}
