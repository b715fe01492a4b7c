//! Configuration management for Feedcast

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::format::{FormatConfig, MIN_LINK_WIDTH};
use crate::logging::LogFormat;

pub const DEFAULT_FEED_URL: &str = "https://aws.amazon.com/about-aws/whats-new/recent/feed/";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub store: StoreConfig,
    pub mastodon: Option<MastodonConfig>,
    #[serde(default)]
    pub format: FormatConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub url: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "~/.local/share/feedcast/titles.txt".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MastodonConfig {
    pub instance: String,
    pub token_file: String,
}

/// Wait policy of the run loop, all values in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Wait after a cycle that found nothing new
    pub idle_interval: u64,
    /// Wait after a cycle that published (or spent) an entry
    pub post_interval: u64,
    /// Wait after a failed fetch
    pub retry_delay: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            idle_interval: 300,
            post_interval: 10,
            retry_delay: 60,
        }
    }
}

impl ScheduleConfig {
    pub fn idle_interval(&self) -> Duration {
        Duration::from_secs(self.idle_interval)
    }

    pub fn post_interval(&self) -> Duration {
        Duration::from_secs(self.post_interval)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Accounts that receive a direct message when publishing fails
    #[serde(default)]
    pub operators: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub format: LogFormat,
    pub level: String,
    /// Append log lines to this file instead of stderr
    pub file: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.feed.url.trim().is_empty() {
            return Err(ConfigError::MissingField("feed.url".to_string()).into());
        }

        if self.store.path.trim().is_empty() {
            return Err(ConfigError::MissingField("store.path".to_string()).into());
        }

        if self.format.max_length == 0 {
            return Err(ConfigError::InvalidValue {
                field: "format.max_length".to_string(),
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }

        if self.format.link_width < MIN_LINK_WIDTH {
            return Err(ConfigError::InvalidValue {
                field: "format.link_width".to_string(),
                reason: format!(
                    "must be at least {} to leave room for the link and separators",
                    MIN_LINK_WIDTH
                ),
            }
            .into());
        }

        if self.format.hashtag.contains(['\n', '\r']) {
            return Err(ConfigError::InvalidValue {
                field: "format.hashtag".to_string(),
                reason: "must be a single line".to_string(),
            }
            .into());
        }

        if let Some(mastodon) = &self.mastodon {
            if mastodon.instance.trim().is_empty() {
                return Err(ConfigError::MissingField("mastodon.instance".to_string()).into());
            }
            if mastodon.token_file.trim().is_empty() {
                return Err(ConfigError::MissingField("mastodon.token_file".to_string()).into());
            }
        }

        Ok(())
    }

    /// Mastodon section, required for anything that publishes
    pub fn mastodon(&self) -> Result<&MastodonConfig> {
        self.mastodon
            .as_ref()
            .ok_or_else(|| ConfigError::MissingField("mastodon".to_string()).into())
    }

    /// Title store location with `~` and environment variables expanded
    pub fn store_path(&self) -> Result<PathBuf> {
        expand_path(&self.store.path, "store.path")
    }

    /// Log file location, if file logging is enabled
    pub fn log_file(&self) -> Result<Option<PathBuf>> {
        self.logging
            .file
            .as_deref()
            .map(|path| expand_path(path, "logging.file"))
            .transpose()
    }
}

/// Expand `~` and `$VARS` in a configured path
pub fn expand_path(path: &str, field: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path).map_err(|e| ConfigError::InvalidValue {
        field: field.to_string(),
        reason: e.to_string(),
    })?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("FEEDCAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("feedcast").join("config.toml"))
}
