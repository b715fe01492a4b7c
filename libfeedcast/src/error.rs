//! Error types for Feedcast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FeedcastError>;

#[derive(Error, Debug)]
pub enum FeedcastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Title store error: {0}")]
    Store(#[from] StoreError),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Publishing failed after the title was already recorded
    #[error("Publishing '{title}' failed: {source}")]
    Publish {
        title: String,
        body: String,
        #[source]
        source: PlatformError,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// How the run loop reacts to an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Log, wait a short fixed delay and start the next cycle
    Retryable,
    /// The entry is spent: log, notify operators and keep running
    NotifyAndContinue,
    /// Stop the bot; continuing could post duplicates
    Fatal,
}

impl FeedcastError {
    /// Classify this error for the run loop
    pub fn severity(&self) -> Severity {
        match self {
            FeedcastError::Feed(_) => Severity::Retryable,
            FeedcastError::Publish { .. } => Severity::NotifyAndContinue,
            FeedcastError::Config(_)
            | FeedcastError::Store(_)
            | FeedcastError::Platform(_)
            | FeedcastError::InvalidInput(_) => Severity::Fatal,
        }
    }

    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            FeedcastError::Config(_) | FeedcastError::InvalidInput(_) => 3,
            // Only raised while validating the configured feed URL
            FeedcastError::Feed(FeedError::InvalidUrl(_)) => 3,
            FeedcastError::Platform(PlatformError::Authentication(_)) => 2,
            FeedcastError::Platform(_) => 1,
            FeedcastError::Publish { .. } => 1,
            FeedcastError::Store(_) => 1,
            FeedcastError::Feed(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open title store {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read title store {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to append to title store {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Title store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug, Clone)]
pub enum FeedError {
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to fetch feed: {0}")]
    Fetch(String),

    #[error("HTTP error: {0}")]
    Status(u16),

    #[error("Feed too large: {size} bytes (max {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("Failed to parse feed: {0}")]
    Parse(String),
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),
}
