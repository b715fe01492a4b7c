//! Mock publisher for testing
//!
//! A configurable publisher that can simulate successes, failures and
//! delays, and records everything it was asked to publish. Clones share
//! their counters and recordings, so a test can keep a handle while the
//! bot owns the publisher.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{PlatformError, Result};
use crate::publisher::Publisher;

/// Configuration for mock publisher behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Platform name
    pub name: String,

    /// Whether authentication should succeed
    pub auth_succeeds: bool,

    /// Whether publishing should succeed
    pub post_succeeds: bool,

    /// Whether operator notifications should succeed
    pub notify_succeeds: bool,

    /// Error returned on publishing failure
    pub post_error: Option<PlatformError>,

    /// Delay before completing a publish (simulates network latency)
    pub delay: Duration,

    /// Character limit for validation
    pub character_limit: Option<usize>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            auth_succeeds: true,
            post_succeeds: true,
            notify_succeeds: true,
            post_error: None,
            delay: Duration::from_millis(0),
            character_limit: None,
        }
    }
}

/// Mock publisher for testing
#[derive(Debug, Clone, Default)]
pub struct MockPublisher {
    config: MockConfig,
    /// Number of upcoming publishes that fail regardless of `post_succeeds`
    failures_remaining: Arc<AtomicUsize>,
    auth_call_count: Arc<AtomicUsize>,
    post_call_count: Arc<AtomicUsize>,
    posted_content: Arc<Mutex<Vec<String>>>,
    notifications: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockPublisher {
    /// Create a new mock publisher with the given configuration
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Create a mock publisher that always succeeds
    pub fn success() -> Self {
        Self::new(MockConfig::default())
    }

    /// Create a mock publisher whose publishes always fail with `error`
    pub fn post_failure(error: PlatformError) -> Self {
        Self::new(MockConfig {
            post_succeeds: false,
            post_error: Some(error),
            ..Default::default()
        })
    }

    /// Create a mock publisher that rejects its credentials
    pub fn auth_failure() -> Self {
        Self::new(MockConfig {
            auth_succeeds: false,
            ..Default::default()
        })
    }

    /// Create a mock publisher whose operator notifications fail
    pub fn notify_failure() -> Self {
        Self::new(MockConfig {
            notify_succeeds: false,
            ..Default::default()
        })
    }

    /// Create a mock publisher with a delay on every publish
    pub fn with_delay(delay: Duration) -> Self {
        Self::new(MockConfig {
            delay,
            ..Default::default()
        })
    }

    /// Fail the next `count` publishes, then behave as configured
    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Get the number of times authenticate was called
    pub fn auth_call_count(&self) -> usize {
        self.auth_call_count.load(Ordering::SeqCst)
    }

    /// Get the number of times publish was called
    pub fn post_call_count(&self) -> usize {
        self.post_call_count.load(Ordering::SeqCst)
    }

    /// Get every text that was published successfully
    pub fn posted_content(&self) -> Vec<String> {
        self.posted_content
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    /// Get every (operator, text) notification that was delivered
    pub fn notifications(&self) -> Vec<(String, String)> {
        self.notifications
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }

    fn take_forced_failure(&self) -> bool {
        self.failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn post_error(&self) -> PlatformError {
        self.config
            .post_error
            .clone()
            .unwrap_or_else(|| PlatformError::Posting("Mock posting failed".to_string()))
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    async fn authenticate(&mut self) -> Result<()> {
        self.auth_call_count.fetch_add(1, Ordering::SeqCst);

        if self.config.auth_succeeds {
            Ok(())
        } else {
            Err(PlatformError::Authentication("Mock authentication failed".to_string()).into())
        }
    }

    async fn publish(&self, text: &str) -> Result<String> {
        let call = self.post_call_count.fetch_add(1, Ordering::SeqCst) + 1;

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        if self.take_forced_failure() || !self.config.post_succeeds {
            return Err(self.post_error().into());
        }

        if let Some(limit) = self.config.character_limit {
            let count = text.chars().count();
            if count > limit {
                return Err(PlatformError::Validation(format!(
                    "Content exceeds {} character limit (current: {} characters)",
                    limit, count
                ))
                .into());
            }
        }

        if let Ok(mut posted) = self.posted_content.lock() {
            posted.push(text.to_string());
        }

        Ok(format!("{}-post-{}", self.config.name, call))
    }

    async fn notify(&self, operator: &str, text: &str) -> Result<()> {
        if !self.config.notify_succeeds {
            return Err(PlatformError::Network("Mock notification failed".to_string()).into());
        }

        if let Ok(mut notifications) = self.notifications.lock() {
            notifications.push((operator.to_string(), text.to_string()));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn character_limit(&self) -> Option<usize> {
        self.config.character_limit
    }
}
