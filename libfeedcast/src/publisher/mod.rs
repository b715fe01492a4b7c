//! Publishing adapters
//!
//! A [`Publisher`] posts formatted text to a social platform and can send a
//! best-effort message to an operator when something goes wrong.
//!
//! # Examples
//!
//! ```no_run
//! use libfeedcast::publisher::{Publisher, mastodon::MastodonPublisher};
//! use libfeedcast::config::MastodonConfig;
//!
//! # async fn example() -> libfeedcast::Result<()> {
//! let config = MastodonConfig {
//!     instance: "mastodon.social".to_string(),
//!     token_file: "~/.config/feedcast/mastodon.token".to_string(),
//! };
//!
//! let mut publisher = MastodonPublisher::from_config(&config)?;
//! publisher.authenticate().await?;
//!
//! let post_id = publisher.publish("Hello from feedcast").await?;
//! println!("Posted: {}", post_id);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use crate::error::Result;

pub mod mastodon;

// Mock publisher is available for all builds (not just tests) to support integration tests
pub mod mock;

/// Platform that announcements are published to
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Verify credentials with the platform
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Authentication` if the credentials are rejected
    async fn authenticate(&mut self) -> Result<()>;

    /// Publish `text` and return the platform-specific post ID
    ///
    /// # Errors
    ///
    /// Returns a `PlatformError` describing why the post was not published
    /// (validation, authentication, rate limit, network or posting failure).
    /// Rate limits are reported, not waited out.
    async fn publish(&self, text: &str) -> Result<String>;

    /// Send `text` privately to `operator`
    ///
    /// Callers treat failures as informational only.
    async fn notify(&self, operator: &str, text: &str) -> Result<()>;

    /// Lowercase platform identifier (e.g. "mastodon")
    fn name(&self) -> &str;

    /// Maximum characters per post, if the platform has a limit
    fn character_limit(&self) -> Option<usize>;
}
