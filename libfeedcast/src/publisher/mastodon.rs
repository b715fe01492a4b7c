//! Mastodon publisher
//!
//! Publishes announcements to Mastodon and other Fediverse servers that
//! implement the Mastodon API, using the megalodon library. Operator
//! notifications are sent as direct-visibility statuses that mention the
//! operator.

use async_trait::async_trait;
use megalodon::entities::StatusVisibility;
use megalodon::megalodon::{PostStatusInputOptions, PostStatusOutput};
use megalodon::{Megalodon, SNS};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::sync::LazyLock;
use tracing::debug;

use crate::config::{expand_path, MastodonConfig};
use crate::error::{PlatformError, Result};
use crate::publisher::Publisher;

/// Limit assumed until [`MastodonPublisher::fetch_instance_info`] runs.
const DEFAULT_CHARACTER_LIMIT: usize = 500;

static HTTP_STATUS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([1-5][0-9]{2})\b").expect("valid regex"));

/// Mastodon publisher
pub struct MastodonPublisher {
    /// The megalodon client for API interactions
    client: Box<dyn Megalodon + Send + Sync>,

    /// The instance URL (e.g., "https://mastodon.social")
    instance_url: String,

    /// Character limit for posts (instance-specific)
    character_limit: usize,
}

impl MastodonPublisher {
    /// Create a new Mastodon publisher
    ///
    /// # Arguments
    ///
    /// * `instance_url` - Base URL of the instance (e.g., "https://mastodon.social")
    /// * `access_token` - OAuth access token for authentication
    pub fn new(instance_url: String, access_token: &SecretString) -> Result<Self> {
        let client = megalodon::generator(
            SNS::Mastodon,
            instance_url.clone(),
            Some(access_token.expose_secret().to_string()),
            None,
        )
        .map_err(|e| {
            PlatformError::Authentication(format!("Failed to create Mastodon client: {:?}", e))
        })?;

        Ok(Self {
            client,
            instance_url,
            character_limit: DEFAULT_CHARACTER_LIMIT,
        })
    }

    /// Create a publisher from configuration
    ///
    /// Reads the access token from the configured token file.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Authentication` if the token file cannot be
    /// read or is empty.
    pub fn from_config(config: &MastodonConfig) -> Result<Self> {
        let token_path = expand_path(&config.token_file, "mastodon.token_file")?;

        let token = std::fs::read_to_string(&token_path).map_err(|e| {
            PlatformError::Authentication(format!(
                "Failed to read Mastodon token file {}: {}",
                token_path.display(),
                e
            ))
        })?;
        let token = SecretString::from(token.trim().to_string());

        if token.expose_secret().is_empty() {
            return Err(
                PlatformError::Authentication("Mastodon token file is empty".to_string()).into(),
            );
        }

        Self::new(normalize_instance_url(&config.instance), &token)
    }

    pub fn instance_url(&self) -> &str {
        &self.instance_url
    }

    /// Fetch the instance's character limit
    pub async fn fetch_instance_info(&mut self) -> Result<()> {
        let response = self
            .client
            .get_instance()
            .await
            .map_err(|e| map_megalodon_error(e, "fetch instance info"))?;

        let limit = response.json.configuration.statuses.max_characters;
        self.character_limit = limit as usize;
        debug!(limit = self.character_limit, "fetched instance character limit");

        Ok(())
    }

    fn validate_content(&self, content: &str) -> Result<()> {
        let char_count = content.chars().count();

        if char_count > self.character_limit {
            return Err(PlatformError::Validation(format!(
                "Content exceeds Mastodon's {} character limit (current: {} characters)",
                self.character_limit, char_count
            ))
            .into());
        }

        if content.trim().is_empty() {
            return Err(PlatformError::Validation("Content cannot be empty".to_string()).into());
        }

        Ok(())
    }
}

#[async_trait]
impl Publisher for MastodonPublisher {
    async fn authenticate(&mut self) -> Result<()> {
        self.client
            .verify_account_credentials()
            .await
            .map_err(|e| map_megalodon_error(e, "authenticate"))?;

        // A missing instance limit is not worth failing startup over
        if let Err(e) = self.fetch_instance_info().await {
            debug!(error = %e, "keeping default character limit");
        }

        Ok(())
    }

    async fn publish(&self, text: &str) -> Result<String> {
        self.validate_content(text)?;

        let response = self
            .client
            .post_status(text.to_string(), None)
            .await
            .map_err(|e| map_megalodon_error(e, "post status"))?;

        let post_id = match response.json {
            PostStatusOutput::Status(status) => status.id,
            PostStatusOutput::ScheduledStatus(scheduled) => scheduled.id,
        };

        Ok(post_id)
    }

    async fn notify(&self, operator: &str, text: &str) -> Result<()> {
        let options = PostStatusInputOptions {
            visibility: Some(StatusVisibility::Direct),
            ..Default::default()
        };

        self.client
            .post_status(direct_message(operator, text), Some(&options))
            .await
            .map_err(|e| map_megalodon_error(e, "notify operator"))?;

        Ok(())
    }

    fn name(&self) -> &str {
        "mastodon"
    }

    fn character_limit(&self) -> Option<usize> {
        Some(self.character_limit)
    }
}

/// Prefix `https://` unless the instance already names a scheme
pub fn normalize_instance_url(instance: &str) -> String {
    let instance = instance.trim().trim_end_matches('/');
    if instance.starts_with("http://") || instance.starts_with("https://") {
        instance.to_string()
    } else {
        format!("https://{}", instance)
    }
}

/// Text of a direct status: the mention makes it reach the operator
fn direct_message(operator: &str, text: &str) -> String {
    let operator = operator.trim();
    if operator.starts_with('@') {
        format!("{} {}", operator, text)
    } else {
        format!("@{} {}", operator, text)
    }
}

/// Map megalodon errors to PlatformError
///
/// megalodon reports HTTP failures as text, so the status code (or failing
/// that, the wording) decides the kind: 401/403 are authentication, 422 is
/// validation, 429 is rate limiting and everything else is treated as a
/// network problem.
fn map_megalodon_error(error: megalodon::error::Error, context: &str) -> PlatformError {
    classify_error(&error.to_string(), context)
}

fn classify_error(message: &str, context: &str) -> PlatformError {
    let detail = format!("Mastodon {} failed: {}", context, message);
    let lower = message.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    match extract_http_status(message) {
        Some(401 | 403) => PlatformError::Authentication(detail),
        Some(422) => PlatformError::Validation(detail),
        Some(429) => PlatformError::RateLimit(detail),
        Some(_) => PlatformError::Network(detail),
        None if mentions(&["unauthorized", "forbidden", "token"]) => {
            PlatformError::Authentication(detail)
        }
        None if mentions(&["rate limit", "too many requests"]) => PlatformError::RateLimit(detail),
        None if mentions(&["unprocessable", "validation"]) => PlatformError::Validation(detail),
        None if mentions(&["parse", "json", "deserialize"]) => PlatformError::Posting(detail),
        None => PlatformError::Network(detail),
    }
}

/// First standalone HTTP status code (100-599) in an error message
fn extract_http_status(message: &str) -> Option<u16> {
    HTTP_STATUS
        .captures(message)
        .and_then(|caps| caps[1].parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedcastError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn publisher() -> MastodonPublisher {
        MastodonPublisher::new(
            "https://mastodon.social".to_string(),
            &SecretString::from("test-token".to_string()),
        )
        .expect("Failed to create publisher")
    }

    fn token_file(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content).expect("Failed to write token");
        file.flush().expect("Failed to flush");
        file
    }

    #[test]
    fn test_publisher_creation() {
        let publisher = publisher();
        assert_eq!(publisher.name(), "mastodon");
        assert_eq!(publisher.character_limit(), Some(500));
        assert_eq!(publisher.instance_url(), "https://mastodon.social");
    }

    #[test]
    fn test_validate_content() {
        let publisher = publisher();

        assert!(publisher.validate_content("New Thing\n\nHello...").is_ok());
        assert!(publisher.validate_content(&"a".repeat(500)).is_ok());
        assert!(publisher.validate_content("   ").is_err());

        match publisher.validate_content(&"a".repeat(501)) {
            Err(FeedcastError::Platform(PlatformError::Validation(msg))) => {
                assert!(msg.contains("500"));
                assert!(msg.contains("501"));
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_from_config_missing_token_file() {
        let config = MastodonConfig {
            instance: "mastodon.social".to_string(),
            token_file: "/nonexistent/feedcast/mastodon.token".to_string(),
        };

        let result = MastodonPublisher::from_config(&config);
        assert!(matches!(
            result,
            Err(FeedcastError::Platform(PlatformError::Authentication(_)))
        ));
    }

    #[test]
    fn test_from_config_empty_token_file() {
        let file = token_file(b"  \n");
        let config = MastodonConfig {
            instance: "mastodon.social".to_string(),
            token_file: file.path().to_str().unwrap().to_string(),
        };

        match MastodonPublisher::from_config(&config) {
            Err(FeedcastError::Platform(PlatformError::Authentication(msg))) => {
                assert!(msg.contains("empty"));
            }
            _ => panic!("Expected authentication error for empty token file"),
        }
    }

    #[test]
    fn test_from_config_valid_token() {
        let file = token_file(b"  test-token-123  \n");
        let config = MastodonConfig {
            instance: "fosstodon.org".to_string(),
            token_file: file.path().to_str().unwrap().to_string(),
        };

        let publisher = MastodonPublisher::from_config(&config).unwrap();
        assert_eq!(publisher.instance_url(), "https://fosstodon.org");
    }

    #[test]
    fn test_normalize_instance_url() {
        assert_eq!(normalize_instance_url("mastodon.social"), "https://mastodon.social");
        assert_eq!(normalize_instance_url("https://mastodon.social/"), "https://mastodon.social");
        assert_eq!(normalize_instance_url("http://localhost:3000"), "http://localhost:3000");
    }

    #[test]
    fn test_direct_message_mentions_operator() {
        assert_eq!(direct_message("@ops@example.social", "boom"), "@ops@example.social boom");
        assert_eq!(direct_message("ops", "boom"), "@ops boom");
    }

    #[test]
    fn test_classify_error_by_status() {
        assert!(matches!(
            classify_error("HTTP 401 Unauthorized", "post status"),
            PlatformError::Authentication(_)
        ));
        assert!(matches!(
            classify_error("HTTP 422 Unprocessable Entity", "post status"),
            PlatformError::Validation(_)
        ));
        assert!(matches!(
            classify_error("HTTP 429 Too Many Requests", "post status"),
            PlatformError::RateLimit(_)
        ));
        assert!(matches!(
            classify_error("HTTP 503 Service Unavailable", "post status"),
            PlatformError::Network(_)
        ));
    }

    #[test]
    fn test_classify_error_by_message() {
        assert!(matches!(
            classify_error("invalid token", "authenticate"),
            PlatformError::Authentication(_)
        ));
        assert!(matches!(
            classify_error("failed to deserialize response", "post status"),
            PlatformError::Posting(_)
        ));
        assert!(matches!(
            classify_error("connection reset by peer", "post status"),
            PlatformError::Network(_)
        ));
    }

    #[test]
    fn test_classify_error_keeps_context() {
        let error = classify_error("HTTP 500 Internal Server Error", "notify operator");
        assert!(error.to_string().contains("notify operator"));
    }

    #[test]
    fn test_extract_http_status() {
        assert_eq!(extract_http_status("HTTP 401 Unauthorized"), Some(401));
        assert_eq!(extract_http_status("status 404 not found"), Some(404));
        assert_eq!(extract_http_status("Error: 401: Unauthorized"), Some(401));
        assert_eq!(extract_http_status("status_code: 429"), Some(429));
        assert_eq!(extract_http_status("Network error"), None);
        assert_eq!(extract_http_status("HTTP 999"), None);
        assert_eq!(extract_http_status("1234"), None);
        assert_eq!(extract_http_status("error 4O4"), None);
    }
}
