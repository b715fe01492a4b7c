//! Feed retrieval
//!
//! Fetches an RSS/Atom document over HTTP(S) and turns its items into
//! [`FeedEntry`] values in document order.

use async_trait::async_trait;
use feed_rs::parser;
use reqwest::Client;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{FeedError, Result};

/// Connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Read timeout in seconds.
const READ_TIMEOUT_SECS: u64 = 20;

/// Total timeout in seconds.
const TOTAL_TIMEOUT_SECS: u64 = 30;

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// Maximum accepted feed size (5 MiB).
pub const MAX_FEED_SIZE: u64 = 5 * 1024 * 1024;

/// User agent string for feed fetching.
const USER_AGENT: &str = concat!("feedcast/", env!("CARGO_PKG_VERSION"));

/// One item of the source feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedEntry {
    pub title: String,
    /// May contain HTML markup
    pub summary: String,
    pub link: String,
}

impl FeedEntry {
    pub fn new(
        title: impl Into<String>,
        summary: impl Into<String>,
        link: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            summary: summary.into(),
            link: link.into(),
        }
    }
}

/// Source of feed snapshots
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the current entries, in the order the feed lists them
    ///
    /// # Errors
    ///
    /// Any network, HTTP or parse failure is reported as a [`FeedError`]
    async fn fetch(&self) -> Result<Vec<FeedEntry>>;
}

/// Feed fetched over HTTP(S)
pub struct HttpFeed {
    client: Client,
    url: String,
}

impl HttpFeed {
    /// Create a fetcher for `url`
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::InvalidUrl`] for anything but an http(s) URL with a host
    pub fn new(url: &str) -> Result<Self> {
        validate_url(url)?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .read_timeout(Duration::from_secs(READ_TIMEOUT_SECS))
            .timeout(Duration::from_secs(TOTAL_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FeedError::Fetch(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl FeedSource for HttpFeed {
    async fn fetch(&self) -> Result<Vec<FeedEntry>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| FeedError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FeedError::Status(response.status().as_u16()).into());
        }

        if let Some(content_length) = response.content_length() {
            if content_length > MAX_FEED_SIZE {
                return Err(FeedError::TooLarge {
                    size: content_length,
                    max: MAX_FEED_SIZE,
                }
                .into());
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FeedError::Fetch(format!("failed to read response: {}", e)))?;

        if bytes.len() as u64 > MAX_FEED_SIZE {
            return Err(FeedError::TooLarge {
                size: bytes.len() as u64,
                max: MAX_FEED_SIZE,
            }
            .into());
        }

        parse_feed(&bytes)
    }
}

/// Check that `url` is an absolute http(s) URL with a host
pub fn validate_url(url: &str) -> Result<()> {
    let parsed = url::Url::parse(url).map_err(|e| FeedError::InvalidUrl(format!("{}: {}", url, e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(FeedError::InvalidUrl(format!("unsupported URL scheme: {}", scheme)).into());
        }
    }

    if parsed.host().is_none() {
        return Err(FeedError::InvalidUrl(format!("URL has no host: {}", url)).into());
    }

    Ok(())
}

/// Parse an RSS or Atom document, keeping document order
///
/// Missing fields become empty strings. The summary falls back to the entry
/// content when the feed has no separate summary.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<FeedEntry>> {
    let feed = parser::parse(bytes).map_err(|e| FeedError::Parse(e.to_string()))?;

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| {
            let title = entry.title.map(|t| t.content).unwrap_or_default();
            let summary = entry
                .summary
                .map(|t| t.content)
                .or(entry.content.and_then(|c| c.body))
                .unwrap_or_default();
            let link = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default();

            FeedEntry {
                title,
                summary,
                link,
            }
        })
        .collect();

    Ok(entries)
}

/// Feed that replays prepared responses
///
/// Each fetch takes the next scripted response; the last one repeats
/// forever. Clones share the script and the fetch counter.
#[derive(Clone)]
pub struct StaticFeed {
    responses: Arc<Mutex<VecDeque<std::result::Result<Vec<FeedEntry>, FeedError>>>>,
    fetches: Arc<AtomicUsize>,
}

impl StaticFeed {
    /// Feed that always returns `entries`
    pub fn new(entries: Vec<FeedEntry>) -> Self {
        Self::scripted(vec![Ok(entries)])
    }

    /// Feed that returns `responses` in order
    pub fn scripted(responses: Vec<std::result::Result<Vec<FeedEntry>, FeedError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of fetches served so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for StaticFeed {
    async fn fetch(&self) -> Result<Vec<FeedEntry>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let mut responses = self
            .responses
            .lock()
            .map_err(|_| FeedError::Fetch("static feed lock poisoned".to_string()))?;

        let response = if responses.len() > 1 {
            responses.pop_front()
        } else {
            responses.front().cloned()
        };

        match response {
            Some(Ok(entries)) => Ok(entries),
            Some(Err(e)) => Err(e.into()),
            None => Ok(Vec::new()),
        }
    }
}
