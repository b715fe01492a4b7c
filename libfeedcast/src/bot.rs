//! The polling run loop
//!
//! Each cycle walks `Fetching → Selecting → Recording → Publishing`. The
//! title is appended to the store *before* publishing starts, so a crash
//! between the two can lose a post but never repeats one. A failed publish
//! leaves the title recorded: the entry is spent and is not retried.
//!
//! Errors are classified once, through [`FeedcastError::severity`]:
//!
//! - feed failures are retried after `retry_delay`
//! - publish failures are logged, reported to the operators, and skipped
//! - store failures (and anything else) stop the bot

use chrono::Local;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::config::{Config, ScheduleConfig};
use crate::error::{ConfigError, FeedcastError, PlatformError, Result, Severity};
use crate::feed::{FeedEntry, FeedSource, HttpFeed};
use crate::format::{ComposedMessage, Formatter};
use crate::publisher::mastodon::MastodonPublisher;
use crate::publisher::Publisher;
use crate::selector::select;
use crate::store::{EntryStore, TitleStore};

/// How often a wait checks for a shutdown request.
const SHUTDOWN_POLL: Duration = Duration::from_millis(250);

/// Result of a cycle that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Every entry in the feed has already been announced
    NothingNew,
    /// An entry was recorded and published
    Published {
        title: String,
        post_id: String,
        body: String,
    },
}

/// What a dry run would publish
#[derive(Debug, Clone, Serialize)]
pub struct Preview {
    pub entry: FeedEntry,
    pub message: ComposedMessage,
}

/// Cooperative shutdown flag shared with signal handlers
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` unless shutdown is requested first
    ///
    /// Returns `true` if the wait was cut short.
    pub async fn wait(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_requested() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                // Zero-length waits still give other tasks a turn
                tokio::task::yield_now().await;
                return false;
            }
            sleep((deadline - now).min(SHUTDOWN_POLL)).await;
        }
    }
}

/// Feed-to-post bot
pub struct Bot {
    feed: Box<dyn FeedSource>,
    store: Box<dyn EntryStore>,
    publisher: Box<dyn Publisher>,
    formatter: Formatter,
    schedule: ScheduleConfig,
    operators: Vec<String>,
}

impl Bot {
    /// Assemble a bot from its collaborators, with default format and schedule
    pub fn new(
        feed: Box<dyn FeedSource>,
        store: Box<dyn EntryStore>,
        publisher: Box<dyn Publisher>,
    ) -> Self {
        Self {
            feed,
            store,
            publisher,
            formatter: Formatter::default(),
            schedule: ScheduleConfig::default(),
            operators: Vec::new(),
        }
    }

    /// Wire up the production bot: HTTP feed, title file and Mastodon
    ///
    /// # Errors
    ///
    /// Fails on an invalid feed URL, a missing `[mastodon]` section, an
    /// unreadable token file or an unusable title store.
    pub fn from_config(config: &Config) -> Result<Self> {
        let feed = HttpFeed::new(&config.feed.url)?;
        let store = TitleStore::open(config.store_path()?)?;
        let publisher = MastodonPublisher::from_config(config.mastodon()?)?;

        Ok(Self::new(Box::new(feed), Box::new(store), Box::new(publisher))
            .with_formatter(Formatter::new(config.format.clone()))
            .with_schedule(config.schedule.clone())
            .with_operators(config.notify.operators.clone()))
    }

    pub fn with_formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn with_schedule(mut self, schedule: ScheduleConfig) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_operators(mut self, operators: Vec<String>) -> Self {
        self.operators = operators;
        self
    }

    /// Verify publisher credentials and that posts fit the platform limit
    ///
    /// # Errors
    ///
    /// - `PlatformError::Authentication` when the credentials are rejected
    /// - `ConfigError::InvalidValue` when `format.max_length` exceeds the
    ///   platform's character limit, which would make long posts fail
    pub async fn authenticate(&mut self) -> Result<()> {
        self.publisher.authenticate().await?;

        let max_length = self.formatter.config().max_length;
        if let Some(limit) = self.publisher.character_limit() {
            if max_length > limit {
                return Err(ConfigError::InvalidValue {
                    field: "format.max_length".to_string(),
                    reason: format!(
                        "{} exceeds the {} character limit of {}",
                        max_length,
                        limit,
                        self.publisher.name()
                    ),
                }
                .into());
            }
        }

        info!(platform = self.publisher.name(), max_length, "authenticated");
        Ok(())
    }

    /// Run one fetch → select → record → publish cycle
    ///
    /// # Errors
    ///
    /// - `FeedcastError::Feed` when the feed cannot be fetched (retryable)
    /// - `FeedcastError::Store` when the title store fails (fatal)
    /// - `FeedcastError::Publish` when publishing fails after recording
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        self.store.refresh()?;

        debug!("fetching feed");
        let entries = self.feed.fetch().await?;
        debug!(entries = entries.len(), "fetched feed");

        let entry = match select(&entries, &*self.store)?.cloned() {
            Some(entry) => entry,
            None => return Ok(CycleOutcome::NothingNew),
        };

        self.store.append(&entry.title)?;
        info!(title = %entry.title, link = %entry.link, "recorded entry");

        let message = self.formatter.format(&entry);
        let published = self.publisher.publish(&message.body).await;
        match published {
            Ok(post_id) => Ok(CycleOutcome::Published {
                title: entry.title,
                post_id,
                body: message.body,
            }),
            Err(e) => Err(FeedcastError::Publish {
                title: entry.title,
                body: message.body,
                source: into_platform_error(e),
            }),
        }
    }

    /// Fetch and select without recording or publishing anything
    pub async fn preview(&mut self) -> Result<Option<Preview>> {
        preview(&*self.feed, &mut *self.store, &self.formatter).await
    }

    /// Run cycles until shutdown is requested or a fatal error occurs
    ///
    /// Returns `Ok(())` after a requested shutdown and the fatal error
    /// otherwise. Shutdown is checked between cycles and during waits; a
    /// publish that is already in flight is allowed to finish.
    pub async fn run(&mut self, shutdown: &Shutdown) -> Result<()> {
        info!(
            platform = self.publisher.name(),
            recorded = self.store.len(),
            idle_interval = self.schedule.idle_interval,
            "bot started"
        );

        loop {
            if shutdown.is_requested() {
                info!("Shutdown requested, stopping bot");
                return Ok(());
            }

            let wait = self.run_once().await?;
            if shutdown.is_requested() {
                info!("Shutdown requested during a cycle; the cycle ran to completion");
            }

            shutdown.wait(wait).await;
        }
    }

    /// Run a single cycle with the error handling of [`Bot::run`]
    ///
    /// Feed failures are logged and publish failures reported to the
    /// operators; both yield `Ok`. Returns how long the loop should wait
    /// before the next cycle.
    ///
    /// # Errors
    ///
    /// Returns any error classified as [`Severity::Fatal`].
    pub async fn run_once(&mut self) -> Result<Duration> {
        match self.run_cycle().await {
            Ok(CycleOutcome::NothingNew) => {
                debug!(wait_secs = self.schedule.idle_interval, "no new entries");
                Ok(self.schedule.idle_interval())
            }
            Ok(CycleOutcome::Published {
                title,
                post_id,
                body,
            }) => {
                info!(%title, %post_id, %body, "message published");
                Ok(self.schedule.post_interval())
            }
            Err(e) => match e.severity() {
                Severity::Retryable => {
                    warn!(error = %e, wait_secs = self.schedule.retry_delay, "cycle failed, will retry");
                    Ok(self.schedule.retry_delay())
                }
                Severity::NotifyAndContinue => {
                    self.report_failure(&e).await;
                    Ok(self.schedule.post_interval())
                }
                Severity::Fatal => {
                    error!(error = %e, "fatal error, stopping bot");
                    Err(e)
                }
            },
        }
    }

    /// Log a spent entry and tell the operators about it
    ///
    /// Notification failures are logged and otherwise ignored.
    async fn report_failure(&self, error: &FeedcastError) {
        let (title, body, source) = match error {
            FeedcastError::Publish {
                title,
                body,
                source,
            } => (title.as_str(), body.as_str(), source.to_string()),
            other => ("", "", other.to_string()),
        };

        error!(%title, %body, error = %source, "publishing failed; entry is spent and will not be retried");

        if self.operators.is_empty() {
            return;
        }

        let text = failure_notice(body, &source);
        for operator in &self.operators {
            match self.publisher.notify(operator, &text).await {
                Ok(()) => debug!(%operator, "operator notified"),
                Err(e) => warn!(%operator, error = %e, "failed to notify operator"),
            }
        }
    }
}

/// Select and format the next entry without side effects on the store
pub async fn preview(
    feed: &dyn FeedSource,
    store: &mut dyn EntryStore,
    formatter: &Formatter,
) -> Result<Option<Preview>> {
    store.refresh()?;
    let entries = feed.fetch().await?;

    Ok(select(&entries, &*store)?.map(|entry| Preview {
        entry: entry.clone(),
        message: formatter.format(entry),
    }))
}

/// Operator message describing a failed publish
pub fn failure_notice(body: &str, error: &str) -> String {
    format!(
        "{}: Error with message:\n{}\n{}",
        Local::now().format("%I:%M:%S %p %d/%m/%Y"),
        body,
        error
    )
}

fn into_platform_error(error: FeedcastError) -> PlatformError {
    match error {
        FeedcastError::Platform(e) => e,
        other => PlatformError::Posting(other.to_string()),
    }
}
