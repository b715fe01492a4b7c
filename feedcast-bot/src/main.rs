//! feedcast-bot - Announce new feed entries on Mastodon
//!
//! Polls a feed, records each new entry in the title store and posts it,
//! one entry per cycle, until stopped.

use clap::Parser;
use libfeedcast::bot::preview;
use libfeedcast::feed::HttpFeed;
use libfeedcast::logging::{LogFormat, LoggingConfig};
use libfeedcast::{Bot, Config, EntryStore, Formatter, MemoryStore, Result, Shutdown, TitleStore};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "feedcast-bot")]
#[command(version)]
#[command(about = "Announce new feed entries on Mastodon")]
#[command(long_about = "\
feedcast-bot - Announce new feed entries on Mastodon

DESCRIPTION:
    feedcast-bot is a long-running daemon that watches an RSS/Atom feed and
    posts every entry it has not announced before, one entry per cycle.

    Announced titles are appended to a plain text file before publishing,
    so an entry is never posted twice, even across restarts. An entry whose
    publish fails is not retried; operators listed in [notify] receive a
    direct message instead.

USAGE:
    # Run in foreground (logs to stderr)
    feedcast-bot

    # Show what the next cycle would post, without posting
    feedcast-bot --dry-run

    # Run a single cycle and exit
    feedcast-bot --once

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current cycle)

CONFIGURATION:
    Configuration file: ~/.config/feedcast/config.toml
    Override with --config or FEEDCAST_CONFIG

    [feed]
    url = \"https://aws.amazon.com/about-aws/whats-new/recent/feed/\"

    [store]
    path = \"~/.local/share/feedcast/titles.txt\"

    [mastodon]
    instance = \"mastodon.social\"
    token_file = \"~/.config/feedcast/mastodon.token\"

    [schedule]
    idle_interval = 300  # seconds to wait when nothing is new
    post_interval = 10   # seconds to wait after a post
    retry_delay = 60     # seconds to wait after a failed fetch

    [notify]
    operators = [\"@me@mastodon.social\"]

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error (e.g. title store failure)
    2 - Authentication error
    3 - Configuration error
")]
struct Cli {
    /// Configuration file (default: ~/.config/feedcast/config.toml)
    #[arg(short, long, value_name = "FILE", env = "FEEDCAST_CONFIG")]
    config: Option<PathBuf>,

    /// Title store file (overrides config)
    #[arg(long, value_name = "FILE")]
    store: Option<PathBuf>,

    /// Wait when nothing is new, e.g. "5m" (overrides config)
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    idle_interval: Option<Duration>,

    /// Wait after a failed fetch, e.g. "30s" (overrides config)
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    retry_delay: Option<Duration>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Print the post the next cycle would make, without recording or posting it
    #[arg(long)]
    dry_run: bool,

    /// Print the dry-run preview as JSON
    #[arg(long, requires = "dry_run")]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log output format: text, json or pretty (overrides config)
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    LoggingConfig::new(
        cli.log_format.unwrap_or(config.logging.format),
        config.logging.level.clone(),
        cli.verbose,
    )
    .with_file(config.log_file()?)
    .with_env_overrides()
    .init()?;

    if cli.dry_run {
        return dry_run(&config, cli.json).await;
    }

    // Registered before startup so an early signal still stops gracefully
    let shutdown = Shutdown::new();
    setup_signal_handlers(shutdown.clone())?;

    let mut bot = Bot::from_config(&config)?;
    bot.authenticate().await?;

    if shutdown.is_requested() {
        info!("Shutdown requested during startup, exiting");
        return Ok(());
    }

    if cli.once {
        bot.run_once().await?;
        info!("feedcast-bot: ran one cycle, exiting");
        return Ok(());
    }

    info!(feed = %config.feed.url, "feedcast-bot starting");
    bot.run(&shutdown).await?;
    info!("feedcast-bot stopped");
    Ok(())
}

/// Load the config file and apply command-line overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    if let Some(store) = &cli.store {
        config.store.path = store.display().to_string();
    }
    if let Some(interval) = cli.idle_interval {
        config.schedule.idle_interval = interval.as_secs();
    }
    if let Some(delay) = cli.retry_delay {
        config.schedule.retry_delay = delay.as_secs();
    }

    config.validate()?;
    Ok(config)
}

/// Show the next post without touching the store or the network account
///
/// A missing store file is treated as empty and is not created.
async fn dry_run(config: &Config, json: bool) -> Result<()> {
    let feed = HttpFeed::new(&config.feed.url)?;
    let store_path = config.store_path()?;
    let mut store: Box<dyn EntryStore> = if store_path.exists() {
        Box::new(TitleStore::open(&store_path)?)
    } else {
        Box::new(MemoryStore::new())
    };
    let formatter = Formatter::new(config.format.clone());

    let next = preview(&feed, &mut *store, &formatter).await?;

    if json {
        let output = serde_json::to_string_pretty(&next)
            .map_err(|e| libfeedcast::FeedcastError::InvalidInput(e.to_string()))?;
        println!("{}", output);
        return Ok(());
    }

    match next {
        Some(preview) => {
            println!("{}", preview.message.body);
        }
        None => {
            println!("Nothing new in {}", feed.url());
        }
    }
    Ok(())
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Shutdown) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(|e| {
        libfeedcast::FeedcastError::InvalidInput(format!("Signal setup failed: {}", e))
    })?;

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!(signal = sig, "Received shutdown signal, stopping gracefully...");
            shutdown.request();
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(shutdown: Shutdown) -> Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, stopping gracefully...");
            shutdown.request();
        }
    });
    Ok(())
}
