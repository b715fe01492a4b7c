//! Feedcast - announce new feed entries on the social web
//!
//! This library provides the pieces of a polling bot that watches an
//! RSS/Atom feed and posts each new entry exactly once: a durable record of
//! announced titles, the selector that picks the next unseen entry, the
//! post formatter, publisher adapters and the run loop tying them together.

pub mod bot;
pub mod config;
pub mod error;
pub mod feed;
pub mod format;
pub mod logging;
pub mod publisher;
pub mod selector;
pub mod store;

// Re-export commonly used types
pub use bot::{Bot, CycleOutcome, Shutdown};
pub use config::Config;
pub use error::{FeedcastError, Result, Severity};
pub use feed::{FeedEntry, FeedSource};
pub use format::{ComposedMessage, FormatConfig, Formatter};
pub use publisher::Publisher;
pub use selector::select;
pub use store::{EntryStore, MemoryStore, TitleStore};
