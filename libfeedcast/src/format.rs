//! Post formatting
//!
//! Turns a [`FeedEntry`] into the text of a post:
//!
//! ```text
//! <title>
//!
//! <plain-text summary, truncated>...
//! <hashtag>
//! <link>
//! ```
//!
//! The summary is cut so that the whole post fits the platform limit when
//! the link is counted at its shortened width. Platforms charge a fixed
//! [`SHORTENED_LINK_WIDTH`] for every URL, so this is an approximation of
//! their counting rather than an exact guarantee. It holds for any
//! `link_width` of at least [`MIN_LINK_WIDTH`]. Titles longer than the limit
//! are not shortened; the summary just becomes empty.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::feed::FeedEntry;

/// Characters a platform charges for any link after shortening it.
pub const SHORTENED_LINK_WIDTH: usize = 23;

/// Smallest `link_width` that still covers the shortened link plus the
/// separators around the summary (`"\n\n"`, `"...\n"` and `"\n"`).
pub const MIN_LINK_WIDTH: usize = SHORTENED_LINK_WIDTH + 7;

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z][a-zA-Z0-9]{1,31});").expect("valid regex")
});
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    /// Platform character limit
    pub max_length: usize,
    /// Room kept for the shortened link and the line separators
    pub link_width: usize,
    /// Appended on its own line before the link
    pub hashtag: String,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            max_length: 280,
            link_width: 31,
            hashtag: "#awseducate".to_string(),
        }
    }
}

/// A post ready for publishing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposedMessage {
    pub body: String,
    pub source_link: String,
}

impl ComposedMessage {
    /// Length as a platform counts it, with the link at its shortened width
    pub fn weighted_len(&self) -> usize {
        let body = self.body.chars().count();
        let link = self.source_link.chars().count();
        body - link + SHORTENED_LINK_WIDTH
    }
}

/// Renders feed entries into posts
#[derive(Debug, Clone, Default)]
pub struct Formatter {
    config: FormatConfig,
}

impl Formatter {
    pub fn new(config: FormatConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FormatConfig {
        &self.config
    }

    /// Characters left for the summary once title, link and hashtag are placed
    pub fn summary_budget(&self, title: &str) -> usize {
        self.config
            .max_length
            .saturating_sub(title.chars().count())
            .saturating_sub(self.config.link_width)
            .saturating_sub(self.config.hashtag.chars().count())
    }

    pub fn format(&self, entry: &FeedEntry) -> ComposedMessage {
        let summary = strip_markup(&entry.summary);
        let budget = self.summary_budget(&entry.title);
        let summary: String = summary.chars().take(budget).collect();

        let body = format!(
            "{}\n\n{}...\n{}\n{}",
            entry.title, summary, self.config.hashtag, entry.link
        );

        ComposedMessage {
            body,
            source_link: entry.link.clone(),
        }
    }
}

/// Reduce an HTML fragment to plain text
///
/// Tags are removed, common character references are decoded and unknown
/// named references dropped. Whitespace runs collapse to a single space.
pub fn strip_markup(html: &str) -> String {
    let without_tags = TAG.replace_all(html, " ");
    let decoded = ENTITY.replace_all(&without_tags, |caps: &Captures| decode_entity(&caps[1]));
    WHITESPACE.replace_all(decoded.trim(), " ").into_owned()
}

fn decode_entity(name: &str) -> String {
    if let Some(number) = name.strip_prefix('#') {
        let code = match number.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => number.parse::<u32>().ok(),
        };
        return code
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default();
    }

    match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => " ",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "hellip" => "\u{2026}",
        "rsquo" => "\u{2019}",
        "lsquo" => "\u{2018}",
        "rdquo" => "\u{201D}",
        "ldquo" => "\u{201C}",
        _ => "",
    }
    .to_string()
}
