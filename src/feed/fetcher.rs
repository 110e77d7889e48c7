//! RSS feed fetcher.
//!
//! Fetches a feed over HTTP and parses it into a [`ParsedFeed`]. Feed text
//! frequently carries HTML entities that survive XML decoding (for example
//! `&amp;amp;`), so titles and descriptions are entity-decoded once more
//! after parsing.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::FetcherConfig;
use crate::error::{GatorError, Result};
use crate::feed::types::{ParsedFeed, ParsedItem};

/// Source of parsed feed documents.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetch and parse the feed at `url`.
    async fn fetch(&self, url: &str) -> Result<ParsedFeed>;
}

/// HTTP fetcher for RSS 2.0 feeds.
pub struct RssFetcher {
    client: Client,
}

impl RssFetcher {
    /// Create a fetcher using the configured user agent and timeout.
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| GatorError::Fetch(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl FeedFetcher for RssFetcher {
    async fn fetch(&self, url: &str) -> Result<ParsedFeed> {
        debug!("Fetching feed {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| GatorError::Fetch(format!("failed to fetch feed: {}", e)))?;

        if !response.status().is_success() {
            return Err(GatorError::Fetch(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatorError::Fetch(format!("failed to read response: {}", e)))?;

        parse_feed(&bytes)
    }
}

/// Parse RSS bytes into a ParsedFeed with entity-decoded text fields.
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed> {
    let channel = rss::Channel::read_from(bytes)
        .map_err(|e| GatorError::Fetch(format!("failed to parse feed: {}", e)))?;

    let items = channel
        .items()
        .iter()
        .map(|item| ParsedItem {
            title: item.title().unwrap_or_default().to_string(),
            link: item.link().unwrap_or_default().trim().to_string(),
            description: item.description().unwrap_or_default().to_string(),
            pub_date: item.pub_date().unwrap_or_default().trim().to_string(),
        })
        .collect();

    let mut feed = ParsedFeed {
        title: channel.title().to_string(),
        link: channel.link().trim().to_string(),
        description: channel.description().to_string(),
        items,
    };
    decode_entities(&mut feed);

    Ok(feed)
}

/// Decode HTML entities in the channel and item titles and descriptions.
pub fn decode_entities(feed: &mut ParsedFeed) {
    feed.title = unescape(&feed.title);
    feed.description = unescape(&feed.description);
    for item in &mut feed.items {
        item.title = unescape(&item.title);
        item.description = unescape(&item.description);
    }
}

fn unescape(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

/// Check that a feed URL is an absolute http(s) URL with a host.
pub fn validate_url(url: &str) -> Result<()> {
    let parsed =
        url::Url::parse(url).map_err(|e| GatorError::Validation(format!("invalid URL: {}", e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(GatorError::Validation(format!(
                "unsupported URL scheme: {}",
                scheme
            )));
        }
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(GatorError::Validation("URL has no host".to_string()));
    }

    Ok(())
}
