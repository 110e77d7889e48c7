//! Post ingestion.
//!
//! Turns parsed feed items into stored posts. The store's unique index on
//! post URL is how already-ingested items are recognised, so a duplicate
//! insert is an expected outcome rather than an error.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use super::clock::Clock;
use super::repository::PostRepository;
use super::types::{NewPost, ParsedItem, Post};
use crate::db::DbPool;
use crate::{GatorError, Result};

/// A publish-date format accepted in feed items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampFormat {
    /// `Mon, 02 Jan 2006 15:04:05 -0700`
    Rfc1123Z,
    /// RFC 2822, including named zones such as `GMT` or `EST`.
    Rfc2822,
    /// `2006-01-02T15:04:05Z07:00`
    Rfc3339,
    /// `02 Jan 06 15:04 -0700`
    Rfc822Z,
    /// `02 Jan 2006 15:04:05 -0700`
    Rfc1123ZNoWeekday,
    /// `2006-01-02 15:04:05`, taken as UTC.
    DateTime,
    /// `2006-01-02`, taken as midnight UTC.
    Date,
}

/// Accepted publish-date formats in the order they are tried.
pub const PUBLISHED_AT_FORMATS: &[TimestampFormat] = &[
    TimestampFormat::Rfc1123Z,
    TimestampFormat::Rfc2822,
    TimestampFormat::Rfc3339,
    TimestampFormat::Rfc822Z,
    TimestampFormat::Rfc1123ZNoWeekday,
    TimestampFormat::DateTime,
    TimestampFormat::Date,
];

impl TimestampFormat {
    /// Parse `s` in this format.
    ///
    /// A leading weekday is accepted but not checked against the date.
    pub fn parse(self, s: &str) -> Option<DateTime<Utc>> {
        let fixed = match self {
            TimestampFormat::Rfc1123Z => {
                DateTime::parse_from_str(strip_weekday(s)?, "%d %b %Y %H:%M:%S %z").ok()
            }
            TimestampFormat::Rfc2822 => {
                let s = numeric_zone(strip_weekday(s)?)?;
                DateTime::parse_from_str(&s, "%d %b %Y %H:%M:%S %z")
                    .or_else(|_| DateTime::parse_from_rfc2822(&s))
                    .ok()
            }
            TimestampFormat::Rfc3339 => DateTime::parse_from_rfc3339(s).ok(),
            TimestampFormat::Rfc822Z => DateTime::parse_from_str(s, "%d %b %y %H:%M %z").ok(),
            TimestampFormat::Rfc1123ZNoWeekday => {
                DateTime::parse_from_str(s, "%d %b %Y %H:%M:%S %z").ok()
            }
            TimestampFormat::DateTime => {
                return NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|naive| naive.and_utc());
            }
            TimestampFormat::Date => {
                return NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
                    .map(|naive| naive.and_utc());
            }
        };
        fixed.map(|dt| dt.with_timezone(&Utc))
    }
}

/// Require and remove a `Mon, ` style prefix.
fn strip_weekday(s: &str) -> Option<&str> {
    let (day, rest) = s.split_once(',')?;
    if day.is_empty() || !day.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some(rest.trim_start())
}

/// Replace a trailing zone abbreviation with its numeric offset.
///
/// Unknown abbreviations are taken as UTC.
fn numeric_zone(s: &str) -> Option<String> {
    let (rest, zone) = s.rsplit_once(' ')?;
    if zone.is_empty() || !zone.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let offset = match zone.to_ascii_uppercase().as_str() {
        "EST" | "CDT" => "-0500",
        "EDT" => "-0400",
        "CST" | "MDT" => "-0600",
        "MST" | "PDT" => "-0700",
        "PST" => "-0800",
        "CET" => "+0100",
        "CEST" => "+0200",
        "JST" => "+0900",
        _ => "+0000",
    };
    Some(format!("{rest} {offset}"))
}

/// Parse a feed item's publish date, trying each accepted format in order.
pub fn parse_published_at(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    PUBLISHED_AT_FORMATS
        .iter()
        .find_map(|format| format.parse(s))
        .ok_or_else(|| GatorError::TimeParse(s.to_string()))
}

/// Result of ingesting one feed item.
#[derive(Debug)]
pub enum IngestOutcome {
    /// A new post was stored.
    Created(Post),
    /// A post with the same URL already exists.
    DuplicateSkipped,
    /// The item could not be stored.
    Failed(GatorError),
}

/// Stores parsed feed items as posts.
pub struct PostIngestor<'a> {
    pool: &'a DbPool,
    clock: &'a dyn Clock,
}

impl<'a> PostIngestor<'a> {
    /// Create an ingestor writing to `pool` and stamping posts with `clock`.
    pub fn new(pool: &'a DbPool, clock: &'a dyn Clock) -> Self {
        Self { pool, clock }
    }

    /// Ingest one item for the given feed.
    pub async fn ingest(&self, feed_id: Uuid, item: &ParsedItem) -> IngestOutcome {
        let new_post = match self.build_post(feed_id, item) {
            Ok(post) => post,
            Err(e) => return IngestOutcome::Failed(e),
        };

        match PostRepository::new(self.pool).create(&new_post).await {
            Ok(post) => IngestOutcome::Created(post),
            Err(e) if e.is_duplicate() => {
                debug!("Post {} already stored, skipping", new_post.url);
                IngestOutcome::DuplicateSkipped
            }
            Err(e) => IngestOutcome::Failed(e),
        }
    }

    fn build_post(&self, feed_id: Uuid, item: &ParsedItem) -> Result<NewPost> {
        if item.link.is_empty() {
            return Err(GatorError::Validation(format!(
                "item {:?} has no link",
                item.title
            )));
        }
        let published_at = parse_published_at(&item.pub_date)?;

        Ok(
            NewPost::new(feed_id, &item.title, &item.link, published_at, self.clock.now())
                .with_description(&item.description),
        )
    }
}
