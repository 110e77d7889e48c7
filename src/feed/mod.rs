//! Feed aggregation for Gator.
//!
//! Feeds, follows and posts are stored through the repositories here. The
//! [`Aggregator`] scrapes one feed per tick and hands each item to the
//! [`PostIngestor`].

pub mod clock;
pub mod fetcher;
pub mod ingest;
pub mod repository;
pub mod scheduler;
pub mod types;

pub use clock::{Clock, IntervalTicker, SystemClock, Ticker};
pub use fetcher::{parse_feed, validate_url, FeedFetcher, RssFetcher};
pub use ingest::{parse_published_at, IngestOutcome, PostIngestor, PUBLISHED_AT_FORMATS};
pub use repository::{FeedFollowRepository, FeedRepository, PostRepository};
pub use scheduler::{parse_interval, Aggregator, CycleReport};
pub use types::{
    Feed, FeedFollow, FeedWithCreator, NewFeed, NewPost, ParsedFeed, ParsedItem, Post,
    PostWithFeed,
};
