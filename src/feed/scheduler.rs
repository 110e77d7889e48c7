//! Aggregation scheduler.
//!
//! Each cycle scrapes exactly one feed: the one fetched least recently, with
//! never-fetched feeds first. The feed is marked fetched before the network
//! call so that a slow or failing feed does not block the rest of the rotation.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::clock::{Clock, Ticker};
use super::fetcher::FeedFetcher;
use super::ingest::{IngestOutcome, PostIngestor};
use super::repository::FeedRepository;
use crate::db::Database;
use crate::{GatorError, Result};

/// Parse a human-readable interval such as `1m30s`.
pub fn parse_interval(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(GatorError::Startup("missing time between requests".into()));
    }
    let interval = humantime::parse_duration(s)
        .map_err(|e| GatorError::Startup(format!("invalid duration {s:?}: {e}")))?;
    if interval.is_zero() {
        return Err(GatorError::Startup(
            "time between requests must be positive".into(),
        ));
    }
    Ok(interval)
}

/// Summary of one aggregation cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Feed that was scraped.
    pub feed_id: Uuid,
    /// Name of the scraped feed.
    pub feed_name: String,
    /// Posts stored.
    pub created: usize,
    /// Items skipped because their post already existed.
    pub duplicates: usize,
    /// Items that could not be stored.
    pub failed: usize,
}

/// Drives the fetch-and-ingest rotation over all stored feeds.
pub struct Aggregator<F, C> {
    db: Database,
    fetcher: F,
    clock: C,
}

impl<F: FeedFetcher, C: Clock> Aggregator<F, C> {
    /// Create an aggregator.
    pub fn new(db: Database, fetcher: F, clock: C) -> Self {
        Self { db, fetcher, clock }
    }

    /// Run cycles until `cancel` fires.
    ///
    /// The first cycle runs immediately; each later one waits for a tick.
    /// Cycle errors are logged and never end the loop.
    pub async fn run<T: Ticker>(&self, ticker: &mut T, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.run_cycle().await {
                Ok(Some(report)) => debug!("Cycle finished: {:?}", report),
                Ok(None) => {}
                Err(e @ GatorError::Fetch(_)) => warn!("{}", e),
                Err(e) => error!("Aggregation cycle failed: {}", e),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
        }

        info!("Aggregator stopped");
    }

    /// Scrape the next due feed.
    ///
    /// Returns `Ok(None)` when there are no feeds. A fetch failure is returned
    /// as an error after the feed has been marked fetched.
    pub async fn run_cycle(&self) -> Result<Option<CycleReport>> {
        let feeds = FeedRepository::new(self.db.pool());

        let Some(feed) = feeds.get_next_to_fetch().await? else {
            info!("No feeds to fetch");
            return Ok(None);
        };

        let now = self.clock.now();
        if !feeds.mark_fetched(feed.id, now).await? {
            return Err(GatorError::NotFound(format!("feed {}", feed.id)));
        }

        info!("Collecting {} from {}", feed.name, feed.url);
        let parsed = self
            .fetcher
            .fetch(&feed.url)
            .await
            .map_err(|e| match e {
                GatorError::Fetch(msg) => GatorError::Fetch(format!("{}: {}", feed.name, msg)),
                other => other,
            })?;

        let ingestor = PostIngestor::new(self.db.pool(), &self.clock);
        let mut report = CycleReport {
            feed_id: feed.id,
            feed_name: feed.name.clone(),
            ..Default::default()
        };

        for item in &parsed.items {
            match ingestor.ingest(feed.id, item).await {
                IngestOutcome::Created(post) => {
                    info!("Saved post: {}", post.title);
                    report.created += 1;
                }
                IngestOutcome::DuplicateSkipped => report.duplicates += 1,
                IngestOutcome::Failed(e) => {
                    warn!("Skipping item {:?} from {}: {}", item.title, feed.name, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Feed {} collected, {} new post(s) ({} already stored, {} failed)",
            feed.name, report.created, report.duplicates, report.failed
        );

        Ok(Some(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewUser, UserRepository};
    use crate::feed::repository::PostRepository;
    use crate::feed::types::{Feed, NewFeed, ParsedFeed, ParsedItem};
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Clone)]
    struct FakeClock(Arc<Mutex<DateTime<Utc>>>);

    impl FakeClock {
        fn at(time: DateTime<Utc>) -> Self {
            Self(Arc::new(Mutex::new(time)))
        }

        fn set(&self, time: DateTime<Utc>) {
            *self.0.lock().unwrap() = time;
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    /// Serves canned feeds and records each fetch with the feed's
    /// `last_fetched_at` as seen at fetch time.
    #[derive(Clone)]
    struct StubFetcher {
        db: Database,
        feeds: HashMap<String, ParsedFeed>,
        calls: Arc<Mutex<Vec<(String, Option<DateTime<Utc>>)>>>,
    }

    impl StubFetcher {
        fn new(db: &Database) -> Self {
            Self {
                db: db.clone(),
                feeds: HashMap::new(),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn serve(mut self, url: &str, feed: ParsedFeed) -> Self {
            self.feeds.insert(url.to_string(), feed);
            self
        }

        fn calls(&self) -> Vec<(String, Option<DateTime<Utc>>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FeedFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<ParsedFeed> {
            let seen = FeedRepository::new(self.db.pool())
                .get_by_url(url)
                .await?
                .and_then(|f| f.last_fetched_at);
            self.calls.lock().unwrap().push((url.to_string(), seen));

            self.feeds
                .get(url)
                .cloned()
                .ok_or_else(|| GatorError::Fetch(format!("HTTP error: 404 for {url}")))
        }
    }

    struct CountingTicker {
        ticks: usize,
        limit: usize,
        cancel: CancellationToken,
    }

    #[async_trait]
    impl Ticker for CountingTicker {
        async fn tick(&mut self) {
            self.ticks += 1;
            if self.ticks >= self.limit {
                self.cancel.cancel();
            }
        }
    }

    fn time(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    fn item(link: &str) -> ParsedItem {
        ParsedItem {
            title: format!("Post {link}"),
            link: link.to_string(),
            description: String::new(),
            pub_date: "Mon, 02 Jan 2006 15:04:05 -0700".to_string(),
        }
    }

    async fn add_feed(db: &Database, name: &str, url: &str) -> Feed {
        let users = UserRepository::new(db.pool());
        let user = match users.get_by_name("owner").await.unwrap() {
            Some(user) => user,
            None => users.create(&NewUser::new("owner")).await.unwrap(),
        };
        FeedRepository::new(db.pool())
            .create(&NewFeed::new(name, url, user.id))
            .await
            .unwrap()
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_interval("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_interval("500ms").unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn test_parse_interval_invalid() {
        assert!(matches!(parse_interval(""), Err(GatorError::Startup(_))));
        assert!(matches!(parse_interval("soon"), Err(GatorError::Startup(_))));
        assert!(matches!(parse_interval("0s"), Err(GatorError::Startup(_))));
    }

    #[tokio::test]
    async fn test_cycle_with_no_feeds() {
        let db = Database::open_in_memory().await.unwrap();
        let aggregator = Aggregator::new(db.clone(), StubFetcher::new(&db), FakeClock::at(time(0)));

        assert_eq!(aggregator.run_cycle().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cycle_ingests_items() {
        let db = Database::open_in_memory().await.unwrap();
        let feed = add_feed(&db, "Blog", "https://example.com/feed.xml").await;
        let parsed = ParsedFeed {
            title: "Blog".into(),
            items: vec![
                item("https://example.com/1"),
                item("https://example.com/2"),
                ParsedItem {
                    pub_date: "not-a-date".into(),
                    ..item("https://example.com/3")
                },
            ],
            ..Default::default()
        };
        let fetcher = StubFetcher::new(&db).serve(&feed.url, parsed);
        let aggregator = Aggregator::new(db.clone(), fetcher, FakeClock::at(time(1)));

        let report = aggregator.run_cycle().await.unwrap().unwrap();
        assert_eq!(report.feed_id, feed.id);
        assert_eq!(report.feed_name, "Blog");
        assert_eq!(report.created, 2);
        assert_eq!(report.duplicates, 0);
        assert_eq!(report.failed, 1);

        let report = aggregator.run_cycle().await.unwrap().unwrap();
        assert_eq!(report.created, 0);
        assert_eq!(report.duplicates, 2);

        let posts = PostRepository::new(db.pool());
        assert_eq!(posts.count_by_feed(feed.id).await.unwrap(), 2);
        let stored = posts.get_by_url("https://example.com/1").await.unwrap().unwrap();
        assert_eq!(stored.created_at, time(1));
    }

    #[tokio::test]
    async fn test_fetch_failure_still_marks_feed() {
        let db = Database::open_in_memory().await.unwrap();
        let feed = add_feed(&db, "Broken", "https://example.com/broken.xml").await;
        let aggregator = Aggregator::new(db.clone(), StubFetcher::new(&db), FakeClock::at(time(2)));

        let result = aggregator.run_cycle().await;
        assert!(matches!(result, Err(GatorError::Fetch(_))));

        let stored = FeedRepository::new(db.pool())
            .get_by_id(feed.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.last_fetched_at, Some(time(2)));
        assert_eq!(PostRepository::new(db.pool()).count_by_feed(feed.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_feeds_fetched_stalest_first() {
        let db = Database::open_in_memory().await.unwrap();
        let never = add_feed(&db, "Never", "https://example.com/never.xml").await;
        let older = add_feed(&db, "Older", "https://example.com/older.xml").await;
        let newer = add_feed(&db, "Newer", "https://example.com/newer.xml").await;

        let feeds = FeedRepository::new(db.pool());
        feeds.mark_fetched(older.id, time(1)).await.unwrap();
        feeds.mark_fetched(newer.id, time(2)).await.unwrap();

        let fetcher = StubFetcher::new(&db)
            .serve(&never.url, ParsedFeed::default())
            .serve(&older.url, ParsedFeed::default())
            .serve(&newer.url, ParsedFeed::default());
        let clock = FakeClock::at(time(10));
        let aggregator = Aggregator::new(db.clone(), fetcher.clone(), clock.clone());

        for hour in [10, 11, 12] {
            clock.set(time(hour));
            aggregator.run_cycle().await.unwrap();
        }

        // Each feed was already marked with its cycle's start time when fetched.
        assert_eq!(
            fetcher.calls(),
            vec![
                (never.url.clone(), Some(time(10))),
                (older.url.clone(), Some(time(11))),
                (newer.url.clone(), Some(time(12))),
            ]
        );
    }

    #[tokio::test]
    async fn test_run_continues_past_failures() {
        let db = Database::open_in_memory().await.unwrap();
        let good = add_feed(&db, "Good", "https://example.com/good.xml").await;
        let bad = add_feed(&db, "Bad", "https://example.com/bad.xml").await;

        let fetcher = StubFetcher::new(&db).serve(
            &good.url,
            ParsedFeed {
                items: vec![item("https://example.com/good/1")],
                ..Default::default()
            },
        );
        let aggregator = Aggregator::new(db.clone(), fetcher.clone(), FakeClock::at(time(3)));

        let cancel = CancellationToken::new();
        let mut ticker = CountingTicker {
            ticks: 0,
            limit: 4,
            cancel: cancel.clone(),
        };
        aggregator.run(&mut ticker, cancel).await;

        assert_eq!(ticker.ticks, 4);
        let calls = fetcher.calls();
        assert_eq!(calls.len(), 4);
        assert!(calls.iter().any(|(url, _)| url == &bad.url));
        assert_eq!(
            PostRepository::new(db.pool()).count_by_feed(good.id).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_run_stops_when_cancelled() {
        let db = Database::open_in_memory().await.unwrap();
        add_feed(&db, "Blog", "https://example.com/feed.xml").await;
        let fetcher = StubFetcher::new(&db);
        let aggregator = Aggregator::new(db.clone(), fetcher.clone(), FakeClock::at(time(4)));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut ticker = CountingTicker {
            ticks: 0,
            limit: usize::MAX,
            cancel: cancel.clone(),
        };
        aggregator.run(&mut ticker, cancel).await;

        assert!(fetcher.calls().is_empty());
        assert_eq!(ticker.ticks, 0);
    }
}
