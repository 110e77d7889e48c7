//! Feed types for Gator.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A subscribed RSS feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Feed {
    /// Feed ID.
    pub id: Uuid,
    /// Display name given when the feed was added.
    pub name: String,
    /// Feed URL (unique).
    pub url: String,
    /// User who added the feed.
    pub user_id: Uuid,
    /// When the feed was created.
    pub created_at: DateTime<Utc>,
    /// When the feed was last updated.
    pub updated_at: DateTime<Utc>,
    /// Start of the most recent fetch attempt.
    pub last_fetched_at: Option<DateTime<Utc>>,
}

/// New feed for creation.
#[derive(Debug, Clone)]
pub struct NewFeed {
    /// Display name.
    pub name: String,
    /// Feed URL.
    pub url: String,
    /// Owning user.
    pub user_id: Uuid,
}

impl NewFeed {
    /// Create a new feed request.
    pub fn new(name: impl Into<String>, url: impl Into<String>, user_id: Uuid) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            user_id,
        }
    }
}

/// Feed joined with the name of the user who added it.
#[derive(Debug, Clone)]
pub struct FeedWithCreator {
    /// The feed.
    pub feed: Feed,
    /// Name of the creating user.
    pub user_name: String,
}

/// A user following a feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedFollow {
    /// Follow ID.
    pub id: Uuid,
    /// Following user.
    pub user_id: Uuid,
    /// Followed feed.
    pub feed_id: Uuid,
    /// Name of the following user.
    pub user_name: String,
    /// Name of the followed feed.
    pub feed_name: String,
    /// When the follow was created.
    pub created_at: DateTime<Utc>,
    /// When the follow was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A post ingested from a feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    /// Post ID.
    pub id: Uuid,
    /// Feed the post came from.
    pub feed_id: Uuid,
    /// Post title.
    pub title: String,
    /// Link to the article (unique across all feeds).
    pub url: String,
    /// Description, `None` when the feed item had none.
    pub description: Option<String>,
    /// When the article was published.
    pub published_at: DateTime<Utc>,
    /// When the post was stored.
    pub created_at: DateTime<Utc>,
    /// When the post was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Candidate post built by the ingestor.
#[derive(Debug, Clone)]
pub struct NewPost {
    /// Pre-generated post ID.
    pub id: Uuid,
    /// Owning feed.
    pub feed_id: Uuid,
    /// Post title.
    pub title: String,
    /// Link to the article.
    pub url: String,
    /// Description.
    pub description: Option<String>,
    /// Publication time.
    pub published_at: DateTime<Utc>,
    /// Creation and update time.
    pub created_at: DateTime<Utc>,
}

impl NewPost {
    /// Create a new post with a fresh id.
    pub fn new(
        feed_id: Uuid,
        title: impl Into<String>,
        url: impl Into<String>,
        published_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            feed_id,
            title: title.into(),
            url: url.into(),
            description: None,
            published_at,
            created_at,
        }
    }

    /// Set the description. Blank text is treated as absent.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let desc = description.into();
        self.description = if desc.trim().is_empty() {
            None
        } else {
            Some(desc)
        };
        self
    }
}

/// Post joined with the name of its feed, for browsing.
#[derive(Debug, Clone)]
pub struct PostWithFeed {
    /// The post.
    pub post: Post,
    /// Name of the feed it came from.
    pub feed_name: String,
}

/// Parsed feed document from a fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFeed {
    /// Channel title.
    pub title: String,
    /// Channel link.
    pub link: String,
    /// Channel description.
    pub description: String,
    /// Items in document order.
    pub items: Vec<ParsedItem>,
}

/// Parsed item from a feed document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedItem {
    /// Item title.
    pub title: String,
    /// Link to the article.
    pub link: String,
    /// Item description.
    pub description: String,
    /// Publication date exactly as it appeared in the document.
    pub pub_date: String,
}
