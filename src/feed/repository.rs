//! Feed, follow and post repositories for Gator.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::types::{Feed, FeedFollow, FeedWithCreator, NewFeed, NewPost, Post, PostWithFeed};
use crate::datetime::{parse_db_timestamp, to_db_timestamp};
use crate::db::{parse_uuid, DbPool};
use crate::{GatorError, Result};

const FEED_COLUMNS: &str = "f.id, f.name, f.url, f.user_id, f.created_at, f.updated_at, f.last_fetched_at";

/// Row type for feeds from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct FeedRow {
    id: String,
    name: String,
    url: String,
    user_id: String,
    created_at: String,
    updated_at: String,
    last_fetched_at: Option<String>,
}

impl TryFrom<FeedRow> for Feed {
    type Error = GatorError;

    fn try_from(row: FeedRow) -> Result<Self> {
        Ok(Feed {
            id: parse_uuid(&row.id)?,
            name: row.name,
            url: row.url,
            user_id: parse_uuid(&row.user_id)?,
            created_at: parse_db_timestamp(&row.created_at).unwrap_or_else(Utc::now),
            updated_at: parse_db_timestamp(&row.updated_at).unwrap_or_else(Utc::now),
            last_fetched_at: row.last_fetched_at.and_then(|s| parse_db_timestamp(&s)),
        })
    }
}

/// Row type for feeds joined with their creator.
#[derive(Debug, Clone, sqlx::FromRow)]
struct FeedWithCreatorRow {
    #[sqlx(flatten)]
    feed: FeedRow,
    user_name: String,
}

impl TryFrom<FeedWithCreatorRow> for FeedWithCreator {
    type Error = GatorError;

    fn try_from(row: FeedWithCreatorRow) -> Result<Self> {
        Ok(FeedWithCreator {
            feed: Feed::try_from(row.feed)?,
            user_name: row.user_name,
        })
    }
}

/// Row type for feed follows joined with user and feed names.
#[derive(Debug, Clone, sqlx::FromRow)]
struct FeedFollowRow {
    id: String,
    user_id: String,
    feed_id: String,
    user_name: String,
    feed_name: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<FeedFollowRow> for FeedFollow {
    type Error = GatorError;

    fn try_from(row: FeedFollowRow) -> Result<Self> {
        Ok(FeedFollow {
            id: parse_uuid(&row.id)?,
            user_id: parse_uuid(&row.user_id)?,
            feed_id: parse_uuid(&row.feed_id)?,
            user_name: row.user_name,
            feed_name: row.feed_name,
            created_at: parse_db_timestamp(&row.created_at).unwrap_or_else(Utc::now),
            updated_at: parse_db_timestamp(&row.updated_at).unwrap_or_else(Utc::now),
        })
    }
}

/// Row type for posts from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct PostRow {
    id: String,
    feed_id: String,
    title: String,
    url: String,
    description: Option<String>,
    published_at: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<PostRow> for Post {
    type Error = GatorError;

    fn try_from(row: PostRow) -> Result<Self> {
        let published_at = parse_db_timestamp(&row.published_at).ok_or_else(|| {
            GatorError::Database(format!("invalid published_at {:?}", row.published_at))
        })?;
        Ok(Post {
            id: parse_uuid(&row.id)?,
            feed_id: parse_uuid(&row.feed_id)?,
            title: row.title,
            url: row.url,
            description: row.description,
            published_at,
            created_at: parse_db_timestamp(&row.created_at).unwrap_or_else(Utc::now),
            updated_at: parse_db_timestamp(&row.updated_at).unwrap_or_else(Utc::now),
        })
    }
}

/// Row type for posts joined with their feed name.
#[derive(Debug, Clone, sqlx::FromRow)]
struct PostWithFeedRow {
    #[sqlx(flatten)]
    post: PostRow,
    feed_name: String,
}

/// Repository for feed operations.
pub struct FeedRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> FeedRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a new feed.
    ///
    /// Returns [`GatorError::Duplicate`] if a feed with the same URL exists.
    pub async fn create(&self, feed: &NewFeed) -> Result<Feed> {
        let id = Uuid::new_v4();
        let now = to_db_timestamp(&Utc::now());

        sqlx::query(
            r#"
            INSERT INTO feeds (id, name, url, user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&feed.name)
        .bind(&feed.url)
        .bind(feed.user_id.to_string())
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| GatorError::NotFound("feed".into()))
    }

    /// Get a feed by ID.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Feed>> {
        let query = format!("SELECT {FEED_COLUMNS} FROM feeds f WHERE f.id = ?");
        let row = sqlx::query_as::<_, FeedRow>(&query)
            .bind(id.to_string())
            .fetch_optional(self.pool)
            .await?;

        row.map(Feed::try_from).transpose()
    }

    /// Get a feed by URL.
    pub async fn get_by_url(&self, url: &str) -> Result<Option<Feed>> {
        let query = format!("SELECT {FEED_COLUMNS} FROM feeds f WHERE f.url = ?");
        let row = sqlx::query_as::<_, FeedRow>(&query)
            .bind(url)
            .fetch_optional(self.pool)
            .await?;

        row.map(Feed::try_from).transpose()
    }

    /// List all feeds with the name of the user who added them.
    pub async fn list_with_creators(&self) -> Result<Vec<FeedWithCreator>> {
        let query = format!(
            r#"
            SELECT {FEED_COLUMNS}, u.name AS user_name
            FROM feeds f
            JOIN users u ON u.id = f.user_id
            ORDER BY f.created_at ASC, f.id ASC
            "#
        );
        let rows = sqlx::query_as::<_, FeedWithCreatorRow>(&query)
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(FeedWithCreator::try_from).collect()
    }

    /// Get the feed that was fetched least recently.
    ///
    /// Feeds that were never fetched come first. Ties are broken by
    /// creation time, then id.
    pub async fn get_next_to_fetch(&self) -> Result<Option<Feed>> {
        let query = format!(
            r#"
            SELECT {FEED_COLUMNS}
            FROM feeds f
            ORDER BY f.last_fetched_at IS NOT NULL, f.last_fetched_at ASC,
                     f.created_at ASC, f.id ASC
            LIMIT 1
            "#
        );
        let row = sqlx::query_as::<_, FeedRow>(&query)
            .fetch_optional(self.pool)
            .await?;

        row.map(Feed::try_from).transpose()
    }

    /// Record the start of a fetch attempt.
    pub async fn mark_fetched(&self, id: Uuid, fetched_at: DateTime<Utc>) -> Result<bool> {
        let ts = to_db_timestamp(&fetched_at);
        let result =
            sqlx::query("UPDATE feeds SET last_fetched_at = ?, updated_at = ? WHERE id = ?")
                .bind(&ts)
                .bind(&ts)
                .bind(id.to_string())
                .execute(self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Count all feeds.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feeds")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

/// Repository for feed follow operations.
pub struct FeedFollowRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> FeedFollowRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Make a user follow a feed.
    ///
    /// Returns [`GatorError::Duplicate`] if the user already follows it.
    pub async fn create(&self, user_id: Uuid, feed_id: Uuid) -> Result<FeedFollow> {
        let id = Uuid::new_v4();
        let now = to_db_timestamp(&Utc::now());

        sqlx::query(
            r#"
            INSERT INTO feed_follows (id, user_id, feed_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .bind(feed_id.to_string())
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await?;

        let row = sqlx::query_as::<_, FeedFollowRow>(
            r#"
            SELECT ff.id, ff.user_id, ff.feed_id, u.name AS user_name, f.name AS feed_name,
                   ff.created_at, ff.updated_at
            FROM feed_follows ff
            JOIN users u ON u.id = ff.user_id
            JOIN feeds f ON f.id = ff.feed_id
            WHERE ff.id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_one(self.pool)
        .await?;

        FeedFollow::try_from(row)
    }

    /// List the follows of a user, oldest first.
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<FeedFollow>> {
        let rows = sqlx::query_as::<_, FeedFollowRow>(
            r#"
            SELECT ff.id, ff.user_id, ff.feed_id, u.name AS user_name, f.name AS feed_name,
                   ff.created_at, ff.updated_at
            FROM feed_follows ff
            JOIN users u ON u.id = ff.user_id
            JOIN feeds f ON f.id = ff.feed_id
            WHERE ff.user_id = ?
            ORDER BY ff.created_at ASC, f.name ASC
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(FeedFollow::try_from).collect()
    }

    /// Remove a follow. Returns false if the user was not following the feed.
    pub async fn delete(&self, user_id: Uuid, feed_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM feed_follows WHERE user_id = ? AND feed_id = ?")
            .bind(user_id.to_string())
            .bind(feed_id.to_string())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Repository for post operations.
pub struct PostRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> PostRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert a post.
    ///
    /// Returns [`GatorError::Duplicate`] when a post with the same URL is
    /// already stored.
    pub async fn create(&self, post: &NewPost) -> Result<Post> {
        let now = to_db_timestamp(&post.created_at);

        sqlx::query(
            r#"
            INSERT INTO posts (id, feed_id, title, url, description, published_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(post.id.to_string())
        .bind(post.feed_id.to_string())
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(to_db_timestamp(&post.published_at))
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await?;

        self.get_by_id(post.id)
            .await?
            .ok_or_else(|| GatorError::NotFound("post".into()))
    }

    /// Get a post by ID.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Post>> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, feed_id, title, url, description, published_at, created_at, updated_at
            FROM posts
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await?;

        row.map(Post::try_from).transpose()
    }

    /// Get a post by URL.
    pub async fn get_by_url(&self, url: &str) -> Result<Option<Post>> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, feed_id, title, url, description, published_at, created_at, updated_at
            FROM posts
            WHERE url = ?
            "#,
        )
        .bind(url)
        .fetch_optional(self.pool)
        .await?;

        row.map(Post::try_from).transpose()
    }

    /// Newest posts from the feeds a user follows.
    pub async fn list_for_user(&self, user_id: Uuid, limit: usize) -> Result<Vec<PostWithFeed>> {
        let rows = sqlx::query_as::<_, PostWithFeedRow>(
            r#"
            SELECT p.id, p.feed_id, p.title, p.url, p.description, p.published_at,
                   p.created_at, p.updated_at, f.name AS feed_name
            FROM posts p
            JOIN feeds f ON f.id = p.feed_id
            JOIN feed_follows ff ON ff.feed_id = p.feed_id
            WHERE ff.user_id = ?
            ORDER BY p.published_at DESC, p.id ASC
            LIMIT ?
            "#,
        )
        .bind(user_id.to_string())
        .bind(limit as i64)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(PostWithFeed {
                    post: Post::try_from(row.post)?,
                    feed_name: row.feed_name,
                })
            })
            .collect()
    }

    /// Count posts for a feed.
    pub async fn count_by_feed(&self, feed_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE feed_id = ?")
            .bind(feed_id.to_string())
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewUser, UserRepository};
    use crate::Database;
    use chrono::TimeZone;

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    async fn create_test_user(db: &Database, name: &str) -> Uuid {
        let repo = UserRepository::new(db.pool());
        repo.create(&NewUser::new(name)).await.unwrap().id
    }

    async fn create_test_feed(db: &Database, user_id: Uuid, url: &str) -> Feed {
        let repo = FeedRepository::new(db.pool());
        repo.create(&NewFeed::new(format!("Feed {url}"), url, user_id))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_feed() {
        let db = setup_db().await;
        let user_id = create_test_user(&db, "kahya").await;

        let feed = create_test_feed(&db, user_id, "https://example.com/feed.xml").await;
        assert_eq!(feed.url, "https://example.com/feed.xml");
        assert_eq!(feed.user_id, user_id);
        assert!(feed.last_fetched_at.is_none());
    }

    #[tokio::test]
    async fn test_create_feed_duplicate_url() {
        let db = setup_db().await;
        let user_id = create_test_user(&db, "kahya").await;
        let repo = FeedRepository::new(db.pool());

        let new_feed = NewFeed::new("A", "https://example.com/feed.xml", user_id);
        repo.create(&new_feed).await.unwrap();
        let result = repo.create(&new_feed).await;
        assert!(matches!(result, Err(GatorError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_get_feed_by_url() {
        let db = setup_db().await;
        let user_id = create_test_user(&db, "kahya").await;
        let created = create_test_feed(&db, user_id, "https://example.com/feed.xml").await;

        let repo = FeedRepository::new(db.pool());
        let found = repo
            .get_by_url("https://example.com/feed.xml")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);
        assert!(repo.get_by_url("https://nope.example").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_with_creators() {
        let db = setup_db().await;
        let alice = create_test_user(&db, "alice").await;
        let bob = create_test_user(&db, "bob").await;
        create_test_feed(&db, alice, "https://a.example/feed").await;
        create_test_feed(&db, bob, "https://b.example/feed").await;

        let repo = FeedRepository::new(db.pool());
        let feeds = repo.list_with_creators().await.unwrap();
        assert_eq!(feeds.len(), 2);

        let a = feeds
            .iter()
            .find(|f| f.feed.url == "https://a.example/feed")
            .unwrap();
        assert_eq!(a.user_name, "alice");
    }

    #[tokio::test]
    async fn test_get_next_to_fetch_orders_by_staleness() {
        let db = setup_db().await;
        let user_id = create_test_user(&db, "kahya").await;
        let repo = FeedRepository::new(db.pool());

        let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();

        let newer = create_test_feed(&db, user_id, "https://newer.example/feed").await;
        let older = create_test_feed(&db, user_id, "https://older.example/feed").await;
        let never = create_test_feed(&db, user_id, "https://never.example/feed").await;
        repo.mark_fetched(newer.id, t2).await.unwrap();
        repo.mark_fetched(older.id, t1).await.unwrap();

        let next = repo.get_next_to_fetch().await.unwrap().unwrap();
        assert_eq!(next.id, never.id);

        repo.mark_fetched(never.id, t2 + chrono::Duration::hours(1))
            .await
            .unwrap();
        let next = repo.get_next_to_fetch().await.unwrap().unwrap();
        assert_eq!(next.id, older.id);
    }

    #[tokio::test]
    async fn test_get_next_to_fetch_empty() {
        let db = setup_db().await;
        let repo = FeedRepository::new(db.pool());
        assert!(repo.get_next_to_fetch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mark_fetched() {
        let db = setup_db().await;
        let user_id = create_test_user(&db, "kahya").await;
        let feed = create_test_feed(&db, user_id, "https://example.com/feed.xml").await;
        let repo = FeedRepository::new(db.pool());

        let at = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        assert!(repo.mark_fetched(feed.id, at).await.unwrap());

        let updated = repo.get_by_id(feed.id).await.unwrap().unwrap();
        assert_eq!(updated.last_fetched_at, Some(at));
        assert_eq!(updated.updated_at, at);

        assert!(!repo.mark_fetched(Uuid::new_v4(), at).await.unwrap());
    }

    #[tokio::test]
    async fn test_follow_and_unfollow() {
        let db = setup_db().await;
        let user_id = create_test_user(&db, "kahya").await;
        let feed = create_test_feed(&db, user_id, "https://example.com/feed.xml").await;
        let repo = FeedFollowRepository::new(db.pool());

        let follow = repo.create(user_id, feed.id).await.unwrap();
        assert_eq!(follow.user_name, "kahya");
        assert_eq!(follow.feed_name, feed.name);

        let again = repo.create(user_id, feed.id).await;
        assert!(matches!(again, Err(GatorError::Duplicate(_))));

        assert_eq!(repo.list_for_user(user_id).await.unwrap().len(), 1);
        assert!(repo.delete(user_id, feed.id).await.unwrap());
        assert!(!repo.delete(user_id, feed.id).await.unwrap());
        assert!(repo.list_for_user(user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_post_duplicate_url() {
        let db = setup_db().await;
        let user_id = create_test_user(&db, "kahya").await;
        let feed = create_test_feed(&db, user_id, "https://example.com/feed.xml").await;
        let repo = PostRepository::new(db.pool());

        let now = Utc::now();
        let post = NewPost::new(feed.id, "First", "https://example.com/1", now, now)
            .with_description("Summary");
        let stored = repo.create(&post).await.unwrap();
        assert_eq!(stored.title, "First");
        assert_eq!(stored.description.as_deref(), Some("Summary"));

        // Same URL with a new id must be rejected by the store.
        let dup = NewPost::new(feed.id, "First again", "https://example.com/1", now, now);
        let result = repo.create(&dup).await;
        assert!(matches!(result, Err(GatorError::Duplicate(_))));
        assert_eq!(repo.count_by_feed(feed.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_posts_for_user() {
        let db = setup_db().await;
        let user_id = create_test_user(&db, "kahya").await;
        let other = create_test_user(&db, "holgith").await;
        let followed = create_test_feed(&db, user_id, "https://a.example/feed").await;
        let unfollowed = create_test_feed(&db, other, "https://b.example/feed").await;
        FeedFollowRepository::new(db.pool())
            .create(user_id, followed.id)
            .await
            .unwrap();

        let repo = PostRepository::new(db.pool());
        let now = Utc::now();
        for day in 1..=3 {
            let published = Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap();
            repo.create(&NewPost::new(
                followed.id,
                format!("Day {day}"),
                format!("https://a.example/{day}"),
                published,
                now,
            ))
            .await
            .unwrap();
        }
        repo.create(&NewPost::new(
            unfollowed.id,
            "Elsewhere",
            "https://b.example/1",
            now,
            now,
        ))
        .await
        .unwrap();

        let posts = repo.list_for_user(user_id, 2).await.unwrap();
        let titles: Vec<_> = posts.iter().map(|p| p.post.title.as_str()).collect();
        assert_eq!(titles, vec!["Day 3", "Day 2"]);
        assert_eq!(posts[0].feed_name, followed.name);
    }

    #[tokio::test]
    async fn test_delete_user_cascades() {
        let db = setup_db().await;
        let user_id = create_test_user(&db, "kahya").await;
        create_test_feed(&db, user_id, "https://example.com/feed.xml").await;

        UserRepository::new(db.pool()).delete_all().await.unwrap();
        assert_eq!(FeedRepository::new(db.pool()).count().await.unwrap(), 0);
    }
}
