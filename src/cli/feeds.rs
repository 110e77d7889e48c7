//! Feed and follow commands.

use async_trait::async_trait;
use tracing::info;

use super::{expect_args, CommandHandler, LoggedInHandler, State};
use crate::db::User;
use crate::feed::{validate_url, Feed, FeedFollowRepository, FeedRepository, NewFeed};
use crate::{GatorError, Result};

/// `addfeed <name> <url>`: add a feed and follow it.
pub struct AddFeedCommand;

#[async_trait]
impl LoggedInHandler for AddFeedCommand {
    async fn run(&self, state: &mut State, user: &User, args: &[String]) -> Result<String> {
        expect_args(args, 2, "addfeed <name> <url>")?;
        let (name, url) = (args[0].trim(), args[1].trim());
        if name.is_empty() {
            return Err(GatorError::Validation("feed name must not be empty".into()));
        }
        validate_url(url)?;

        let feed = FeedRepository::new(state.db.pool())
            .create(&NewFeed::new(name, url, user.id))
            .await
            .map_err(|e| match e {
                GatorError::Duplicate(_) => {
                    GatorError::Validation(format!("feed {url} already exists"))
                }
                other => other,
            })?;
        let follow = FeedFollowRepository::new(state.db.pool())
            .create(user.id, feed.id)
            .await?;
        info!("User {} added feed {} ({})", user.name, feed.name, feed.url);

        Ok(format!(
            "Feed added:\n  ID:   {}\n  Name: {}\n  URL:  {}\n{} is now following {}",
            feed.id, feed.name, feed.url, follow.user_name, follow.feed_name
        ))
    }
}

/// `feeds`: list every feed with the user who added it.
pub struct FeedsCommand;

#[async_trait]
impl CommandHandler for FeedsCommand {
    async fn run(&self, state: &mut State, args: &[String]) -> Result<String> {
        expect_args(args, 0, "feeds")?;
        let feeds = FeedRepository::new(state.db.pool()).list_with_creators().await?;
        if feeds.is_empty() {
            return Ok("No feeds found".to_string());
        }

        let lines: Vec<String> = feeds
            .iter()
            .map(|f| format!("* {} ({}) added by {}", f.feed.name, f.feed.url, f.user_name))
            .collect();
        Ok(lines.join("\n"))
    }
}

/// `follow <url>`: follow an existing feed.
pub struct FollowCommand;

#[async_trait]
impl LoggedInHandler for FollowCommand {
    async fn run(&self, state: &mut State, user: &User, args: &[String]) -> Result<String> {
        expect_args(args, 1, "follow <url>")?;
        let feed = find_feed(state, &args[0]).await?;

        let follow = FeedFollowRepository::new(state.db.pool())
            .create(user.id, feed.id)
            .await
            .map_err(|e| match e {
                GatorError::Duplicate(_) => {
                    GatorError::Validation(format!("already following {}", feed.name))
                }
                other => other,
            })?;

        Ok(format!(
            "{} is now following {}",
            follow.user_name, follow.feed_name
        ))
    }
}

/// `following`: list the feeds the current user follows.
pub struct FollowingCommand;

#[async_trait]
impl LoggedInHandler for FollowingCommand {
    async fn run(&self, state: &mut State, user: &User, args: &[String]) -> Result<String> {
        expect_args(args, 0, "following")?;
        let follows = FeedFollowRepository::new(state.db.pool())
            .list_for_user(user.id)
            .await?;
        if follows.is_empty() {
            return Ok(format!("{} is not following any feeds", user.name));
        }

        let lines: Vec<String> = follows
            .iter()
            .map(|f| format!("* {}", f.feed_name))
            .collect();
        Ok(lines.join("\n"))
    }
}

/// `unfollow <url>`: stop following a feed.
pub struct UnfollowCommand;

#[async_trait]
impl LoggedInHandler for UnfollowCommand {
    async fn run(&self, state: &mut State, user: &User, args: &[String]) -> Result<String> {
        expect_args(args, 1, "unfollow <url>")?;
        let feed = find_feed(state, &args[0]).await?;

        let removed = FeedFollowRepository::new(state.db.pool())
            .delete(user.id, feed.id)
            .await?;
        if !removed {
            return Err(GatorError::NotFound(format!(
                "follow of {} by {}",
                feed.name, user.name
            )));
        }

        Ok(format!("{} unfollowed {}", user.name, feed.name))
    }
}

async fn find_feed(state: &State, url: &str) -> Result<Feed> {
    let url = url.trim();
    FeedRepository::new(state.db.pool())
        .get_by_url(url)
        .await?
        .ok_or_else(|| GatorError::NotFound(format!("feed {url}")))
}
