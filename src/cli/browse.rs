//! `browse [limit]`: newest posts from the feeds the current user follows.

use async_trait::async_trait;

use super::{LoggedInHandler, State};
use crate::datetime::format_utc_datetime;
use crate::db::User;
use crate::feed::{PostRepository, PostWithFeed};
use crate::{GatorError, Result};

/// Number of posts shown when no limit is given.
pub const DEFAULT_BROWSE_LIMIT: usize = 2;

const DATE_FORMAT: &str = "%a %b %e %Y %H:%M %Z";

pub struct BrowseCommand;

#[async_trait]
impl LoggedInHandler for BrowseCommand {
    async fn run(&self, state: &mut State, user: &User, args: &[String]) -> Result<String> {
        let limit = match args {
            [] => DEFAULT_BROWSE_LIMIT,
            [limit] => parse_limit(limit)?,
            _ => return Err(GatorError::Validation("usage: browse [limit]".into())),
        };

        let posts = PostRepository::new(state.db.pool())
            .list_for_user(user.id, limit)
            .await?;
        if posts.is_empty() {
            return Ok("No posts yet".to_string());
        }

        let timezone = &state.config.display.timezone;
        let mut out = format!("Found {} post(s) for {}:", posts.len(), user.name);
        for post in &posts {
            out.push('\n');
            out.push_str(&render_post(post, timezone));
        }
        Ok(out)
    }
}

fn parse_limit(s: &str) -> Result<usize> {
    match s.trim().parse::<usize>() {
        Ok(limit) if limit > 0 => Ok(limit),
        _ => Err(GatorError::Validation(format!(
            "limit must be a positive number, got {s:?}"
        ))),
    }
}

fn render_post(entry: &PostWithFeed, timezone: &str) -> String {
    let post = &entry.post;
    let mut out = format!(
        "{} from {}\n--- {} ---\n",
        format_utc_datetime(&post.published_at, timezone, DATE_FORMAT),
        entry.feed_name,
        post.title
    );
    if let Some(description) = &post.description {
        out.push_str(&format!("    {}\n", description));
    }
    out.push_str(&format!("Link: {}\n=====================================", post.url));
    out
}
