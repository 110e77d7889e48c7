//! Command dispatch for the gator CLI.
//!
//! Every command word maps to a [`CommandHandler`] in a [`CommandRegistry`].
//! Handlers that act on behalf of the current user implement
//! [`LoggedInHandler`] instead and are registered through [`LoggedIn`], which
//! resolves the user from the configuration first.

mod agg;
mod browse;
mod feeds;
mod users;

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::db::{User, UserRepository};
use crate::{Config, Database, GatorError, Result};

pub use agg::AggCommand;
pub use browse::{BrowseCommand, DEFAULT_BROWSE_LIMIT};
pub use feeds::{AddFeedCommand, FeedsCommand, FollowCommand, FollowingCommand, UnfollowCommand};
pub use users::{LoginCommand, RegisterCommand, ResetCommand, UsersCommand};

/// State shared by all commands of one invocation.
pub struct State {
    /// Open database.
    pub db: Database,
    /// Loaded configuration.
    pub config: Config,
    /// Where the configuration is persisted.
    pub config_path: PathBuf,
    /// Stops long-running commands.
    pub cancel: CancellationToken,
}

impl State {
    /// Create command state.
    pub fn new(db: Database, config: Config, config_path: impl Into<PathBuf>) -> Self {
        Self {
            db,
            config,
            config_path: config_path.into(),
            cancel: CancellationToken::new(),
        }
    }
}

/// A CLI command.
///
/// Returns the text to show the user, which may be empty.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Run the command.
    async fn run(&self, state: &mut State, args: &[String]) -> Result<String>;
}

/// A command that needs the logged-in user.
#[async_trait]
pub trait LoggedInHandler: Send + Sync {
    /// Run the command for `user`.
    async fn run(&self, state: &mut State, user: &User, args: &[String]) -> Result<String>;
}

/// Adapter that resolves the current user before running a [`LoggedInHandler`].
pub struct LoggedIn<H>(pub H);

#[async_trait]
impl<H: LoggedInHandler> CommandHandler for LoggedIn<H> {
    async fn run(&self, state: &mut State, args: &[String]) -> Result<String> {
        let name = state
            .config
            .current_user_name
            .clone()
            .ok_or_else(|| GatorError::Validation("not logged in".into()))?;

        let user = UserRepository::new(state.db.pool())
            .get_by_name(&name)
            .await?
            .ok_or_else(|| GatorError::NotFound(format!("user {name}")))?;

        self.0.run(state, &user, args).await
    }
}

/// Name to handler lookup.
#[derive(Default)]
pub struct CommandRegistry {
    handlers: HashMap<String, Box<dyn CommandHandler>>,
}

impl CommandRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every gator command.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("register", RegisterCommand);
        registry.register("login", LoginCommand);
        registry.register("reset", ResetCommand);
        registry.register("users", UsersCommand);
        registry.register("agg", AggCommand);
        registry.register("addfeed", LoggedIn(AddFeedCommand));
        registry.register("feeds", FeedsCommand);
        registry.register("follow", LoggedIn(FollowCommand));
        registry.register("following", LoggedIn(FollowingCommand));
        registry.register("unfollow", LoggedIn(UnfollowCommand));
        registry.register("browse", LoggedIn(BrowseCommand));
        registry
    }

    /// Register a handler, replacing any existing one with the same name.
    pub fn register(&mut self, name: &str, handler: impl CommandHandler + 'static) {
        self.handlers.insert(name.to_string(), Box::new(handler));
    }

    /// Registered command names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Run the named command.
    pub async fn run(&self, state: &mut State, name: &str, args: &[String]) -> Result<String> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| {
                GatorError::Validation(format!(
                    "unknown command: {name} (available: {})",
                    self.names().join(", ")
                ))
            })?;
        handler.run(state, args).await
    }
}

/// Check the argument count of a command.
fn expect_args(args: &[String], count: usize, usage: &str) -> Result<()> {
    if args.len() != count {
        return Err(GatorError::Validation(format!("usage: {usage}")));
    }
    Ok(())
}
