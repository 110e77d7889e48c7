//! User commands.

use async_trait::async_trait;
use tracing::info;

use super::{expect_args, CommandHandler, State};
use crate::db::{NewUser, UserRepository};
use crate::{GatorError, Result};

/// `register <name>`: create a user and log in as them.
pub struct RegisterCommand;

#[async_trait]
impl CommandHandler for RegisterCommand {
    async fn run(&self, state: &mut State, args: &[String]) -> Result<String> {
        expect_args(args, 1, "register <name>")?;
        let name = &args[0];

        let user = UserRepository::new(state.db.pool())
            .create(&NewUser::new(name.as_str()))
            .await
            .map_err(|e| match e {
                GatorError::Duplicate(_) => {
                    GatorError::Validation(format!("user {name} already exists"))
                }
                other => other,
            })?;

        let path = state.config_path.clone();
        state.config.set_user(&user.name, &path)?;
        info!("Registered user {}", user.name);

        Ok(format!("User created: {user}"))
    }
}

/// `login <name>`: switch the current user.
pub struct LoginCommand;

#[async_trait]
impl CommandHandler for LoginCommand {
    async fn run(&self, state: &mut State, args: &[String]) -> Result<String> {
        expect_args(args, 1, "login <name>")?;
        let name = &args[0];

        let user = UserRepository::new(state.db.pool())
            .get_by_name(name)
            .await?
            .ok_or_else(|| GatorError::NotFound(format!("user {name}")))?;

        let path = state.config_path.clone();
        state.config.set_user(&user.name, &path)?;

        Ok(format!("Logged in as {}", user.name))
    }
}

/// `reset`: delete every user along with their feeds, follows and posts.
pub struct ResetCommand;

#[async_trait]
impl CommandHandler for ResetCommand {
    async fn run(&self, state: &mut State, args: &[String]) -> Result<String> {
        expect_args(args, 0, "reset")?;
        let removed = UserRepository::new(state.db.pool()).delete_all().await?;
        info!("Reset database, removed {} user(s)", removed);
        Ok(format!("Database reset ({removed} user(s) removed)"))
    }
}

/// `users`: list users, marking the current one.
pub struct UsersCommand;

#[async_trait]
impl CommandHandler for UsersCommand {
    async fn run(&self, state: &mut State, args: &[String]) -> Result<String> {
        expect_args(args, 0, "users")?;
        let users = UserRepository::new(state.db.pool()).list().await?;
        let current = state.config.current_user_name.as_deref();

        let lines: Vec<String> = users
            .iter()
            .map(|user| {
                if Some(user.name.as_str()) == current {
                    format!("* {} (current)", user.name)
                } else {
                    format!("* {}", user.name)
                }
            })
            .collect();

        Ok(lines.join("\n"))
    }
}
