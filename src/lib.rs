//! Gator - a command-line RSS feed aggregator.
//!
//! Users follow RSS feeds; the `agg` command scrapes them one at a time on a
//! fixed interval and stores their posts in SQLite for `browse`.

pub mod cli;
pub mod config;
pub mod datetime;
pub mod db;
pub mod error;
pub mod feed;
pub mod logging;

pub use cli::{CommandHandler, CommandRegistry, LoggedIn, LoggedInHandler, State};
pub use config::Config;
pub use db::{Database, NewUser, User, UserRepository};
pub use error::{GatorError, Result};
pub use feed::{Aggregator, CycleReport, FeedFetcher, IngestOutcome, PostIngestor, RssFetcher};
