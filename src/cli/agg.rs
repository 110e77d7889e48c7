//! `agg <duration>`: run the aggregation loop until interrupted.

use async_trait::async_trait;
use tracing::info;

use super::{CommandHandler, State};
use crate::feed::{parse_interval, Aggregator, IntervalTicker, RssFetcher, SystemClock};
use crate::{GatorError, Result};

pub struct AggCommand;

#[async_trait]
impl CommandHandler for AggCommand {
    async fn run(&self, state: &mut State, args: &[String]) -> Result<String> {
        if args.len() > 1 {
            return Err(GatorError::Validation("usage: agg <time_between_reqs>".into()));
        }
        let interval = parse_interval(args.first().map(String::as_str).unwrap_or_default())?;
        let fetcher = RssFetcher::new(&state.config.fetcher)?;

        info!(
            "Collecting feeds every {}",
            humantime::format_duration(interval)
        );

        let aggregator = Aggregator::new(state.db.clone(), fetcher, SystemClock);
        let mut ticker = IntervalTicker::new(interval);
        aggregator.run(&mut ticker, state.cancel.clone()).await;

        Ok(String::new())
    }
}
