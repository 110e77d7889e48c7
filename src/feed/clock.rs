//! Time sources for the aggregator.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::{interval_at, Duration, Instant, Interval, MissedTickBehavior};

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// The current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Timer that paces aggregation cycles.
#[async_trait]
pub trait Ticker: Send {
    /// Wait for the next tick.
    async fn tick(&mut self);
}

/// Ticker backed by a tokio interval.
///
/// The first tick fires one full period after creation.
pub struct IntervalTicker {
    interval: Interval,
    period: Duration,
}

impl IntervalTicker {
    /// Create a ticker with the given period.
    pub fn new(period: Duration) -> Self {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, period }
    }

    /// The tick period.
    pub fn period(&self) -> Duration {
        self.period
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_current() {
        let before = Utc::now();
        let now = SystemClock.now();
        assert!(now >= before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_ticker_waits_full_period() {
        let start = Instant::now();
        let mut ticker = IntervalTicker::new(Duration::from_secs(60));
        assert_eq!(ticker.period(), Duration::from_secs(60));

        ticker.tick().await;
        assert!(Instant::now() - start >= Duration::from_secs(60));

        ticker.tick().await;
        assert!(Instant::now() - start >= Duration::from_secs(120));
    }
}
