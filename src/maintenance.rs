//! Background maintenance tasks
//!
//! Periodic upkeep that runs beside request handling: the usage-log
//! retention sweep and eviction of closed rate-limit windows. Timing is
//! best effort; neither task shares a lock scope with request handlers
//! beyond a single sweep/evict call.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::rate_limit::RateLimiter;
use crate::usage::UsageTracker;

/// Default interval between usage-log sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Spawn the hourly (or `every`) retention sweep for `tracker`
pub fn spawn_usage_sweeper(tracker: Arc<UsageTracker>, every: Duration) -> JoinHandle<()> {
    info!(interval_secs = every.as_secs(), "Starting usage log sweeper");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick fires immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = tracker.sweep();
            debug!(removed, "Usage sweep finished");
        }
    })
}

/// Spawn periodic eviction of expired rate-limit buckets
pub fn spawn_bucket_evictor(limiter: Arc<RateLimiter>, every: Duration) -> JoinHandle<()> {
    info!(interval_secs = every.as_secs(), "Starting rate limit bucket evictor");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let evicted = limiter.evict_expired();
            debug!(evicted, "Rate limit eviction finished");
        }
    })
}
