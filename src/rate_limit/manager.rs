//! Rate Limiter
//!
//! Admission decisions for fixed-window request limits.

use axum::http::HeaderMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use super::config::RateLimitConfig;
use super::identifier::resolve_identifier;
use super::store::{window_start, CounterStore, InMemoryCounterStore, WindowCount};
use crate::metrics;

/// Result of a rate limit check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateLimitDecision {
    /// Whether the request is allowed
    pub allowed: bool,

    /// Requests counted in the current window, including this one
    pub count: u32,

    /// Requests left in the current window
    pub remaining: u32,

    /// Requests allowed per window
    pub limit: u32,

    /// Milliseconds until the current window closes
    pub reset_ms: u64,

    /// Identifier the request was counted against
    pub identifier: String,
}

impl RateLimitDecision {
    /// Seconds until the window closes, rounded up
    pub fn reset_secs(&self) -> u64 {
        self.reset_ms.div_ceil(1000)
    }

    /// Retry hint in seconds (only for rejected requests)
    pub fn retry_after_secs(&self) -> Option<u64> {
        if self.allowed {
            None
        } else {
            Some(self.reset_secs().max(1))
        }
    }
}

/// Fixed-window rate limiter
///
/// Constructed once at startup and shared with request handlers behind an
/// `Arc`. Every [`check`](Self::check) counts as one request.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    store: Arc<dyn CounterStore>,
}

impl RateLimiter {
    /// Create a limiter backed by an in-memory counter map
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_store(config, Arc::new(InMemoryCounterStore::new()))
    }

    /// Create a limiter over a custom counter store
    pub fn with_store(config: RateLimitConfig, store: Arc<dyn CounterStore>) -> Self {
        Self { config, store }
    }

    /// Create with default configuration
    pub fn default_config() -> Self {
        Self::new(RateLimitConfig::default())
    }

    /// Create a disabled rate limiter (for testing)
    pub fn disabled() -> Self {
        Self::new(RateLimitConfig::disabled())
    }

    /// Count a request and decide whether it may proceed
    pub fn check(
        &self,
        headers: &HeaderMap,
        endpoint: &str,
        identifier: Option<&str>,
    ) -> RateLimitDecision {
        self.check_at(headers, endpoint, identifier, now_ms())
    }

    /// [`check`](Self::check) against an explicit clock reading
    pub fn check_at(
        &self,
        headers: &HeaderMap,
        endpoint: &str,
        identifier: Option<&str>,
        now_ms: u64,
    ) -> RateLimitDecision {
        let identifier = resolve_identifier(headers, identifier);
        let limit = self.config.max_requests;
        let window_ms = self.config.window_ms;

        if !self.config.enabled {
            let reset_at = window_start(now_ms, window_ms) + window_ms;
            return RateLimitDecision {
                allowed: true,
                count: 0,
                remaining: limit,
                limit,
                reset_ms: reset_at.saturating_sub(now_ms),
                identifier,
            };
        }

        let key = bucket_key(endpoint, &identifier);
        let WindowCount { count, reset_at } = self.store.increment(&key, window_ms, now_ms);

        let decision = RateLimitDecision {
            allowed: count <= limit,
            count,
            remaining: limit.saturating_sub(count),
            limit,
            reset_ms: reset_at.saturating_sub(now_ms),
            identifier,
        };

        if decision.allowed {
            debug!(
                endpoint = %endpoint,
                identifier = %decision.identifier,
                count = decision.count,
                remaining = decision.remaining,
                "Request admitted"
            );
            metrics::RATE_LIMIT_DECISIONS_TOTAL
                .with_label_values(&[endpoint, "allowed"])
                .inc();
        } else {
            warn!(
                endpoint = %endpoint,
                identifier = %decision.identifier,
                count = decision.count,
                reset_ms = decision.reset_ms,
                "Rate limit exceeded"
            );
            metrics::RATE_LIMIT_DECISIONS_TOTAL
                .with_label_values(&[endpoint, "rejected"])
                .inc();
        }
        metrics::RATE_LIMIT_BUCKETS.set(self.store.len() as i64);

        decision
    }

    /// Current window counter for an endpoint and resolved identifier
    pub fn peek(&self, endpoint: &str, identifier: &str) -> WindowCount {
        self.peek_at(endpoint, identifier, now_ms())
    }

    /// [`peek`](Self::peek) against an explicit clock reading
    pub fn peek_at(&self, endpoint: &str, identifier: &str, now_ms: u64) -> WindowCount {
        self.store
            .peek(&bucket_key(endpoint, identifier), self.config.window_ms, now_ms)
    }

    /// Drop buckets for windows that have closed
    pub fn evict_expired(&self) -> usize {
        self.evict_expired_at(now_ms())
    }

    /// [`evict_expired`](Self::evict_expired) against an explicit clock reading
    pub fn evict_expired_at(&self, now_ms: u64) -> usize {
        let evicted = self.store.evict_expired(now_ms);
        if evicted > 0 {
            debug!(evicted, "Evicted expired rate limit buckets");
            metrics::RATE_LIMIT_EVICTIONS_TOTAL.inc_by(evicted as u64);
        }
        metrics::RATE_LIMIT_BUCKETS.set(self.store.len() as i64);
        evicted
    }

    /// Get current configuration
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Get counter store
    pub fn store(&self) -> &Arc<dyn CounterStore> {
        &self.store
    }
}

fn bucket_key(endpoint: &str, identifier: &str) -> String {
    format!("{}:{}", endpoint, identifier)
}

/// Wall-clock time in epoch milliseconds
pub fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::store::ExpiringCounterStore;
    use proptest::prelude::*;

    const T0: u64 = 1_700_000_040_000; // aligned to a 60s window

    fn none() -> HeaderMap {
        HeaderMap::new()
    }

    #[test]
    fn test_nth_call_reports_count_n() {
        let limiter = RateLimiter::default_config();

        for n in 1..=25u32 {
            let decision = limiter.check_at(&none(), "chat", Some("user-1"), T0 + n as u64);
            assert_eq!(decision.count, n);
            assert_eq!(decision.allowed, n <= 20);
        }
    }

    #[test]
    fn test_ai_discussion_scenario() {
        let limiter = RateLimiter::default_config();

        for _ in 0..20 {
            let decision =
                limiter.check_at(&none(), "ai_discussion", Some("user@example.com"), T0 + 500);
            assert!(decision.allowed);
        }

        let rejected =
            limiter.check_at(&none(), "ai_discussion", Some("user@example.com"), T0 + 500);
        assert!(!rejected.allowed);
        assert_eq!(rejected.remaining, 0);
        let retry_after = rejected.retry_after_secs().unwrap();
        assert!(retry_after > 0 && retry_after <= 60);
    }

    #[test]
    fn test_new_window_resets_count() {
        let limiter = RateLimiter::default_config();

        for _ in 0..21 {
            limiter.check_at(&none(), "chat", Some("user-1"), T0 + 10);
        }
        let other = limiter.check_at(&none(), "chat", Some("user-2"), T0 + 20);
        assert_eq!(other.count, 1);

        let next = limiter.check_at(&none(), "chat", Some("user-1"), T0 + 60_000);
        assert!(next.allowed);
        assert_eq!(next.count, 1);
        assert_eq!(next.remaining, 19);
    }

    #[test]
    fn test_identifiers_are_independent() {
        let limiter = RateLimiter::new(RateLimitConfig::with_limit(2, 60_000));

        limiter.check_at(&none(), "chat", Some("alice"), T0);
        limiter.check_at(&none(), "chat", Some("alice"), T0);
        let bob = limiter.check_at(&none(), "chat", Some("bob"), T0);

        assert!(bob.allowed);
        assert_eq!(bob.count, 1);
        assert_eq!(limiter.peek_at("chat", "alice", T0).count, 2);
    }

    #[test]
    fn test_endpoints_are_independent() {
        let limiter = RateLimiter::new(RateLimitConfig::with_limit(1, 60_000));

        assert!(limiter.check_at(&none(), "chat", Some("alice"), T0).allowed);
        assert!(limiter.check_at(&none(), "export", Some("alice"), T0).allowed);
        assert!(!limiter.check_at(&none(), "chat", Some("alice"), T0).allowed);
    }

    #[test]
    fn test_reset_ms_counts_to_window_boundary() {
        let limiter = RateLimiter::default_config();
        let decision = limiter.check_at(&none(), "chat", None, T0 + 15_250);

        assert_eq!(decision.identifier, "anonymous");
        assert_eq!(decision.reset_ms, 44_750);
        assert_eq!(decision.reset_secs(), 45);
        assert!(decision.retry_after_secs().is_none());
    }

    #[test]
    fn test_disabled_allows_all() {
        let limiter = RateLimiter::disabled();

        for _ in 0..200 {
            let decision = limiter.check_at(&none(), "chat", Some("user-1"), T0);
            assert!(decision.allowed);
            assert_eq!(decision.remaining, 20);
        }
        assert!(limiter.store().is_empty());
    }

    #[test]
    fn test_evict_expired_windows() {
        let limiter = RateLimiter::default_config();
        limiter.check_at(&none(), "chat", Some("a"), T0);
        limiter.check_at(&none(), "chat", Some("b"), T0 + 60_001);

        assert_eq!(limiter.evict_expired_at(T0 + 60_001), 1);
        assert_eq!(limiter.store().len(), 1);
    }

    #[test]
    fn test_custom_store() {
        let limiter = RateLimiter::with_store(
            RateLimitConfig::with_limit(3, 1_000),
            Arc::new(ExpiringCounterStore::new("test")),
        );

        for _ in 0..3 {
            assert!(limiter.check_at(&none(), "chat", Some("a"), T0).allowed);
        }
        assert!(!limiter.check_at(&none(), "chat", Some("a"), T0).allowed);
        assert!(limiter.check_at(&none(), "chat", Some("a"), T0 + 1_000).allowed);
    }

    proptest! {
        #[test]
        fn prop_remaining_never_negative(calls in 1usize..80, offset in 0u64..60_000) {
            let limiter = RateLimiter::default_config();
            for n in 1..=calls {
                let decision = limiter.check_at(&none(), "chat", Some("p"), T0 + offset);
                prop_assert_eq!(decision.count as usize, n);
                prop_assert_eq!(decision.remaining, 20u32.saturating_sub(decision.count));
                prop_assert_eq!(decision.allowed, n <= 20);
                prop_assert!(decision.reset_ms <= 60_000);
            }
        }
    }
}
