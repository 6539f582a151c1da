//! Rate Limit Configuration
//!
//! Configuration for the fixed-window request limiter.

use serde::{Deserialize, Serialize};

/// Default window size in milliseconds
pub const DEFAULT_WINDOW_MS: u64 = 60_000;

/// Default requests allowed per identifier per endpoint per window
pub const DEFAULT_MAX_REQUESTS: u32 = 20;

/// Rate limit configuration
///
/// Read once when a [`RateLimiter`](super::RateLimiter) is constructed; a
/// running limiter never changes its window or limit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    pub enabled: bool,

    /// Window size in milliseconds
    pub window_ms: u64,

    /// Requests allowed per window
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: DEFAULT_WINDOW_MS,
            max_requests: DEFAULT_MAX_REQUESTS,
        }
    }
}

impl RateLimitConfig {
    /// Configuration with a custom limit and window
    pub fn with_limit(max_requests: u32, window_ms: u64) -> Self {
        Self {
            enabled: true,
            window_ms,
            max_requests,
        }
    }

    /// Disable rate limiting (for testing)
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.window_ms == 0 {
            anyhow::bail!("Rate limit window must be > 0 ms");
        }
        if self.max_requests == 0 {
            anyhow::bail!("Rate limit max_requests must be > 0");
        }
        Ok(())
    }
}
