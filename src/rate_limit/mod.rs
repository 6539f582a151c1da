//! Rate Limiting Module
//!
//! This module provides fixed-window request rate limiting keyed by
//! endpoint and caller identity, plus the HTTP glue that turns a rejected
//! decision into a `429 Too Many Requests` response.
//!
//! # Features
//!
//! - Epoch-aligned fixed windows (`window_start = floor(now / window) * window`)
//! - Caller identity from the authenticated user, proxy headers, or `anonymous`
//! - Pluggable counter storage behind [`CounterStore`]
//! - Standard `X-RateLimit-*` and `Retry-After` response headers
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              enforce() / rate_limit_middleware               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────┐    ┌─────────────────────────┐     │
//! │  │ Identifier resolver │ -> │      RateLimiter        │     │
//! │  └─────────────────────┘    └─────────────────────────┘     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │   CounterStore (InMemory | Expiring)                 │   │
//! │  └─────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod enforce;
pub mod identifier;
pub mod manager;
pub mod store;

pub use config::RateLimitConfig;
pub use enforce::{
    admit, enforce, rate_limit_middleware, AuthenticatedUser, RateLimitContext,
    RateLimitLayer,
};
pub use identifier::resolve_identifier;
pub use manager::{RateLimitDecision, RateLimiter};
pub use store::{CounterStore, ExpiringCounterStore, InMemoryCounterStore, WindowCount};
