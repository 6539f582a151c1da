//! Premium Usage Tracking Module
//!
//! Tracks calls to quota-limited premium LLM services and picks a fallback
//! service when the preferred one is exhausted.
//!
//! Statistics are always recomputed from the record log (no incremental
//! counters); the log is bounded by a periodic 30-day retention sweep.

pub mod export;
pub mod quota;
pub mod record;
pub mod service;
pub mod storage;
pub mod tracker;

pub use quota::QuotaWindow;
pub use record::{ThinkingMode, UsageAttempt, UsageRecord};
pub use service::{PremiumService, ServiceLimits};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use tracker::{Availability, ServiceSelection, UsageStats, UsageTracker};
