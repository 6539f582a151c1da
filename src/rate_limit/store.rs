//! Counter Store
//!
//! Storage for fixed-window request counters. The limiter only talks to the
//! [`CounterStore`] trait, so a shared counter service can replace the
//! in-process map without touching admission logic.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Debug;

/// Counter state for one key in its current window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowCount {
    /// Requests counted in the window
    pub count: u32,

    /// Epoch milliseconds at which the window closes
    pub reset_at: u64,
}

/// Start of the epoch-aligned window containing `now_ms`
pub fn window_start(now_ms: u64, window_ms: u64) -> u64 {
    let window_ms = window_ms.max(1);
    (now_ms / window_ms) * window_ms
}

/// Backing storage for window counters
///
/// All methods are synchronous; implementations must not block on I/O.
pub trait CounterStore: Send + Sync + Debug {
    /// Increment the counter for `key` in the window containing `now_ms`
    fn increment(&self, key: &str, window_ms: u64, now_ms: u64) -> WindowCount;

    /// Read the counter for `key` in the window containing `now_ms`
    fn peek(&self, key: &str, window_ms: u64, now_ms: u64) -> WindowCount;

    /// Drop buckets whose window closed at or before `now_ms`
    ///
    /// Returns the number of buckets removed.
    fn evict_expired(&self, now_ms: u64) -> usize;

    /// Number of live buckets
    fn len(&self) -> usize;

    /// Whether the store holds no buckets
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Hash, Eq, PartialEq)]
struct BucketKey {
    key: String,
    window_start: u64,
}

/// In-process counter map
///
/// Buckets are never removed on their own; call
/// [`evict_expired`](CounterStore::evict_expired) periodically in
/// long-running processes.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    buckets: Mutex<HashMap<BucketKey, WindowCount>>,
}

impl InMemoryCounterStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl CounterStore for InMemoryCounterStore {
    fn increment(&self, key: &str, window_ms: u64, now_ms: u64) -> WindowCount {
        let start = window_start(now_ms, window_ms);
        let bucket_key = BucketKey {
            key: key.to_string(),
            window_start: start,
        };

        let mut buckets = self.buckets.lock();
        let bucket = buckets.entry(bucket_key).or_insert(WindowCount {
            count: 0,
            reset_at: start + window_ms,
        });
        bucket.count = bucket.count.saturating_add(1);
        *bucket
    }

    fn peek(&self, key: &str, window_ms: u64, now_ms: u64) -> WindowCount {
        let start = window_start(now_ms, window_ms);
        let bucket_key = BucketKey {
            key: key.to_string(),
            window_start: start,
        };

        let buckets = self.buckets.lock();
        buckets.get(&bucket_key).copied().unwrap_or(WindowCount {
            count: 0,
            reset_at: start + window_ms,
        })
    }

    fn evict_expired(&self, now_ms: u64) -> usize {
        let mut buckets = self.buckets.lock();
        let before = buckets.len();
        buckets.retain(|_, bucket| bucket.reset_at > now_ms);
        before - buckets.len()
    }

    fn len(&self) -> usize {
        self.buckets.lock().len()
    }
}

/// Counter store with shared-service semantics
///
/// Models an external counter service with per-key expiry (increment plus
/// TTL): keys live under a namespace and expired buckets are dropped by the
/// first increment after the earliest live bucket expires. Only the
/// in-process backend exists today, so counts are not shared across
/// processes.
#[derive(Debug)]
pub struct ExpiringCounterStore {
    namespace: String,
    state: Mutex<ExpiringState>,
}

#[derive(Debug)]
struct ExpiringState {
    buckets: HashMap<String, WindowCount>,
    /// Earliest `reset_at` among live buckets
    next_expiry: u64,
}

impl ExpiringState {
    fn purge(&mut self, now_ms: u64) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| bucket.reset_at > now_ms);
        self.next_expiry = self
            .buckets
            .values()
            .map(|bucket| bucket.reset_at)
            .min()
            .unwrap_or(u64::MAX);
        before - self.buckets.len()
    }
}

impl ExpiringCounterStore {
    /// Create a store whose keys are prefixed with `namespace`
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            state: Mutex::new(ExpiringState {
                buckets: HashMap::new(),
                next_expiry: u64::MAX,
            }),
        }
    }

    fn storage_key(&self, key: &str, start: u64) -> String {
        format!("{}:{}:{}", self.namespace, key, start)
    }
}

impl CounterStore for ExpiringCounterStore {
    fn increment(&self, key: &str, window_ms: u64, now_ms: u64) -> WindowCount {
        let start = window_start(now_ms, window_ms);
        let storage_key = self.storage_key(key, start);

        let reset_at = start + window_ms;

        let mut state = self.state.lock();
        if now_ms >= state.next_expiry {
            state.purge(now_ms);
        }
        state.next_expiry = state.next_expiry.min(reset_at);
        let bucket = state
            .buckets
            .entry(storage_key)
            .or_insert(WindowCount { count: 0, reset_at });
        bucket.count = bucket.count.saturating_add(1);
        *bucket
    }

    fn peek(&self, key: &str, window_ms: u64, now_ms: u64) -> WindowCount {
        let start = window_start(now_ms, window_ms);
        let state = self.state.lock();
        state
            .buckets
            .get(&self.storage_key(key, start))
            .copied()
            .unwrap_or(WindowCount {
                count: 0,
                reset_at: start + window_ms,
            })
    }

    fn evict_expired(&self, now_ms: u64) -> usize {
        self.state.lock().purge(now_ms)
    }

    fn len(&self) -> usize {
        self.state.lock().buckets.len()
    }
}
