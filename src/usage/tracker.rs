//! Usage Tracker
//!
//! Records premium-service attempts, derives windowed statistics from the
//! log on every query, and decides which service is safe to use next.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::export;
use super::quota::QuotaWindow;
use super::record::{UsageAttempt, UsageRecord};
use super::service::{PremiumService, ServiceLimits};
use super::storage::KeyValueStore;
use crate::error::StorageError;
use crate::metrics;

/// Storage key the usage log is persisted under
pub const STORAGE_KEY: &str = "premium_usage_log";

/// Records older than this are purged by the sweep
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

/// Derived usage statistics for one service
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub service: PremiumService,

    /// Records in the trailing 24 hours
    pub daily_usage: u32,

    /// Records in the trailing 7 days
    pub weekly_usage: u32,

    /// Records in the trailing 30 days
    pub monthly_usage: u32,

    /// Mean latency of successful records, 0 when there are none
    pub average_response_time_ms: f64,

    /// Percentage of records that succeeded, 0 when there are none
    pub success_rate: f64,

    pub limits: ServiceLimits,
}

impl UsageStats {
    /// Usage counted in `window`
    pub fn usage(&self, window: QuotaWindow) -> u32 {
        match window {
            QuotaWindow::Daily => self.daily_usage,
            QuotaWindow::Weekly => self.weekly_usage,
            QuotaWindow::Monthly => self.monthly_usage,
        }
    }

    /// Limit for `window`
    pub fn limit(&self, window: QuotaWindow) -> u32 {
        match window {
            QuotaWindow::Daily => self.limits.daily,
            QuotaWindow::Weekly => self.limits.weekly,
            QuotaWindow::Monthly => self.limits.monthly,
        }
    }

    /// Requests left today
    pub fn remaining_daily(&self) -> u32 {
        self.limits.daily.saturating_sub(self.daily_usage)
    }
}

/// Whether a service may be used right now
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub can_use: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_available_at: Option<DateTime<Utc>>,

    /// Window whose limit blocked the service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<QuotaWindow>,
}

impl Availability {
    fn available() -> Self {
        Self {
            can_use: true,
            reason: None,
            next_available_at: None,
            blocked_by: None,
        }
    }
}

/// Outcome of [`UsageTracker::select_best_available`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSelection {
    /// First usable service in priority order, if any
    pub service: Option<PremiumService>,

    pub reason: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_daily: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_rate: Option<f64>,
}

/// Tracks premium-service usage against static quotas
///
/// The log lives in memory and is written through to `store` after every
/// change. Storage failures are logged and never surface to callers.
#[derive(Debug)]
pub struct UsageTracker {
    store: Arc<dyn KeyValueStore>,
    records: Mutex<Vec<UsageRecord>>,
    retention: Duration,
}

impl UsageTracker {
    /// Create a tracker, loading any existing log from `store`
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_retention(store, DEFAULT_RETENTION_DAYS)
    }

    /// Create a tracker with a custom retention horizon in days
    pub fn with_retention(store: Arc<dyn KeyValueStore>, retention_days: i64) -> Self {
        let records = load(store.as_ref());
        debug!(records = records.len(), "Loaded usage log");
        Self {
            store,
            records: Mutex::new(records),
            retention: Duration::days(retention_days),
        }
    }

    /// Append an attempt stamped with the current time and persist the log
    pub fn record(&self, attempt: UsageAttempt) {
        self.record_at(attempt, Utc::now());
    }

    /// [`record`](Self::record) with an explicit timestamp
    pub fn record_at(&self, attempt: UsageAttempt, timestamp: DateTime<Utc>) {
        let record = attempt.into_record(timestamp);

        let outcome = if record.success { "success" } else { "failure" };
        metrics::USAGE_RECORDS_TOTAL
            .with_label_values(&[record.service.as_str(), outcome])
            .inc();
        if record.success {
            metrics::USAGE_RESPONSE_TIME_SECONDS
                .with_label_values(&[record.service.as_str()])
                .observe(record.response_time_ms as f64 / 1000.0);
        }

        debug!(
            service = %record.service,
            agent = %record.agent,
            success = record.success,
            response_time_ms = record.response_time_ms,
            "Recorded premium usage"
        );

        let mut records = self.records.lock();
        records.push(record);
        self.persist(&records);
    }

    /// Statistics for `service` as of now
    pub fn stats_for(&self, service: PremiumService) -> UsageStats {
        self.stats_for_at(service, Utc::now())
    }

    /// Statistics for `service` as of `now`, recomputed from the full log
    pub fn stats_for_at(&self, service: PremiumService, now: DateTime<Utc>) -> UsageStats {
        let records = self.records.lock();
        let day_ago = now - QuotaWindow::Daily.span();
        let week_ago = now - QuotaWindow::Weekly.span();
        let month_ago = now - QuotaWindow::Monthly.span();

        let mut daily_usage = 0;
        let mut weekly_usage = 0;
        let mut monthly_usage = 0;
        let mut total = 0u32;
        let mut successes = 0u32;
        // u128 so any number of u64 latencies sums without overflow
        let mut success_latency_ms = 0u128;

        for record in records.iter().filter(|r| r.service == service) {
            total += 1;
            if record.success {
                successes += 1;
                success_latency_ms += u128::from(record.response_time_ms);
            }
            if record.timestamp > day_ago {
                daily_usage += 1;
            }
            if record.timestamp > week_ago {
                weekly_usage += 1;
            }
            if record.timestamp > month_ago {
                monthly_usage += 1;
            }
        }

        let average_response_time_ms = if successes > 0 {
            success_latency_ms as f64 / f64::from(successes)
        } else {
            0.0
        };
        let success_rate = if total > 0 {
            f64::from(successes) / f64::from(total) * 100.0
        } else {
            0.0
        };

        UsageStats {
            service,
            daily_usage,
            weekly_usage,
            monthly_usage,
            average_response_time_ms,
            success_rate,
            limits: service.limits(),
        }
    }

    /// Whether `service` is within all of its quotas right now
    pub fn can_use(&self, service: PremiumService) -> Availability {
        self.can_use_at(service, Utc::now())
    }

    /// [`can_use`](Self::can_use) as of `now`.
    ///
    /// Monthly is checked before weekly before daily, so the coarsest
    /// violated window is the one reported.
    pub fn can_use_at(&self, service: PremiumService, now: DateTime<Utc>) -> Availability {
        let stats = self.stats_for_at(service, now);

        for window in QuotaWindow::CHECK_ORDER {
            let used = stats.usage(window);
            let limit = stats.limit(window);
            if used >= limit {
                return Availability {
                    can_use: false,
                    reason: Some(format!(
                        "{} limit reached for {} ({}/{} requests)",
                        window,
                        service.display_name(),
                        used,
                        limit
                    )),
                    next_available_at: Some(window.next_reset(now)),
                    blocked_by: Some(window),
                };
            }
        }

        Availability::available()
    }

    /// First service in priority order that can be used right now
    pub fn select_best_available(&self) -> ServiceSelection {
        self.select_best_available_at(Utc::now())
    }

    /// [`select_best_available`](Self::select_best_available) as of `now`
    pub fn select_best_available_at(&self, now: DateTime<Utc>) -> ServiceSelection {
        for service in PremiumService::PRIORITY {
            let availability = self.can_use_at(service, now);
            if !availability.can_use {
                debug!(
                    service = %service,
                    reason = availability.reason.as_deref().unwrap_or_default(),
                    "Skipping exhausted service"
                );
                continue;
            }

            let stats = self.stats_for_at(service, now);
            return ServiceSelection {
                service: Some(service),
                reason: format!(
                    "{} available ({} requests left today, {:.0}% success rate)",
                    service.display_name(),
                    stats.remaining_daily(),
                    stats.success_rate
                ),
                remaining_daily: Some(stats.remaining_daily()),
                success_rate: Some(stats.success_rate),
            };
        }

        warn!("All premium services have reached their usage limits");
        ServiceSelection {
            service: None,
            reason: "All premium services have reached their usage limits; \
                     fall back to standard API access"
                .to_string(),
            remaining_daily: None,
            success_rate: None,
        }
    }

    /// Remove records older than the retention horizon.
    ///
    /// Persists only when something was removed. Returns the number of
    /// records removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    /// [`sweep`](Self::sweep) as of `now`
    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.retention;
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|r| r.timestamp > cutoff);
        let removed = before - records.len();

        if removed > 0 {
            info!(removed, remaining = records.len(), "Swept expired usage records");
            metrics::USAGE_SWEPT_TOTAL.inc_by(removed as u64);
            self.persist(&records);
        }
        removed
    }

    /// Export the log as CSV
    pub fn export_csv(&self) -> String {
        export::to_csv(&self.records.lock())
    }

    /// Snapshot of the log, oldest first
    pub fn records(&self) -> Vec<UsageRecord> {
        self.records.lock().clone()
    }

    /// Number of records in the log
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Drop every record and persist the empty log
    pub fn clear(&self) {
        let mut records = self.records.lock();
        records.clear();
        self.persist(&records);
    }

    fn persist(&self, records: &[UsageRecord]) {
        let json = match encode(records) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "Failed to serialize usage log");
                metrics::USAGE_STORAGE_ERRORS_TOTAL
                    .with_label_values(&["serialize"])
                    .inc();
                return;
            }
        };

        if let Err(e) = self.store.set(STORAGE_KEY, &json) {
            error!(error = %e, "Failed to persist usage log");
            metrics::USAGE_STORAGE_ERRORS_TOTAL
                .with_label_values(&["write"])
                .inc();
        }
    }
}

fn encode(records: &[UsageRecord]) -> Result<String, StorageError> {
    Ok(serde_json::to_string(records)?)
}

fn decode(raw: &str) -> Result<Vec<UsageRecord>, StorageError> {
    Ok(serde_json::from_str(raw)?)
}

fn load(store: &dyn KeyValueStore) -> Vec<UsageRecord> {
    let raw = match store.get(STORAGE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(error = %e, "Failed to read usage log, starting empty");
            metrics::USAGE_STORAGE_ERRORS_TOTAL
                .with_label_values(&["read"])
                .inc();
            return Vec::new();
        }
    };

    match decode(&raw) {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, "Usage log is corrupt, starting empty");
            metrics::USAGE_STORAGE_ERRORS_TOTAL
                .with_label_values(&["decode"])
                .inc();
            Vec::new()
        }
    }
}
