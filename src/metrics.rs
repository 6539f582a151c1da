// Prometheus metrics for the quota subsystem
//
// Exposes metrics on /metrics HTTP endpoint:
// - Rate limit decisions per endpoint (counter)
// - Live rate limit buckets (gauge)
// - Usage records per service and outcome (counter)
// - Premium service latency (histogram)
// - Usage log sweeps and storage errors (counter)

use lazy_static::lazy_static;
use prometheus::{
    core::Collector, Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Registry,
    TextEncoder,
};
use std::sync::Arc;

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    // Rate limit metrics
    pub static ref RATE_LIMIT_DECISIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("rate_limit_decisions_total", "Rate limit decisions by endpoint and outcome"),
        &["endpoint", "outcome"]
    ).expect("Failed to create rate limit decisions metric");

    pub static ref RATE_LIMIT_BUCKETS: IntGauge = IntGauge::new(
        "rate_limit_buckets",
        "Number of window buckets held by the rate limiter"
    ).expect("Failed to create rate limit buckets metric");

    pub static ref RATE_LIMIT_EVICTIONS_TOTAL: IntCounter = IntCounter::new(
        "rate_limit_evictions_total",
        "Total number of expired rate limit buckets evicted"
    ).expect("Failed to create rate limit evictions metric");

    // Usage tracker metrics
    pub static ref USAGE_RECORDS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("usage_records_total", "Premium service attempts recorded"),
        &["service", "outcome"]
    ).expect("Failed to create usage records metric");

    pub static ref USAGE_RESPONSE_TIME_SECONDS: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new("usage_response_time_seconds", "Premium service response time for successful calls"),
        &["service"]
    ).expect("Failed to create usage response time metric");

    pub static ref USAGE_SWEPT_TOTAL: IntCounter = IntCounter::new(
        "usage_swept_records_total",
        "Total number of usage records removed by the retention sweep"
    ).expect("Failed to create usage swept metric");

    pub static ref USAGE_STORAGE_ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("usage_storage_errors_total", "Usage log storage failures by operation"),
        &["operation"]
    ).expect("Failed to create usage storage errors metric");
}

/// Initialize metrics registry
///
/// Safe to call more than once; already-registered collectors are skipped.
pub fn init() -> prometheus::Result<()> {
    register(Box::new(RATE_LIMIT_DECISIONS_TOTAL.clone()))?;
    register(Box::new(RATE_LIMIT_BUCKETS.clone()))?;
    register(Box::new(RATE_LIMIT_EVICTIONS_TOTAL.clone()))?;
    register(Box::new(USAGE_RECORDS_TOTAL.clone()))?;
    register(Box::new(USAGE_RESPONSE_TIME_SECONDS.clone()))?;
    register(Box::new(USAGE_SWEPT_TOTAL.clone()))?;
    register(Box::new(USAGE_STORAGE_ERRORS_TOTAL.clone()))?;
    Ok(())
}

fn register(collector: Box<dyn Collector>) -> prometheus::Result<()> {
    match REGISTRY.register(collector) {
        Ok(()) | Err(prometheus::Error::AlreadyReg) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}
