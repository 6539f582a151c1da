// HTTP server for the quota API
//
// Routes:
// - GET  /health                 liveness
// - GET  /metrics                Prometheus text format
// - GET  /api/usage/{service}    usage statistics and availability
// - GET  /api/usage/select       best available premium service
// - POST /api/usage              record a premium-service attempt
// - GET  /api/usage/export       usage log as CSV
//
// Every /api route is rate limited under its own endpoint label.

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::maintenance;
use crate::metrics;
use crate::rate_limit::{rate_limit_middleware, AuthenticatedUser, RateLimitLayer, RateLimiter};
use crate::usage::{Availability, FileStore, PremiumService, UsageAttempt, UsageStats, UsageTracker};

/// Header carrying the identity established by upstream authentication
pub const USER_ID_HEADER: &str = "x-user-id";

/// Shared state handed to every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub limiter: Arc<RateLimiter>,
    pub tracker: Arc<UsageTracker>,
    pub metrics_enabled: bool,
}

impl AppState {
    pub fn new(limiter: Arc<RateLimiter>, tracker: Arc<UsageTracker>) -> Self {
        Self {
            limiter,
            tracker,
            metrics_enabled: true,
        }
    }

    /// Build the limiter and a file-backed tracker from configuration
    pub fn from_config(config: &Config) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        let store = Arc::new(FileStore::new(&config.usage.data_dir));
        info!(data_dir = %store.dir().display(), "Using file-backed usage log");
        let tracker = Arc::new(UsageTracker::with_retention(
            store,
            config.usage.retention_days,
        ));
        Self {
            limiter,
            tracker,
            metrics_enabled: config.metrics.enabled,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

/// Stats plus availability for one service
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ServiceReport {
    #[serde(flatten)]
    stats: UsageStats,
    availability: Availability,
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let limiter = state.limiter.clone();
    let limited = |endpoint: &'static str| {
        middleware::from_fn_with_state(
            RateLimitLayer::new(limiter.clone(), endpoint),
            rate_limit_middleware,
        )
    };

    let api = Router::new()
        .merge(
            Router::new()
                .route("/usage/select", get(usage_select))
                .route_layer(limited("usage_select")),
        )
        .merge(
            Router::new()
                .route("/usage/export", get(usage_export))
                .route_layer(limited("usage_export")),
        )
        .merge(
            Router::new()
                .route("/usage/{service}", get(usage_stats))
                .route_layer(limited("usage_stats")),
        )
        .merge(
            Router::new()
                .route("/usage", post(usage_record))
                .route_layer(limited("usage_record")),
        );

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .nest("/api", api)
        .layer(middleware::from_fn(identity_middleware))
        .with_state(state)
}

/// Start the HTTP server and its background maintenance tasks
///
/// Runs until Ctrl-C.
pub async fn serve(config: &Config, state: AppState) -> Result<()> {
    metrics::init().context("Failed to initialize metrics")?;

    let sweeper = maintenance::spawn_usage_sweeper(
        state.tracker.clone(),
        Duration::from_secs(config.usage.sweep_interval_secs),
    );
    let evictor = maintenance::spawn_bucket_evictor(
        state.limiter.clone(),
        Duration::from_secs(config.server.eviction_interval_secs),
    );

    let limits = state.limiter.config();
    info!(
        enabled = limits.enabled,
        max_requests = limits.max_requests,
        window_ms = limits.window_ms,
        "Rate limiting configured"
    );

    let app = router(state).layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind server to {}", addr))?;

    info!(
        "Starting boardroom server on {}",
        listener.local_addr().context("Failed to read bound address")?
    );

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error");

    sweeper.abort();
    evictor.abort();
    info!("Server stopped");
    result
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Map `X-User-Id` to an [`AuthenticatedUser`] extension
async fn identity_middleware(mut request: Request, next: Next) -> Response {
    let user = request
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| AuthenticatedUser(value.to_string()));

    if let Some(user) = user {
        request.extensions_mut().insert(user);
    }
    next.run(request).await
}

/// Health check endpoint
async fn health_handler() -> impl IntoResponse {
    StatusCode::OK
}

/// Metrics endpoint handler
async fn metrics_handler(State(state): State<AppState>) -> Response {
    if !state.metrics_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }
    match metrics::gather_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text).into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error gathering metrics: {}", e),
            )
                .into_response()
        }
    }
}

async fn usage_stats(State(state): State<AppState>, Path(service): Path<String>) -> Response {
    let service: PremiumService = match service.parse() {
        Ok(service) => service,
        Err(e) => {
            warn!("Stats requested for unknown service: {}", service);
            let body = ErrorBody {
                error: "unknown_service",
                message: format!("{}", e),
            };
            return (StatusCode::NOT_FOUND, Json(body)).into_response();
        }
    };

    let report = ServiceReport {
        stats: state.tracker.stats_for(service),
        availability: state.tracker.can_use(service),
    };
    Json(report).into_response()
}

async fn usage_select(State(state): State<AppState>) -> Response {
    Json(state.tracker.select_best_available()).into_response()
}

async fn usage_record(
    State(state): State<AppState>,
    Json(attempt): Json<UsageAttempt>,
) -> Response {
    let service = attempt.service;
    // Recording writes the log to disk; keep that off the async workers
    let tracker = state.tracker.clone();
    let recorded = tokio::task::spawn_blocking(move || {
        tracker.record(attempt);
        tracker.stats_for(service)
    })
    .await;

    match recorded {
        Ok(stats) => (StatusCode::CREATED, Json(stats)).into_response(),
        Err(e) => {
            error!("Usage record task failed: {}", e);
            let body = ErrorBody {
                error: "internal_error",
                message: "Failed to record usage".to_string(),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

async fn usage_export(State(state): State<AppState>) -> Response {
    (
        [(CONTENT_TYPE, "text/csv; charset=utf-8")],
        state.tracker.export_csv(),
    )
        .into_response()
}
