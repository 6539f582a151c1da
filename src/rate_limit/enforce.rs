//! HTTP enforcement of rate limit decisions.

use axum::{
    extract::{Request, State},
    http::{header::RETRY_AFTER, HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use super::manager::{RateLimitDecision, RateLimiter};

/// Machine-readable error code on rejected requests
pub const RATE_LIMITED: &str = "rate_limited";

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Identity established by upstream authentication
///
/// Inserted into request extensions; takes precedence over network
/// address when resolving the rate-limit identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

/// Per-call enforcement context
#[derive(Debug, Clone, Copy)]
pub struct RateLimitContext<'a> {
    /// Endpoint label the request is counted under
    pub endpoint: &'a str,

    /// Pre-resolved caller identity, if any
    pub identifier: Option<&'a str>,
}

impl<'a> RateLimitContext<'a> {
    pub fn new(endpoint: &'a str) -> Self {
        Self {
            endpoint,
            identifier: None,
        }
    }

    pub fn with_identifier(mut self, identifier: &'a str) -> Self {
        self.identifier = Some(identifier);
        self
    }
}

#[derive(Debug, Serialize)]
struct RateLimitedBody {
    error: &'static str,
    message: String,
}

/// Count `request` and return a rejection response if it is over the limit.
///
/// `None` means the caller may proceed.
pub fn enforce<B>(
    limiter: &RateLimiter,
    request: &axum::http::Request<B>,
    context: RateLimitContext<'_>,
) -> Option<Response> {
    admit(limiter, request, context).err()
}

/// Count `request`; the admitting decision, or the 429 response
pub fn admit<B>(
    limiter: &RateLimiter,
    request: &axum::http::Request<B>,
    context: RateLimitContext<'_>,
) -> Result<RateLimitDecision, Response> {
    let decision = limiter.check(request.headers(), context.endpoint, context.identifier);
    if decision.allowed {
        Ok(decision)
    } else {
        Err(rejection_response(&decision))
    }
}

/// Build the `429 Too Many Requests` response for a rejected decision
pub fn rejection_response(decision: &RateLimitDecision) -> Response {
    let body = RateLimitedBody {
        error: RATE_LIMITED,
        message: format!(
            "Too many requests. You can make {} requests per window; try again in {} seconds.",
            decision.limit,
            decision.retry_after_secs().unwrap_or_else(|| decision.reset_secs())
        ),
    };

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    apply_headers(response.headers_mut(), decision);
    response
}

/// Attach the `X-RateLimit-*` headers, plus `Retry-After` when rejected
pub fn apply_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_secs()));
    if let Some(retry_after) = decision.retry_after_secs() {
        headers.insert(RETRY_AFTER, HeaderValue::from(retry_after));
    }
}

/// State for [`rate_limit_middleware`]: the shared limiter and the
/// endpoint label for the routes it wraps
#[derive(Debug, Clone)]
pub struct RateLimitLayer {
    pub limiter: Arc<RateLimiter>,
    pub endpoint: &'static str,
}

impl RateLimitLayer {
    pub fn new(limiter: Arc<RateLimiter>, endpoint: &'static str) -> Self {
        Self { limiter, endpoint }
    }
}

/// axum middleware: reject over-limit requests, otherwise run the handler
/// and add the informational rate-limit headers to its response
pub async fn rate_limit_middleware(
    State(layer): State<RateLimitLayer>,
    request: Request,
    next: Next,
) -> Response {
    let identity = request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|user| user.0.clone());

    let mut context = RateLimitContext::new(layer.endpoint);
    if let Some(identity) = identity.as_deref() {
        context = context.with_identifier(identity);
    }
    let decision = match admit(&layer.limiter, &request, context) {
        Ok(decision) => decision,
        Err(rejection) => return rejection,
    };

    let mut response = next.run(request).await;
    apply_headers(response.headers_mut(), &decision);
    response
}
