use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use boardroom_limits::rate_limit::{RateLimitConfig, RateLimiter};
use boardroom_limits::server::{router, AppState};
use boardroom_limits::usage::{MemoryStore, UsageTracker};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app_with_limit(max_requests: u32) -> Router {
    let state = AppState::new(
        Arc::new(RateLimiter::new(RateLimitConfig::with_limit(
            max_requests,
            60_000,
        ))),
        Arc::new(UsageTracker::new(Arc::new(MemoryStore::new()))),
    );
    router(state)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_as(uri: &str, user: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-user-id", user)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

#[tokio::test]
async fn test_success_carries_rate_limit_headers() {
    let app = app_with_limit(20);

    let response = app.oneshot(get("/api/usage/select")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["x-ratelimit-limit"], "20");
    assert_eq!(headers["x-ratelimit-remaining"], "19");
    let reset: u64 = headers["x-ratelimit-reset"].to_str().unwrap().parse().unwrap();
    assert!((1..=60).contains(&reset));
    assert!(headers.get("retry-after").is_none());
}

#[tokio::test]
async fn test_rejects_after_limit_with_429() {
    let app = app_with_limit(3);

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(get_as("/api/usage/select", "ceo@example.com"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(get_as("/api/usage/select", "ceo@example.com"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
    let retry_after: u64 = response.headers()["retry-after"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));

    let body = body_json(response).await;
    assert_eq!(body["error"], "rate_limited");
    assert!(body["message"].as_str().unwrap().contains("3 requests"));
}

#[tokio::test]
async fn test_identities_are_counted_separately() {
    let app = app_with_limit(1);

    let first = app
        .clone()
        .oneshot(get_as("/api/usage/select", "cfo@example.com"))
        .await
        .unwrap();
    let second = app
        .clone()
        .oneshot(get_as("/api/usage/select", "cto@example.com"))
        .await
        .unwrap();
    let again = app
        .clone()
        .oneshot(get_as("/api/usage/select", "cfo@example.com"))
        .await
        .unwrap();

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(again.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_endpoints_are_counted_separately() {
    let app = app_with_limit(1);

    let select = app.clone().oneshot(get("/api/usage/select")).await.unwrap();
    let export = app.clone().oneshot(get("/api/usage/export")).await.unwrap();
    let select_again = app.clone().oneshot(get("/api/usage/select")).await.unwrap();

    assert_eq!(select.status(), StatusCode::OK);
    assert_eq!(export.status(), StatusCode::OK);
    assert_eq!(select_again.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_forwarded_address_identifies_anonymous_callers() {
    let app = app_with_limit(1);
    let from = |addr: &str| {
        Request::builder()
            .uri("/api/usage/select")
            .header("x-forwarded-for", addr)
            .body(Body::empty())
            .unwrap()
    };

    let a = app.clone().oneshot(from("198.51.100.7, 10.0.0.1")).await.unwrap();
    let b = app.clone().oneshot(from("198.51.100.8")).await.unwrap();
    let a_again = app.clone().oneshot(from("198.51.100.7")).await.unwrap();

    assert_eq!(a.status(), StatusCode::OK);
    assert_eq!(b.status(), StatusCode::OK);
    assert_eq!(a_again.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_record_then_stats() {
    let app = app_with_limit(20);

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/usage",
            json!({
                "service": "claude_pro",
                "agent": "CEO",
                "topic": "Quarterly strategy",
                "thinkingMode": "deep",
                "success": true,
                "responseTime": 1800
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let recorded = body_json(response).await;
    assert_eq!(recorded["dailyUsage"], 1);

    let response = app
        .clone()
        .oneshot(get("/api/usage/claude_pro"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let stats = body_json(response).await;
    assert_eq!(stats["service"], "claude_pro");
    assert_eq!(stats["dailyUsage"], 1);
    assert_eq!(stats["weeklyUsage"], 1);
    assert_eq!(stats["monthlyUsage"], 1);
    assert_eq!(stats["averageResponseTimeMs"], 1800.0);
    assert_eq!(stats["successRate"], 100.0);
    assert_eq!(stats["limits"]["daily"], 66);
    assert_eq!(stats["availability"]["canUse"], true);
}

#[tokio::test]
async fn test_record_rejects_malformed_body() {
    let app = app_with_limit(20);

    let response = app
        .oneshot(post_json("/api/usage", json!({ "service": "copilot" })))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_unknown_service_is_404() {
    let app = app_with_limit(20);

    let response = app.oneshot(get("/api/usage/copilot")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"], "unknown_service");
}

#[tokio::test]
async fn test_select_prefers_priority_order() {
    let app = app_with_limit(20);

    let response = app.oneshot(get("/api/usage/select")).await.unwrap();
    let body = body_json(response).await;

    assert_eq!(body["service"], "claude_pro");
    assert_eq!(body["remainingDaily"], 66);
}

#[tokio::test]
async fn test_export_csv() {
    let app = app_with_limit(20);

    app.clone()
        .oneshot(post_json(
            "/api/usage",
            json!({
                "service": "gemini_advanced",
                "agent": "CTO",
                "topic": "Platform roadmap",
                "success": false,
                "responseTime": 0,
                "errorMessage": "quota exceeded"
            }),
        ))
        .await
        .unwrap();

    let response = app.oneshot(get("/api/usage/export")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/csv"));

    let csv = body_text(response).await;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].ends_with(
        "gemini_advanced,\"CTO\",\"Platform roadmap\",balanced,false,0,\"quota exceeded\""
    ));
}

#[tokio::test]
async fn test_disabled_limiter_never_rejects() {
    let state = AppState::new(
        Arc::new(RateLimiter::disabled()),
        Arc::new(UsageTracker::new(Arc::new(MemoryStore::new()))),
    );
    let app = router(state);

    for _ in 0..30 {
        let response = app.clone().oneshot(get("/api/usage/select")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
