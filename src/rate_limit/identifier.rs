//! Caller identity resolution for rate limiting.

use axum::http::HeaderMap;

/// Identifier used when no identity or client address is available
pub const ANONYMOUS: &str = "anonymous";

const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";

/// Resolve the rate-limit identifier for a request.
///
/// Order: the authenticated identity, the first `X-Forwarded-For` hop,
/// `X-Real-IP`, then [`ANONYMOUS`]. Callers behind one NAT share a bucket.
pub fn resolve_identifier(headers: &HeaderMap, identity: Option<&str>) -> String {
    if let Some(identity) = identity.map(str::trim).filter(|id| !id.is_empty()) {
        return identity.to_string();
    }

    client_address(headers).unwrap_or_else(|| ANONYMOUS.to_string())
}

/// Client address from trusted proxy headers
pub fn client_address(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get(FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty());

    if let Some(hop) = forwarded {
        return Some(hop.to_string());
    }

    headers
        .get(REAL_IP)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}
