//! Security headers middleware for HTTP responses.
//!
//! Adds hardening headers to every response and picks a caching policy by
//! content type: API payloads and shopping-list downloads are never cached,
//! stored recipe images (immutable, uuid-named) are cached for a year.

use axum::http::header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE, PRAGMA};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::config::{AppConfig, SecurityConfig};

pub async fn security_headers_middleware(
    State(cfg): State<Arc<AppConfig>>,
    req: Request,
    next: Next,
) -> Response {
    let mut res = next.run(req).await;
    let headers = res.headers_mut();

    for (name, value) in [
        ("x-content-type-options", "nosniff"),
        ("x-frame-options", "DENY"),
        ("referrer-policy", "same-origin"),
        ("permissions-policy", "geolocation=(), microphone=(), camera=()"),
        ("cross-origin-opener-policy", "same-origin"),
        ("cross-origin-resource-policy", "same-origin"),
    ] {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }

    if let Some(sec) = cfg.security.as_ref() {
        apply_optional_headers(headers, sec);
    }

    apply_cache_policy(headers);
    res
}

fn apply_optional_headers(headers: &mut HeaderMap, sec: &SecurityConfig) {
    if sec.enable_hsts.unwrap_or(false) {
        let max_age = sec.hsts_max_age.unwrap_or(31536000);
        let include_sub = if sec.hsts_include_subdomains.unwrap_or(false) { "; includeSubDomains" } else { "" };
        let value = format!("max-age={}{}", max_age, include_sub);
        headers.insert(
            HeaderName::from_static("strict-transport-security"),
            HeaderValue::from_str(&value).unwrap_or(HeaderValue::from_static("max-age=31536000")),
        );
    }
    if let Some(csp) = sec.csp.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        if let Ok(val) = HeaderValue::from_str(csp) {
            headers.insert(HeaderName::from_static("content-security-policy"), val);
        }
    }
}

fn apply_cache_policy(headers: &mut HeaderMap) {
    let content_type = match headers.get(CONTENT_TYPE).map(|ct| ct.to_str()) {
        Some(Ok(s)) => s.to_string(),
        Some(Err(e)) => {
            tracing::warn!("Invalid UTF-8 in Content-Type header: {}", e);
            return;
        }
        None => return,
    };

    let is_attachment = headers.contains_key(CONTENT_DISPOSITION);
    if content_type.starts_with("application/json") || is_attachment {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    } else if content_type.starts_with("image/") {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("public, max-age=31536000, immutable"));
        headers.remove(PRAGMA);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_is_not_cached() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        apply_cache_policy(&mut headers);
        assert_eq!(headers.get(CACHE_CONTROL).unwrap(), "no-store");
    }

    #[test]
    fn test_images_are_cached() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("image/png"));
        apply_cache_policy(&mut headers);
        assert!(headers.get(CACHE_CONTROL).unwrap().to_str().unwrap().contains("immutable"));
    }

    #[test]
    fn test_hsts_and_csp() {
        let sec = SecurityConfig {
            enable_hsts: Some(true),
            hsts_max_age: Some(60),
            hsts_include_subdomains: Some(true),
            csp: Some("default-src 'self'".to_string()),
        };
        let mut headers = HeaderMap::new();
        apply_optional_headers(&mut headers, &sec);
        assert_eq!(headers.get("strict-transport-security").unwrap(), "max-age=60; includeSubDomains");
        assert_eq!(headers.get("content-security-policy").unwrap(), "default-src 'self'");
    }
}
