#[cfg(test)]
mod tests {
    use axum::http::{header, Method, StatusCode};

    use crate::tests::common::setup_test_app;

    #[tokio::test]
    async fn test_healthz_endpoint() {
        let t = setup_test_app().await;
        let (status, body) = t.text("/healthz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_readyz_endpoint_ok() {
        let t = setup_test_app().await;
        let (status, body) = t.text("/readyz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ready");
    }

    #[tokio::test]
    async fn test_version_endpoint() {
        let t = setup_test_app().await;
        let (status, v) = t.get("/version", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["name"], "foodgram");
        assert!(!v["version"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_metrics_count_registrations() {
        let t = setup_test_app().await;
        t.signup("counter").await;

        let (status, v) = t.get("/metrics", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["users_registered"], 1);
        assert_eq!(v["logins"], 1);
        assert_eq!(v["recipes_created"], 0);
    }

    #[tokio::test]
    async fn test_metrics_prometheus_format() {
        let t = setup_test_app().await;
        let (status, body) = t.text("/metrics/prometheus", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("# TYPE foodgram_recipes_created counter"));
        assert!(body.contains("foodgram_shopping_lists_downloaded 0"));
        assert!(body.contains("foodgram_uptime_seconds"));
    }

    #[tokio::test]
    async fn test_security_headers_present() {
        let t = setup_test_app().await;
        let response = t.raw(Method::GET, "/api/tags/", None, None).await;

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
        assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
        assert!(headers.contains_key("referrer-policy"));
        assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "no-store");
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let t = setup_test_app().await;
        let response = t.raw(Method::GET, "/media/%2e%2e/test.db", None, None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_login_rate_limited() {
        let t = setup_test_app().await;
        let body = serde_json::json!({"email": "nobody@example.com", "password": "x"});
        for _ in 0..10 {
            let (status, _) = t.post("/api/auth/token/login/", None, body.clone()).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
        let (status, v) = t.post("/api/auth/token/login/", None, body).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(v["error"]["code"], "RATE_LIMITED");
    }
}
