use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

// Health check endpoint - lightweight, no rate limiting
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

// Readiness check: verifies DB connectivity with timeout protection
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let query = sqlx::query("SELECT 1").fetch_one(&state.db);
    match tokio::time::timeout(std::time::Duration::from_secs(5), query).await {
        Ok(Ok(_)) => (StatusCode::OK, "ready").into_response(),
        Ok(Err(e)) => (StatusCode::SERVICE_UNAVAILABLE, format!("not ready: {}", e)).into_response(),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "not ready: timeout").into_response(),
    }
}

// Metrics endpoint: returns JSON snapshot
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.metrics.get_snapshot();
    Json(snapshot)
}

// Prometheus-compatible text exposition format
pub async fn metrics_prometheus(State(state): State<AppState>) -> impl IntoResponse {
    let m = state.metrics.get_snapshot();
    let counters = [
        ("users_registered", "Users registered", m.users_registered),
        ("logins", "Successful token logins", m.logins),
        ("recipes_created", "Recipes created", m.recipes_created),
        ("recipes_deleted", "Recipes deleted", m.recipes_deleted),
        ("favorites_added", "Recipes added to favorites", m.favorites_added),
        ("cart_items_added", "Recipes added to shopping carts", m.cart_items_added),
        ("subscriptions_created", "Subscriptions created", m.subscriptions_created),
        ("shopping_lists_downloaded", "Shopping lists downloaded", m.shopping_lists_downloaded),
    ];
    let mut body = String::new();
    for (name, help, value) in counters {
        body.push_str(&format!(
            "# HELP foodgram_{name} {help}\n# TYPE foodgram_{name} counter\nfoodgram_{name} {value}\n"
        ));
    }
    body.push_str(&format!(
        "# HELP foodgram_uptime_seconds Uptime seconds\n# TYPE foodgram_uptime_seconds gauge\nfoodgram_uptime_seconds {}\n",
        m.uptime_seconds
    ));
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

// Version/Build info endpoint (JSON)
pub async fn version() -> impl IntoResponse {
    let body = serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "package": {
            "description": env!("CARGO_PKG_DESCRIPTION"),
            "authors": env!("CARGO_PKG_AUTHORS"),
            "license": env!("CARGO_PKG_LICENSE"),
        },
        "build": {
            "profile": if cfg!(debug_assertions) { "debug" } else { "release" },
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        }
    });
    (StatusCode::OK, Json(body))
}
