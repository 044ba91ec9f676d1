use super::ip::client_ip;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{
    collections::HashMap,
    net::IpAddr,
    sync::{Arc, OnceLock},
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

use crate::error::AppError;

/// A thread-safe rate limiter based on the sliding window algorithm.
#[derive(Clone)]
pub struct RateLimiter {
    requests: Arc<RwLock<HashMap<IpAddr, Vec<Instant>>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    /// Creates a new `RateLimiter`.
    ///
    /// # Arguments
    ///
    /// * `max_requests` - The maximum number of requests allowed within the time window.
    /// * `window_seconds` - The duration of the time window in seconds.
    pub fn new(max_requests: usize, window_seconds: u64) -> Self {
        Self {
            requests: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window: Duration::from_secs(window_seconds),
        }
    }

    /// Records a request from `ip`, or rejects it with `AppError::RateLimited`
    /// when the window is already full.
    pub async fn check_rate_limit(&self, ip: IpAddr) -> Result<(), AppError> {
        let now = Instant::now();
        let mut requests = self.requests.write().await;

        let timestamps = requests.entry(ip).or_default();

        // On clock skew keep the timestamp
        timestamps.retain(|&t| now.checked_duration_since(t).map(|d| d < self.window).unwrap_or(true));

        if timestamps.len() >= self.max_requests {
            let oldest = timestamps.first().copied().unwrap_or(now);
            let retry_after = match now.checked_duration_since(oldest) {
                Some(elapsed) => self.window.saturating_sub(elapsed),
                None => Duration::from_secs(1),
            };
            return Err(AppError::RateLimited { retry_after_seconds: retry_after.as_secs().max(1) });
        }

        timestamps.push(now);
        Ok(())
    }

    /// Removes IPs whose timestamps all fell out of the window.
    pub async fn cleanup_old_entries(&self) {
        let now = Instant::now();
        let mut requests = self.requests.write().await;

        requests.retain(|_, timestamps| {
            timestamps.retain(|&t| now.checked_duration_since(t).map(|d| d < self.window).unwrap_or(true));
            !timestamps.is_empty()
        });
    }
}

/// Global per-IP rate limiting for every request.
///
/// Defaults: 1000 req / 60s, overridable via
/// `FOODGRAM_RATE_LIMIT_MAX_REQUESTS` and `FOODGRAM_RATE_LIMIT_WINDOW_SECONDS`.
pub async fn rate_limit_middleware(req: Request, next: Next) -> Response {
    let ip = client_ip(&req);

    lazy_static::lazy_static! {
        static ref GLOBAL_RATE_LIMITER: RateLimiter = {
            let max = std::env::var("FOODGRAM_RATE_LIMIT_MAX_REQUESTS")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(1000);
            let win = std::env::var("FOODGRAM_RATE_LIMIT_WINDOW_SECONDS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            RateLimiter::new(max, win)
        };
        static ref GLOBAL_CLEANUP_STARTED: OnceLock<()> = OnceLock::new();
    }

    // Periodic cleanup, started once, keeps the IP map bounded.
    GLOBAL_CLEANUP_STARTED.get_or_init(|| {
        let limiter = GLOBAL_RATE_LIMITER.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(600));
            loop {
                interval.tick().await;
                limiter.cleanup_old_entries().await;
            }
        });
    });

    match GLOBAL_RATE_LIMITER.check_rate_limit(ip).await {
        Ok(()) => next.run(req).await,
        Err(e) => e.into_response(),
    }
}

/// A manager for per-endpoint rate limiters.
///
/// Endpoints are keyed as `"<METHOD> <path>"`, e.g. `"POST /api/auth/token/login/"`.
#[derive(Clone)]
pub struct EndpointRateLimiter {
    limiters: Arc<RwLock<HashMap<String, RateLimiter>>>,
}

impl Default for EndpointRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointRateLimiter {
    /// Creates a new, empty `EndpointRateLimiter`.
    pub fn new() -> Self {
        Self { limiters: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Adds (or replaces) limits as `(endpoint, max_requests, window_seconds)`.
    pub fn with_limits(self, limits: Vec<(&str, usize, u64)>) -> Self {
        let mut limiters_map = match Arc::try_unwrap(self.limiters) {
            Ok(rwlock) => rwlock.into_inner(),
            Err(arc) => arc.try_read().map(|guard| guard.clone()).unwrap_or_default(),
        };

        for (endpoint, max_requests, window_seconds) in limits {
            limiters_map.insert(endpoint.to_string(), RateLimiter::new(max_requests, window_seconds));
        }

        Self { limiters: Arc::new(RwLock::new(limiters_map)) }
    }

    /// Checks if a request to a specific endpoint from a given IP address is allowed.
    pub async fn check_endpoint_limit(&self, endpoint: &str, ip: IpAddr) -> Result<(), AppError> {
        let limiter = {
            let limiters = self.limiters.read().await;
            limiters.get(endpoint).cloned()
        };

        match limiter {
            Some(limiter) => limiter.check_rate_limit(ip).await,
            // No specific limit for this endpoint
            None => Ok(()),
        }
    }

    /// Cleans up old entries from all endpoint-specific rate limiters.
    pub async fn cleanup_all(&self) {
        let snapshot: Vec<RateLimiter> = {
            let limiters = self.limiters.read().await;
            limiters.values().cloned().collect()
        };
        for limiter in snapshot {
            limiter.cleanup_old_entries().await;
        }
    }
}

/// Applies the per-endpoint limits configured in `AppState`.
pub async fn endpoint_rate_limit_middleware(
    State(limiter): State<EndpointRateLimiter>,
    req: Request,
    next: Next,
) -> Response {
    let key = format!("{} {}", req.method(), req.uri().path());
    let ip = client_ip(&req);
    match limiter.check_endpoint_limit(&key, ip).await {
        Ok(()) => next.run(req).await,
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter() {
        let limiter = RateLimiter::new(3, 1);
        let ip = IpAddr::from([127, 0, 0, 1]);

        assert!(limiter.check_rate_limit(ip).await.is_ok());
        assert!(limiter.check_rate_limit(ip).await.is_ok());
        assert!(limiter.check_rate_limit(ip).await.is_ok());

        // 4th request should fail
        let err = limiter.check_rate_limit(ip).await.unwrap_err();
        assert!(matches!(err, AppError::RateLimited { .. }));

        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert!(limiter.check_rate_limit(ip).await.is_ok());
    }

    #[tokio::test]
    async fn test_different_ips() {
        let limiter = RateLimiter::new(1, 60);
        let ip1 = IpAddr::from([127, 0, 0, 1]);
        let ip2 = IpAddr::from([127, 0, 0, 2]);

        assert!(limiter.check_rate_limit(ip1).await.is_ok());
        assert!(limiter.check_rate_limit(ip2).await.is_ok());

        assert!(limiter.check_rate_limit(ip1).await.is_err());
        assert!(limiter.check_rate_limit(ip2).await.is_err());
    }

    #[tokio::test]
    async fn test_endpoint_limits_are_scoped() {
        let limiter = EndpointRateLimiter::new().with_limits(vec![("POST /api/auth/token/login/", 1, 60)]);
        let ip = IpAddr::from([10, 0, 0, 1]);

        assert!(limiter.check_endpoint_limit("POST /api/auth/token/login/", ip).await.is_ok());
        assert!(limiter.check_endpoint_limit("POST /api/auth/token/login/", ip).await.is_err());
        // Unlisted endpoints are unlimited
        for _ in 0..5 {
            assert!(limiter.check_endpoint_limit("GET /api/recipes/", ip).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_cleanup_drops_expired() {
        let limiter = RateLimiter::new(5, 1);
        let ip = IpAddr::from([127, 0, 0, 9]);
        limiter.check_rate_limit(ip).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        limiter.cleanup_old_entries().await;
        assert!(limiter.requests.read().await.is_empty());
    }
}
