use std::sync::Arc;

use crate::config::AppConfig;
use crate::media::{FsImageStore, ImageStore};
use crate::metrics::Metrics;
use crate::middleware::EndpointRateLimiter;

/// The shared application state.
///
/// Cloned into every handler by axum; all members are cheap handles.
#[derive(Clone)]
pub struct AppState {
    /// The database connection pool.
    pub db: sqlx::SqlitePool,
    /// The application configuration.
    pub config: Arc<AppConfig>,
    /// Usage counters exposed on `/metrics`.
    pub metrics: Metrics,
    /// Per-endpoint limits for login and registration.
    pub rate_limiter: EndpointRateLimiter,
    /// Where recipe images are written.
    pub images: Arc<dyn ImageStore>,
}

impl AppState {
    /// Creates a new `AppState` with a filesystem image store rooted at
    /// `config.media.root` and the default endpoint limits:
    ///   - 10 login attempts per minute
    ///   - 20 registrations per minute
    pub fn new(db: sqlx::SqlitePool, config: AppConfig) -> Self {
        let images: Arc<dyn ImageStore> = Arc::new(FsImageStore::new(&config.media.root));
        Self::with_image_store(db, config, images)
    }

    pub fn with_image_store(db: sqlx::SqlitePool, config: AppConfig, images: Arc<dyn ImageStore>) -> Self {
        let rate_limiter = EndpointRateLimiter::new().with_limits(vec![
            ("POST /api/auth/token/login/", 10, 60),
            ("POST /api/users/", 20, 60),
        ]);

        Self { db, config: Arc::new(config), metrics: Metrics::new(), rate_limiter, images }
    }
}
