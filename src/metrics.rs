use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Usage counters for monitoring
#[derive(Clone)]
pub struct Metrics {
    pub users_registered: Arc<AtomicU64>,
    pub logins: Arc<AtomicU64>,
    pub recipes_created: Arc<AtomicU64>,
    pub recipes_deleted: Arc<AtomicU64>,
    pub favorites_added: Arc<AtomicU64>,
    pub cart_items_added: Arc<AtomicU64>,
    pub subscriptions_created: Arc<AtomicU64>,
    pub shopping_lists_downloaded: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            users_registered: Arc::new(AtomicU64::new(0)),
            logins: Arc::new(AtomicU64::new(0)),
            recipes_created: Arc::new(AtomicU64::new(0)),
            recipes_deleted: Arc::new(AtomicU64::new(0)),
            favorites_added: Arc::new(AtomicU64::new(0)),
            cart_items_added: Arc::new(AtomicU64::new(0)),
            subscriptions_created: Arc::new(AtomicU64::new(0)),
            shopping_lists_downloaded: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_users_registered(&self) {
        self.users_registered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_logins(&self) {
        self.logins.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_recipes_created(&self) {
        self.recipes_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_recipes_deleted(&self) {
        self.recipes_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_favorites_added(&self) {
        self.favorites_added.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cart_items_added(&self) {
        self.cart_items_added.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_subscriptions_created(&self) {
        self.subscriptions_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_shopping_lists_downloaded(&self) {
        self.shopping_lists_downloaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            users_registered: self.users_registered.load(Ordering::Relaxed),
            logins: self.logins.load(Ordering::Relaxed),
            recipes_created: self.recipes_created.load(Ordering::Relaxed),
            recipes_deleted: self.recipes_deleted.load(Ordering::Relaxed),
            favorites_added: self.favorites_added.load(Ordering::Relaxed),
            cart_items_added: self.cart_items_added.load(Ordering::Relaxed),
            subscriptions_created: self.subscriptions_created.load(Ordering::Relaxed),
            shopping_lists_downloaded: self.shopping_lists_downloaded.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
pub struct MetricsSnapshot {
    pub users_registered: u64,
    pub logins: u64,
    pub recipes_created: u64,
    pub recipes_deleted: u64,
    pub favorites_added: u64,
    pub cart_items_added: u64,
    pub subscriptions_created: u64,
    pub shopping_lists_downloaded: u64,
    pub uptime_seconds: u64,
}
