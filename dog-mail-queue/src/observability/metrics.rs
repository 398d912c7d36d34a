use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;

use crate::EmailCategory;

/// Live counters for queue operations
pub struct LiveMetrics {
    enqueued: AtomicU64,
    fallback_sent: AtomicU64,
    sent: AtomicU64,
    retried: AtomicU64,
    exhausted: AtomicU64,
    deferred: AtomicU64,
    store_errors: AtomicU64,

    // Per-category outcomes
    categories: RwLock<HashMap<EmailCategory, CategoryMetrics>>,
}

impl LiveMetrics {
    pub fn new() -> Self {
        Self {
            enqueued: AtomicU64::new(0),
            fallback_sent: AtomicU64::new(0),
            sent: AtomicU64::new(0),
            retried: AtomicU64::new(0),
            exhausted: AtomicU64::new(0),
            deferred: AtomicU64::new(0),
            store_errors: AtomicU64::new(0),
            categories: RwLock::new(HashMap::new()),
        }
    }

    pub fn increment_enqueued(&self, category: EmailCategory) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        self.categories.write().entry(category).or_default().enqueued += 1;
    }

    pub fn increment_fallback_sent(&self, category: EmailCategory) {
        self.fallback_sent.fetch_add(1, Ordering::Relaxed);
        self.categories.write().entry(category).or_default().sent += 1;
    }

    pub fn increment_sent(&self, category: EmailCategory) {
        self.sent.fetch_add(1, Ordering::Relaxed);
        self.categories.write().entry(category).or_default().sent += 1;
    }

    pub fn increment_retried(&self, category: EmailCategory) {
        self.retried.fetch_add(1, Ordering::Relaxed);
        self.categories.write().entry(category).or_default().retried += 1;
    }

    pub fn increment_exhausted(&self, category: EmailCategory) {
        self.exhausted.fetch_add(1, Ordering::Relaxed);
        self.categories.write().entry(category).or_default().exhausted += 1;
    }

    pub fn increment_deferred(&self) {
        self.deferred.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_store_errors(&self) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get metrics for one category
    pub fn category(&self, category: EmailCategory) -> Option<CategoryMetrics> {
        self.categories.read().get(&category).cloned()
    }

    /// Point-in-time copy of the global counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            fallback_sent: self.fallback_sent.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
        }
    }
}

impl Default for LiveMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Global counters at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub enqueued: u64,
    pub fallback_sent: u64,
    pub sent: u64,
    pub retried: u64,
    pub exhausted: u64,
    pub deferred: u64,
    pub store_errors: u64,
}

/// Outcomes for one email category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryMetrics {
    pub enqueued: u64,
    pub sent: u64,
    pub retried: u64,
    pub exhausted: u64,
}

impl CategoryMetrics {
    /// Delivered share of finished jobs, as a percentage
    pub fn success_rate(&self) -> f64 {
        let finished = self.sent + self.exhausted;
        if finished == 0 {
            100.0
        } else {
            (self.sent as f64 / finished as f64) * 100.0
        }
    }
}
