use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Registry counters, bumped on every outcome.
#[derive(Default)]
pub struct Metrics {
    pub created_total: AtomicU64,
    pub resolved_total: AtomicU64,
    pub not_found_total: AtomicU64,
    pub expired_total: AtomicU64,
    pub gone_total: AtomicU64,
    pub pin_rejected_total: AtomicU64,
    pub swept_total: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub created_total: u64,
    pub resolved_total: u64,
    pub not_found_total: u64,
    pub expired_total: u64,
    pub gone_total: u64,
    pub pin_rejected_total: u64,
    pub swept_total: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_created(&self) {
        self.created_total.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_resolved(&self) {
        self.resolved_total.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_not_found(&self) {
        self.not_found_total.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_expired(&self) {
        self.expired_total.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_gone(&self) {
        self.gone_total.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_pin_rejected(&self) {
        self.pin_rejected_total.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_swept(&self, n: u64) {
        self.swept_total.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            created_total: self.created_total.load(Ordering::Relaxed),
            resolved_total: self.resolved_total.load(Ordering::Relaxed),
            not_found_total: self.not_found_total.load(Ordering::Relaxed),
            expired_total: self.expired_total.load(Ordering::Relaxed),
            gone_total: self.gone_total.load(Ordering::Relaxed),
            pin_rejected_total: self.pin_rejected_total.load(Ordering::Relaxed),
            swept_total: self.swept_total.load(Ordering::Relaxed),
        }
    }
}
