use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Counters for the tracking pipeline
#[derive(Clone)]
pub struct Metrics {
    pub requests_logged: Arc<AtomicU64>,
    pub requests_blocked: Arc<AtomicU64>,
    pub log_write_failures: Arc<AtomicU64>,
    pub access_check_failures: Arc<AtomicU64>,
    pub geo_cache_hits: Arc<AtomicU64>,
    pub geo_cache_misses: Arc<AtomicU64>,
    pub geo_lookups: Arc<AtomicU64>,
    pub geo_lookup_failures: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            requests_logged: Arc::new(AtomicU64::new(0)),
            requests_blocked: Arc::new(AtomicU64::new(0)),
            log_write_failures: Arc::new(AtomicU64::new(0)),
            access_check_failures: Arc::new(AtomicU64::new(0)),
            geo_cache_hits: Arc::new(AtomicU64::new(0)),
            geo_cache_misses: Arc::new(AtomicU64::new(0)),
            geo_lookups: Arc::new(AtomicU64::new(0)),
            geo_lookup_failures: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_requests_logged(&self) {
        self.requests_logged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_requests_blocked(&self) {
        self.requests_blocked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_log_write_failures(&self) {
        self.log_write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_access_check_failures(&self) {
        self.access_check_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_geo_cache_hits(&self) {
        self.geo_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_geo_cache_misses(&self) {
        self.geo_cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_geo_lookups(&self) {
        self.geo_lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_geo_lookup_failures(&self) {
        self.geo_lookup_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_logged: self.requests_logged.load(Ordering::Relaxed),
            requests_blocked: self.requests_blocked.load(Ordering::Relaxed),
            log_write_failures: self.log_write_failures.load(Ordering::Relaxed),
            access_check_failures: self.access_check_failures.load(Ordering::Relaxed),
            geo_cache_hits: self.geo_cache_hits.load(Ordering::Relaxed),
            geo_cache_misses: self.geo_cache_misses.load(Ordering::Relaxed),
            geo_lookups: self.geo_lookups.load(Ordering::Relaxed),
            geo_lookup_failures: self.geo_lookup_failures.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub requests_logged: u64,
    pub requests_blocked: u64,
    pub log_write_failures: u64,
    pub access_check_failures: u64,
    pub geo_cache_hits: u64,
    pub geo_cache_misses: u64,
    pub geo_lookups: u64,
    pub geo_lookup_failures: u64,
    pub uptime_seconds: u64,
}
