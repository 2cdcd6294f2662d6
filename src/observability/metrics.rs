//! Metrics collection for the megaverse client.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::types::ObjectKind;

/// Metrics collector interface.
pub trait MetricsCollector: Send + Sync {
    /// Records the final result of one call, retries included.
    fn record_request(&self, endpoint: &str, success: bool, duration: Duration);

    /// Records a retry of a call.
    fn record_retry(&self, endpoint: &str);

    /// Records an error by its kind label.
    fn record_error(&self, kind: &str);

    /// Records an object placed on the grid.
    fn record_created(&self, kind: ObjectKind);

    /// Records an object removed from the grid.
    fn record_deleted(&self, kind: ObjectKind);

    /// Gets current metrics.
    fn get_metrics(&self) -> MetricsSnapshot;

    /// Resets all metrics.
    fn reset(&self);
}

/// Metrics snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    /// Total calls.
    pub total_requests: u64,
    /// Successful calls.
    pub successful_requests: u64,
    /// Failed calls.
    pub failed_requests: u64,
    /// Retries across all calls.
    pub retries: u64,
    /// Total latency in milliseconds.
    pub total_latency_ms: u64,
    /// Calls per endpoint.
    pub endpoints: HashMap<String, u64>,
    /// Error counts by kind.
    pub errors: HashMap<String, u64>,
    /// Objects created per kind.
    pub created: HashMap<ObjectKind, u64>,
    /// Objects deleted per kind.
    pub deleted: HashMap<ObjectKind, u64>,
}

impl MetricsSnapshot {
    /// Calculates average latency in milliseconds.
    pub fn average_latency_ms(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.total_requests as f64
        }
    }

    /// Calculates success rate as a percentage.
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            100.0
        } else {
            (self.successful_requests as f64 / self.total_requests as f64) * 100.0
        }
    }
}

/// Default metrics collector implementation.
#[derive(Default)]
pub struct DefaultMetricsCollector {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    retries: AtomicU64,
    total_latency_ms: AtomicU64,
    endpoints: RwLock<HashMap<String, u64>>,
    errors: RwLock<HashMap<String, u64>>,
    created: RwLock<HashMap<ObjectKind, u64>>,
    deleted: RwLock<HashMap<ObjectKind, u64>>,
}

impl DefaultMetricsCollector {
    /// Creates a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetricsCollector for DefaultMetricsCollector {
    fn record_request(&self, endpoint: &str, success: bool, duration: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
        self.total_latency_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
        *self.endpoints.write().entry(endpoint.to_string()).or_insert(0) += 1;
    }

    fn record_retry(&self, _endpoint: &str) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    fn record_error(&self, kind: &str) {
        *self.errors.write().entry(kind.to_string()).or_insert(0) += 1;
    }

    fn record_created(&self, kind: ObjectKind) {
        *self.created.write().entry(kind).or_insert(0) += 1;
    }

    fn record_deleted(&self, kind: ObjectKind) {
        *self.deleted.write().entry(kind).or_insert(0) += 1;
    }

    fn get_metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            total_latency_ms: self.total_latency_ms.load(Ordering::Relaxed),
            endpoints: self.endpoints.read().clone(),
            errors: self.errors.read().clone(),
            created: self.created.read().clone(),
            deleted: self.deleted.read().clone(),
        }
    }

    fn reset(&self) {
        self.total_requests.store(0, Ordering::Relaxed);
        self.successful_requests.store(0, Ordering::Relaxed);
        self.failed_requests.store(0, Ordering::Relaxed);
        self.retries.store(0, Ordering::Relaxed);
        self.total_latency_ms.store(0, Ordering::Relaxed);
        self.endpoints.write().clear();
        self.errors.write().clear();
        self.created.write().clear();
        self.deleted.write().clear();
    }
}

impl std::fmt::Debug for DefaultMetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultMetricsCollector")
            .field("total_requests", &self.total_requests.load(Ordering::Relaxed))
            .field("failed_requests", &self.failed_requests.load(Ordering::Relaxed))
            .field("retries", &self.retries.load(Ordering::Relaxed))
            .finish()
    }
}

/// Collector that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetricsCollector;

impl MetricsCollector for NoopMetricsCollector {
    fn record_request(&self, _endpoint: &str, _success: bool, _duration: Duration) {}
    fn record_retry(&self, _endpoint: &str) {}
    fn record_error(&self, _kind: &str) {}
    fn record_created(&self, _kind: ObjectKind) {}
    fn record_deleted(&self, _kind: ObjectKind) {}

    fn get_metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot::default()
    }

    fn reset(&self) {}
}
