//! Per-endpoint metrics (spec.md §3 `EndpointMetrics`, §4.7).
//!
//! All counters are atomics so reads never block writers and updates from
//! concurrent request workers are race-free (spec.md §5: "Metrics counters
//! are atomic"). A snapshot of one endpoint is internally consistent; no
//! cross-endpoint atomicity is implied or required (§4.7, Open Question 1).

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Default)]
pub struct EndpointMetrics {
    total: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    queue_full_rejections: AtomicU64,
    total_latency_millis: AtomicU64,
    current_queue_size: AtomicU64,
    /// Milliseconds since the Unix epoch, or 0 if no request has landed yet.
    last_request_time_millis: AtomicI64,
}

impl EndpointMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a successful terminal state (`COMPLETED` or `ENQUEUED`,
    /// §4.4's metrics update points).
    pub fn record_success(&self, latency_millis: u64) {
        self.successful.fetch_add(1, Ordering::Relaxed);
        self.total_latency_millis.fetch_add(latency_millis, Ordering::Relaxed);
        self.last_request_time_millis
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queue_full_rejection(&self) {
        self.queue_full_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_current_queue_size(&self, size: usize) {
        self.current_queue_size.store(size as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.total.load(Ordering::Relaxed);
        let successful = self.successful.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let queue_full_rejections = self.queue_full_rejections.load(Ordering::Relaxed);
        let total_latency_millis = self.total_latency_millis.load(Ordering::Relaxed);
        let current_queue_size = self.current_queue_size.load(Ordering::Relaxed);
        let last_request_millis = self.last_request_time_millis.load(Ordering::Relaxed);

        let average_latency_millis = if successful == 0 {
            0.0
        } else {
            total_latency_millis as f64 / successful as f64
        };
        let success_rate = if total == 0 {
            100.0
        } else {
            successful as f64 / total as f64 * 100.0
        };

        MetricsSnapshot {
            total,
            successful,
            failed,
            queue_full_rejections,
            total_latency_millis,
            current_queue_size,
            average_latency_millis,
            success_rate,
            last_request_time: if last_request_millis == 0 {
                None
            } else {
                DateTime::from_timestamp_millis(last_request_millis)
            },
        }
    }
}

/// A point-in-time, JSON-serialisable copy of one endpoint's metrics,
/// served at `GET /_metrics` (§4.7).
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub queue_full_rejections: u64,
    pub total_latency_millis: u64,
    pub current_queue_size: u64,
    pub average_latency_millis: f64,
    pub success_rate: f64,
    pub last_request_time: Option<DateTime<Utc>>,
}
