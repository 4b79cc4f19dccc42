//! Metrics for the request coalescer.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for monitoring coalescer behaviour
#[derive(Debug, Default)]
pub struct CoalescerMetrics {
    /// Total `request` calls
    pub requests_received: AtomicU64,

    /// Requests answered straight from the cache
    pub cache_hits: AtomicU64,

    /// Requests currently waiting in the queue
    pub requests_queued: AtomicU64,

    /// Maximum queue depth observed
    pub max_queue_depth: AtomicU64,

    /// Number of flushes performed
    pub flushes: AtomicU64,

    /// Total requests drained by flushes (for batch size averaging)
    pub total_flushed_requests: AtomicU64,

    /// Batched lookups issued (at most one per domain per flush)
    pub lookups_issued: AtomicU64,

    /// Batched lookups that failed
    pub lookups_failed: AtomicU64,

    /// Background re-fetch attempts for failed lookups
    pub retries_attempted: AtomicU64,

    /// Keys still unresolved after a flush
    pub unresolved_keys: AtomicU64,

    /// Callbacks invoked
    pub callbacks_dispatched: AtomicU64,
}

impl CoalescerMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a `request` call
    pub fn record_received(&self) {
        self.requests_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request answered from the cache
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request entering the queue
    pub fn record_queued(&self) {
        let queued = self.requests_queued.fetch_add(1, Ordering::Relaxed) + 1;
        let mut current_max = self.max_queue_depth.load(Ordering::Relaxed);
        while queued > current_max {
            match self.max_queue_depth.compare_exchange_weak(
                current_max,
                queued,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(x) => current_max = x,
            }
        }
    }

    /// Record a flush draining `batch_size` requests
    pub fn record_flush(&self, batch_size: usize) {
        self.requests_queued
            .fetch_sub(batch_size as u64, Ordering::Relaxed);
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.total_flushed_requests
            .fetch_add(batch_size as u64, Ordering::Relaxed);
    }

    /// Record a batched lookup being issued
    pub fn record_lookup(&self) {
        self.lookups_issued.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed batched lookup
    pub fn record_lookup_failure(&self) {
        self.lookups_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a background re-fetch attempt
    pub fn record_retry(&self) {
        self.retries_attempted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record keys left unresolved after a flush
    pub fn record_unresolved(&self, count: usize) {
        self.unresolved_keys.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Record a callback invocation
    pub fn record_dispatched(&self) {
        self.callbacks_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current queue depth
    pub fn queue_depth(&self) -> u64 {
        self.requests_queued.load(Ordering::Relaxed)
    }

    /// Number of batched lookups issued so far
    pub fn lookup_count(&self) -> u64 {
        self.lookups_issued.load(Ordering::Relaxed)
    }

    /// Calculate average number of requests per flush
    pub fn avg_batch_size(&self) -> f64 {
        let flushes = self.flushes.load(Ordering::Relaxed);
        if flushes == 0 {
            return 0.0;
        }
        let total = self.total_flushed_requests.load(Ordering::Relaxed);
        total as f64 / flushes as f64
    }

    /// Fraction of requests answered from the cache
    pub fn hit_rate(&self) -> f64 {
        let received = self.requests_received.load(Ordering::Relaxed);
        if received == 0 {
            return 0.0;
        }
        self.cache_hits.load(Ordering::Relaxed) as f64 / received as f64
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_received: self.requests_received.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            requests_queued: self.requests_queued.load(Ordering::Relaxed),
            max_queue_depth: self.max_queue_depth.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            lookups_issued: self.lookups_issued.load(Ordering::Relaxed),
            lookups_failed: self.lookups_failed.load(Ordering::Relaxed),
            retries_attempted: self.retries_attempted.load(Ordering::Relaxed),
            unresolved_keys: self.unresolved_keys.load(Ordering::Relaxed),
            callbacks_dispatched: self.callbacks_dispatched.load(Ordering::Relaxed),
            avg_batch_size: self.avg_batch_size(),
            hit_rate: self.hit_rate(),
        }
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub requests_received: u64,
    pub cache_hits: u64,
    pub requests_queued: u64,
    pub max_queue_depth: u64,
    pub flushes: u64,
    pub lookups_issued: u64,
    pub lookups_failed: u64,
    pub retries_attempted: u64,
    pub unresolved_keys: u64,
    pub callbacks_dispatched: u64,
    pub avg_batch_size: f64,
    pub hit_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = CoalescerMetrics::new();

        metrics.record_received();
        metrics.record_queued();
        metrics.record_received();
        metrics.record_cache_hit();
        assert_eq!(metrics.queue_depth(), 1);

        metrics.record_flush(1);
        metrics.record_lookup();
        metrics.record_dispatched();
        assert_eq!(metrics.queue_depth(), 0);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_received, 2);
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.lookups_issued, 1);
        assert_eq!(snapshot.callbacks_dispatched, 1);
        assert_eq!(snapshot.hit_rate, 0.5);
    }

    #[test]
    fn test_max_queue_depth() {
        let metrics = CoalescerMetrics::new();

        for _ in 0..5 {
            metrics.record_queued();
        }
        metrics.record_flush(5);

        // Max should still be 5
        assert_eq!(metrics.max_queue_depth.load(Ordering::Relaxed), 5);
        assert_eq!(metrics.queue_depth(), 0);
    }

    #[test]
    fn test_batch_metrics() {
        let metrics = CoalescerMetrics::new();
        for _ in 0..10 {
            metrics.record_queued();
        }

        metrics.record_flush(4);
        metrics.record_flush(6);

        assert_eq!(metrics.avg_batch_size(), 5.0);
    }

    #[test]
    fn test_empty_rates() {
        let metrics = CoalescerMetrics::new();
        assert_eq!(metrics.avg_batch_size(), 0.0);
        assert_eq!(metrics.hit_rate(), 0.0);
    }
}
