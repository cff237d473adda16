//! Observability and Metrics
//!
//! Counters for session persistence outcomes.
//!
//! Uses atomic counters for thread-safe metrics collection.

use crate::error::SessionError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Metrics collector for save / load operations
#[derive(Debug)]
pub struct Metrics {
    /// Total save calls
    pub saves_total: AtomicU64,
    /// Saves that wrote a container
    pub saves_success: AtomicU64,
    /// Saves answered with the required size only
    pub size_queries: AtomicU64,
    /// Total load calls
    pub loads_total: AtomicU64,
    /// Loads that restored a session
    pub loads_success: AtomicU64,
    /// Loads rejected by the container checksum
    pub integrity_failures: AtomicU64,
    /// Loads aborted by key derivation
    pub derivation_failures: AtomicU64,
    /// Calls rejected as invalid parameters
    pub invalid_parameters: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            saves_total: AtomicU64::new(0),
            saves_success: AtomicU64::new(0),
            size_queries: AtomicU64::new(0),
            loads_total: AtomicU64::new(0),
            loads_success: AtomicU64::new(0),
            integrity_failures: AtomicU64::new(0),
            derivation_failures: AtomicU64::new(0),
            invalid_parameters: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn save_attempt(&self) {
        self.saves_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn save_success(&self) {
        self.saves_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn size_query(&self) {
        self.size_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn load_attempt(&self) {
        self.loads_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn load_success(&self) {
        self.loads_success.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed save or load under its category
    pub fn failure(&self, err: &SessionError) {
        let counter = match err {
            SessionError::IntegrityCheckFailed => &self.integrity_failures,
            SessionError::KeyDerivationFailed(_) => &self.derivation_failures,
            SessionError::InvalidParameter(_) => &self.invalid_parameters,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            saves_total: self.saves_total.load(Ordering::Relaxed),
            saves_success: self.saves_success.load(Ordering::Relaxed),
            size_queries: self.size_queries.load(Ordering::Relaxed),
            loads_total: self.loads_total.load(Ordering::Relaxed),
            loads_success: self.loads_success.load(Ordering::Relaxed),
            integrity_failures: self.integrity_failures.load(Ordering::Relaxed),
            derivation_failures: self.derivation_failures.load(Ordering::Relaxed),
            invalid_parameters: self.invalid_parameters.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            saves_total = snapshot.saves_total,
            saves_success = snapshot.saves_success,
            size_queries = snapshot.size_queries,
            loads_total = snapshot.loads_total,
            loads_success = snapshot.loads_success,
            integrity_failures = snapshot.integrity_failures,
            derivation_failures = snapshot.derivation_failures,
            invalid_parameters = snapshot.invalid_parameters,
            uptime_seconds = snapshot.uptime_seconds,
            "Session state metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub saves_total: u64,
    pub saves_success: u64,
    pub size_queries: u64,
    pub loads_total: u64,
    pub loads_success: u64,
    pub integrity_failures: u64,
    pub derivation_failures: u64,
    pub invalid_parameters: u64,
    pub uptime_seconds: u64,
}

static METRICS: once_cell::sync::Lazy<Metrics> = once_cell::sync::Lazy::new(Metrics::new);

/// Get the global metrics instance
pub fn global_metrics() -> &'static Metrics {
    &METRICS
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_us = duration.as_micros() as u64,
            "Operation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::constants;

    #[test]
    fn test_failure_categories() {
        let metrics = Metrics::new();
        metrics.failure(&SessionError::IntegrityCheckFailed);
        metrics.failure(&SessionError::KeyDerivationFailed("x".into()));
        metrics.failure(&SessionError::InvalidParameter(constants::ERR_UNKNOWN_TAG));
        metrics.failure(&SessionError::InvalidParameter(constants::ERR_INPUT_TOO_SHORT));
        metrics.failure(&SessionError::DecryptionFailure);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.integrity_failures, 1);
        assert_eq!(snapshot.derivation_failures, 1);
        assert_eq!(snapshot.invalid_parameters, 2);
    }

    #[test]
    fn test_counters_start_at_zero() {
        let snapshot = Metrics::default().snapshot();
        assert_eq!(snapshot.saves_total, 0);
        assert_eq!(snapshot.loads_total, 0);
        assert_eq!(snapshot.size_queries, 0);
    }

    #[test]
    fn test_global_metrics_records_save() {
        let before = global_metrics().snapshot().saves_total;
        global_metrics().save_attempt();
        assert!(global_metrics().snapshot().saves_total > before);
    }
}
