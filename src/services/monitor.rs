//! Operational health monitoring for the recommendation pipeline.
//!
//! The monitor is a cheaply cloneable handle over shared counters. The
//! drift, recomputation and invalidation paths record into it; the admin
//! metrics endpoint reads a snapshot and evaluates it against configured
//! thresholds. The monitor decides breach and requests notification; alert
//! delivery belongs to the `AlertNotifier` collaborator.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

use crate::config::MonitorConfig;
use crate::error::Result;

/// A breached threshold, handed to the notifier for delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub metric: String,
    pub value: f64,
    pub threshold: f64,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    async fn notify(&self, alert: &Alert) -> Result<()>;
}

/// Default notifier: alerts land in the service log.
pub struct LogAlertNotifier;

#[async_trait]
impl AlertNotifier for LogAlertNotifier {
    async fn notify(&self, alert: &Alert) -> Result<()> {
        error!(
            metric = %alert.metric,
            value = alert.value,
            threshold = alert.threshold,
            "Algorithm health alert: {}",
            alert.message
        );
        Ok(())
    }
}

#[derive(Default)]
struct Counters {
    drift_checks: AtomicU64,
    drift_detected: AtomicU64,
    drift_check_ms_total: AtomicU64,
    recomputations: AtomicU64,
    grade_transitions: AtomicU64,
    invalidations_issued: AtomicU64,
    invalidation_failures: AtomicU64,
    vector_cache_hits: AtomicU64,
    vector_cache_misses: AtomicU64,
}

/// Read-only view of the pipeline's counters with derived ratios.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub drift_checks: u64,
    pub drift_detected: u64,
    pub drift_rate: f64,
    pub avg_drift_check_ms: f64,
    pub recomputations: u64,
    pub grade_transitions: u64,
    pub invalidations_issued: u64,
    pub invalidation_failures: u64,
    pub invalidation_failure_ratio: f64,
    pub vector_cache_hits: u64,
    pub vector_cache_misses: u64,
    pub cache_hit_ratio: f64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct HealthMonitor {
    counters: Arc<Counters>,
    config: MonitorConfig,
}

impl HealthMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            counters: Arc::new(Counters::default()),
            config,
        }
    }

    pub fn record_drift_check(&self, has_drift: bool, elapsed: Duration) {
        self.counters.drift_checks.fetch_add(1, Ordering::Relaxed);
        if has_drift {
            self.counters.drift_detected.fetch_add(1, Ordering::Relaxed);
        }
        self.counters
            .drift_check_ms_total
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_recomputation(&self) {
        self.counters.recomputations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_grade_transition(&self) {
        self.counters
            .grade_transitions
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidation_sweep(&self, issued: u64, failures: u64) {
        self.counters
            .invalidations_issued
            .fetch_add(issued, Ordering::Relaxed);
        self.counters
            .invalidation_failures
            .fetch_add(failures, Ordering::Relaxed);
    }

    pub fn record_vector_cache_hit(&self) {
        self.counters
            .vector_cache_hits
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_vector_cache_miss(&self) {
        self.counters
            .vector_cache_misses
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot the counters. Read-only: never mutates.
    pub fn get_metrics(&self) -> MetricsSnapshot {
        let c = &self.counters;
        let drift_checks = c.drift_checks.load(Ordering::Relaxed);
        let drift_detected = c.drift_detected.load(Ordering::Relaxed);
        let drift_check_ms_total = c.drift_check_ms_total.load(Ordering::Relaxed);
        let invalidations_issued = c.invalidations_issued.load(Ordering::Relaxed);
        let invalidation_failures = c.invalidation_failures.load(Ordering::Relaxed);
        let hits = c.vector_cache_hits.load(Ordering::Relaxed);
        let misses = c.vector_cache_misses.load(Ordering::Relaxed);

        MetricsSnapshot {
            drift_checks,
            drift_detected,
            drift_rate: ratio(drift_detected, drift_checks),
            avg_drift_check_ms: ratio(drift_check_ms_total, drift_checks),
            recomputations: c.recomputations.load(Ordering::Relaxed),
            grade_transitions: c.grade_transitions.load(Ordering::Relaxed),
            invalidations_issued,
            invalidation_failures,
            invalidation_failure_ratio: ratio(invalidation_failures, invalidations_issued),
            vector_cache_hits: hits,
            vector_cache_misses: misses,
            cache_hit_ratio: ratio(hits, hits + misses),
            generated_at: Utc::now(),
        }
    }

    /// Evaluate the snapshot against configured thresholds and request
    /// notification for every breach. Returns the raised alerts.
    pub async fn check_thresholds_and_alert(&self, notifier: &dyn AlertNotifier) -> Vec<Alert> {
        let snapshot = self.get_metrics();
        let mut alerts = Vec::new();

        if snapshot.drift_checks >= self.config.min_samples
            && snapshot.drift_rate > self.config.max_drift_rate
        {
            alerts.push(Alert {
                metric: "drift_rate".to_string(),
                value: snapshot.drift_rate,
                threshold: self.config.max_drift_rate,
                message: format!(
                    "drift rate {:.2} exceeds {:.2}; interest vectors may be decaying faster than recomputation keeps up",
                    snapshot.drift_rate, self.config.max_drift_rate
                ),
                raised_at: Utc::now(),
            });
        }

        let cache_samples = snapshot.vector_cache_hits + snapshot.vector_cache_misses;
        if cache_samples >= self.config.min_samples
            && snapshot.cache_hit_ratio < self.config.min_cache_hit_ratio
        {
            alerts.push(Alert {
                metric: "cache_hit_ratio".to_string(),
                value: snapshot.cache_hit_ratio,
                threshold: self.config.min_cache_hit_ratio,
                message: format!(
                    "vector cache hit ratio {:.2} below {:.2}",
                    snapshot.cache_hit_ratio, self.config.min_cache_hit_ratio
                ),
                raised_at: Utc::now(),
            });
        }

        if snapshot.invalidations_issued >= self.config.min_samples
            && snapshot.invalidation_failure_ratio > self.config.max_invalidation_failure_ratio
        {
            alerts.push(Alert {
                metric: "invalidation_failure_ratio".to_string(),
                value: snapshot.invalidation_failure_ratio,
                threshold: self.config.max_invalidation_failure_ratio,
                message: format!(
                    "invalidation failure ratio {:.2} exceeds {:.2}",
                    snapshot.invalidation_failure_ratio,
                    self.config.max_invalidation_failure_ratio
                ),
                raised_at: Utc::now(),
            });
        }

        for alert in &alerts {
            if let Err(e) = notifier.notify(alert).await {
                error!(metric = %alert.metric, error = %e, "Alert notification failed");
            }
        }

        alerts
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor_with(min_samples: u64) -> HealthMonitor {
        HealthMonitor::new(MonitorConfig {
            max_drift_rate: 0.5,
            min_cache_hit_ratio: 0.6,
            max_invalidation_failure_ratio: 0.1,
            min_samples,
        })
    }

    #[test]
    fn test_snapshot_derives_ratios() {
        let monitor = monitor_with(50);
        for i in 0..10 {
            monitor.record_drift_check(i < 4, Duration::from_millis(20));
        }
        monitor.record_invalidation_sweep(100, 5);
        monitor.record_vector_cache_hit();
        monitor.record_vector_cache_hit();
        monitor.record_vector_cache_miss();

        let snapshot = monitor.get_metrics();
        assert_eq!(snapshot.drift_checks, 10);
        assert_eq!(snapshot.drift_detected, 4);
        assert!((snapshot.drift_rate - 0.4).abs() < 1e-9);
        assert!((snapshot.avg_drift_check_ms - 20.0).abs() < 1e-9);
        assert!((snapshot.invalidation_failure_ratio - 0.05).abs() < 1e-9);
        assert!((snapshot.cache_hit_ratio - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_get_metrics_does_not_mutate() {
        let monitor = monitor_with(50);
        monitor.record_recomputation();

        let a = monitor.get_metrics();
        let b = monitor.get_metrics();
        assert_eq!(a.recomputations, b.recomputations);
    }

    #[tokio::test]
    async fn test_thresholds_quiet_below_min_samples() {
        let monitor = monitor_with(50);
        // 100% drift rate, but only 3 samples.
        for _ in 0..3 {
            monitor.record_drift_check(true, Duration::from_millis(1));
        }

        let notifier = MockAlertNotifier::new();
        let alerts = monitor.check_thresholds_and_alert(&notifier).await;
        assert!(alerts.is_empty());
    }

    #[tokio::test]
    async fn test_drift_rate_breach_notifies() {
        let monitor = monitor_with(10);
        for i in 0..20 {
            monitor.record_drift_check(i % 2 == 0 || i < 10, Duration::from_millis(1));
        }

        let mut notifier = MockAlertNotifier::new();
        notifier
            .expect_notify()
            .times(1)
            .withf(|alert| alert.metric == "drift_rate")
            .returning(|_| Ok(()));

        let alerts = monitor.check_thresholds_and_alert(&notifier).await;
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].value > 0.5);
    }

    #[tokio::test]
    async fn test_cache_hit_ratio_breach() {
        let monitor = monitor_with(10);
        for _ in 0..4 {
            monitor.record_vector_cache_hit();
        }
        for _ in 0..8 {
            monitor.record_vector_cache_miss();
        }

        let mut notifier = MockAlertNotifier::new();
        notifier
            .expect_notify()
            .times(1)
            .withf(|alert| alert.metric == "cache_hit_ratio")
            .returning(|_| Ok(()));

        let alerts = monitor.check_thresholds_and_alert(&notifier).await;
        assert_eq!(alerts.len(), 1);
    }
}
