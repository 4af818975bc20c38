//! Prometheus metrics for the personalization pipeline.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter_vec, Histogram, IntCounterVec, TextEncoder,
};
use std::time::Duration;

static DRIFT_CHECKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "algorithm_drift_checks_total",
        "Total drift detection runs by outcome (drift/stable/error)",
        &["outcome"]
    )
    .expect("Failed to register drift checks metric")
});

static VECTOR_RECOMPUTATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "algorithm_vector_recomputations_total",
        "Interest vector recomputations by trigger (drift/grade_transition/maintenance)",
        &["trigger"]
    )
    .expect("Failed to register recomputations metric")
});

static INVALIDATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "algorithm_feed_invalidations_total",
        "Soft feed invalidations issued during sweeps (ok/error)",
        &["status"]
    )
    .expect("Failed to register invalidations metric")
});

static MAINTENANCE_RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "algorithm_maintenance_runs_total",
        "Maintenance job runs by kind and status",
        &["kind", "status"]
    )
    .expect("Failed to register maintenance runs metric")
});

static DRIFT_CHECK_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "algorithm_drift_check_duration_seconds",
        "Duration of drift detection calls",
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    )
    .expect("Failed to register drift check duration metric")
});

/// Record a drift check outcome (drift/stable/error).
pub fn record_drift_check(outcome: &str, duration: Duration) {
    DRIFT_CHECKS_TOTAL.with_label_values(&[outcome]).inc();
    DRIFT_CHECK_DURATION_SECONDS.observe(duration.as_secs_f64());
}

/// Record a vector recomputation by trigger.
pub fn record_recomputation(trigger: &str) {
    VECTOR_RECOMPUTATIONS_TOTAL
        .with_label_values(&[trigger])
        .inc();
}

/// Record a sweep's invalidation counts.
pub fn record_invalidation_sweep(issued: u64, failures: u64) {
    INVALIDATIONS_TOTAL
        .with_label_values(&["ok"])
        .inc_by(issued.saturating_sub(failures));
    INVALIDATIONS_TOTAL
        .with_label_values(&["error"])
        .inc_by(failures);
}

/// Record a maintenance run result.
pub fn record_maintenance_run(kind: &str, status: &str) {
    MAINTENANCE_RUNS_TOTAL
        .with_label_values(&[kind, status])
        .inc();
}

/// Render the default registry in the Prometheus text format.
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    encoder
        .encode_to_string(&prometheus::gather())
        .unwrap_or_default()
}
