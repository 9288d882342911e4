//! Prometheus metrics for the push dispatch service.
//!
//! - Dispatch metrics (calls, latency, subscriptions per call)
//! - Delivery metrics (attempts by outcome, pruned subscriptions)
//! - Signing metrics (VAPID token failures)

mod helpers;

pub use helpers::{encode_metrics, PushMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "push";

lazy_static! {
    // ============================================================================
    // Dispatch Metrics
    // ============================================================================

    /// Total dispatch calls
    pub static ref DISPATCH_TOTAL: IntCounter = register_int_counter!(
        format!("{}_dispatch_total", METRIC_PREFIX),
        "Total dispatch calls"
    ).unwrap();

    /// Dispatch latency (until every delivery attempt settled)
    pub static ref DISPATCH_LATENCY: Histogram = register_histogram!(
        format!("{}_dispatch_latency_seconds", METRIC_PREFIX),
        "Dispatch latency in seconds",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();

    /// Subscriptions targeted per dispatch call
    pub static ref SUBSCRIPTIONS_PER_DISPATCH: Histogram = register_histogram!(
        format!("{}_subscriptions_per_dispatch", METRIC_PREFIX),
        "Distribution of subscriptions per dispatch call",
        vec![0.0, 1.0, 2.0, 3.0, 5.0, 10.0, 25.0]
    ).unwrap();

    // ============================================================================
    // Delivery Metrics
    // ============================================================================

    /// Delivery attempts by outcome (delivered, expired, failed)
    pub static ref DELIVERIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_deliveries_total", METRIC_PREFIX),
        "Total push delivery attempts by outcome",
        &["outcome"]
    ).unwrap();

    /// Subscriptions removed after a 410 response
    pub static ref SUBSCRIPTIONS_PRUNED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_subscriptions_pruned_total", METRIC_PREFIX),
        "Total subscriptions removed after the push service reported them gone"
    ).unwrap();

    /// Failed prune attempts (logged and ignored)
    pub static ref PRUNE_ERRORS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_prune_errors_total", METRIC_PREFIX),
        "Total failures while deleting expired subscriptions"
    ).unwrap();

    // ============================================================================
    // Signing Metrics
    // ============================================================================

    /// VAPID signing failures
    pub static ref SIGNING_FAILURES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_signing_failures_total", METRIC_PREFIX),
        "Total VAPID token signing failures"
    ).unwrap();
}
