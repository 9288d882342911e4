//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use crate::push::DeliveryOutcome;

use super::{
    DELIVERIES_TOTAL, DISPATCH_LATENCY, DISPATCH_TOTAL, PRUNE_ERRORS_TOTAL,
    SIGNING_FAILURES_TOTAL, SUBSCRIPTIONS_PER_DISPATCH, SUBSCRIPTIONS_PRUNED_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording push metrics
pub struct PushMetrics;

impl PushMetrics {
    /// Record a dispatch call and how many subscriptions it targeted
    pub fn record_dispatch(subscriptions: usize) {
        DISPATCH_TOTAL.inc();
        SUBSCRIPTIONS_PER_DISPATCH.observe(subscriptions as f64);
    }

    /// Record the time until all deliveries of a call settled
    pub fn record_dispatch_latency(latency_secs: f64) {
        DISPATCH_LATENCY.observe(latency_secs);
    }

    /// Record the outcome of one delivery attempt
    pub fn record_outcome(outcome: &DeliveryOutcome) {
        DELIVERIES_TOTAL.with_label_values(&[outcome.label()]).inc();
    }

    /// Record a pruned subscription
    pub fn record_pruned() {
        SUBSCRIPTIONS_PRUNED_TOTAL.inc();
    }

    /// Record a failed prune
    pub fn record_prune_error() {
        PRUNE_ERRORS_TOTAL.inc();
    }

    /// Record a VAPID signing failure
    pub fn record_signing_failure() {
        SIGNING_FAILURES_TOTAL.inc();
    }
}
