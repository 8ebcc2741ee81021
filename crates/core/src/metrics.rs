//! Prometheus metrics for the order lifecycle.
//!
//! The server registers everything returned by [`all_metrics`] in its
//! registry; core code only increments.

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Orders
// =============================================================================

/// Orders registered.
pub static ORDERS_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("parcelhub_orders_created_total", "Total orders created").unwrap()
});

/// Accepted status transitions.
pub static STATUS_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "parcelhub_status_transitions_total",
            "Accepted status transitions",
        ),
        &["from", "to"],
    )
    .unwrap()
});

/// Refused status transitions by error kind.
pub static TRANSITIONS_REJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "parcelhub_transitions_rejected_total",
            "Refused status transitions",
        ),
        &["reason"], // "illegal_transition", "unauthorized", "conflict", ...
    )
    .unwrap()
});

/// Time spent committing a transition (order update plus history append).
pub static TRANSITION_COMMIT_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "parcelhub_transition_commit_duration_seconds",
            "Duration of the status update transaction",
        )
        .buckets(vec![0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5]),
        &[],
    )
    .unwrap()
});

// =============================================================================
// Scans
// =============================================================================

/// Processed scans by outcome.
pub static SCANS_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("parcelhub_scans_processed_total", "Processed scans"),
        &["outcome"], // "applied", "not_found", "forbidden", "rejected", "invalid"
    )
    .unwrap()
});

// =============================================================================
// Audit stream
// =============================================================================

/// Audit events lost before reaching storage.
pub static AUDIT_EVENTS_DROPPED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "parcelhub_audit_events_dropped_total",
            "Audit events that could not be recorded",
        ),
        &["event_type"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(ORDERS_CREATED.clone()),
        Box::new(STATUS_TRANSITIONS.clone()),
        Box::new(TRANSITIONS_REJECTED.clone()),
        Box::new(TRANSITION_COMMIT_DURATION.clone()),
        Box::new(SCANS_PROCESSED.clone()),
        Box::new(AUDIT_EVENTS_DROPPED.clone()),
    ]
}
