//! Prometheus metrics for monitoring and alerting
//!
//! NOTE: student_id never appears in labels; per-student labels would
//! explode cardinality.

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global metrics registry
    pub static ref METRICS_REGISTRY: Registry = Registry::new();

    // ============================================================================
    // Request metrics
    // ============================================================================

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "edusight_http_request_duration_seconds",
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["method", "endpoint", "status"]
    ).unwrap();

    /// Total HTTP requests
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("edusight_http_requests_total", "Total HTTP requests"),
        &["method", "endpoint", "status"]
    ).unwrap();

    // ============================================================================
    // Generation metrics
    // ============================================================================

    /// Generation provider attempts by outcome (ok / overloaded / failed)
    pub static ref GENERATION_ATTEMPTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "edusight_generation_attempts_total",
            "Generation provider attempts by outcome"
        ),
        &["result"]
    ).unwrap();

    /// Insights successfully persisted
    pub static ref INSIGHTS_CREATED_TOTAL: IntCounter = IntCounter::new(
        "edusight_insights_created_total",
        "Insight records successfully persisted"
    ).unwrap();
}

/// Register all metrics with the global registry. Call once at startup.
pub fn register_metrics() -> Result<(), prometheus::Error> {
    METRICS_REGISTRY.register(Box::new(HTTP_REQUEST_DURATION.clone()))?;
    METRICS_REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(GENERATION_ATTEMPTS_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(INSIGHTS_CREATED_TOTAL.clone()))?;
    Ok(())
}
