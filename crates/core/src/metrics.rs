//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Caches (hits, misses)
//! - Search fan-out (per-indexer outcomes, result counts)
//! - External services (debrid provider, indexers)
//! - Redirect tickets and unlocks

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Cache Metrics
// =============================================================================

/// Cache lookups by cache name and result.
pub static CACHE_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("streamgate_cache_lookups_total", "Total cache lookups"),
        &["cache", "result"], // result: "hit", "miss"
    )
    .unwrap()
});

// =============================================================================
// Search Metrics
// =============================================================================

/// Indexer searches by indexer and outcome.
pub static INDEXER_SEARCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "streamgate_indexer_searches_total",
            "Total per-indexer searches",
        ),
        &["indexer", "status"], // status: "success", "error", "timeout"
    )
    .unwrap()
});

/// Candidates returned per aggregated search (after dedup).
pub static SEARCH_RESULTS: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "streamgate_search_results",
            "Number of deduplicated candidates per search",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0]),
        &[],
    )
    .unwrap()
});

// =============================================================================
// External Service Metrics
// =============================================================================

/// External service request duration.
pub static EXTERNAL_SERVICE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "streamgate_external_service_duration_seconds",
            "Duration of external service calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["service", "operation"],
    )
    .unwrap()
});

/// External service requests total.
pub static EXTERNAL_SERVICE_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "streamgate_external_service_requests_total",
            "Total external service requests",
        ),
        &["service", "operation", "status"], // status: "success", "error"
    )
    .unwrap()
});

// =============================================================================
// Redirect Metrics
// =============================================================================

/// Redirect tickets issued.
pub static TICKETS_ISSUED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("streamgate_tickets_issued_total", "Total redirect tickets issued").unwrap()
});

/// Ticket resolutions by result.
pub static TICKET_RESOLUTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "streamgate_ticket_resolutions_total",
            "Total redirect ticket resolutions",
        ),
        &["result"], // "cached", "unlocked", "expired", "not_cached", "quota_exceeded", "error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Record the outcome of one external call.
pub fn observe_external_call(service: &str, operation: &str, seconds: f64, success: bool) {
    EXTERNAL_SERVICE_DURATION
        .with_label_values(&[service, operation])
        .observe(seconds);
    EXTERNAL_SERVICE_REQUESTS
        .with_label_values(&[service, operation, if success { "success" } else { "error" }])
        .inc();
}

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Cache
        Box::new(CACHE_LOOKUPS.clone()),
        // Search
        Box::new(INDEXER_SEARCHES.clone()),
        Box::new(SEARCH_RESULTS.clone()),
        // External services
        Box::new(EXTERNAL_SERVICE_DURATION.clone()),
        Box::new(EXTERNAL_SERVICE_REQUESTS.clone()),
        // Redirect
        Box::new(TICKETS_ISSUED.clone()),
        Box::new(TICKET_RESOLUTIONS.clone()),
    ]
}
