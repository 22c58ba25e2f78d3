//! Prometheus metrics for the HTTP layer.
//!
//! Pipeline metrics (caches, indexers, provider calls, tickets) live in
//! `streamgate_core::metrics` and are registered here as well.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use regex_lite::Regex;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "streamgate_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("streamgate_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "streamgate_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

/// Rejected credentials by reason.
pub static AUTH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "streamgate_auth_failures_total",
            "Total credential validation failures",
        ),
        &["reason"],
    )
    .unwrap()
});

// =============================================================================
// Cache Metrics (collected dynamically)
// =============================================================================

pub static CACHE_ENTRIES: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("streamgate_cache_entries", "Live entries per cache"),
        &["cache"],
    )
    .unwrap()
});

pub static CACHE_SIZE_BYTES: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("streamgate_cache_size_bytes", "Accounted bytes per cache"),
        &["cache"],
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();
    registry
        .register(Box::new(AUTH_FAILURES_TOTAL.clone()))
        .unwrap();

    registry.register(Box::new(CACHE_ENTRIES.clone())).unwrap();
    registry
        .register(Box::new(CACHE_SIZE_BYTES.clone()))
        .unwrap();

    for metric in streamgate_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Couldn't encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Refresh cache gauges from current application state.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    for cache in state.caches().persistent() {
        let stats = cache.stats().await;
        CACHE_ENTRIES
            .with_label_values(&[&stats.name])
            .set(stats.entries as i64);
        CACHE_SIZE_BYTES
            .with_label_values(&[&stats.name])
            .set(stats.size_bytes as i64);
    }
}

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});
static IMDB_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"tt\d+").unwrap());

/// First path segments that are never a credential.
const PUBLIC_ROOTS: &[&str] = &["health", "metrics", "config", "redirect"];

/// Replace the first path segment with `***` unless it is a public route.
///
/// Any other first segment may be a credential, matched route or not.
pub fn redact_path(path: &str) -> String {
    let trimmed = path.trim_start_matches('/');
    let (first, rest) = match trimmed.split_once('/') {
        Some((first, rest)) => (first, Some(rest)),
        None => (trimmed, None),
    };
    if first.is_empty() || PUBLIC_ROOTS.contains(&first) {
        return path.to_string();
    }
    match rest {
        Some(rest) => format!("/***/{}", rest),
        None => "/***".to_string(),
    }
}

/// Normalize a path for metric labels (credentials and ids replaced).
pub fn normalize_path(path: &str) -> String {
    let redacted = redact_path(path);
    let result = UUID_RE.replace_all(&redacted, "{id}");
    let result = IMDB_RE.replace_all(&result, "{id}");
    match result.strip_prefix("/***") {
        Some(rest) => format!("/{{credential}}{}", rest),
        None => result.into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_path_catalog_routes() {
        assert_eq!(redact_path("/secret/manifest.json"), "/***/manifest.json");
        assert_eq!(
            redact_path("/secret/stream/movie/tt0133093.json"),
            "/***/stream/movie/tt0133093.json"
        );
    }

    #[test]
    fn test_redact_path_leaves_other_routes() {
        assert_eq!(redact_path("/health"), "/health");
        assert_eq!(redact_path("/metrics"), "/metrics");
        assert_eq!(
            redact_path("/redirect/550e8400-e29b-41d4-a716-446655440000"),
            "/redirect/550e8400-e29b-41d4-a716-446655440000"
        );
    }

    #[test]
    fn test_normalize_path_stream() {
        assert_eq!(
            normalize_path("/secret/stream/movie/tt0133093.json"),
            "/{credential}/stream/movie/{id}.json"
        );
    }

    #[test]
    fn test_normalize_path_redirect() {
        assert_eq!(
            normalize_path("/redirect/550e8400-e29b-41d4-a716-446655440000"),
            "/redirect/{id}"
        );
    }

    #[test]
    fn test_redact_path_unknown_routes() {
        assert_eq!(redact_path("/secret/configure"), "/***/configure");
        assert_eq!(redact_path("/secret"), "/***");
        assert_eq!(redact_path("/secret/a/b"), "/***/a/b");
        assert_eq!(redact_path("/"), "/");
        assert_eq!(redact_path("/config"), "/config");
    }

    #[test]
    fn test_normalize_path_unknown_routes() {
        assert_eq!(normalize_path("/secret/configure"), "/{credential}/configure");
        assert_eq!(normalize_path("/secret"), "/{credential}");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/health"), "/health");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();
        streamgate_core::metrics::TICKETS_ISSUED.inc();

        let output = encode_metrics();
        assert!(output.contains("streamgate_http_requests_total"));
        assert!(output.contains("streamgate_tickets_issued_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }
}
