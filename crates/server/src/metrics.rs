//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the reelfetch server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Orchestrator and artifact store status (collected dynamically)
//! - Everything registered by `reelfetch_core::metrics`

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use regex_lite::Regex;

use reelfetch_core::JobState;

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
            "reelfetch_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 60.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelfetch_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "reelfetch_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Orchestrator Metrics (collected dynamically)
// =============================================================================

/// Orchestrator running state (1 = running, 0 = stopped).
pub static ORCHESTRATOR_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "reelfetch_orchestrator_running",
        "Whether the orchestrator is running (1) or stopped (0)",
    )
    .unwrap()
});

/// Jobs in the registry by state.
pub static JOBS_BY_STATE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("reelfetch_jobs_by_state", "Current job count by state"),
        &["state"],
    )
    .unwrap()
});

// =============================================================================
// Artifact Store Metrics (collected dynamically)
// =============================================================================

pub static ARTIFACTS_STORED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("reelfetch_artifacts_stored", "Artifacts currently stored").unwrap()
});

pub static ARTIFACT_BYTES_STORED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "reelfetch_artifact_bytes_stored",
        "Total size of stored artifacts",
    )
    .unwrap()
});

pub static ARTIFACT_READERS_OPEN: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "reelfetch_artifact_readers_open",
        "Artifact downloads currently streaming",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Orchestrator
    registry
        .register(Box::new(ORCHESTRATOR_RUNNING.clone()))
        .unwrap();
    registry.register(Box::new(JOBS_BY_STATE.clone())).unwrap();

    // Artifact store
    registry
        .register(Box::new(ARTIFACTS_STORED.clone()))
        .unwrap();
    registry
        .register(Box::new(ARTIFACT_BYTES_STORED.clone()))
        .unwrap();
    registry
        .register(Box::new(ARTIFACT_READERS_OPEN.clone()))
        .unwrap();

    // Core metrics (orchestrator, store, extractor)
    for metric in reelfetch_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so gauges reflect the orchestrator and store as of
/// the scrape.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let stats = state.orchestrator().stats();
    ORCHESTRATOR_RUNNING.set(if stats.running { 1 } else { 0 });
    for (job_state, count) in [
        (JobState::Pending, stats.pending_count),
        (JobState::Running, stats.running_count),
        (JobState::Completed, stats.completed_count),
        (JobState::Failed, stats.failed_count),
        (JobState::Cancelled, stats.cancelled_count),
    ] {
        JOBS_BY_STATE
            .with_label_values(&[job_state.as_str()])
            .set(count as i64);
    }

    let store = state.store().stats();
    ARTIFACTS_STORED.set(store.artifacts as i64);
    ARTIFACT_BYTES_STORED.set(store.total_bytes as i64);
    ARTIFACT_READERS_OPEN.set(store.open_readers as i64);
}

static HEX_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"/[0-9a-f]{32}(/|$)").unwrap());

/// Normalize a path for metric labels (replace keys and handles with a
/// placeholder).
pub fn normalize_path(path: &str) -> String {
    HEX_ID.replace_all(path, "/{id}$1").to_string()
}
