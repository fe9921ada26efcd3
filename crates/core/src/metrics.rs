//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Orchestrator (submissions, executions, retries, queue depth)
//! - Artifact store (publications, sweeps)
//! - Extractor (calls and their durations)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Orchestrator
// =============================================================================

/// Submissions by outcome.
pub static JOB_SUBMISSIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelfetch_job_submissions_total", "Total job submissions"),
        &["result"], // "created", "attached", "overloaded", "not_running"
    )
    .unwrap()
});

/// Jobs reaching a terminal state.
pub static JOBS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelfetch_jobs_finished_total", "Jobs reaching a terminal state"),
        &["state", "kind"], // kind is the error kind, or "none"
    )
    .unwrap()
});

/// Duration of a single execution attempt.
pub static EXECUTION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "reelfetch_execution_duration_seconds",
            "Duration of one job execution attempt",
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        &["result"],
    )
    .unwrap()
});

/// Retries scheduled after a retryable failure.
pub static RETRIES_SCHEDULED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reelfetch_retries_scheduled_total",
        "Retries scheduled after a retryable failure",
    )
    .unwrap()
});

/// Jobs waiting for a worker.
pub static QUEUE_DEPTH: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("reelfetch_queue_depth", "Jobs waiting for a worker").unwrap()
});

/// Jobs currently executing.
pub static JOBS_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("reelfetch_jobs_running", "Jobs currently executing").unwrap()
});

// =============================================================================
// Artifact store
// =============================================================================

pub static ARTIFACTS_PUBLISHED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("reelfetch_artifacts_published_total", "Artifacts published").unwrap()
});

pub static ARTIFACT_BYTES_PUBLISHED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reelfetch_artifact_bytes_published_total",
        "Bytes written to published artifacts",
    )
    .unwrap()
});

pub static ARTIFACTS_SWEPT: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reelfetch_artifacts_swept_total",
        "Artifacts removed by the retention sweep",
    )
    .unwrap()
});

// =============================================================================
// Extractor
// =============================================================================

/// Extractor calls by backend, operation and outcome.
pub static EXTRACTOR_CALLS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelfetch_extractor_calls_total", "Total extractor calls"),
        &["backend", "operation", "status"],
    )
    .unwrap()
});

/// Extractor call duration.
pub static EXTRACTOR_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "reelfetch_extractor_duration_seconds",
            "Duration of extractor calls",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0, 1800.0]),
        &["backend", "operation"],
    )
    .unwrap()
});

/// All core metrics, for registration with a server registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Orchestrator
        Box::new(JOB_SUBMISSIONS.clone()),
        Box::new(JOBS_FINISHED.clone()),
        Box::new(EXECUTION_DURATION.clone()),
        Box::new(RETRIES_SCHEDULED.clone()),
        Box::new(QUEUE_DEPTH.clone()),
        Box::new(JOBS_RUNNING.clone()),
        // Artifact store
        Box::new(ARTIFACTS_PUBLISHED.clone()),
        Box::new(ARTIFACT_BYTES_PUBLISHED.clone()),
        Box::new(ARTIFACTS_SWEPT.clone()),
        // Extractor
        Box::new(EXTRACTOR_CALLS.clone()),
        Box::new(EXTRACTOR_DURATION.clone()),
    ]
}
