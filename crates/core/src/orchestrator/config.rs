//! Orchestrator configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the job orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Number of worker tasks executing jobs concurrently.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Maximum number of pending jobs while every worker is busy.
    /// Submissions beyond this fail fast with `Overloaded`.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// How long terminal jobs stay queryable (seconds).
    #[serde(default = "default_job_retention")]
    pub job_retention_secs: u64,

    /// Wall-clock limit for a single execution attempt (seconds).
    /// Expiry counts as a retryable network failure. Unset means no limit.
    #[serde(default)]
    pub execution_timeout_secs: Option<u64>,

    /// How long a synchronous download request waits (seconds).
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout_secs: u64,

    /// How long an asynchronous download request keeps its job alive
    /// without anyone polling (seconds).
    #[serde(default = "default_request_interest")]
    pub request_interest_secs: u64,

    /// Interval of the eviction and artifact sweep loop (seconds).
    #[serde(default = "default_housekeeping_interval")]
    pub housekeeping_interval_secs: u64,

    #[serde(default)]
    pub retry: RetryConfig,
}

/// Retry policy for retryable execution failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total executions allowed per job, the first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (milliseconds).
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Upper bound for any retry delay (milliseconds).
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Delay before re-enqueueing after execution number `attempt` failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let delay = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        Duration::from_millis(delay.min(self.max_delay_ms as f64) as u64)
    }
}

fn default_workers() -> usize {
    2
}

fn default_queue_capacity() -> usize {
    32
}

fn default_job_retention() -> u64 {
    3600 // 1 hour
}

fn default_wait_timeout() -> u64 {
    120
}

fn default_request_interest() -> u64 {
    600 // 10 minutes
}

fn default_housekeeping_interval() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            job_retention_secs: default_job_retention(),
            execution_timeout_secs: None,
            wait_timeout_secs: default_wait_timeout(),
            request_interest_secs: default_request_interest(),
            housekeeping_interval_secs: default_housekeeping_interval(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}
