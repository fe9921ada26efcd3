//! Job orchestrator.
//!
//! Accepts submissions keyed by [`JobKey`](crate::identity::JobKey),
//! deduplicates identical in-flight work, runs jobs on a bounded worker pool
//! and hands every waiter the same outcome.
//!
//! All job state lives in one registry behind a single mutex that is never
//! held across an `.await`. Extraction runs in worker tasks outside the lock.

mod config;
mod handle;
mod registry;
mod runner;
mod types;

pub use config::{OrchestratorConfig, RetryConfig};
pub use handle::WaiterHandle;
pub use runner::Orchestrator;
pub use types::{JobOutcome, JobState, JobView, OrchestratorStatus, SubmitError, WaitError};
