//! Waiter registrations.

use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::debug;

use super::registry::{lock, Registration, Registry};
use super::types::JobOutcome;
use crate::identity::JobKey;

/// A requester's interest in a job.
///
/// Holding a handle keeps the job wanted. Dropping it (or passing it to
/// `cancel`) withdraws the interest; when the last handle of a pending job
/// goes away the job is cancelled.
pub struct WaiterHandle {
    key: JobKey,
    job_id: u64,
    requester: u64,
    created: bool,
    pub(super) outcome: watch::Receiver<Option<JobOutcome>>,
    registry: Arc<Mutex<Registry>>,
}

impl WaiterHandle {
    pub(super) fn new(key: JobKey, registration: Registration, registry: Arc<Mutex<Registry>>) -> Self {
        Self {
            key,
            job_id: registration.job_id,
            requester: registration.requester,
            created: registration.created,
            outcome: registration.outcome,
            registry,
        }
    }

    pub fn key(&self) -> &JobKey {
        &self.key
    }

    /// Whether this submission created the job (as opposed to joining it).
    pub fn created_job(&self) -> bool {
        self.created
    }

    /// The outcome, if the job has already settled.
    pub fn outcome(&self) -> Option<JobOutcome> {
        self.outcome.borrow().clone()
    }
}

impl std::fmt::Debug for WaiterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaiterHandle")
            .field("key", &self.key)
            .field("job_id", &self.job_id)
            .field("requester", &self.requester)
            .finish()
    }
}

impl Drop for WaiterHandle {
    fn drop(&mut self) {
        if lock(&self.registry).release(&self.key, self.job_id, self.requester) {
            debug!("Last waiter of job {} released it", self.key);
        }
    }
}
