//! Job registry: the single owned table of jobs plus the pending queue.
//!
//! Every state transition happens here, under the orchestrator's one mutex.
//! Nothing in this module awaits.

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::config::RetryConfig;
use super::types::{JobOutcome, JobState, JobView, OrchestratorStatus, SubmitError};
use crate::error::{ErrorInfo, ErrorKind};
use crate::identity::{JobKey, WorkSpec};
use crate::metrics;

pub(super) fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

struct JobEntry {
    /// Distinguishes successive jobs under the same key.
    id: u64,
    work: WorkSpec,
    state: JobState,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    attempt: u32,
    requesters: HashSet<u64>,
    last_error: Option<ErrorInfo>,
    outcome: watch::Sender<Option<JobOutcome>>,
}

impl JobEntry {
    fn settle(&mut self, key: &JobKey, outcome: JobOutcome) {
        let (state, kind) = match &outcome {
            Ok(_) => (JobState::Completed, "none"),
            Err(e) if e.kind == ErrorKind::Cancelled => (JobState::Cancelled, e.kind.as_str()),
            Err(e) => (JobState::Failed, e.kind.as_str()),
        };
        self.state = state;
        self.finished_at = Some(Utc::now());
        self.outcome.send_replace(Some(outcome));
        metrics::JOBS_FINISHED
            .with_label_values(&[state.as_str(), kind])
            .inc();
        debug!("Job {} settled as {}", key, state);
    }

    fn view(&self, key: &JobKey) -> JobView {
        let outcome = self.outcome.borrow();
        let (artifact, error) = match outcome.as_ref() {
            Some(Ok(artifact)) => (Some(artifact.clone()), None),
            Some(Err(error)) => (None, Some(error.clone())),
            None => (None, self.last_error.clone()),
        };
        JobView {
            key: key.clone(),
            state: self.state,
            source_url: self.work.source_url.clone(),
            encoding: self.work.encoding.descriptor(),
            media_kind: self.work.encoding.kind,
            attempt: self.attempt,
            requesters: self.requesters.len(),
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            artifact,
            error,
        }
    }
}

/// A waiter registration handed out by `submit` or `attach`.
#[derive(Debug)]
pub(super) struct Registration {
    pub job_id: u64,
    pub requester: u64,
    pub outcome: watch::Receiver<Option<JobOutcome>>,
    pub created: bool,
}

/// A job claimed by a worker.
#[derive(Debug, Clone)]
pub(super) struct Claim {
    pub job_id: u64,
    pub key: JobKey,
    pub work: WorkSpec,
    pub attempt: u32,
}

/// What happened when a worker reported an execution result.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Settlement {
    Completed,
    Failed(ErrorKind),
    /// Back to `Pending`; re-queue after the delay.
    Retry(Duration),
    /// All requesters left before a retry could be scheduled.
    Abandoned,
    /// The job was settled or replaced while executing (e.g. by shutdown).
    Stale,
}

pub(super) struct Registry {
    jobs: HashMap<JobKey, JobEntry>,
    queue: BTreeSet<(DateTime<Utc>, JobKey)>,
    running: usize,
    next_job_id: u64,
    next_requester_id: u64,
    accepting: bool,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            jobs: HashMap::new(),
            queue: BTreeSet::new(),
            running: 0,
            next_job_id: 1,
            next_requester_id: 1,
            accepting: true,
        }
    }

    fn update_gauges(&self) {
        metrics::QUEUE_DEPTH.set(self.queue.len() as i64);
        metrics::JOBS_RUNNING.set(self.running as i64);
    }

    fn pending_count(&self) -> usize {
        self.jobs
            .values()
            .filter(|e| e.state == JobState::Pending)
            .count()
    }

    fn register(&mut self, key: &JobKey) -> Option<Registration> {
        let requester = self.next_requester_id;
        let entry = self.jobs.get_mut(key)?;
        self.next_requester_id += 1;
        entry.requesters.insert(requester);
        Some(Registration {
            job_id: entry.id,
            requester,
            outcome: entry.outcome.subscribe(),
            created: false,
        })
    }

    /// Attaches to a live job for `key` or creates a new pending one.
    pub fn submit(
        &mut self,
        key: JobKey,
        work: WorkSpec,
        workers: usize,
        queue_capacity: usize,
    ) -> Result<Registration, SubmitError> {
        if !self.accepting {
            return Err(SubmitError::NotRunning);
        }

        let live = self
            .jobs
            .get(&key)
            .is_some_and(|entry| !entry.state.is_terminal());
        if live {
            if let Some(registration) = self.register(&key) {
                debug!("Attached requester {} to job {}", registration.requester, key);
                return Ok(registration);
            }
        }

        // Idle workers absorb pending jobs beyond the queue bound.
        let pending = self.pending_count();
        let idle = workers.saturating_sub(self.running);
        if pending >= queue_capacity + idle {
            return Err(SubmitError::Overloaded {
                pending,
                capacity: queue_capacity,
            });
        }

        let now = Utc::now();
        let job_id = self.next_job_id;
        self.next_job_id += 1;
        let requester = self.next_requester_id;
        self.next_requester_id += 1;
        let (outcome, receiver) = watch::channel(None);

        // A terminal record for the same key is replaced by the new job.
        self.jobs.insert(
            key.clone(),
            JobEntry {
                id: job_id,
                work,
                state: JobState::Pending,
                created_at: now,
                started_at: None,
                finished_at: None,
                attempt: 0,
                requesters: HashSet::from([requester]),
                last_error: None,
                outcome,
            },
        );
        self.queue.insert((now, key.clone()));
        self.update_gauges();
        info!("Created job {}", key);

        Ok(Registration {
            job_id,
            requester,
            outcome: receiver,
            created: true,
        })
    }

    /// Joins the requester set of whatever job is recorded for `key`.
    pub fn attach(&mut self, key: &JobKey) -> Option<Registration> {
        self.register(key)
    }

    /// Drops one requester. Returns true when this cancelled a pending job.
    pub fn release(&mut self, key: &JobKey, job_id: u64, requester: u64) -> bool {
        let Some(entry) = self.jobs.get_mut(key).filter(|e| e.id == job_id) else {
            return false;
        };
        entry.requesters.remove(&requester);
        if !entry.requesters.is_empty() || entry.state != JobState::Pending {
            return false;
        }

        let created_at = entry.created_at;
        entry.settle(
            key,
            Err(ErrorInfo::new(
                ErrorKind::Cancelled,
                "every requester withdrew before execution",
            )),
        );
        self.queue.remove(&(created_at, key.clone()));
        self.update_gauges();
        info!("Cancelled job {} (no remaining requesters)", key);
        true
    }

    /// Takes the oldest queued job and marks it running.
    pub fn claim(&mut self) -> Option<Claim> {
        while let Some((_, key)) = self.queue.pop_first() {
            let Some(entry) = self.jobs.get_mut(&key) else {
                continue;
            };
            if entry.state != JobState::Pending {
                continue;
            }
            entry.state = JobState::Running;
            entry.attempt += 1;
            entry.started_at = Some(Utc::now());
            self.running += 1;
            let claim = Claim {
                job_id: entry.id,
                key: key.clone(),
                work: entry.work.clone(),
                attempt: entry.attempt,
            };
            self.update_gauges();
            return Some(claim);
        }
        self.update_gauges();
        None
    }

    /// Records an execution result for a claimed job.
    pub fn finish(&mut self, claim: &Claim, result: JobOutcome, retry: &RetryConfig) -> Settlement {
        let Some(entry) = self
            .jobs
            .get_mut(&claim.key)
            .filter(|e| e.id == claim.job_id && e.state == JobState::Running)
        else {
            return Settlement::Stale;
        };
        self.running = self.running.saturating_sub(1);

        let settlement = match result {
            Ok(artifact) => {
                entry.settle(&claim.key, Ok(artifact));
                Settlement::Completed
            }
            Err(error) if error.kind.is_retryable() && entry.attempt < retry.max_attempts => {
                entry.state = JobState::Pending;
                if entry.requesters.is_empty() {
                    // Pending with nobody waiting: cancel instead of re-queueing.
                    entry.last_error = Some(error.clone());
                    entry.settle(
                        &claim.key,
                        Err(ErrorInfo::new(
                            ErrorKind::Cancelled,
                            format!("abandoned after retryable failure: {}", error.message),
                        )),
                    );
                    Settlement::Abandoned
                } else {
                    warn!(
                        "Job {} attempt {} failed, will retry: {}",
                        claim.key, entry.attempt, error
                    );
                    entry.last_error = Some(error);
                    Settlement::Retry(retry.delay_for(entry.attempt))
                }
            }
            Err(error) => {
                let kind = error.kind;
                entry.settle(&claim.key, Err(error));
                Settlement::Failed(kind)
            }
        };
        self.update_gauges();
        settlement
    }

    /// Puts a job that backed off for a retry back on the queue.
    pub fn requeue(&mut self, key: &JobKey, job_id: u64) -> bool {
        let Some(entry) = self
            .jobs
            .get(key)
            .filter(|e| e.id == job_id && e.state == JobState::Pending)
        else {
            return false;
        };
        let inserted = self.queue.insert((entry.created_at, key.clone()));
        self.update_gauges();
        inserted
    }

    /// Removes terminal jobs that finished at or before `cutoff`.
    pub fn evict(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|_, entry| {
            !(entry.state.is_terminal() && entry.finished_at.is_some_and(|t| t <= cutoff))
        });
        before - self.jobs.len()
    }

    /// Stops admission and cancels every job that has not finished.
    pub fn shutdown(&mut self) -> usize {
        self.accepting = false;
        let mut cancelled = 0;
        for (key, entry) in self.jobs.iter_mut() {
            if !entry.state.is_terminal() {
                entry.settle(
                    key,
                    Err(ErrorInfo::new(ErrorKind::Cancelled, "orchestrator stopped")),
                );
                cancelled += 1;
            }
        }
        self.queue.clear();
        self.running = 0;
        self.update_gauges();
        cancelled
    }

    pub fn view(&self, key: &JobKey) -> Option<JobView> {
        self.jobs.get(key).map(|entry| entry.view(key))
    }

    pub fn status(&self, running: bool, workers: usize, queue_capacity: usize) -> OrchestratorStatus {
        let mut status = OrchestratorStatus {
            running,
            workers,
            queue_capacity,
            ..Default::default()
        };
        for entry in self.jobs.values() {
            match entry.state {
                JobState::Pending => status.pending_count += 1,
                JobState::Running => status.running_count += 1,
                JobState::Completed => status.completed_count += 1,
                JobState::Failed => status.failed_count += 1,
                JobState::Cancelled => status.cancelled_count += 1,
            }
        }
        status
    }
}
