//! Job orchestrator implementation.
//!
//! Owns the registry, a fixed pool of worker tasks pulling from the shared
//! pending queue, and a housekeeping loop that evicts old jobs and sweeps
//! expired artifacts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::artifact::{ArtifactRef, ArtifactStore, SweepReport};
use crate::error::{ErrorInfo, ErrorKind};
use crate::extractor::Extractor;
use crate::identity::{JobKey, WorkSpec};
use crate::metrics;

use super::config::OrchestratorConfig;
use super::handle::WaiterHandle;
use super::registry::{lock, Claim, Registry, Settlement};
use super::types::{JobOutcome, JobView, OrchestratorStatus, SubmitError, WaitError};

/// Everything a worker needs, cloned into each spawned task.
#[derive(Clone)]
struct WorkerContext {
    config: OrchestratorConfig,
    extractor: Arc<dyn Extractor>,
    store: Arc<ArtifactStore>,
    registry: Arc<Mutex<Registry>>,
    notify: Arc<Notify>,
}

impl WorkerContext {
    async fn run(self, worker: usize, mut shutdown_rx: broadcast::Receiver<()>) {
        debug!("Worker {} started", worker);
        loop {
            let claim = lock(&self.registry).claim();
            let Some(claim) = claim else {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = self.notify.notified() => {}
                }
                continue;
            };

            info!(
                "Worker {} executing job {} (attempt {})",
                worker, claim.key, claim.attempt
            );
            let start = Instant::now();
            let result = tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Worker {} abandoning job {} on shutdown", worker, claim.key);
                    break;
                }
                result = self.execute(&claim) => result,
            };
            self.settle(&claim, result, start);
        }
        debug!("Worker {} stopped", worker);
    }

    /// Runs the extractor into a scratch directory and publishes its output.
    async fn execute(&self, claim: &Claim) -> JobOutcome {
        let sink = self.store.scratch().await.map_err(|e| {
            error!("Storage failure preparing job {}: {}", claim.key, e);
            ErrorInfo::new(e.kind(), e.to_string())
        })?;

        let encode = self.extractor.fetch_and_encode(&claim.work, &sink);
        let encoded = match self.config.execution_timeout_secs {
            Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), encode).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(ErrorInfo::new(
                        ErrorKind::NetworkError,
                        format!("execution exceeded {secs} seconds"),
                    ))
                }
            },
            None => encode.await,
        }
        .map_err(|e| ErrorInfo::new(e.kind(), e.to_string()))?;

        let title = encoded
            .title
            .clone()
            .unwrap_or_else(|| claim.key.to_string());
        self.store
            .put_file(&encoded.path, &title, claim.work.encoding.kind)
            .await
            .map_err(|e| {
                error!("Storage failure publishing job {}: {}", claim.key, e);
                ErrorInfo::new(e.kind(), e.to_string())
            })
    }

    fn settle(&self, claim: &Claim, result: JobOutcome, start: Instant) {
        let elapsed = start.elapsed().as_secs_f64();
        let settlement = lock(&self.registry).finish(claim, result, &self.config.retry);

        let label = match &settlement {
            Settlement::Completed => {
                info!("Job {} completed in {:.1}s", claim.key, elapsed);
                "success"
            }
            Settlement::Retry(delay) => {
                metrics::RETRIES_SCHEDULED.inc();
                self.schedule_requeue(claim, *delay);
                "retry"
            }
            Settlement::Failed(kind) => {
                warn!("Job {} failed ({}) after {} attempts", claim.key, kind, claim.attempt);
                "failed"
            }
            Settlement::Abandoned => "abandoned",
            Settlement::Stale => {
                debug!("Discarding stale result for job {}", claim.key);
                "stale"
            }
        };
        metrics::EXECUTION_DURATION
            .with_label_values(&[label])
            .observe(elapsed);
    }

    fn schedule_requeue(&self, claim: &Claim, delay: Duration) {
        debug!("Re-queueing job {} in {:?}", claim.key, delay);
        let registry = Arc::clone(&self.registry);
        let notify = Arc::clone(&self.notify);
        let key = claim.key.clone();
        let job_id = claim.job_id;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if lock(&registry).requeue(&key, job_id) {
                notify.notify_one();
            }
        });
    }
}

/// The job orchestrator: deduplicates submissions by key and executes them
/// on a bounded worker pool.
pub struct Orchestrator {
    context: WorkerContext,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Orchestrator {
    /// Create a new orchestrator. Call [`start`](Self::start) to spawn workers.
    pub fn new(
        config: OrchestratorConfig,
        extractor: Arc<dyn Extractor>,
        store: Arc<ArtifactStore>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            context: WorkerContext {
                config,
                extractor,
                store,
                registry: Arc::new(Mutex::new(Registry::new())),
                notify: Arc::new(Notify::new()),
            },
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.context.config
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.context.store
    }

    pub fn extractor(&self) -> &Arc<dyn Extractor> {
        &self.context.extractor
    }

    /// Start the worker pool and the housekeeping loop.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Orchestrator already running");
            return;
        }

        info!(
            "Starting orchestrator with {} workers (queue capacity {})",
            self.context.config.workers, self.context.config.queue_capacity
        );

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        for worker in 0..self.context.config.workers {
            let context = self.context.clone();
            let shutdown_rx = self.shutdown_tx.subscribe();
            tasks.push(tokio::spawn(context.run(worker, shutdown_rx)));
        }
        // Workers claim before their first wait, so jobs submitted before
        // start are picked up without a notification.
        tasks.push(self.spawn_housekeeping_loop());
    }

    /// Stop accepting jobs, cancel unfinished ones and wait for the workers.
    pub async fn stop(&self) {
        let cancelled = lock(&self.context.registry).shutdown();
        if cancelled > 0 {
            info!("Cancelled {} unfinished jobs on shutdown", cancelled);
        }

        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Orchestrator not running");
            return;
        }

        info!("Stopping orchestrator");
        let _ = self.shutdown_tx.send(());

        let tasks = std::mem::take(
            &mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for task in tasks {
            if let Err(e) = task.await {
                warn!("Orchestrator task ended abnormally: {}", e);
            }
        }
        info!("Orchestrator stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    fn spawn_housekeeping_loop(&self) -> JoinHandle<()> {
        let context = self.context.clone();
        let running = Arc::clone(&self.running);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let interval = Duration::from_secs(context.config.housekeeping_interval_secs.max(1));

        tokio::spawn(async move {
            info!("Housekeeping loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Housekeeping loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        housekeeping(&context, Utc::now()).await;
                    }
                }
            }
            info!("Housekeeping loop stopped");
        })
    }

    /// Submit work for `key`, joining an in-flight job when there is one.
    ///
    /// Never waits for execution. Fails fast with
    /// [`SubmitError::Overloaded`] when every worker is busy and the pending
    /// queue is full.
    pub fn submit(&self, key: JobKey, work: WorkSpec) -> Result<WaiterHandle, SubmitError> {
        let config = &self.context.config;
        let result = lock(&self.context.registry).submit(
            key.clone(),
            work,
            config.workers,
            config.queue_capacity,
        );

        let outcome = match &result {
            Ok(registration) if registration.created => "created",
            Ok(_) => "attached",
            Err(SubmitError::Overloaded { .. }) => "overloaded",
            Err(SubmitError::NotRunning) => "not_running",
        };
        metrics::JOB_SUBMISSIONS.with_label_values(&[outcome]).inc();

        let registration = result.inspect_err(|e| warn!("Rejected job {}: {}", key, e))?;
        if registration.created {
            self.context.notify.notify_one();
        }
        Ok(WaiterHandle::new(
            key,
            registration,
            Arc::clone(&self.context.registry),
        ))
    }

    /// Register interest in whatever job is recorded for `key`.
    pub fn attach(&self, key: &JobKey) -> Option<WaiterHandle> {
        let registration = lock(&self.context.registry).attach(key)?;
        Some(WaiterHandle::new(
            key.clone(),
            registration,
            Arc::clone(&self.context.registry),
        ))
    }

    /// Wait up to `timeout` for the job behind `handle` to settle.
    ///
    /// On [`WaitError::Timeout`] the handle stays registered.
    pub async fn wait(&self, handle: &WaiterHandle, timeout: Duration) -> Result<ArtifactRef, WaitError> {
        let mut outcome = handle.outcome.clone();
        let settled = tokio::time::timeout(timeout, async {
            outcome
                .wait_for(Option::is_some)
                .await
                .map(|value| (*value).clone())
        })
        .await;

        match settled {
            Err(_) => Err(WaitError::Timeout),
            Ok(Ok(Some(Ok(artifact)))) => Ok(artifact),
            Ok(Ok(Some(Err(error)))) => Err(WaitError::Failed(error)),
            Ok(Ok(None)) | Ok(Err(_)) => Err(WaitError::Failed(ErrorInfo::new(
                ErrorKind::Cancelled,
                "orchestrator dropped",
            ))),
        }
    }

    /// Withdraw the requester behind `handle`.
    ///
    /// A pending job whose last requester leaves is cancelled. A running job
    /// keeps running.
    pub fn cancel(&self, handle: WaiterHandle) {
        debug!("Cancelling waiter on job {}", handle.key());
        drop(handle);
    }

    /// Non-blocking snapshot of the job recorded for `key`.
    pub fn status(&self, key: &JobKey) -> Option<JobView> {
        lock(&self.context.registry).view(key)
    }

    /// Pool and queue counters.
    pub fn stats(&self) -> OrchestratorStatus {
        lock(&self.context.registry).status(
            self.is_running(),
            self.context.config.workers,
            self.context.config.queue_capacity,
        )
    }

    /// Evict expired jobs and sweep expired artifacts as of `now`.
    pub async fn run_housekeeping(&self, now: DateTime<Utc>) -> (usize, SweepReport) {
        housekeeping(&self.context, now).await
    }
}

async fn housekeeping(context: &WorkerContext, now: DateTime<Utc>) -> (usize, SweepReport) {
    let cutoff = now - ChronoDuration::seconds(context.config.job_retention_secs as i64);
    let evicted = lock(&context.registry).evict(cutoff);
    if evicted > 0 {
        info!("Evicted {} finished jobs", evicted);
    }
    let report = context.store.sweep(now).await;
    (evicted, report)
}
