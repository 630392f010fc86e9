// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of spawning jobs itself.
//! This makes it easy to swap in a fake backend in tests while keeping the
//! production implementation here.
//!
//! - `RealExecutorBackend` is the default implementation used by `jobdag`.
//!   It spawns one Tokio task per dispatched job, runs its steps through a
//!   [`StepExecutor`], and reports back with `RuntimeEvent::JobFinished`.
//! - Tests can provide their own `ExecutorBackend` that, for example, records
//!   which jobs were dispatched and directly emits `JobFinished` events.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, warn};

use crate::dag::{JobFailure, JobReport, ScheduledJob};
use crate::engine::RuntimeEvent;
use crate::errors::Result;

use super::executor::StepExecutor;
use super::job_runner::{run_job, StepLog};

/// Trait abstracting how dispatched jobs are executed.
///
/// Production code uses [`RealExecutorBackend`]; tests can provide their own
/// implementation that doesn't spawn real processes.
pub trait ExecutorBackend: Send {
    /// Start executing the given jobs. Must not wait for them to finish;
    /// completion is reported asynchronously as `RuntimeEvent::JobFinished`.
    fn spawn_ready_jobs(
        &mut self,
        jobs: Vec<ScheduledJob>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Real executor backend used in production.
///
/// Two optional hooks sit here rather than in the scheduler:
/// - `max_parallel`: a semaphore caps how many jobs execute at once.
/// - `job_timeout`: a job still running after this long is reported as
///   [`JobFailure::TimedOut`]; dropping its future kills the step process.
pub struct RealExecutorBackend {
    executor: Arc<dyn StepExecutor>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    permits: Option<Arc<Semaphore>>,
    job_timeout: Option<Duration>,
}

impl RealExecutorBackend {
    pub fn new(executor: Arc<dyn StepExecutor>, runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            executor,
            runtime_tx,
            permits: None,
            job_timeout: None,
        }
    }

    pub fn with_max_parallel(mut self, max: Option<usize>) -> Self {
        self.permits = max.map(|n| Arc::new(Semaphore::new(n.max(1))));
        self
    }

    pub fn with_job_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.job_timeout = timeout;
        self
    }

    fn spawn_job(&self, job: ScheduledJob) {
        let executor = Arc::clone(&self.executor);
        let tx = self.runtime_tx.clone();
        let permits = self.permits.clone();
        let job_timeout = self.job_timeout;

        tokio::spawn(async move {
            let _permit = match permits {
                Some(sem) => match sem.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(e) => {
                        warn!(job = %job.id, error = %e, "parallelism semaphore closed; running uncapped");
                        None
                    }
                },
                None => None,
            };

            let log = StepLog::new();
            let report = match job_timeout {
                None => run_job(&job, executor.as_ref(), &log).await,
                Some(limit) => {
                    match tokio::time::timeout(limit, run_job(&job, executor.as_ref(), &log)).await
                    {
                        Ok(report) => report,
                        Err(_) => {
                            let finished = log.snapshot();
                            warn!(
                                job = %job.id,
                                run_id = %job.run_id,
                                ?limit,
                                finished_steps = finished.len(),
                                "job timed out"
                            );
                            JobReport::failed(finished, JobFailure::TimedOut { after: limit })
                        }
                    }
                }
            };

            debug!(job = %job.id, succeeded = report.succeeded(), "reporting job completion");
            if let Err(e) = tx
                .send(RuntimeEvent::JobFinished {
                    job: job.id.clone(),
                    report,
                })
                .await
            {
                error!(job = %job.id, error = %e, "runtime gone; dropping job completion");
            }
        });
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn spawn_ready_jobs(
        &mut self,
        jobs: Vec<ScheduledJob>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        for job in jobs {
            self.spawn_job(job);
        }
        Box::pin(async { Ok(()) })
    }
}
