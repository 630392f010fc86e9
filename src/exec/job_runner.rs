// src/exec/job_runner.rs

//! Sequential execution of one job's steps.

use std::sync::{Arc, Mutex};

use tracing::{debug, error, info, warn};

use crate::dag::{JobFailure, JobReport, ScheduledJob, StepOutcome};
use crate::exec::executor::StepExecutor;

/// Outcomes of the steps a job has finished so far.
///
/// Clones share the same list, so a caller that abandons the job future
/// (on timeout) still sees what completed.
#[derive(Debug, Clone, Default)]
pub struct StepLog(Arc<Mutex<Vec<StepOutcome>>>);

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, outcome: StepOutcome) {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(outcome);
    }

    pub fn snapshot(&self) -> Vec<StepOutcome> {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// Run the steps of `job` strictly in declaration order, recording each
/// finished step in `log` as it completes.
///
/// The first step that exits non-zero, or that the executor cannot run at
/// all, ends the job: later steps are never handed to the executor.
pub async fn run_job(job: &ScheduledJob, executor: &dyn StepExecutor, log: &StepLog) -> JobReport {
    info!(
        job = %job.id,
        run_id = %job.run_id,
        steps = job.steps.len(),
        "job started"
    );

    let mut outcomes = Vec::with_capacity(job.steps.len());

    for step in job.steps.iter() {
        debug!(job = %job.id, step = %step.id, "executing step");

        let report = match executor.execute(step, &job.environment).await {
            Ok(report) => report,
            Err(unavailable) => {
                error!(
                    job = %job.id,
                    run_id = %job.run_id,
                    step = %step.id,
                    error = %unavailable,
                    "executor unavailable; failing job"
                );
                return JobReport::failed(
                    outcomes,
                    JobFailure::ExecutorUnavailable {
                        step: step.id.clone(),
                        reason: unavailable.0,
                    },
                );
            }
        };

        let outcome = StepOutcome {
            step: step.id.clone(),
            exit_code: report.exit_code,
            duration: report.duration,
            log_ref: report.log_ref,
        };
        let succeeded = outcome.succeeded();
        log.push(outcome.clone());
        outcomes.push(outcome);

        if !succeeded {
            warn!(
                job = %job.id,
                run_id = %job.run_id,
                step = %step.id,
                exit_code = report.exit_code,
                "step failed; skipping remaining steps"
            );
            return JobReport::failed(
                outcomes,
                JobFailure::StepFailed {
                    step: step.id.clone(),
                    exit_code: report.exit_code,
                },
            );
        }
    }

    info!(job = %job.id, run_id = %job.run_id, "all steps succeeded");
    JobReport::success(outcomes)
}
