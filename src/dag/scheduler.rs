use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dag::graph::{JobGraph, JobIndex};
use crate::dag::job_run::{JobReport, JobState};
use crate::dag::run::{PipelineRun, RunMetadata};
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::StateManager;
use crate::types::FailurePolicy;

/// Scheduler holds the immutable graph plus the mutable [`PipelineRun`].
///
/// It is responsible for:
/// - deciding when a job is Ready (every dependency Succeeded)
/// - marking jobs Running / Succeeded / Failed
/// - skipping jobs according to the [`FailurePolicy`]
/// - finalizing the run once every job is terminal
///
/// It is synchronous and performs no IO; the async
/// [`crate::engine::Runtime`] is its single caller during a run, which is
/// what serializes eligibility decisions.
#[derive(Debug)]
pub struct Scheduler {
    run: PipelineRun,
    policy: FailurePolicy,
    /// Per job: direct dependencies that have not Succeeded yet.
    remaining: Vec<usize>,
    started: bool,
}

impl Scheduler {
    pub fn new(graph: Arc<JobGraph>, metadata: RunMetadata, policy: FailurePolicy) -> Self {
        let remaining = (0..graph.len())
            .map(|i| graph.dependencies_of(i).len())
            .collect();

        Self {
            run: PipelineRun::new(graph, metadata),
            policy,
            remaining,
            started: false,
        }
    }

    pub fn run(&self) -> &PipelineRun {
        &self.run
    }

    pub fn run_id(&self) -> Uuid {
        self.run.id()
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// `true` once every job is terminal and the run has been finalized.
    pub fn is_finished(&self) -> bool {
        self.run.is_finished()
    }

    pub fn state_of(&self, job: &str) -> Option<JobState> {
        self.run.job(job).map(|j| j.state())
    }

    /// Unresolved dependency count of a job, for diagnostics and tests.
    pub fn remaining_deps(&self, job: &str) -> Option<usize> {
        self.run.graph().index_of(job).map(|i| self.remaining[i])
    }

    /// Consume the scheduler, returning the run record.
    pub fn into_run(self) -> PipelineRun {
        self.run
    }

    /// Begin the run: every job without dependencies is dispatched.
    ///
    /// Calling `start` twice is a no-op the second time.
    pub fn start(&mut self) -> SchedulerStep {
        if self.started {
            warn!(run_id = %self.run.id(), "scheduler already started; ignoring");
            return SchedulerStep::default();
        }
        self.started = true;

        info!(
            run_id = %self.run.id(),
            pipeline = %self.run.metadata().pipeline,
            jobs = self.run.graph().len(),
            order = ?self.run.graph().topological_ids(),
            "scheduler: starting run"
        );

        let mut manager = StateManager::new(&mut self.run, &mut self.remaining);
        manager.mark_roots_ready();
        let newly_scheduled = manager.collect_ready();
        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled,
            newly_skipped: Vec::new(),
            run_just_finished,
        }
    }

    /// Record the outcome of a Running job and work out what happens next.
    pub fn handle_completion(&mut self, job: &str, report: JobReport) -> SchedulerStep {
        let Some(index) = self.run.graph().index_of(job) else {
            warn!(job = %job, "completion for unknown job; ignoring");
            return SchedulerStep::default();
        };

        if self.run.job_at(index).state() != JobState::Running {
            warn!(
                job = %job,
                state = ?self.run.job_at(index).state(),
                "completion for job that is not running; ignoring"
            );
            return SchedulerStep::default();
        }

        let succeeded = report.succeeded();
        if let Some(failure) = report.failure.as_ref() {
            warn!(
                job = %job,
                run_id = %self.run.id(),
                reason = failure.reason_code(),
                error = %failure,
                "job failed"
            );
        }
        self.run.job_mut(index).record_report(report);

        let step = if succeeded {
            self.run.transition(index, JobState::Succeeded);
            debug!(job = %job, run_id = %self.run.id(), "job succeeded");
            let mut manager = StateManager::new(&mut self.run, &mut self.remaining);
            manager.release_dependents(index);
            SchedulerStep {
                newly_scheduled: manager.collect_ready(),
                ..SchedulerStep::default()
            }
        } else {
            self.run.transition(index, JobState::Failed);
            SchedulerStep {
                newly_skipped: self.apply_failure_policy(index),
                ..SchedulerStep::default()
            }
        };

        SchedulerStep {
            run_just_finished: self.maybe_finish_run(),
            ..step
        }
    }

    /// Skip every job that has not started. Running jobs are left to finish.
    pub fn request_shutdown(&mut self) -> SchedulerStep {
        if self.run.is_finished() {
            return SchedulerStep::default();
        }

        info!(run_id = %self.run.id(), "shutdown requested; skipping jobs that have not started");
        let mut manager = StateManager::new(&mut self.run, &mut self.remaining);
        let skipped = manager.skip_not_started("shutdown requested");
        let newly_skipped = self.ids(&skipped);

        SchedulerStep {
            newly_scheduled: Vec::new(),
            newly_skipped,
            run_just_finished: self.maybe_finish_run(),
        }
    }

    fn apply_failure_policy(&mut self, failed: JobIndex) -> Vec<String> {
        let failed_id = self.run.graph().job(failed).id.clone();
        let mut manager = StateManager::new(&mut self.run, &mut self.remaining);

        let skipped = match self.policy {
            FailurePolicy::FailFast => manager.skip_downstream(failed),
            FailurePolicy::StopAll => {
                manager.skip_not_started(&format!("run stopped after '{failed_id}' failed"))
            }
        };

        let ids = self.ids(&skipped);
        if !ids.is_empty() {
            info!(
                job = %failed_id,
                policy = ?self.policy,
                skipped = ?ids,
                "skipping jobs after failure"
            );
        }
        ids
    }

    fn ids(&self, indices: &[JobIndex]) -> Vec<String> {
        indices
            .iter()
            .map(|i| self.run.graph().job(*i).id.clone())
            .collect()
    }

    /// Finalize the run if every job is terminal.
    ///
    /// Returns `true` if this call finished the run.
    fn maybe_finish_run(&mut self) -> bool {
        if self.run.is_finished() || !self.run.all_jobs_terminal() {
            return false;
        }

        self.run.finalize();
        info!(
            run_id = %self.run.id(),
            state = ?self.run.state(),
            succeeded = self.run.count_in(JobState::Succeeded),
            failed = self.run.count_in(JobState::Failed),
            skipped = self.run.count_in(JobState::Skipped),
            "scheduler: all jobs terminal; run finished"
        );
        true
    }
}
