// src/dag/state_manager.rs

//! Per-run state transitions for jobs in the scheduler.

use std::sync::Arc;

use tracing::{debug, info};

use crate::dag::graph::{JobGraph, JobIndex};
use crate::dag::job_run::{JobState, ScheduledJob};
use crate::dag::run::PipelineRun;

/// Applies the dependency-countdown rules to a [`PipelineRun`].
///
/// `remaining[i]` is the number of direct dependencies of job `i` that have
/// not yet Succeeded. A job becomes Ready only when its counter is zero and
/// every dependency is confirmed Succeeded.
pub struct StateManager<'a> {
    graph: Arc<JobGraph>,
    run: &'a mut PipelineRun,
    remaining: &'a mut [usize],
}

impl<'a> StateManager<'a> {
    pub fn new(run: &'a mut PipelineRun, remaining: &'a mut [usize]) -> Self {
        Self {
            graph: run.graph_handle(),
            run,
            remaining,
        }
    }

    /// Mark every job with no dependencies Ready.
    pub fn mark_roots_ready(&mut self) -> Vec<JobIndex> {
        let roots: Vec<JobIndex> = self
            .graph
            .topological_order()
            .iter()
            .copied()
            .filter(|i| self.graph.dependencies_of(*i).is_empty())
            .collect();

        roots
            .into_iter()
            .filter(|i| self.run.transition(*i, JobState::Ready))
            .collect()
    }

    /// Decrement the countdown of each direct dependent of a succeeded job,
    /// marking Ready those that reach zero.
    pub fn release_dependents(&mut self, succeeded: JobIndex) -> Vec<JobIndex> {
        let mut ready = Vec::new();

        for &dependent in self.graph.dependents_of(succeeded) {
            if self.run.job_at(dependent).state() != JobState::Pending {
                continue;
            }

            self.remaining[dependent] = self.remaining[dependent].saturating_sub(1);
            debug!(
                job = %self.graph.job(dependent).id,
                remaining = self.remaining[dependent],
                "dependency succeeded; decremented countdown"
            );

            if self.remaining[dependent] == 0
                && self.deps_satisfied(dependent)
                && self.run.transition(dependent, JobState::Ready)
            {
                ready.push(dependent);
            }
        }

        ready
    }

    /// Whether every direct dependency of `index` has Succeeded.
    pub fn deps_satisfied(&self, index: JobIndex) -> bool {
        self.graph
            .dependencies_of(index)
            .iter()
            .all(|d| self.run.job_at(*d).state() == JobState::Succeeded)
    }

    /// Skip every not-yet-started job downstream of `failed`.
    pub fn skip_downstream(&mut self, failed: JobIndex) -> Vec<JobIndex> {
        let failed_id = self.graph.job(failed).id.clone();
        let downstream = self.graph.downstream_of(failed);
        self.skip_where(downstream, |graph, i| {
            if graph.dependencies_of(i).contains(&failed) {
                format!("needs '{failed_id}' which failed")
            } else {
                format!("upstream job '{failed_id}' failed")
            }
        })
    }

    /// Skip every job that has not started yet, with the same reason.
    pub fn skip_not_started(&mut self, reason: &str) -> Vec<JobIndex> {
        let all: Vec<JobIndex> = self.graph.topological_order().to_vec();
        self.skip_where(all, |_, _| reason.to_string())
    }

    fn skip_where<F>(&mut self, candidates: Vec<JobIndex>, reason: F) -> Vec<JobIndex>
    where
        F: Fn(&JobGraph, JobIndex) -> String,
    {
        let mut skipped = Vec::new();

        for i in candidates {
            if !matches!(
                self.run.job_at(i).state(),
                JobState::Pending | JobState::Ready
            ) {
                continue;
            }
            if self.run.transition(i, JobState::Skipped) {
                let why = reason(&self.graph, i);
                debug!(job = %self.graph.job(i).id, reason = %why, "job skipped");
                self.run.job_mut(i).set_skip_reason(why);
                skipped.push(i);
            }
        }

        skipped
    }

    /// Move every Ready job to Running and describe it for dispatch, in
    /// topological order.
    pub fn collect_ready(&mut self) -> Vec<ScheduledJob> {
        let run_id = self.run.id();
        let candidates: Vec<JobIndex> = self
            .graph
            .topological_order()
            .iter()
            .copied()
            .filter(|i| self.run.job_at(*i).state() == JobState::Ready)
            .collect();

        let mut scheduled = Vec::new();
        for i in candidates {
            if !self.deps_satisfied(i) {
                continue;
            }
            if self.run.transition(i, JobState::Running) {
                let def = self.graph.job(i);
                info!(
                    job = %def.id,
                    run_id = %run_id,
                    steps = def.steps.len(),
                    environment = %def.environment,
                    "dependencies satisfied; dispatching job"
                );
                scheduled.push(ScheduledJob::from_definition(i, def, run_id));
            }
        }

        scheduled
    }

    pub fn all_jobs_terminal(&self) -> bool {
        self.run.all_jobs_terminal()
    }
}
