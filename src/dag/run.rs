// src/dag/run.rs

//! The `PipelineRun` aggregate: one graph, one `JobRun` per job, and the
//! overall outcome.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::dag::graph::{JobGraph, JobIndex};
use crate::dag::job::JobId;
use crate::dag::job_run::{JobRun, JobState};

/// Overall state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Succeeded,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunState::Running)
    }
}

/// Descriptive fields reported alongside the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub pipeline: String,
    pub commit: Option<String>,
    pub branch: Option<String>,
}

impl Default for RunMetadata {
    fn default() -> Self {
        Self {
            pipeline: "pipeline".to_string(),
            commit: None,
            branch: None,
        }
    }
}

/// One entry in the run's transition log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTransition {
    pub job: JobId,
    pub state: JobState,
    pub at: DateTime<Utc>,
}

/// A single execution attempt of every job in a [`JobGraph`].
///
/// Only the [`crate::dag::Scheduler`] mutates a run; once it is finalized
/// every accessor is a read-only view for reporting.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    id: Uuid,
    metadata: RunMetadata,
    graph: Arc<JobGraph>,
    jobs: Vec<JobRun>,
    state: RunState,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    transitions: Vec<JobTransition>,
}

impl PipelineRun {
    pub fn new(graph: Arc<JobGraph>, metadata: RunMetadata) -> Self {
        let jobs = graph.jobs().map(|j| JobRun::new(j.id.clone())).collect();
        Self {
            id: Uuid::new_v4(),
            metadata,
            graph,
            jobs,
            state: RunState::Running,
            started_at: Utc::now(),
            finished_at: None,
            transitions: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn metadata(&self) -> &RunMetadata {
        &self.metadata
    }

    pub fn graph(&self) -> &JobGraph {
        &self.graph
    }

    pub(crate) fn graph_handle(&self) -> Arc<JobGraph> {
        Arc::clone(&self.graph)
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Total wall time; `None` while running.
    pub fn duration(&self) -> Option<Duration> {
        let end = self.finished_at?;
        Some((end - self.started_at).to_std().unwrap_or_default())
    }

    /// Job records in declaration order.
    pub fn jobs(&self) -> &[JobRun] {
        &self.jobs
    }

    pub fn job(&self, id: &str) -> Option<&JobRun> {
        self.graph.index_of(id).map(|i| &self.jobs[i])
    }

    pub fn job_at(&self, index: JobIndex) -> &JobRun {
        &self.jobs[index]
    }

    /// Every state change, in the order the scheduler applied it.
    pub fn transitions(&self) -> &[JobTransition] {
        &self.transitions
    }

    pub fn count_in(&self, state: JobState) -> usize {
        self.jobs.iter().filter(|j| j.state() == state).count()
    }

    pub(crate) fn job_mut(&mut self, index: JobIndex) -> &mut JobRun {
        &mut self.jobs[index]
    }

    /// Move job `index` to `next`, logging the transition. Illegal
    /// transitions are refused with a warning.
    pub(crate) fn transition(&mut self, index: JobIndex, next: JobState) -> bool {
        let at = Utc::now();
        let job = &mut self.jobs[index];
        let from = job.state();
        if !job.transition(next, at) {
            warn!(
                job = %job.job(),
                run_id = %self.id,
                ?from,
                to = ?next,
                "refusing illegal job state transition"
            );
            return false;
        }
        self.transitions.push(JobTransition {
            job: job.job().to_string(),
            state: next,
            at,
        });
        true
    }

    pub(crate) fn all_jobs_terminal(&self) -> bool {
        self.jobs.iter().all(|j| j.state().is_terminal())
    }

    /// Close the run. Succeeded only if every job Succeeded; an empty run is
    /// vacuously Succeeded.
    pub(crate) fn finalize(&mut self) {
        let all_ok = self.jobs.iter().all(|j| j.state() == JobState::Succeeded);
        self.state = if all_ok {
            RunState::Succeeded
        } else {
            RunState::Failed
        };
        self.finished_at = Some(Utc::now());
    }
}
