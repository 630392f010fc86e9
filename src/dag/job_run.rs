// src/dag/job_run.rs

//! Per-run job state, step outcomes and the dispatch description handed to
//! the execution backend.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::dag::graph::JobIndex;
use crate::dag::job::{EnvironmentDescriptor, JobDefinition, JobId, Step};

/// Lifecycle of one job inside a run.
///
/// ```text
/// Pending -> Ready -> Running -> Succeeded | Failed
/// Pending -> Skipped
/// Ready   -> Skipped   (shutdown / stop-all only)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Ready,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::Skipped
        )
    }

    /// Whether `self -> next` is one of the allowed forward transitions.
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Pending, Ready)
                | (Pending, Skipped)
                | (Ready, Running)
                | (Ready, Skipped)
                | (Running, Succeeded)
                | (Running, Failed)
        )
    }
}

/// Why a job ended in `Failed`. Captured on the [`JobRun`], never raised out
/// of the scheduler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobFailure {
    #[error("step '{step}' exited with code {exit_code}")]
    StepFailed { step: String, exit_code: i32 },

    #[error("executor unavailable for step '{step}': {reason}")]
    ExecutorUnavailable { step: String, reason: String },

    #[error("job timed out after {after:?}")]
    TimedOut { after: Duration },
}

impl JobFailure {
    /// Stable diagnostic code, recorded in the ledger.
    pub fn reason_code(&self) -> &'static str {
        match self {
            JobFailure::StepFailed { .. } => "step_failed",
            JobFailure::ExecutorUnavailable { .. } => "executor_unavailable",
            JobFailure::TimedOut { .. } => "timed_out",
        }
    }
}

/// Result of one executed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub step: String,
    pub exit_code: i32,
    pub duration: Duration,
    /// Opaque pointer to the step's captured output, if the executor keeps one.
    pub log_ref: Option<String>,
}

impl StepOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// What the execution backend reports back once a job stops running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    /// Outcomes of the steps that actually ran, in order.
    pub steps: Vec<StepOutcome>,
    pub failure: Option<JobFailure>,
}

impl JobReport {
    pub fn success(steps: Vec<StepOutcome>) -> Self {
        Self {
            steps,
            failure: None,
        }
    }

    pub fn failed(steps: Vec<StepOutcome>, failure: JobFailure) -> Self {
        Self {
            steps,
            failure: Some(failure),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

/// Mutable record of one job's execution attempt.
#[derive(Debug, Clone)]
pub struct JobRun {
    job: JobId,
    state: JobState,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    steps: Vec<StepOutcome>,
    failure: Option<JobFailure>,
    skip_reason: Option<String>,
}

impl JobRun {
    pub fn new(job: JobId) -> Self {
        Self {
            job,
            state: JobState::Pending,
            started_at: None,
            finished_at: None,
            steps: Vec::new(),
            failure: None,
            skip_reason: None,
        }
    }

    pub fn job(&self) -> &str {
        &self.job
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn steps(&self) -> &[StepOutcome] {
        &self.steps
    }

    pub fn failure(&self) -> Option<&JobFailure> {
        self.failure.as_ref()
    }

    pub fn skip_reason(&self) -> Option<&str> {
        self.skip_reason.as_deref()
    }

    /// Wall time between dispatch and completion; `None` until finished.
    pub fn duration(&self) -> Option<Duration> {
        let (start, end) = (self.started_at?, self.finished_at?);
        Some((end - start).to_std().unwrap_or_default())
    }

    /// Apply a forward transition. Returns `false` (and leaves the record
    /// untouched) when the transition is not allowed.
    pub(crate) fn transition(&mut self, next: JobState, at: DateTime<Utc>) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        match next {
            JobState::Running => self.started_at = Some(at),
            JobState::Succeeded | JobState::Failed => self.finished_at = Some(at),
            JobState::Skipped => self.finished_at = Some(at),
            JobState::Pending | JobState::Ready => {}
        }
        self.state = next;
        true
    }

    pub(crate) fn record_report(&mut self, report: JobReport) {
        self.steps = report.steps;
        self.failure = report.failure;
    }

    pub(crate) fn set_skip_reason(&mut self, reason: String) {
        self.skip_reason = Some(reason);
    }
}

/// Description of a job that the scheduler wants the backend to run now.
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub index: JobIndex,
    pub id: JobId,
    pub steps: Vec<Step>,
    pub environment: EnvironmentDescriptor,
    /// Run this dispatch belongs to.
    pub run_id: Uuid,
}

impl ScheduledJob {
    pub fn from_definition(index: JobIndex, def: &JobDefinition, run_id: Uuid) -> Self {
        Self {
            index,
            id: def.id.clone(),
            steps: def.steps.clone(),
            environment: def.environment.clone(),
            run_id,
        }
    }
}
