// src/ledger/summary.rs

//! Serializable projections of a finished run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dag::{JobRun, JobState, PipelineRun, RunState, StepOutcome};
use crate::errors::LedgerError;

/// Immutable record of one finished run, as stored by a ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: Uuid,
    pub pipeline: String,
    pub commit: Option<String>,
    pub branch: Option<String>,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub jobs: Vec<JobSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: String,
    pub state: JobState,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub steps: Vec<StepSummary>,
    /// Diagnostic code and message for Failed jobs.
    #[serde(default)]
    pub failure: Option<FailureSummary>,
    #[serde(default)]
    pub skip_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSummary {
    pub id: String,
    pub exit_code: i32,
    pub duration_ms: u64,
    #[serde(default)]
    pub log_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureSummary {
    pub code: String,
    pub message: String,
}

impl RunSummary {
    pub fn succeeded(&self) -> bool {
        self.state == RunState::Succeeded
    }

    pub fn job(&self, id: &str) -> Option<&JobSummary> {
        self.jobs.iter().find(|j| j.id == id)
    }
}

impl TryFrom<&PipelineRun> for RunSummary {
    type Error = LedgerError;

    fn try_from(run: &PipelineRun) -> Result<Self, Self::Error> {
        let finished_at = run
            .finished_at()
            .filter(|_| run.is_finished())
            .ok_or(LedgerError::RunNotFinished(run.id()))?;

        Ok(Self {
            id: run.id(),
            pipeline: run.metadata().pipeline.clone(),
            commit: run.metadata().commit.clone(),
            branch: run.metadata().branch.clone(),
            state: run.state(),
            started_at: run.started_at(),
            finished_at,
            duration_ms: run.duration().map(millis).unwrap_or(0),
            jobs: run.jobs().iter().map(JobSummary::from).collect(),
        })
    }
}

impl From<&JobRun> for JobSummary {
    fn from(job: &JobRun) -> Self {
        Self {
            id: job.job().to_string(),
            state: job.state(),
            started_at: job.started_at(),
            finished_at: job.finished_at(),
            duration_ms: job.duration().map(millis),
            steps: job.steps().iter().map(StepSummary::from).collect(),
            failure: job.failure().map(|f| FailureSummary {
                code: f.reason_code().to_string(),
                message: f.to_string(),
            }),
            skip_reason: job.skip_reason().map(str::to_string),
        }
    }
}

impl From<&StepOutcome> for StepSummary {
    fn from(step: &StepOutcome) -> Self {
        Self {
            id: step.step.clone(),
            exit_code: step.exit_code,
            duration_ms: millis(step.duration),
            log_ref: step.log_ref.clone(),
        }
    }
}

fn millis(d: std::time::Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
