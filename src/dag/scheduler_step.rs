// src/dag/scheduler_step.rs

//! Step-by-step result type for the scheduler.

use crate::dag::job::JobId;
use crate::dag::job_run::ScheduledJob;

/// Structured result of a single scheduler "step".
///
/// The runtime dispatches `newly_scheduled`; tests use the rest to make
/// assertions about what changed.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Jobs that became Ready and were marked Running in this step.
    pub newly_scheduled: Vec<ScheduledJob>,
    /// Jobs that were newly marked Skipped in this step.
    pub newly_skipped: Vec<JobId>,
    /// Whether this step finalized the run.
    pub run_just_finished: bool,
}

impl SchedulerStep {
    pub fn scheduled_ids(&self) -> Vec<&str> {
        self.newly_scheduled.iter().map(|j| j.id.as_str()).collect()
    }
}
