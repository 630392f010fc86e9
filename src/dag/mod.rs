// src/dag/mod.rs

//! Job graph and scheduling.
//!
//! - [`job`] holds the static job and step definitions.
//! - [`graph`] builds the immutable dependency graph and its topological order.
//! - [`job_run`] provides per-run job state and dispatch descriptions.
//! - [`run`] is the `PipelineRun` aggregate.
//! - [`scheduler`] contains the per-run state machine that decides which
//!   jobs are ready to run and how failures propagate.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`state_manager`] applies the dependency-countdown transitions.

pub mod graph;
pub mod job;
pub mod job_run;
pub mod run;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;

pub use graph::{JobGraph, JobIndex};
pub use job::{EnvironmentDescriptor, JobDefinition, JobId, Step};
pub use job_run::{JobFailure, JobReport, JobRun, JobState, ScheduledJob, StepOutcome};
pub use run::{JobTransition, PipelineRun, RunMetadata, RunState};
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
