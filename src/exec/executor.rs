// src/exec/executor.rs

//! The step-executor boundary.
//!
//! The scheduler never runs commands itself. Each step of a dispatched job is
//! handed to a [`StepExecutor`], which reports an exit code or says it could
//! not run the step at all.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

use crate::dag::{EnvironmentDescriptor, Step};

/// What an executor reports for a step that ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    /// Process exit code; anything other than `0` fails the step.
    pub exit_code: i32,
    pub duration: Duration,
    /// Opaque reference to captured output (e.g. a log file path).
    pub log_ref: Option<String>,
}

/// The executor could not run the step (environment setup failed, process
/// could not be spawned, unsupported environment, ...).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ExecutorUnavailable(pub String);

/// Future returned by [`StepExecutor::execute`].
pub type StepFuture<'a> =
    Pin<Box<dyn Future<Output = Result<StepReport, ExecutorUnavailable>> + Send + 'a>>;

/// Runs one step to completion.
///
/// Production code uses [`crate::exec::ShellStepExecutor`]; tests provide a
/// scripted implementation that never spawns processes.
pub trait StepExecutor: Send + Sync {
    fn execute<'a>(&'a self, step: &'a Step, environment: &'a EnvironmentDescriptor)
        -> StepFuture<'a>;
}
