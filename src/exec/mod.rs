// src/exec/mod.rs

//! Job execution layer.
//!
//! - [`executor`] defines the `StepExecutor` boundary the scheduler relies on.
//! - [`shell`] is the production step executor (`tokio::process::Command`).
//! - [`job_runner`] runs a job's steps in order and short-circuits on failure.
//! - [`backend`] provides the `ExecutorBackend` trait and a concrete
//!   `RealExecutorBackend` that the runtime uses in production, and which
//!   tests can replace with a fake implementation.

pub mod backend;
pub mod executor;
pub mod job_runner;
pub mod shell;

pub use backend::{ExecutorBackend, RealExecutorBackend};
pub use executor::{ExecutorUnavailable, StepExecutor, StepFuture, StepReport};
pub use job_runner::{run_job, StepLog};
pub use shell::ShellStepExecutor;
