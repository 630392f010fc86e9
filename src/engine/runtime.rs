// src/engine/runtime.rs

use std::fmt;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::dag::{PipelineRun, ScheduledJob};
use crate::errors::Result;
use crate::exec::ExecutorBackend;

use super::core::CoreRuntime;
use super::{CoreCommand, RuntimeEvent};

/// Drives the scheduler in response to `RuntimeEvent`s, and delegates job
/// execution to an `ExecutorBackend`.
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// runtime semantics. Because this loop is the only caller of the
/// scheduler, job-eligibility decisions are serialized.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, executor: E) -> Self {
        Self {
            core,
            event_rx,
            executor,
        }
    }

    /// Main event loop.
    ///
    /// - Starts the run and dispatches its root jobs.
    /// - Consumes `RuntimeEvent`s from `event_rx` and feeds them into the core.
    /// - Executes commands returned by the core.
    ///
    /// Returns the finalized run once every job is terminal.
    pub async fn run(mut self) -> Result<PipelineRun> {
        info!(run_id = %self.core.scheduler().run_id(), "jobdag runtime started");

        let mut step = self.core.start();
        loop {
            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                break;
            }

            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    return Err(anyhow!("runtime event channel closed before the run finished").into());
                }
            };

            debug!(?event, "runtime received event");
            step = self.core.step(event);
        }

        info!("runtime exiting");
        Ok(self.core.into_run())
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchJobs(jobs) => {
                self.spawn_ready(jobs).await?;
            }
            CoreCommand::RunFinished => {
                let run = self.core.scheduler().run();
                info!(
                    run_id = %run.id(),
                    state = ?run.state(),
                    shutdown = self.core.shutdown_requested(),
                    "run finished"
                );
            }
        }
        Ok(())
    }

    async fn spawn_ready(&mut self, jobs: Vec<ScheduledJob>) -> Result<()> {
        if jobs.is_empty() {
            return Ok(());
        }

        let names: Vec<_> = jobs.iter().map(|j| j.id.as_str()).collect();
        debug!(?names, "spawning ready jobs");

        self.executor.spawn_ready_jobs(jobs).await
    }
}
