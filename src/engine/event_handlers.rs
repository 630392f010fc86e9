// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use crate::dag::{JobReport, ScheduledJob, Scheduler, SchedulerStep};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Hand these jobs to the execution backend.
    DispatchJobs(Vec<ScheduledJob>),
    /// Every job is terminal; the run record is final.
    RunFinished,
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

/// Start the run: dispatch every job without dependencies.
pub fn handle_run_start(scheduler: &mut Scheduler) -> CoreStep {
    let step = scheduler.start();
    core_step_from(scheduler, step)
}

/// Handle a job completion event.
pub fn handle_job_finished(scheduler: &mut Scheduler, job: &str, report: JobReport) -> CoreStep {
    let step = scheduler.handle_completion(job, report);
    core_step_from(scheduler, step)
}

/// Handle a shutdown request: nothing new starts, running jobs are drained.
pub fn handle_shutdown(scheduler: &mut Scheduler) -> CoreStep {
    let step = scheduler.request_shutdown();
    core_step_from(scheduler, step)
}

fn core_step_from(scheduler: &Scheduler, step: SchedulerStep) -> CoreStep {
    let mut commands = Vec::new();

    if !step.newly_scheduled.is_empty() {
        commands.push(CoreCommand::DispatchJobs(step.newly_scheduled));
    }
    if step.run_just_finished {
        commands.push(CoreCommand::RunFinished);
    }

    CoreStep {
        commands,
        keep_running: !scheduler.is_finished(),
    }
}
