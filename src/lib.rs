// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod ledger;
pub mod logging;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::dag::{JobGraph, JobState, PipelineRun, RunMetadata, RunState, Scheduler};
use crate::engine::{CoreRuntime, Runtime, RuntimeEvent};
use crate::errors::Result;
use crate::exec::{RealExecutorBackend, ShellStepExecutor, StepExecutor};
use crate::ledger::{FileLedger, HistoryStats, MemoryLedger, RunLedger};
use crate::types::{FailurePolicy, LedgerMode};

/// Ledger file used when `ledger = "file"` and no `ledger_path` is given.
pub const DEFAULT_LEDGER_PATH: &str = ".jobdag/runs.jsonl";

/// Knobs for one pipeline execution.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionOptions {
    pub policy: FailurePolicy,
    /// Cap on concurrently executing jobs; `None` means uncapped.
    pub max_parallel: Option<usize>,
    pub job_timeout: Option<Duration>,
    /// Turn Ctrl-C into a graceful shutdown of the run.
    pub handle_ctrl_c: bool,
}

impl ExecutionOptions {
    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self {
            policy: cfg.config.failure_policy,
            max_parallel: cfg.config.max_parallel,
            job_timeout: cfg.job_timeout(),
            handle_ctrl_c: false,
        }
    }
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - pipeline loading and graph building
/// - scheduler / runtime
/// - step executor
/// - run ledger
/// - Ctrl-C handling
///
/// Returns the final run state; load and graph errors are returned as `Err`.
pub async fn run(args: CliArgs) -> Result<RunState> {
    let config_path = args.config.clone();
    let root_dir = config_root_dir(&config_path);

    if let (Some(limit), Some(path)) = (args.history, args.ledger.as_ref()) {
        let ledger = FileLedger::open(path)?;
        print_history(&ledger, limit)?;
        return Ok(RunState::Succeeded);
    }

    let cfg = load_and_validate(&config_path)?;
    let ledger = open_ledger(&cfg, args.ledger.as_deref(), &root_dir)?;

    if let Some(limit) = args.history {
        print_history(ledger.as_ref(), limit)?;
        return Ok(RunState::Succeeded);
    }

    let graph = Arc::new(JobGraph::build(cfg.job_definitions())?);

    if args.dry_run {
        print_dry_run(&cfg, &graph);
        return Ok(RunState::Succeeded);
    }

    let metadata = RunMetadata {
        pipeline: cfg.pipeline_name().to_string(),
        commit: args.commit.clone(),
        branch: args.branch.clone(),
    };

    let executor: Arc<dyn StepExecutor> =
        Arc::new(ShellStepExecutor::new().with_workdir(root_dir.clone()));

    let options = ExecutionOptions {
        handle_ctrl_c: true,
        ..ExecutionOptions::from_config(&cfg)
    };

    let run = execute_pipeline(graph, metadata, options, executor).await?;

    ledger.record_run(&run)?;
    print_run_report(&run);

    Ok(run.state())
}

/// Execute every job of `graph` once and return the finalized run.
///
/// Job failures never surface as `Err`; they are recorded on the returned
/// [`PipelineRun`].
pub async fn execute_pipeline(
    graph: Arc<JobGraph>,
    metadata: RunMetadata,
    options: ExecutionOptions,
    executor: Arc<dyn StepExecutor>,
) -> Result<PipelineRun> {
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    let backend = RealExecutorBackend::new(executor, rt_tx.clone())
        .with_max_parallel(options.max_parallel)
        .with_job_timeout(options.job_timeout);

    if options.handle_ctrl_c {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }
    drop(rt_tx);

    let scheduler = Scheduler::new(graph, metadata, options.policy);
    let core = CoreRuntime::new(scheduler);
    let runtime = Runtime::new(core, rt_rx, backend);
    runtime.run().await
}

/// Pick the ledger: `--ledger` wins, then `[config].ledger`.
pub fn open_ledger(
    cfg: &ConfigFile,
    cli_path: Option<&Path>,
    root_dir: &Path,
) -> Result<Box<dyn RunLedger>> {
    if let Some(path) = cli_path {
        return Ok(Box::new(FileLedger::open(path)?));
    }

    match cfg.config.ledger {
        LedgerMode::Memory => Ok(Box::new(MemoryLedger::new())),
        LedgerMode::File => {
            let rel = cfg
                .config
                .ledger_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LEDGER_PATH));
            let path = if rel.is_absolute() {
                rel
            } else {
                root_dir.join(rel)
            };
            info!(path = %path.display(), "using file ledger");
            Ok(Box::new(FileLedger::open(path)?))
        }
    }
}

/// Figure out the pipeline's root directory.
///
/// - If the config path has a non-empty parent (e.g. "ci/Jobdag.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Jobdag.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Dry-run output: policy, jobs in topological order, steps and needs.
fn print_dry_run(cfg: &ConfigFile, graph: &JobGraph) {
    println!("jobdag dry-run: {}", cfg.pipeline_name());
    println!("  config.failure_policy = {:?}", cfg.config.failure_policy);
    if let Some(max) = cfg.config.max_parallel {
        println!("  config.max_parallel = {max}");
    }
    if let Some(timeout) = cfg.job_timeout() {
        println!("  config.job_timeout = {timeout:?}");
    }
    println!();

    println!("jobs ({}), in execution order:", graph.len());
    for &i in graph.topological_order() {
        let job = graph.job(i);
        println!("  - {} (runs_on: {})", job.id, job.environment);
        if !job.needs.is_empty() {
            println!("      needs: {:?}", job.needs);
        }
        for step in job.steps.iter() {
            println!("      step {}: {}", step.id, step.command);
        }
    }

    debug!("dry-run complete (no execution)");
}

/// Per-job breakdown of a finished run.
fn print_run_report(run: &PipelineRun) {
    let meta = run.metadata();
    println!("run {} ({})", run.id(), meta.pipeline);
    if let Some(commit) = &meta.commit {
        println!("  commit: {commit}");
    }
    if let Some(branch) = &meta.branch {
        println!("  branch: {branch}");
    }
    println!();

    let width = run
        .jobs()
        .iter()
        .map(|j| j.job().len())
        .max()
        .unwrap_or(3)
        .max(3);
    println!("  {:<width$}  {:<10}  {:>10}", "JOB", "STATUS", "DURATION");
    for job in run.jobs() {
        let duration = job
            .duration()
            .map(format_duration)
            .unwrap_or_else(|| "-".to_string());
        let detail = match job.state() {
            JobState::Failed => job.failure().map(|f| f.to_string()),
            JobState::Skipped => job.skip_reason().map(str::to_string),
            _ => None,
        };
        let state = format!("{:?}", job.state()).to_lowercase();
        match detail {
            Some(detail) => println!(
                "  {:<width$}  {:<10}  {:>10}  ({detail})",
                job.job(),
                state,
                duration
            ),
            None => println!("  {:<width$}  {:<10}  {:>10}", job.job(), state, duration),
        }
    }
    println!();

    let total = run
        .duration()
        .map(format_duration)
        .unwrap_or_else(|| "-".to_string());
    println!("result: {:?} in {total}", run.state());
}

/// Most recent `limit` runs plus aggregate stats over them.
fn print_history(ledger: &dyn RunLedger, limit: usize) -> Result<()> {
    let history = ledger.list_runs()?;
    let runs = history
        .take(limit)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if runs.is_empty() {
        println!("no runs recorded");
        return Ok(());
    }

    for run in runs.iter() {
        println!(
            "{}  {}  {:<9}  {:>10}  {}{}",
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.id,
            format!("{:?}", run.state).to_lowercase(),
            format_duration(Duration::from_millis(run.duration_ms)),
            run.pipeline,
            run.branch
                .as_deref()
                .map(|b| format!(" @ {b}"))
                .unwrap_or_default(),
        );
    }

    let stats = HistoryStats::from_runs(runs.iter());
    println!();
    println!(
        "{} runs, {} succeeded, {} failed, success rate {:.1}%",
        stats.total,
        stats.succeeded,
        stats.failed,
        stats.success_rate * 100.0
    );
    if let Some(mean) = stats.mean_duration {
        println!("mean duration {}", format_duration(mean));
    }
    Ok(())
}

fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms < 1_000 {
        format!("{ms}ms")
    } else if ms < 60_000 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m{:02}s", d.as_secs() / 60, d.as_secs() % 60)
    }
}
