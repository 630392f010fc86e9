// tests/ledger.rs

mod common;

use std::fs::OpenOptions;
use std::io::Write;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use jobdag::dag::{
    JobDefinition, JobFailure, JobReport, JobState, PipelineRun, RunMetadata, RunState,
    Scheduler, StepOutcome,
};
use jobdag::errors::LedgerError;
use jobdag::ledger::{FileLedger, HistoryStats, MemoryLedger, RunLedger, RunSummary};
use jobdag::types::FailurePolicy;
use jobdag_test_utils::builders::{compile_then_scan, graph};

fn ok(step: &str) -> JobReport {
    JobReport::success(vec![StepOutcome {
        step: step.to_string(),
        exit_code: 0,
        duration: Duration::from_millis(3),
        log_ref: Some(format!("logs/{step}.log")),
    }])
}

fn start(jobs: Vec<JobDefinition>, branch: &str) -> Scheduler {
    let metadata = RunMetadata {
        pipeline: "ci".to_string(),
        commit: Some("0a1b2c3".to_string()),
        branch: Some(branch.to_string()),
    };
    let mut s = Scheduler::new(graph(jobs), metadata, FailurePolicy::FailFast);
    s.start();
    s
}

/// A finished run of compile -> security-scan, either green or with
/// `compile` failing.
fn finished_run(branch: &str, succeed: bool) -> PipelineRun {
    let mut s = start(compile_then_scan(), branch);
    if succeed {
        s.handle_completion("compile", ok("build"));
        s.handle_completion("security-scan", ok("trivy"));
    } else {
        s.handle_completion(
            "compile",
            JobReport::failed(
                Vec::new(),
                JobFailure::StepFailed {
                    step: "checkout".to_string(),
                    exit_code: 128,
                },
            ),
        );
    }
    assert!(s.is_finished());
    s.into_run()
}

fn collect(ledger: &dyn RunLedger) -> Vec<RunSummary> {
    ledger
        .list_runs()
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

#[test]
fn summary_captures_jobs_steps_and_failures() {
    common::init_tracing();

    let run = finished_run("main", false);
    let summary = RunSummary::try_from(&run).unwrap();

    assert_eq!(summary.id, run.id());
    assert_eq!(summary.pipeline, "ci");
    assert_eq!(summary.commit.as_deref(), Some("0a1b2c3"));
    assert_eq!(summary.state, RunState::Failed);
    assert!(!summary.succeeded());

    let compile = summary.job("compile").unwrap();
    assert_eq!(compile.state, JobState::Failed);
    let failure = compile.failure.as_ref().unwrap();
    assert_eq!(failure.code, "step_failed");

    let scan = summary.job("security-scan").unwrap();
    assert_eq!(scan.state, JobState::Skipped);
    assert_eq!(scan.skip_reason.as_deref(), Some("needs 'compile' which failed"));
    assert!(scan.started_at.is_none());
}

#[test]
fn step_summaries_keep_log_references() {
    let run = finished_run("main", true);
    let summary = RunSummary::try_from(&run).unwrap();

    let compile = summary.job("compile").unwrap();
    assert_eq!(compile.steps.len(), 1);
    assert_eq!(compile.steps[0].id, "build");
    assert_eq!(compile.steps[0].log_ref.as_deref(), Some("logs/build.log"));
    assert!(compile.duration_ms.is_some());
}

#[test]
fn memory_ledger_lists_most_recent_first() {
    let ledger = MemoryLedger::new();
    let first = finished_run("first", true);
    let second = finished_run("second", false);
    let third = finished_run("third", true);

    for run in [&first, &second, &third] {
        ledger.record_run(run).unwrap();
    }

    let ids: Vec<Uuid> = collect(&ledger).into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![third.id(), second.id(), first.id()]);
}

#[test]
fn recording_twice_is_refused() {
    let ledger = MemoryLedger::new();
    let run = finished_run("main", true);

    ledger.record_run(&run).unwrap();
    let err = ledger.record_run(&run).unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyRecorded(id) if id == run.id()));
    assert_eq!(collect(&ledger).len(), 1);
}

#[test]
fn unfinished_run_cannot_be_recorded() {
    let s = start(compile_then_scan(), "main");
    let ledger = MemoryLedger::new();

    let err = ledger.record_run(s.run()).unwrap_err();
    assert!(matches!(err, LedgerError::RunNotFinished(id) if id == s.run_id()));
    assert!(ledger.list_runs().unwrap().is_empty());
}

#[test]
fn history_is_restartable_and_clones_are_independent() {
    let ledger = MemoryLedger::new();
    ledger.record_run(&finished_run("a", true)).unwrap();
    ledger.record_run(&finished_run("b", true)).unwrap();

    let mut history = ledger.list_runs().unwrap();
    assert_eq!(history.len(), 2);
    let latest = history.next().unwrap().unwrap();
    assert_eq!(latest.branch.as_deref(), Some("b"));

    let mut copy = history.clone();
    assert_eq!(copy.next().unwrap().unwrap().branch.as_deref(), Some("a"));
    assert!(copy.next().is_none());

    // The original did not move with its clone.
    assert_eq!(history.next().unwrap().unwrap().branch.as_deref(), Some("a"));
    assert!(history.next().is_none());

    history.restart();
    assert_eq!(history.next().unwrap().unwrap().branch.as_deref(), Some("b"));
}

#[test]
fn history_is_a_snapshot() {
    let ledger = MemoryLedger::new();
    ledger.record_run(&finished_run("a", true)).unwrap();

    let history = ledger.list_runs().unwrap();
    ledger.record_run(&finished_run("b", true)).unwrap();

    assert_eq!(history.count(), 1);
    assert_eq!(collect(&ledger).len(), 2);
}

#[test]
fn file_ledger_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("runs.jsonl");

    let first = finished_run("main", true);
    let second = finished_run("main", false);
    {
        let ledger = FileLedger::open(&path).unwrap();
        ledger.record_run(&first).unwrap();
        ledger.record_run(&second).unwrap();
    }

    let reopened = FileLedger::open(&path).unwrap();
    let runs = collect(&reopened);
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].id, second.id());
    assert_eq!(runs[0], RunSummary::try_from(&second).unwrap());
    assert_eq!(runs[1].id, first.id());

    // Ids loaded from disk still guard against rewrites.
    let err = reopened.record_run(&first).unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyRecorded(_)));

    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents.lines().count(), 2);
}

#[test]
fn missing_ledger_file_is_an_empty_history() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = FileLedger::open(dir.path().join("runs.jsonl")).unwrap();

    let history = ledger.list_runs().unwrap();
    assert!(history.is_empty());
}

#[test]
fn malformed_line_is_reported_when_reached() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("runs.jsonl");

    let good = finished_run("main", true);
    FileLedger::open(&path).unwrap().record_run(&good).unwrap();
    {
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(f, "{{ not json").unwrap();
    }

    let ledger = FileLedger::open(&path).unwrap();
    let mut history = ledger.list_runs().unwrap();

    match history.next() {
        Some(Err(LedgerError::Malformed { line, .. })) => assert_eq!(line, 2),
        other => panic!("expected malformed entry, got {other:?}"),
    }
    // Earlier entries are still readable.
    assert_eq!(history.next().unwrap().unwrap().id, good.id());
}

#[test]
fn torn_last_line_does_not_swallow_the_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("runs.jsonl");

    let good = finished_run("main", true);
    FileLedger::open(&path).unwrap().record_run(&good).unwrap();
    {
        // An interrupted write: half an entry, no trailing newline.
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        write!(f, "{{\"id\": \"abc").unwrap();
    }

    let next = finished_run("release", false);
    FileLedger::open(&path).unwrap().record_run(&next).unwrap();

    let ledger = FileLedger::open(&path).unwrap();
    let mut history = ledger.list_runs().unwrap();
    assert_eq!(history.len(), 3);

    assert_eq!(history.next().unwrap().unwrap().id, next.id());
    match history.next() {
        Some(Err(LedgerError::Malformed { line, .. })) => assert_eq!(line, 2),
        other => panic!("expected malformed entry, got {other:?}"),
    }
    assert_eq!(history.next().unwrap().unwrap().id, good.id());
    assert!(history.next().is_none());
}

fn summary_with(state: RunState, duration_ms: u64) -> RunSummary {
    let now = Utc::now();
    RunSummary {
        id: Uuid::new_v4(),
        pipeline: "ci".to_string(),
        commit: None,
        branch: None,
        state,
        started_at: now,
        finished_at: now,
        duration_ms,
        jobs: Vec::new(),
    }
}

#[test]
fn history_stats_aggregate_runs() {
    let runs = vec![
        summary_with(RunState::Succeeded, 100),
        summary_with(RunState::Failed, 300),
        summary_with(RunState::Succeeded, 200),
        summary_with(RunState::Succeeded, 400),
    ];

    let stats = HistoryStats::from_runs(runs.iter());
    assert_eq!(stats.total, 4);
    assert_eq!(stats.succeeded, 3);
    assert_eq!(stats.failed, 1);
    assert!((stats.success_rate - 0.75).abs() < f64::EPSILON);
    assert_eq!(stats.mean_duration, Some(Duration::from_millis(250)));
    assert_eq!(stats.latest_duration, Some(Duration::from_millis(100)));
}

#[test]
fn history_stats_of_nothing() {
    let stats = HistoryStats::from_runs(std::iter::empty());
    assert_eq!(stats.total, 0);
    assert_eq!(stats.success_rate, 0.0);
    assert_eq!(stats.mean_duration, None);
}
