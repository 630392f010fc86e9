// tests/scheduler_core.rs
//
// Drives the synchronous scheduler and core runtime by hand, without Tokio
// or processes.

mod common;

use std::time::Duration;

use jobdag::dag::{
    JobFailure, JobReport, JobState, RunMetadata, RunState, Scheduler, StepOutcome,
};
use jobdag::engine::{CoreCommand, CoreRuntime, RuntimeEvent};
use jobdag::types::FailurePolicy;
use jobdag_test_utils::builders::{compile_then_scan, diamond, graph, job};

fn scheduler(jobs: Vec<jobdag::dag::JobDefinition>, policy: FailurePolicy) -> Scheduler {
    Scheduler::new(graph(jobs), RunMetadata::default(), policy)
}

fn ok() -> JobReport {
    JobReport::success(vec![StepOutcome {
        step: "s1".to_string(),
        exit_code: 0,
        duration: Duration::from_millis(5),
        log_ref: None,
    }])
}

fn failed(step: &str, exit_code: i32) -> JobReport {
    JobReport::failed(
        vec![StepOutcome {
            step: step.to_string(),
            exit_code,
            duration: Duration::from_millis(5),
            log_ref: None,
        }],
        JobFailure::StepFailed {
            step: step.to_string(),
            exit_code,
        },
    )
}

#[test]
fn start_dispatches_only_roots() {
    common::init_tracing();

    let mut s = scheduler(diamond(), FailurePolicy::FailFast);
    let step = s.start();

    assert_eq!(step.scheduled_ids(), vec!["A"]);
    assert_eq!(s.state_of("A"), Some(JobState::Running));
    assert_eq!(s.state_of("B"), Some(JobState::Pending));
    assert_eq!(s.remaining_deps("D"), Some(2));
    assert!(!s.is_finished());
}

#[test]
fn second_start_is_a_no_op() {
    let mut s = scheduler(diamond(), FailurePolicy::FailFast);
    s.start();
    let again = s.start();
    assert!(again.newly_scheduled.is_empty());
    assert!(!again.run_just_finished);
}

#[test]
fn dependents_wait_for_every_dependency() {
    let mut s = scheduler(diamond(), FailurePolicy::FailFast);
    s.start();

    let step = s.handle_completion("A", ok());
    assert_eq!(step.scheduled_ids(), vec!["B", "C"]);
    assert_eq!(s.remaining_deps("D"), Some(2));

    let step = s.handle_completion("B", ok());
    assert!(step.newly_scheduled.is_empty());
    assert_eq!(s.remaining_deps("D"), Some(1));
    assert_eq!(s.state_of("D"), Some(JobState::Pending));

    let step = s.handle_completion("C", ok());
    assert_eq!(step.scheduled_ids(), vec!["D"]);

    let step = s.handle_completion("D", ok());
    assert!(step.run_just_finished);
    assert_eq!(s.run().state(), RunState::Succeeded);
    assert_eq!(s.run().count_in(JobState::Succeeded), 4);
}

#[test]
fn fail_fast_skips_downstream_but_lets_siblings_finish() {
    let mut s = scheduler(diamond(), FailurePolicy::FailFast);
    s.start();
    s.handle_completion("A", ok());

    let step = s.handle_completion("B", failed("s1", 2));
    assert_eq!(step.newly_skipped, vec!["D".to_string()]);
    assert!(!step.run_just_finished);
    assert_eq!(s.state_of("C"), Some(JobState::Running));

    let step = s.handle_completion("C", ok());
    assert!(step.run_just_finished);

    let run = s.into_run();
    assert_eq!(run.state(), RunState::Failed);
    assert_eq!(run.job("A").unwrap().state(), JobState::Succeeded);
    assert_eq!(run.job("B").unwrap().state(), JobState::Failed);
    assert_eq!(run.job("C").unwrap().state(), JobState::Succeeded);

    let d = run.job("D").unwrap();
    assert_eq!(d.state(), JobState::Skipped);
    assert_eq!(d.skip_reason(), Some("needs 'B' which failed"));
    assert!(d.started_at().is_none());

    let b = run.job("B").unwrap();
    assert_eq!(
        b.failure(),
        Some(&JobFailure::StepFailed {
            step: "s1".to_string(),
            exit_code: 2
        })
    );
}

#[test]
fn fail_fast_reason_names_the_upstream_failure_for_transitive_jobs() {
    let jobs = vec![
        job("a", &["s"], &[]),
        job("b", &["s"], &["a"]),
        job("c", &["s"], &["b"]),
    ];
    let mut s = scheduler(jobs, FailurePolicy::FailFast);
    s.start();

    let step = s.handle_completion("a", failed("s", 1));
    assert_eq!(step.newly_skipped, vec!["b".to_string(), "c".to_string()]);
    assert!(step.run_just_finished);

    let run = s.run();
    assert_eq!(run.job("b").unwrap().skip_reason(), Some("needs 'a' which failed"));
    assert_eq!(run.job("c").unwrap().skip_reason(), Some("upstream job 'a' failed"));
}

#[test]
fn stop_all_skips_independent_jobs_too() {
    let jobs = vec![
        job("a", &["s"], &[]),
        job("b", &["s"], &[]),
        job("after-b", &["s"], &["b"]),
        job("after-a", &["s"], &["a"]),
    ];
    let mut s = scheduler(jobs, FailurePolicy::StopAll);
    let step = s.start();
    assert_eq!(step.scheduled_ids(), vec!["a", "b"]);

    let step = s.handle_completion("a", failed("s", 1));
    assert_eq!(
        step.newly_skipped,
        vec!["after-b".to_string(), "after-a".to_string()]
    );
    // `b` was already running; it is left to finish.
    assert_eq!(s.state_of("b"), Some(JobState::Running));

    let step = s.handle_completion("b", ok());
    assert!(step.newly_scheduled.is_empty());
    assert!(step.run_just_finished);

    let run = s.run();
    assert_eq!(run.state(), RunState::Failed);
    assert_eq!(
        run.job("after-b").unwrap().skip_reason(),
        Some("run stopped after 'a' failed")
    );
}

#[test]
fn fail_fast_keeps_independent_branches_running() {
    let jobs = vec![
        job("a", &["s"], &[]),
        job("b", &["s"], &[]),
        job("after-b", &["s"], &["b"]),
        job("after-a", &["s"], &["a"]),
    ];
    let mut s = scheduler(jobs, FailurePolicy::FailFast);
    s.start();

    s.handle_completion("a", failed("s", 1));
    let step = s.handle_completion("b", ok());
    assert_eq!(step.scheduled_ids(), vec!["after-b"]);
    assert_eq!(s.state_of("after-a"), Some(JobState::Skipped));
}

#[test]
fn empty_run_succeeds_immediately() {
    let mut s = scheduler(Vec::new(), FailurePolicy::FailFast);
    let step = s.start();

    assert!(step.newly_scheduled.is_empty());
    assert!(step.run_just_finished);
    assert_eq!(s.run().state(), RunState::Succeeded);
}

#[test]
fn completion_for_job_that_is_not_running_is_ignored() {
    let mut s = scheduler(compile_then_scan(), FailurePolicy::FailFast);
    s.start();

    let step = s.handle_completion("security-scan", ok());
    assert!(step.newly_scheduled.is_empty());
    assert_eq!(s.state_of("security-scan"), Some(JobState::Pending));

    let step = s.handle_completion("no-such-job", ok());
    assert!(step.newly_scheduled.is_empty());

    s.handle_completion("compile", ok());
    // A duplicate completion must not re-release dependents.
    let step = s.handle_completion("compile", ok());
    assert!(step.newly_scheduled.is_empty());
    assert_eq!(s.state_of("security-scan"), Some(JobState::Running));
}

#[test]
fn shutdown_skips_jobs_that_have_not_started() {
    let mut s = scheduler(diamond(), FailurePolicy::FailFast);
    s.start();

    let step = s.request_shutdown();
    assert_eq!(
        step.newly_skipped,
        vec!["B".to_string(), "C".to_string(), "D".to_string()]
    );
    assert!(!step.run_just_finished);

    let step = s.handle_completion("A", ok());
    assert!(step.newly_scheduled.is_empty());
    assert!(step.run_just_finished);

    let run = s.run();
    // A job that never ran means the pipeline did not succeed.
    assert_eq!(run.state(), RunState::Failed);
    assert_eq!(run.job("B").unwrap().skip_reason(), Some("shutdown requested"));
}

#[test]
fn transition_log_follows_the_lifecycle() {
    let mut s = scheduler(compile_then_scan(), FailurePolicy::FailFast);
    s.start();
    s.handle_completion("compile", ok());
    s.handle_completion("security-scan", ok());

    let log: Vec<(String, JobState)> = s
        .run()
        .transitions()
        .iter()
        .map(|t| (t.job.clone(), t.state))
        .collect();

    let expected = vec![
        ("compile", JobState::Ready),
        ("compile", JobState::Running),
        ("compile", JobState::Succeeded),
        ("security-scan", JobState::Ready),
        ("security-scan", JobState::Running),
        ("security-scan", JobState::Succeeded),
    ];
    let expected: Vec<(String, JobState)> = expected
        .into_iter()
        .map(|(j, st)| (j.to_string(), st))
        .collect();
    assert_eq!(log, expected);
}

#[test]
fn core_runtime_emits_dispatch_and_finish_commands() {
    let mut core = CoreRuntime::new(scheduler(compile_then_scan(), FailurePolicy::FailFast));

    let step = core.start();
    assert!(step.keep_running);
    match step.commands.as_slice() {
        [CoreCommand::DispatchJobs(jobs)] => {
            assert_eq!(jobs.len(), 1);
            assert_eq!(jobs[0].id, "compile");
            assert_eq!(jobs[0].steps.len(), 2);
        }
        other => panic!("unexpected commands: {other:?}"),
    }

    let step = core.step(RuntimeEvent::JobFinished {
        job: "compile".to_string(),
        report: failed("checkout", 128),
    });
    assert!(!step.keep_running);
    assert!(matches!(step.commands.as_slice(), [CoreCommand::RunFinished]));
    assert!(core.is_finished());

    let run = core.into_run();
    assert_eq!(run.job("security-scan").unwrap().state(), JobState::Skipped);
}

#[test]
fn core_runtime_records_shutdown() {
    let mut core = CoreRuntime::new(scheduler(diamond(), FailurePolicy::FailFast));
    core.start();

    let step = core.step(RuntimeEvent::ShutdownRequested);
    assert!(core.shutdown_requested());
    assert!(step.keep_running, "A is still running");
    assert!(step.commands.is_empty());
}
