// tests/config_loading.rs

mod common;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use jobdag::cli::CliArgs;
use jobdag::config::{
    default_config_path, load_and_validate, load_from_str, parse_duration, ConfigFile,
};
use jobdag::dag::{JobGraph, RunState};
use jobdag::errors::JobdagError;
use jobdag::types::{FailurePolicy, LedgerMode};
use jobdag::ExecutionOptions;
use jobdag_test_utils::builders::{ConfigFileBuilder, JobConfigBuilder};
use jobdag_test_utils::scripted::ScriptedStepExecutor;

const PIPELINE: &str = r#"
name = "ci"

[config]
failure_policy = "stop-all"
max_parallel = 4
job_timeout = "30m"
ledger = "file"
ledger_path = "history/runs.jsonl"

[env]
CI = "true"

[[job]]
id = "compile"
runs_on = "ubuntu-latest"

[[job.steps]]
id = "checkout"
run = "git checkout"

[[job.steps]]
run = "mvn -B package"

[[job]]
id = "security-scan"
needs = ["compile"]

[[job.steps]]
run = "trivy fs ."
"#;

#[test]
fn loads_a_full_pipeline_from_disk() {
    common::init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Jobdag.toml");
    fs::write(&path, PIPELINE).unwrap();

    let cfg = load_and_validate(&path).unwrap();
    assert_eq!(cfg.pipeline_name(), "ci");
    assert_eq!(cfg.config.failure_policy, FailurePolicy::StopAll);
    assert_eq!(cfg.config.max_parallel, Some(4));
    assert_eq!(cfg.job_timeout(), Some(Duration::from_secs(30 * 60)));
    assert_eq!(cfg.config.ledger, LedgerMode::File);

    let defs = cfg.job_definitions();
    let ids: Vec<&str> = defs.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["compile", "security-scan"]);

    let compile = &defs[0];
    assert_eq!(compile.environment.label(), "ubuntu-latest");
    assert_eq!(compile.steps[0].id, "checkout");
    assert_eq!(compile.steps[1].id, "step-2");
    assert_eq!(compile.steps[1].command, "mvn -B package");
    assert_eq!(compile.steps[1].env.get("CI").map(String::as_str), Some("true"));

    let scan = &defs[1];
    assert_eq!(scan.environment.label(), "local");
    assert_eq!(scan.needs, vec!["compile".to_string()]);

    let graph = JobGraph::build(defs).unwrap();
    assert_eq!(graph.topological_ids(), vec!["compile", "security-scan"]);
}

#[test]
fn defaults_apply_when_sections_are_missing() {
    let raw = load_from_str(
        r#"
        [[job]]
        id = "only"

        [[job.steps]]
        run = "true"
        "#,
    )
    .unwrap();
    let cfg = ConfigFile::try_from(raw).unwrap();

    assert_eq!(cfg.pipeline_name(), "pipeline");
    assert_eq!(cfg.config.failure_policy, FailurePolicy::FailFast);
    assert_eq!(cfg.config.max_parallel, None);
    assert_eq!(cfg.job_timeout(), None);
    assert_eq!(cfg.config.ledger, LedgerMode::Memory);
}

#[test]
fn cli_config_defaults_to_the_default_pipeline_path() {
    let args = CliArgs::try_parse_from(["jobdag"]).unwrap();
    assert_eq!(args.config, default_config_path());

    let args = CliArgs::try_parse_from(["jobdag", "--config", "ci/Jobdag.toml"]).unwrap();
    assert_eq!(args.config, std::path::PathBuf::from("ci/Jobdag.toml"));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_and_validate(dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, JobdagError::IoError(_)));
}

#[test]
fn invalid_toml_is_reported() {
    let err = load_from_str("[[job]\nid = ").unwrap_err();
    assert!(matches!(err, JobdagError::TomlError(_)));
}

#[test]
fn unknown_failure_policy_is_a_parse_error() {
    let err = load_from_str(
        r#"
        [config]
        failure_policy = "yolo"
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, JobdagError::TomlError(_)));
}

#[tokio::test]
async fn pipeline_without_jobs_runs_to_success() {
    common::init_tracing();

    let cfg = ConfigFile::try_from(load_from_str("name = \"ci\"\n").unwrap()).unwrap();
    assert!(cfg.job_definitions().is_empty());

    let executor = Arc::new(ScriptedStepExecutor::new());
    let run = common::run_pipeline(
        cfg.job_definitions(),
        ExecutionOptions::from_config(&cfg),
        executor.clone(),
    )
    .await;

    assert_eq!(run.state(), RunState::Succeeded);
    assert!(run.jobs().is_empty());
    assert!(executor.executed().is_empty());
}

#[test]
fn zero_max_parallel_is_rejected() {
    let raw = ConfigFileBuilder::new()
        .with_job(JobConfigBuilder::new("a").run("true").build())
        .max_parallel(0)
        .build_raw();

    let err = ConfigFile::try_from(raw).unwrap_err();
    assert!(matches!(err, JobdagError::ConfigError(ref m) if m.contains("max_parallel")));
}

#[test]
fn bad_job_timeout_is_rejected() {
    let raw = ConfigFileBuilder::new()
        .with_job(JobConfigBuilder::new("a").run("true").build())
        .job_timeout("soon")
        .build_raw();

    let err = ConfigFile::try_from(raw).unwrap_err();
    assert!(matches!(err, JobdagError::ConfigError(ref m) if m.contains("job_timeout")));
}

#[test]
fn duplicate_step_ids_within_a_job_are_rejected() {
    // The unnamed second step becomes `step-2`, colliding with the first.
    let raw = ConfigFileBuilder::new()
        .with_job(
            JobConfigBuilder::new("a")
                .step("step-2", "echo named")
                .run("echo unnamed")
                .build(),
        )
        .build_raw();

    let err = ConfigFile::try_from(raw).unwrap_err();
    assert!(matches!(err, JobdagError::ConfigError(ref m) if m.contains("step-2")));
}

#[test]
fn empty_run_is_rejected() {
    let raw = ConfigFileBuilder::new()
        .with_job(JobConfigBuilder::new("a").step("build", "   ").build())
        .build_raw();

    let err = ConfigFile::try_from(raw).unwrap_err();
    assert!(matches!(err, JobdagError::ConfigError(ref m) if m.contains("empty `run`")));
}

#[test]
fn graph_errors_surface_after_validation() {
    // Structural validation passes; the dangling `needs` is the graph's job.
    let cfg = ConfigFileBuilder::new()
        .with_job(JobConfigBuilder::new("a").run("true").needs("ghost").build())
        .build();

    let err = JobGraph::build(cfg.job_definitions()).unwrap_err();
    assert_eq!(err.to_string(), "Job 'a' needs unknown job 'ghost'");
}

#[test]
fn job_env_overrides_workflow_env() {
    let cfg = ConfigFileBuilder::new()
        .with_env("LEVEL", "workflow")
        .with_env("CI", "true")
        .with_job(
            JobConfigBuilder::new("a")
                .env("LEVEL", "job")
                .run("true")
                .build(),
        )
        .build();

    let defs = cfg.job_definitions();
    let env = &defs[0].steps[0].env;
    assert_eq!(env["LEVEL"], "job");
    assert_eq!(env["CI"], "true");
}

#[test]
fn duration_suffixes() {
    assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
    assert_eq!(parse_duration("90s"), Ok(Duration::from_secs(90)));
    assert_eq!(parse_duration("2h"), Ok(Duration::from_secs(7200)));
    assert!(parse_duration("").is_err());
    assert!(parse_duration("10").is_err());
    assert!(parse_duration("10d").is_err());

    // 99999999999999999 fits in a u64; the same number of hours does not.
    assert!(parse_duration("99999999999999999h").is_err());
    assert!(parse_duration("99999999999999999m").is_err());
    assert_eq!(
        parse_duration("99999999999999999s"),
        Ok(Duration::from_secs(99_999_999_999_999_999))
    );
}
