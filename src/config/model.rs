// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::dag::{EnvironmentDescriptor, JobDefinition, Step};
use crate::types::{FailurePolicy, LedgerMode};

/// Pipeline file exactly as deserialized from TOML, before validation.
///
/// ```toml
/// name = "ci"
///
/// [config]
/// failure_policy = "fail-fast"
///
/// [env]
/// CI = "true"
///
/// [[job]]
/// id = "compile"
/// runs_on = "ubuntu-latest"
///
/// [[job.steps]]
/// id = "build"
/// run = "mvn -B package"
///
/// [[job]]
/// id = "security-scan"
/// needs = ["compile"]
///
/// [[job.steps]]
/// run = "trivy fs ."
/// ```
///
/// Jobs are an array of tables so declaration order survives parsing.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Pipeline name, recorded with every run.
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub config: ConfigSection,

    /// Workflow-level environment, inherited by every step.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub job: Vec<JobConfig>,
}

/// `[config]` section: run-wide policy and optional execution hooks.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// `"fail-fast"` (default) or `"stop-all"`.
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Upper bound on concurrently executing jobs. Unset means no cap.
    #[serde(default)]
    pub max_parallel: Option<usize>,

    /// Wall-clock limit per job, e.g. `"30m"`. Unset means no limit.
    #[serde(default)]
    pub job_timeout: Option<String>,

    /// `"memory"` (default) or `"file"`.
    #[serde(default)]
    pub ledger: LedgerMode,

    /// Ledger location when `ledger = "file"`, relative to the config file.
    #[serde(default)]
    pub ledger_path: Option<PathBuf>,
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            max_parallel: None,
            job_timeout: None,
            ledger: LedgerMode::default(),
            ledger_path: None,
        }
    }
}

/// `[[job]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub id: String,

    /// Jobs that must succeed before this one starts.
    #[serde(default)]
    pub needs: Vec<String>,

    /// Execution environment label; defaults to `"local"`.
    #[serde(default)]
    pub runs_on: Option<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// `[[job.steps]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct StepConfig {
    /// Optional step id; unnamed steps become `step-<n>` (1-based).
    #[serde(default)]
    pub id: Option<String>,

    pub run: String,

    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl StepConfig {
    pub fn effective_id(&self, position: usize) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| format!("step-{}", position + 1))
    }
}

/// Validated pipeline configuration.
///
/// Only obtainable through `ConfigFile::try_from(RawConfigFile)`, which
/// checks structural invariants. Dependency resolution and cycle detection
/// belong to [`crate::dag::JobGraph::build`].
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub name: Option<String>,
    pub config: ConfigSection,
    pub env: BTreeMap<String, String>,
    pub job: Vec<JobConfig>,
    job_timeout: Option<Duration>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile, job_timeout: Option<Duration>) -> Self {
        Self {
            name: raw.name,
            config: raw.config,
            env: raw.env,
            job: raw.job,
            job_timeout,
        }
    }

    /// Pipeline name, falling back to `"pipeline"`.
    pub fn pipeline_name(&self) -> &str {
        self.name.as_deref().unwrap_or("pipeline")
    }

    /// Parsed `[config].job_timeout`.
    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout
    }

    /// Convert the `[[job]]` entries into job definitions, in declaration
    /// order, with environment layered as step > job > workflow.
    pub fn job_definitions(&self) -> Vec<JobDefinition> {
        self.job
            .iter()
            .map(|job| {
                let steps = job
                    .steps
                    .iter()
                    .enumerate()
                    .map(|(pos, sc)| {
                        let mut env = self.env.clone();
                        env.extend(job.env.clone());
                        env.extend(sc.env.clone());
                        Step {
                            id: sc.effective_id(pos),
                            command: sc.run.clone(),
                            env,
                        }
                    })
                    .collect();

                JobDefinition {
                    id: job.id.clone(),
                    steps,
                    needs: job.needs.clone(),
                    environment: job
                        .runs_on
                        .clone()
                        .map(EnvironmentDescriptor)
                        .unwrap_or_default(),
                }
            })
            .collect()
    }
}

/// Parse a duration string such as `"500ms"`, `"90s"`, `"30m"` or `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };
    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{}' is too large", s))
}
