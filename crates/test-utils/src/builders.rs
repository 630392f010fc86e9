#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use jobdag::config::{ConfigFile, ConfigSection, JobConfig, RawConfigFile, StepConfig};
use jobdag::dag::{JobDefinition, JobGraph, Step};
use jobdag::types::FailurePolicy;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                name: None,
                config: ConfigSection::default(),
                env: BTreeMap::new(),
                job: Vec::new(),
            },
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.config.name = Some(name.to_string());
        self
    }

    pub fn with_job(mut self, job: JobConfig) -> Self {
        self.config.job.push(job);
        self
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.config.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.config.failure_policy = policy;
        self
    }

    pub fn max_parallel(mut self, max: usize) -> Self {
        self.config.config.max_parallel = Some(max);
        self
    }

    pub fn job_timeout(mut self, timeout: &str) -> Self {
        self.config.config.job_timeout = Some(timeout.to_string());
        self
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `JobConfig`.
pub struct JobConfigBuilder {
    job: JobConfig,
}

impl JobConfigBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            job: JobConfig {
                id: id.to_string(),
                needs: vec![],
                runs_on: None,
                env: BTreeMap::new(),
                steps: vec![],
            },
        }
    }

    pub fn needs(mut self, dep: &str) -> Self {
        self.job.needs.push(dep.to_string());
        self
    }

    pub fn runs_on(mut self, label: &str) -> Self {
        self.job.runs_on = Some(label.to_string());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.job.env.insert(key.to_string(), value.to_string());
        self
    }

    /// Add a named step.
    pub fn step(mut self, id: &str, run: &str) -> Self {
        self.job.steps.push(StepConfig {
            id: Some(id.to_string()),
            run: run.to_string(),
            env: BTreeMap::new(),
        });
        self
    }

    /// Add a step without an id.
    pub fn run(mut self, run: &str) -> Self {
        self.job.steps.push(StepConfig {
            id: None,
            run: run.to_string(),
            env: BTreeMap::new(),
        });
        self
    }

    pub fn build(self) -> JobConfig {
        self.job
    }
}

/// A job whose steps are named `<job>/<step>`, which is also their command,
/// so a [`crate::scripted::ScriptedStepExecutor`] can target them.
pub fn job(id: &str, steps: &[&str], needs: &[&str]) -> JobDefinition {
    let mut def = JobDefinition::new(id);
    for step in steps {
        def = def.step(Step::new(*step, format!("{id}/{step}")));
    }
    for dep in needs {
        def = def.needs(*dep);
    }
    def
}

/// Build a graph, panicking on invalid input.
pub fn graph(jobs: Vec<JobDefinition>) -> Arc<JobGraph> {
    Arc::new(JobGraph::build(jobs).expect("Failed to build job graph"))
}

/// The documented two-job pipeline: `compile` then `security-scan`.
pub fn compile_then_scan() -> Vec<JobDefinition> {
    vec![
        job("compile", &["checkout", "build"], &[]),
        job("security-scan", &["trivy", "gitleaks"], &["compile"]),
    ]
}

/// A -> {B, C} -> D.
pub fn diamond() -> Vec<JobDefinition> {
    vec![
        job("A", &["s1"], &[]),
        job("B", &["s1"], &["A"]),
        job("C", &["s1"], &["A"]),
        job("D", &["s1"], &["B", "C"]),
    ]
}
