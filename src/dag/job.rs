// src/dag/job.rs

//! Static job and step definitions, as handed to the graph builder.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical job identifier type.
pub type JobId = String;

/// Opaque label describing where a job's steps should execute
/// (the `runs_on` value). The scheduler never interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnvironmentDescriptor(pub String);

impl EnvironmentDescriptor {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn label(&self) -> &str {
        &self.0
    }
}

impl Default for EnvironmentDescriptor {
    fn default() -> Self {
        Self("local".to_string())
    }
}

impl fmt::Display for EnvironmentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One command inside a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub id: String,
    /// Shell command line to execute.
    pub command: String,
    /// Environment overrides applied on top of the executor's environment.
    pub env: BTreeMap<String, String>,
}

impl Step {
    pub fn new(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
            env: BTreeMap::new(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// A job as declared in the pipeline: ordered steps plus the jobs it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDefinition {
    pub id: JobId,
    pub steps: Vec<Step>,
    /// Jobs that must succeed before this one may start (`needs = [...]`).
    pub needs: Vec<JobId>,
    pub environment: EnvironmentDescriptor,
}

impl JobDefinition {
    pub fn new(id: impl Into<JobId>) -> Self {
        Self {
            id: id.into(),
            steps: Vec::new(),
            needs: Vec::new(),
            environment: EnvironmentDescriptor::default(),
        }
    }

    pub fn needs(mut self, dep: impl Into<JobId>) -> Self {
        self.needs.push(dep.into());
        self
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn runs_on(mut self, environment: EnvironmentDescriptor) -> Self {
        self.environment = environment;
        self
    }
}
