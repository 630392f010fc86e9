// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Duplicate job id: {0}")]
    DuplicateJob(String),

    #[error("Job '{job}' needs unknown job '{missing}'")]
    UnknownDependency { job: String, missing: String },

    #[error("Cyclic dependency between jobs: {}", .0.join(", "))]
    CyclicDependency(Vec<String>),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Ledger error: {0}")]
    LedgerError(#[from] LedgerError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failures raised by a [`crate::ledger::RunLedger`].
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("run {0} is already recorded")]
    AlreadyRecorded(uuid::Uuid),

    #[error("run {0} has not reached a terminal state")]
    RunNotFinished(uuid::Uuid),

    #[error("malformed ledger entry at line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("serializing ledger entry: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("ledger IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, JobdagError>;
