// src/ledger/mod.rs

//! Run ledger: write-once records of finished runs for historical reporting.
//!
//! - [`summary`] holds the serializable `RunSummary` stored per run.
//! - [`history`] provides the lazy `RunHistory` iterator and `HistoryStats`.
//! - [`memory`] and [`file`] are the two `RunLedger` implementations.

pub mod file;
pub mod history;
pub mod memory;
pub mod summary;

use crate::dag::PipelineRun;
use crate::errors::LedgerError;

pub use file::FileLedger;
pub use history::{HistoryStats, RunHistory};
pub use memory::MemoryLedger;
pub use summary::{FailureSummary, JobSummary, RunSummary, StepSummary};

/// Append-only store of finished runs, keyed by run id.
pub trait RunLedger: Send + Sync {
    /// Persist a finished run. Fails with [`LedgerError::RunNotFinished`] for
    /// a run that is still running and [`LedgerError::AlreadyRecorded`] if
    /// the run id is already present; existing entries are never modified.
    fn record_run(&self, run: &PipelineRun) -> Result<(), LedgerError>;

    /// Past runs, most recent first.
    fn list_runs(&self) -> Result<RunHistory, LedgerError>;
}
