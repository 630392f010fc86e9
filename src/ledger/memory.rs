// src/ledger/memory.rs

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::dag::PipelineRun;
use crate::errors::LedgerError;
use crate::ledger::history::RunHistory;
use crate::ledger::summary::RunSummary;
use crate::ledger::RunLedger;

/// In-process ledger; contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    runs: Mutex<Vec<RunSummary>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn runs(&self) -> MutexGuard<'_, Vec<RunSummary>> {
        // A panic while holding the lock cannot leave a half-written entry:
        // entries are pushed whole.
        self.runs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RunLedger for MemoryLedger {
    fn record_run(&self, run: &PipelineRun) -> Result<(), LedgerError> {
        let summary = RunSummary::try_from(run)?;
        let mut runs = self.runs();

        if runs.iter().any(|r| r.id == summary.id) {
            return Err(LedgerError::AlreadyRecorded(summary.id));
        }

        debug!(run_id = %summary.id, state = ?summary.state, "recording run in memory ledger");
        runs.push(summary);
        Ok(())
    }

    fn list_runs(&self) -> Result<RunHistory, LedgerError> {
        let snapshot: Arc<[RunSummary]> = self.runs().clone().into();
        Ok(RunHistory::from_summaries(snapshot))
    }
}
