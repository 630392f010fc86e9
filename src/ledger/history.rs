// src/ledger/history.rs

use std::sync::Arc;
use std::time::Duration;

use crate::errors::LedgerError;
use crate::ledger::summary::RunSummary;

#[derive(Debug, Clone)]
enum HistorySource {
    /// Already-decoded summaries, oldest first.
    Summaries(Arc<[RunSummary]>),
    /// Raw ledger lines `(line number, json)`, oldest first. Decoded only
    /// when the iterator reaches them.
    Lines(Arc<[(usize, String)]>),
}

/// Past runs, most recent first.
///
/// Lazy: file-backed entries are parsed one at a time as the iterator
/// advances. Restartable: [`RunHistory::restart`] rewinds to the most recent
/// run, and a clone iterates independently of the original.
#[derive(Debug, Clone)]
pub struct RunHistory {
    source: HistorySource,
    cursor: usize,
}

impl RunHistory {
    pub(crate) fn from_summaries(runs: Arc<[RunSummary]>) -> Self {
        Self {
            source: HistorySource::Summaries(runs),
            cursor: 0,
        }
    }

    pub(crate) fn from_lines(lines: Arc<[(usize, String)]>) -> Self {
        Self {
            source: HistorySource::Lines(lines),
            cursor: 0,
        }
    }

    /// Number of runs in the snapshot, regardless of the cursor.
    pub fn len(&self) -> usize {
        match &self.source {
            HistorySource::Summaries(s) => s.len(),
            HistorySource::Lines(l) => l.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rewind to the most recent run.
    pub fn restart(&mut self) {
        self.cursor = 0;
    }
}

impl Iterator for RunHistory {
    type Item = Result<RunSummary, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.len();
        if self.cursor >= len {
            return None;
        }
        let idx = len - 1 - self.cursor;
        self.cursor += 1;

        Some(match &self.source {
            HistorySource::Summaries(s) => Ok(s[idx].clone()),
            HistorySource::Lines(l) => {
                let (line, json) = &l[idx];
                serde_json::from_str(json).map_err(|source| LedgerError::Malformed {
                    line: *line,
                    source,
                })
            }
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.len().saturating_sub(self.cursor);
        (left, Some(left))
    }
}

/// Aggregates over a set of past runs, for trend reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Fraction of succeeded runs in `0.0..=1.0`; `0.0` with no runs.
    pub success_rate: f64,
    pub mean_duration: Option<Duration>,
    /// Duration of the first run yielded (the most recent one).
    pub latest_duration: Option<Duration>,
}

impl HistoryStats {
    pub fn from_runs<'a, I>(runs: I) -> Self
    where
        I: IntoIterator<Item = &'a RunSummary>,
    {
        let mut total = 0usize;
        let mut succeeded = 0usize;
        let mut total_ms = 0u128;
        let mut latest_duration = None;

        for run in runs {
            if total == 0 {
                latest_duration = Some(Duration::from_millis(run.duration_ms));
            }
            total += 1;
            if run.succeeded() {
                succeeded += 1;
            }
            total_ms += u128::from(run.duration_ms);
        }

        let (success_rate, mean_duration) = if total == 0 {
            (0.0, None)
        } else {
            let mean_ms = u64::try_from(total_ms / total as u128).unwrap_or(u64::MAX);
            (
                succeeded as f64 / total as f64,
                Some(Duration::from_millis(mean_ms)),
            )
        };

        Self {
            total,
            succeeded,
            failed: total - succeeded,
            success_rate,
            mean_duration,
            latest_duration,
        }
    }
}
