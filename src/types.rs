use serde::Deserialize;

/// What the scheduler does with the rest of the run once a job fails.
///
/// - `FailFast`: skip every job that needs the failed job, directly or
///   transitively. Jobs with no path to the failure keep running (default).
/// - `StopAll`: skip every job that has not started yet. Jobs that are
///   already running are allowed to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    FailFast,
    StopAll,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::FailFast
    }
}

/// Where finished runs are recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerMode {
    /// Append runs to a JSON Lines file (`.jobdag/runs.jsonl` by default).
    File,
    /// Keep runs in memory only (lost on exit).
    Memory,
}

impl Default for LedgerMode {
    fn default() -> Self {
        LedgerMode::Memory
    }
}
