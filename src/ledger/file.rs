// src/ledger/file.rs

//! Append-only ledger backed by a JSON Lines file: one `RunSummary` per
//! line, oldest first.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::dag::PipelineRun;
use crate::errors::LedgerError;
use crate::ledger::history::RunHistory;
use crate::ledger::summary::RunSummary;
use crate::ledger::RunLedger;

#[derive(Debug)]
pub struct FileLedger {
    path: PathBuf,
    /// Ids already in the file, so a run is never written twice.
    recorded: Mutex<HashSet<Uuid>>,
}

#[derive(serde::Deserialize)]
struct IdOnly {
    id: Uuid,
}

impl FileLedger {
    /// Open (or create) the ledger at `path`, creating parent directories.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut recorded = HashSet::new();
        for (line_no, json) in read_lines(&path)? {
            match serde_json::from_str::<IdOnly>(&json) {
                Ok(entry) => {
                    recorded.insert(entry.id);
                }
                Err(e) => warn!(
                    path = %path.display(),
                    line = line_no,
                    error = %e,
                    "ignoring malformed ledger line"
                ),
            }
        }

        debug!(path = %path.display(), runs = recorded.len(), "opened file ledger");
        Ok(Self {
            path,
            recorded: Mutex::new(recorded),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RunLedger for FileLedger {
    fn record_run(&self, run: &PipelineRun) -> Result<(), LedgerError> {
        let summary = RunSummary::try_from(run)?;
        let mut recorded = self
            .recorded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if recorded.contains(&summary.id) {
            return Err(LedgerError::AlreadyRecorded(summary.id));
        }

        let mut line = serde_json::to_string(&summary)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .read(true)
            .create(true)
            .append(true)
            .open(&self.path)?;
        // A torn last write must not swallow this entry.
        if !ends_with_newline(&mut file)? {
            warn!(path = %self.path.display(), "ledger ends with a partial line");
            line.insert(0, '\n');
        }
        file.write_all(line.as_bytes())?;
        file.flush()?;

        recorded.insert(summary.id);
        debug!(
            run_id = %summary.id,
            path = %self.path.display(),
            "appended run to file ledger"
        );
        Ok(())
    }

    fn list_runs(&self) -> Result<RunHistory, LedgerError> {
        let lines: Arc<[(usize, String)]> = read_lines(&self.path)?.into();
        Ok(RunHistory::from_lines(lines))
    }
}

fn ends_with_newline(file: &mut File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Non-empty lines of the ledger with 1-based line numbers. A missing file
/// is an empty ledger.
fn read_lines(path: &Path) -> Result<Vec<(usize, String)>, LedgerError> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    Ok(contents
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(i, l)| (i + 1, l.to_string()))
        .collect())
}
