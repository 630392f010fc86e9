// src/config/validate.rs

use std::collections::HashSet;
use std::time::Duration;

use crate::config::model::{parse_duration, ConfigFile, RawConfigFile};
use crate::errors::{JobdagError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::JobdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let job_timeout = validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw, job_timeout))
    }
}

/// Structural checks only. Unknown `needs` references and cycles are
/// reported by the graph builder with their own error variants.
fn validate_raw_config(cfg: &RawConfigFile) -> Result<Option<Duration>> {
    let timeout = validate_global_config(cfg)?;
    validate_jobs(cfg)?;
    Ok(timeout)
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<Option<Duration>> {
    if cfg.config.max_parallel == Some(0) {
        return Err(JobdagError::ConfigError(
            "[config].max_parallel must be >= 1 (got 0)".to_string(),
        ));
    }

    match cfg.config.job_timeout.as_deref() {
        None => Ok(None),
        Some(s) => parse_duration(s).map(Some).map_err(|e| {
            JobdagError::ConfigError(format!("[config].job_timeout: {e}"))
        }),
    }
}

fn validate_jobs(cfg: &RawConfigFile) -> Result<()> {
    for job in cfg.job.iter() {
        if job.id.trim().is_empty() {
            return Err(JobdagError::ConfigError(
                "every [[job]] needs a non-empty `id`".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for (pos, step) in job.steps.iter().enumerate() {
            let id = step.effective_id(pos);
            if !seen.insert(id.clone()) {
                return Err(JobdagError::ConfigError(format!(
                    "job '{}' declares step '{}' more than once",
                    job.id, id
                )));
            }
            if step.run.trim().is_empty() {
                return Err(JobdagError::ConfigError(format!(
                    "step '{}' of job '{}' has an empty `run`",
                    id, job.id
                )));
            }
        }
    }
    Ok(())
}
