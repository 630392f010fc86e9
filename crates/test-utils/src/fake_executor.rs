use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use jobdag::dag::{JobFailure, JobReport, ScheduledJob, StepOutcome};
use jobdag::engine::RuntimeEvent;
use jobdag::errors::Result;
use jobdag::exec::ExecutorBackend;

/// A fake backend that:
/// - records which jobs were dispatched
/// - immediately reports `JobFinished` for each of them, failing the first
///   step of any job listed in `failing`.
pub struct FakeBackend {
    runtime_tx: tokio::sync::mpsc::Sender<RuntimeEvent>,
    dispatched: Arc<Mutex<Vec<String>>>,
    failing: HashSet<String>,
}

impl FakeBackend {
    pub fn new(
        runtime_tx: tokio::sync::mpsc::Sender<RuntimeEvent>,
        dispatched: Arc<Mutex<Vec<String>>>,
    ) -> Self {
        Self {
            runtime_tx,
            dispatched,
            failing: HashSet::new(),
        }
    }

    pub fn failing(mut self, job: &str) -> Self {
        self.failing.insert(job.to_string());
        self
    }

    fn report_for(&self, job: &ScheduledJob) -> JobReport {
        let first = job
            .steps
            .first()
            .map(|s| s.id.clone())
            .unwrap_or_else(|| "none".to_string());

        if self.failing.contains(&job.id) {
            JobReport::failed(
                vec![StepOutcome {
                    step: first.clone(),
                    exit_code: 1,
                    duration: Default::default(),
                    log_ref: None,
                }],
                JobFailure::StepFailed {
                    step: first,
                    exit_code: 1,
                },
            )
        } else {
            JobReport::success(Vec::new())
        }
    }
}

impl ExecutorBackend for FakeBackend {
    fn spawn_ready_jobs(
        &mut self,
        jobs: Vec<ScheduledJob>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let dispatched = Arc::clone(&self.dispatched);
        let finished: Vec<(String, JobReport)> = jobs
            .iter()
            .map(|j| (j.id.clone(), self.report_for(j)))
            .collect();

        Box::pin(async move {
            for (job, report) in finished {
                {
                    let mut guard = dispatched.lock().unwrap();
                    guard.push(job.clone());
                }

                tx.send(RuntimeEvent::JobFinished { job, report })
                    .await
                    .map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }
}
