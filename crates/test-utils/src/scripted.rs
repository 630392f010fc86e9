use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use jobdag::dag::{EnvironmentDescriptor, Step};
use jobdag::exec::{ExecutorUnavailable, StepExecutor, StepFuture, StepReport};

/// What the scripted executor does for a given command.
#[derive(Debug, Clone)]
pub enum Behaviour {
    Exit(i32),
    Unavailable(String),
    /// Sleep, then exit with the given code.
    Sleep(Duration, i32),
}

/// One step the executor was asked to run.
#[derive(Debug, Clone)]
pub struct Execution {
    pub command: String,
    pub environment: String,
    pub env: Vec<(String, String)>,
    pub started: Instant,
    pub finished: Instant,
}

/// A step executor that never spawns processes.
///
/// Steps are looked up by their command; unscripted commands succeed
/// immediately. Every call is recorded, along with the peak number of steps
/// running at once.
#[derive(Debug, Default, Clone)]
pub struct ScriptedStepExecutor {
    script: Arc<Mutex<HashMap<String, Behaviour>>>,
    log: Arc<Mutex<Vec<Execution>>>,
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ScriptedStepExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, command: &str, behaviour: Behaviour) -> Self {
        self.script
            .lock()
            .unwrap()
            .insert(command.to_string(), behaviour);
        self
    }

    pub fn fail(self, command: &str, code: i32) -> Self {
        self.with(command, Behaviour::Exit(code))
    }

    pub fn unavailable(self, command: &str, reason: &str) -> Self {
        self.with(command, Behaviour::Unavailable(reason.to_string()))
    }

    pub fn sleep(self, command: &str, dur: Duration) -> Self {
        self.with(command, Behaviour::Sleep(dur, 0))
    }

    /// Commands in the order their execution finished.
    pub fn executed(&self) -> Vec<String> {
        self.executions().into_iter().map(|e| e.command).collect()
    }

    pub fn executions(&self) -> Vec<Execution> {
        self.log.lock().unwrap().clone()
    }

    pub fn execution_of(&self, command: &str) -> Option<Execution> {
        self.executions().into_iter().find(|e| e.command == command)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn run_step(
        &self,
        step: &Step,
        environment: &EnvironmentDescriptor,
    ) -> Result<StepReport, ExecutorUnavailable> {
        let behaviour = self
            .script
            .lock()
            .unwrap()
            .get(&step.command)
            .cloned()
            .unwrap_or(Behaviour::Exit(0));

        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let started = Instant::now();
        let result = match behaviour {
            Behaviour::Exit(code) => {
                tokio::task::yield_now().await;
                Ok(code)
            }
            Behaviour::Sleep(dur, code) => {
                tokio::time::sleep(dur).await;
                Ok(code)
            }
            Behaviour::Unavailable(reason) => Err(ExecutorUnavailable(reason)),
        };
        let finished = Instant::now();

        self.running.fetch_sub(1, Ordering::SeqCst);
        self.log.lock().unwrap().push(Execution {
            command: step.command.clone(),
            environment: environment.label().to_string(),
            env: step.env.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            started,
            finished,
        });

        result.map(|exit_code| StepReport {
            exit_code,
            duration: finished - started,
            log_ref: Some(format!("mem://{}", step.command)),
        })
    }
}

impl StepExecutor for ScriptedStepExecutor {
    fn execute<'a>(
        &'a self,
        step: &'a Step,
        environment: &'a EnvironmentDescriptor,
    ) -> StepFuture<'a> {
        Box::pin(self.run_step(step, environment))
    }
}
