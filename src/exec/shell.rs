// src/exec/shell.rs

//! Step executor that runs each step's command through the platform shell.

use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dag::{EnvironmentDescriptor, Step};
use crate::exec::executor::{ExecutorUnavailable, StepExecutor, StepFuture, StepReport};

/// Runs steps as `sh -c <command>` (`cmd /C` on Windows).
///
/// - `workdir`: directory the command runs in (defaults to the process cwd).
/// - `labels`: if set, only jobs whose `runs_on` label is in the set can run;
///   anything else is reported as [`ExecutorUnavailable`].
/// - `log_dir`: if set, each step's stdout and stderr are streamed to a file
///   there and the path is returned as the step's `log_ref`. Output is never
///   buffered in memory beyond the current line.
#[derive(Debug, Clone, Default)]
pub struct ShellStepExecutor {
    workdir: Option<PathBuf>,
    labels: Option<HashSet<String>>,
    log_dir: Option<PathBuf>,
}

impl ShellStepExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn accepting_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = Some(labels.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    async fn run_step(
        &self,
        step: &Step,
        environment: &EnvironmentDescriptor,
    ) -> Result<StepReport, ExecutorUnavailable> {
        if let Some(labels) = &self.labels {
            if !labels.contains(environment.label()) {
                return Err(ExecutorUnavailable(format!(
                    "no runner for environment '{}'",
                    environment
                )));
            }
        }

        info!(
            step = %step.id,
            environment = %environment,
            cmd = %step.command,
            "starting step process"
        );

        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&step.command);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&step.command);
            c
        };

        cmd.envs(&step.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|e| {
            ExecutorUnavailable(format!("spawning process for step '{}': {e}", step.id))
        })?;

        let sink = self.open_log(step).await;
        let tx = sink.as_ref().map(|s| s.tx.clone());
        let stdout = child
            .stdout
            .take()
            .map(|s| drain_lines(step.id.clone(), "stdout", s, tx.clone()));
        let stderr = child
            .stderr
            .take()
            .map(|s| drain_lines(step.id.clone(), "stderr", s, tx));

        let status = child.wait().await.map_err(|e| {
            ExecutorUnavailable(format!("waiting for process of step '{}': {e}", step.id))
        })?;
        let duration = started.elapsed();

        for handle in [stdout, stderr].into_iter().flatten() {
            if let Err(e) = handle.await {
                warn!(step = %step.id, error = %e, "output reader task failed");
            }
        }

        // A process killed by a signal has no exit code.
        let exit_code = status.code().unwrap_or(-1);
        info!(
            step = %step.id,
            exit_code,
            success = status.success(),
            duration_ms = duration.as_millis() as u64,
            "step process exited"
        );

        let log_ref = match sink {
            Some(sink) => sink.finish(&step.id).await,
            None => None,
        };

        Ok(StepReport {
            exit_code,
            duration,
            log_ref,
        })
    }

    /// Create the step's log file and the task that writes it.
    async fn open_log(&self, step: &Step) -> Option<LogSink> {
        let dir = self.log_dir.as_ref()?;
        let path = dir.join(format!("{}-{}.log", step.id, Uuid::new_v4()));

        let opened = async {
            tokio::fs::create_dir_all(dir).await?;
            File::create(&path).await
        }
        .await;

        let file = match opened {
            Ok(f) => f,
            Err(e) => {
                warn!(step = %step.id, path = %path.display(), error = %e, "failed to create step log");
                return None;
            }
        };

        let (tx, mut rx) = mpsc::channel::<String>(256);
        let writer = tokio::spawn(async move {
            let mut out = BufWriter::new(file);
            while let Some(line) = rx.recv().await {
                out.write_all(line.as_bytes()).await?;
                out.write_all(b"\n").await?;
            }
            out.flush().await
        });

        Some(LogSink { path, tx, writer })
    }
}

/// Open step log: readers send lines through `tx`, `writer` appends them.
struct LogSink {
    path: PathBuf,
    tx: mpsc::Sender<String>,
    writer: JoinHandle<std::io::Result<()>>,
}

impl LogSink {
    /// Close the channel, wait for the writer and return the log path if
    /// every line made it to disk.
    async fn finish(self, step: &str) -> Option<String> {
        let LogSink { path, tx, writer } = self;
        drop(tx);

        match writer.await {
            Ok(Ok(())) => Some(path.display().to_string()),
            Ok(Err(e)) => {
                warn!(step = %step, path = %path.display(), error = %e, "failed to write step log");
                None
            }
            Err(e) => {
                warn!(step = %step, error = %e, "step log writer task failed");
                None
            }
        }
    }
}

impl StepExecutor for ShellStepExecutor {
    fn execute<'a>(
        &'a self,
        step: &'a Step,
        environment: &'a EnvironmentDescriptor,
    ) -> StepFuture<'a> {
        Box::pin(self.run_step(step, environment))
    }
}

/// Consume a child pipe to EOF so the process never blocks on a full pipe.
///
/// Lines are decoded lossily; invalid UTF-8 must not stop the reader, or the
/// child would die of SIGPIPE on its next write. Each line is logged at debug
/// and forwarded to the step log when there is one.
fn drain_lines<R>(
    step: String,
    stream: &'static str,
    pipe: R,
    mut log: Option<mpsc::Sender<String>>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let decoded = String::from_utf8_lossy(&buf);
                    let line = decoded.trim_end_matches(['\n', '\r']);
                    debug!(step = %step, "{stream}: {}", line);

                    if let Some(tx) = &log {
                        if tx.send(line.to_string()).await.is_err() {
                            // Writer is gone; keep draining without a log.
                            log = None;
                        }
                    }
                }
                Err(e) => {
                    warn!(step = %step, stream, error = %e, "reading step output failed");
                    break;
                }
            }
        }
    })
}
