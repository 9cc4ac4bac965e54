//! # Interpreter Process Manager
//!
//! Runs one interpreter subprocess per request:
//!
//! ```text
//! spawn -> start stdout/stderr drains -> write source to stdin, close it
//!       -> wait for exit (deadline) -> join drains (grace) -> ProcessOutput
//! ```
//!
//! Both drains are running before the first byte of source is written, so a
//! child that fills one pipe while the other is unread cannot deadlock the
//! exchange. On deadline expiry the child is killed; whatever the drains have
//! accumulated so far is kept.

use std::{
    io,
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    process::{ChildStdin, Command},
    sync::Mutex,
    time::timeout,
};
use tracing::{debug, warn};

use crate::config::InterpreterConfig;
use crate::gateway::Evaluator;
use crate::normalize::{Normalizer, truncate_detail};
use crate::outcome::{Evaluation, EvaluationOutcome, EvaluatorKind, FailureKind};
use crate::request::{EvaluationMode, EvaluationRequest};

const READ_CHUNK: usize = 8 * 1024;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to start interpreter `{program}`: {kind}")]
    Spawn {
        program: String,
        kind: io::ErrorKind,
    },

    #[error("interpreter `{program}` was started without a {stream} pipe")]
    MissingPipe {
        program: String,
        stream: &'static str,
    },

    #[error("failed to wait for interpreter: {0}")]
    Wait(#[source] io::Error),
}

pub type ProcessResult<T> = Result<T, ProcessError>;

/// Raw material handed to the [`Normalizer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the child was killed by a signal (including our own kill on timeout).
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    /// Set when stdout hit the capture cap; a result line may have been lost.
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
    pub elapsed: Duration,
}

/// Accumulator shared between a drain task and the manager.
///
/// Shared rather than returned from the task so that output survives the
/// task being aborted.
#[derive(Debug, Clone, Default)]
struct Capture {
    inner: Arc<Mutex<CaptureBuf>>,
}

#[derive(Debug, Default)]
struct CaptureBuf {
    bytes: Vec<u8>,
    truncated: bool,
}

impl Capture {
    async fn append(&self, chunk: &[u8], limit: usize) {
        let mut buf = self.inner.lock().await;
        let room = limit.saturating_sub(buf.bytes.len());
        if chunk.len() > room {
            buf.truncated = true;
        }
        let take = chunk.len().min(room);
        buf.bytes.extend_from_slice(&chunk[..take]);
    }

    async fn take(&self) -> (String, bool) {
        let mut buf = self.inner.lock().await;
        let bytes = std::mem::take(&mut buf.bytes);
        (String::from_utf8_lossy(&bytes).into_owned(), buf.truncated)
    }
}

/// Reads `reader` to EOF. Bytes past `limit` are read and dropped so the
/// child never blocks on a full pipe.
async fn drain<R>(mut reader: R, capture: Capture, limit: usize) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        capture.append(&chunk[..n], limit).await;
    }
}

async fn feed(mut stdin: ChildStdin, source: &str) {
    match stdin.write_all(source.as_bytes()).await {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
            debug!("interpreter closed stdin before reading all of the source");
        }
        Err(err) => warn!("failed to write source to interpreter: {}", err),
    }
    // Dropping the handle closes the pipe and signals EOF to the child.
    drop(stdin);
}

#[derive(Debug, Clone)]
pub struct ProcessManager {
    config: InterpreterConfig,
    normalizer: Normalizer,
}

impl ProcessManager {
    pub fn new(config: InterpreterConfig, detail_limit: usize) -> Self {
        let normalizer = Normalizer::new(config.result_marker.clone(), detail_limit)
            .with_capture_limit(config.max_output_bytes);
        Self { config, normalizer }
    }

    /// Resolves the configured program without starting it.
    pub fn probe(&self) -> Option<PathBuf> {
        resolve_program(&self.config.program)
    }

    fn command(&self, mode: EvaluationMode) -> Command {
        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.args)
            .envs(&self.config.env)
            .env("EVALGATE_MODE", mode.to_string())
            .env("EVALGATE_RESULT_MARKER", &self.config.result_marker)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }
        command
    }

    /// Runs one interpreter process to completion or deadline.
    pub async fn run(&self, request: &EvaluationRequest) -> ProcessResult<ProcessOutput> {
        let started = Instant::now();
        let program = &self.config.program;

        let mut child = self
            .command(request.mode())
            .spawn()
            .map_err(|err| ProcessError::Spawn {
                program: program.clone(),
                kind: err.kind(),
            })?;
        debug!(pid = ?child.id(), %program, "interpreter started");

        let missing = |stream| ProcessError::MissingPipe {
            program: program.clone(),
            stream,
        };
        let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

        let limit = self.config.max_output_bytes;
        let stdout_capture = Capture::default();
        let stderr_capture = Capture::default();
        let mut stdout_task = tokio::spawn(drain(stdout, stdout_capture.clone(), limit));
        let mut stderr_task = tokio::spawn(drain(stderr, stderr_capture.clone(), limit));

        let exchange = async {
            feed(stdin, request.source()).await;
            child.wait().await
        };
        let waited = timeout(self.config.timeout, exchange).await;

        let (exit_code, timed_out) = match waited {
            Ok(Ok(status)) => (status.code(), false),
            Ok(Err(err)) => {
                stdout_task.abort();
                stderr_task.abort();
                return Err(ProcessError::Wait(err));
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.config.timeout.as_millis() as u64,
                    "interpreter exceeded its deadline, killing it"
                );
                if let Err(err) = child.kill().await {
                    warn!("failed to kill interpreter: {}", err);
                }
                (None, true)
            }
        };

        // Descendants of the interpreter may still hold the pipes open.
        let joined = timeout(self.config.kill_grace, async {
            tokio::join!(&mut stdout_task, &mut stderr_task)
        })
        .await;
        match joined {
            Ok((out, err)) => {
                for (stream, result) in [("stdout", out), ("stderr", err)] {
                    match result {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => debug!(stream, "drain ended with error: {}", e),
                        Err(e) => debug!(stream, "drain task failed: {}", e),
                    }
                }
            }
            Err(_) => {
                warn!("interpreter output still open after grace period, abandoning drains");
                stdout_task.abort();
                stderr_task.abort();
            }
        }

        let (stdout, stdout_truncated) = stdout_capture.take().await;
        let (stderr, stderr_truncated) = stderr_capture.take().await;
        let elapsed = started.elapsed();
        debug!(
            ?exit_code,
            timed_out,
            elapsed_ms = elapsed.as_millis() as u64,
            stdout_bytes = stdout.len(),
            stderr_bytes = stderr.len(),
            "interpreter finished"
        );

        Ok(ProcessOutput {
            exit_code,
            stdout,
            stderr,
            timed_out,
            stdout_truncated,
            stderr_truncated,
            elapsed,
        })
    }
}

#[async_trait]
impl Evaluator for ProcessManager {
    fn kind(&self) -> EvaluatorKind {
        EvaluatorKind::Interpreter
    }

    fn is_available(&self) -> bool {
        self.probe().is_some()
    }

    #[tracing::instrument(skip(self, request), fields(mode = %request.mode()))]
    async fn evaluate(&self, request: &EvaluationRequest) -> Evaluation {
        let started = Instant::now();
        match self.run(request).await {
            Ok(output) => {
                if output.stdout_truncated || output.stderr_truncated {
                    warn!(
                        limit = self.config.max_output_bytes,
                        "interpreter output exceeded the capture limit and was truncated"
                    );
                }
                let exit_code = output.exit_code;
                let elapsed = output.elapsed;
                Evaluation::new(self.normalizer.normalize(output), EvaluatorKind::Interpreter)
                    .with_exit_code(exit_code)
                    .with_elapsed(elapsed)
            }
            Err(err @ ProcessError::Spawn { .. }) => {
                warn!("{}", err);
                Evaluation::new(
                    EvaluationOutcome::failure(
                        FailureKind::InterpreterUnavailable,
                        "interpreter is unavailable",
                        truncate_detail(&err.to_string(), self.normalizer.detail_limit()),
                    ),
                    EvaluatorKind::Interpreter,
                )
                .with_elapsed(started.elapsed())
            }
            Err(err) => {
                warn!("{}", err);
                Evaluation::new(
                    EvaluationOutcome::failure(
                        FailureKind::InternalError,
                        "failed to run interpreter",
                        truncate_detail(&err.to_string(), self.normalizer.detail_limit()),
                    ),
                    EvaluatorKind::Interpreter,
                )
                .with_elapsed(started.elapsed())
            }
        }
    }
}

/// Resolves `program` to an executable: absolute paths are checked directly,
/// anything else goes through a `PATH` lookup.
pub fn resolve_program(program: &str) -> Option<PathBuf> {
    let path = Path::new(program);
    if path.is_absolute() {
        return is_executable(path).then(|| path.to_path_buf());
    }
    which::which(program).ok()
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
