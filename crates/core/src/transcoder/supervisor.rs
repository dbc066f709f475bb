//! Runs ffmpeg as a child process and supervises both of its output streams.

use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::command::TranscodeCommand;
use super::diagnostics::DiagnosticLevel;
use super::progress::{ProgressTracker, ProgressUpdate};

/// What the supervisor needs to know about the input.
#[derive(Debug, Clone)]
pub struct InputDescriptor {
    pub job_id: String,
    /// Source duration, the denominator for progress percentage.
    pub duration_secs: f64,
}

/// Verdict for one process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Exactly `exit_code == 0`.
    pub success: bool,
    pub exit_code: i32,
    /// Error and warning lines, in emission order.
    pub diagnostics: Vec<String>,
}

impl Outcome {
    /// Exit code reported when the process could not be started.
    pub const SPAWN_FAILED: i32 = -1;

    pub fn from_exit(exit_code: i32, diagnostics: Vec<String>) -> Self {
        Self {
            success: exit_code == 0,
            exit_code,
            diagnostics,
        }
    }

    pub fn spawn_failed(reason: impl Into<String>) -> Self {
        Self::from_exit(Self::SPAWN_FAILED, vec![reason.into()])
    }
}

/// Executes built transcode commands.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Returns the name of this implementation.
    fn name(&self) -> &str;

    /// Runs the command to completion.
    ///
    /// Progress updates are sent with `try_send`; a full or closed channel
    /// never stalls the process.
    async fn execute(
        &self,
        command: &TranscodeCommand,
        input: &InputDescriptor,
        progress_tx: mpsc::Sender<ProgressUpdate>,
    ) -> Outcome;
}

/// Child-process supervisor for ffmpeg.
///
/// Each invocation gets two drain tasks, one per output stream, running
/// alongside the wait for process exit. Once the process exits both tasks are
/// joined under `join_timeout`; on expiry they are aborted and whatever
/// diagnostics were collected so far are kept.
pub struct ProcessSupervisor {
    join_timeout: Duration,
}

impl ProcessSupervisor {
    pub fn new(join_timeout: Duration) -> Self {
        Self { join_timeout }
    }

    pub fn from_config(config: &super::TranscoderConfig) -> Self {
        Self::new(Duration::from_secs(config.monitor_join_timeout_secs))
    }
}

#[async_trait]
impl Transcoder for ProcessSupervisor {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn execute(
        &self,
        command: &TranscodeCommand,
        input: &InputDescriptor,
        progress_tx: mpsc::Sender<ProgressUpdate>,
    ) -> Outcome {
        debug!(job_id = %input.job_id, command = %command.display(), "Spawning transcoder");

        let spawned = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                error!(
                    job_id = %input.job_id,
                    program = %command.program.display(),
                    error = %e,
                    "Failed to start transcoder"
                );
                return Outcome::spawn_failed(e.to_string());
            }
        };

        let diagnostics = Arc::new(Mutex::new(Vec::new()));
        let mut monitors: Vec<JoinHandle<()>> = Vec::with_capacity(2);

        if let Some(stdout) = child.stdout.take() {
            let tracker = ProgressTracker::new(input.duration_secs);
            monitors.push(tokio::spawn(drain_progress(
                stdout,
                tracker,
                progress_tx,
                input.job_id.clone(),
            )));
        }
        if let Some(stderr) = child.stderr.take() {
            monitors.push(tokio::spawn(drain_diagnostics(
                stderr,
                Arc::clone(&diagnostics),
                input.job_id.clone(),
            )));
        }

        let exit_code = match child.wait().await {
            Ok(status) => exit_code(status),
            Err(e) => {
                error!(job_id = %input.job_id, error = %e, "Failed waiting for transcoder");
                push_diagnostic(&diagnostics, format!("Failed waiting for transcoder: {}", e));
                Outcome::SPAWN_FAILED
            }
        };

        let joined = timeout(
            self.join_timeout,
            futures::future::join_all(monitors.iter_mut()),
        )
        .await;
        match joined {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        warn!(job_id = %input.job_id, error = %e, "Stream monitor ended abnormally");
                    }
                }
            }
            Err(_) => {
                warn!(
                    job_id = %input.job_id,
                    timeout_secs = self.join_timeout.as_secs_f64(),
                    "Stream monitors did not complete within timeout"
                );
                for monitor in &monitors {
                    monitor.abort();
                }
            }
        }

        let diagnostics = diagnostics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        if exit_code == 0 {
            info!(job_id = %input.job_id, "Transcoder exited successfully");
        } else {
            error!(job_id = %input.job_id, exit_code, "Transcoder failed");
        }

        Outcome::from_exit(exit_code, diagnostics)
    }
}

/// Exit code, or `128 + signal` for signal-terminated processes on unix.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    Outcome::SPAWN_FAILED
}

fn push_diagnostic(diagnostics: &Mutex<Vec<String>>, line: String) {
    diagnostics
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .push(line);
}

/// Reads lines lossily so invalid UTF-8 never stops the drain.
async fn next_line<R: AsyncRead + Unpin>(
    reader: &mut BufReader<R>,
    buf: &mut Vec<u8>,
) -> std::io::Result<Option<String>> {
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(buf);
    Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
}

async fn drain_progress<R: AsyncRead + Unpin>(
    stream: R,
    mut tracker: ProgressTracker,
    progress_tx: mpsc::Sender<ProgressUpdate>,
    job_id: String,
) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        match next_line(&mut reader, &mut buf).await {
            Ok(Some(line)) => {
                let Some(update) = tracker.observe(&line) else {
                    continue;
                };
                if update.percentage % 10 == 0 {
                    info!(
                        job_id = %job_id,
                        percentage = update.percentage,
                        elapsed_secs = update.elapsed.as_secs(),
                        remaining_secs = update.estimated_remaining.map(|r| r.as_secs()),
                        "Transcoding progress"
                    );
                }
                if let Err(mpsc::error::TrySendError::Full(_)) = progress_tx.try_send(update) {
                    debug!(job_id = %job_id, "Progress channel full, dropping update");
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Progress stream read failed");
                break;
            }
        }
    }
}

async fn drain_diagnostics<R: AsyncRead + Unpin>(
    stream: R,
    diagnostics: Arc<Mutex<Vec<String>>>,
    job_id: String,
) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        match next_line(&mut reader, &mut buf).await {
            Ok(Some(line)) => {
                let level = DiagnosticLevel::classify(&line);
                level.log(&job_id, &line);
                if level.is_reportable() {
                    push_diagnostic(&diagnostics, line);
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Diagnostic stream read failed");
                break;
            }
        }
    }
}
