//! Backend process runner.
//!
//! Spawns one backend CLI process per turn (`claude -p <prompt>
//! --output-format stream-json --verbose`, plus `--resume` for existing
//! sessions), parses its stdout lines into [`SessionEvent`]s, and reports
//! lifecycle status on the same channel. Termination is an explicit kill.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::BackendConfig;
use crate::core::events::SessionEvent;

/// Bounded channel between the process reader and its subscriber.
const EVENT_CHANNEL_CAPACITY: usize = 128;

/// How many trailing stderr lines are kept for failure diagnostics.
const STDERR_TAIL_LINES: usize = 10;

/// Backend lifecycle status, surfaced alongside parsed events.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessStatus {
    /// The process is up. Carries the session id when already known (resume).
    Started { session_id: Option<String> },
    /// First parsed stream line has arrived.
    Output,
    /// Clean exit; the turn is over.
    Idle,
    /// Spawn failure, non-zero exit, stream error, or timeout.
    Failed { message: String },
}

/// One item on a session subscription channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessEvent {
    Status(ProcessStatus),
    Message(SessionEvent),
}

/// Options for one backend turn.
#[derive(Debug, Clone, Default)]
pub struct TurnOptions {
    /// Directory the backend runs in.
    pub project_path: PathBuf,
    /// Prompt text for this turn.
    pub prompt: String,
    /// Resume an existing backend session instead of starting a new one.
    pub resume: Option<String>,
    /// Model override (`--model`).
    pub model: Option<String>,
    /// Abort the turn after this long.
    pub timeout: Option<Duration>,
}

/// A live backend turn: the event stream plus a termination handle.
#[derive(Debug)]
pub struct SessionProcess {
    /// Parsed events and status transitions, in arrival order.
    pub events: mpsc::Receiver<ProcessEvent>,
    cancel: CancellationToken,
}

impl SessionProcess {
    /// Requests termination: kills the subprocess and ends the stream.
    pub fn terminate(&self) {
        self.cancel.cancel();
    }

    /// Splits the handle into its event stream and termination token.
    pub fn split(self) -> (mpsc::Receiver<ProcessEvent>, CancellationToken) {
        (self.events, self.cancel)
    }

    /// Rebuilds a handle from its parts; the inverse of [`SessionProcess::split`].
    /// Lets callers stand in a scripted event stream for a real backend.
    pub fn from_parts(events: mpsc::Receiver<ProcessEvent>, cancel: CancellationToken) -> Self {
        Self { events, cancel }
    }
}

/// Spawns a backend turn.
///
/// # Errors
/// Returns an error when the prompt is empty or the subprocess cannot be
/// spawned. Failures after spawn are reported as [`ProcessStatus::Failed`]
/// on the event channel instead.
pub fn spawn_session(backend: &BackendConfig, options: TurnOptions) -> Result<SessionProcess> {
    let prompt = options.prompt.trim().to_string();
    ensure!(!prompt.is_empty(), "Prompt cannot be empty");

    let args = build_turn_args(&prompt, &options, backend);

    let mut command = Command::new(&backend.binary);
    command
        .args(args)
        .current_dir(&options.project_path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .with_context(|| format!("Failed to spawn backend '{}'", backend.binary))?;

    let stdout = child
        .stdout
        .take()
        .context("Failed to capture backend stdout")?;
    let stderr = child
        .stderr
        .take()
        .context("Failed to capture backend stderr")?;

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let cancel = CancellationToken::new();

    let stderr_task = spawn_stderr_reader(stderr);
    tokio::spawn(run_session_io(
        child,
        stdout,
        stderr_task,
        tx,
        cancel.clone(),
        options.resume.clone(),
        options.timeout,
    ));

    Ok(SessionProcess { events: rx, cancel })
}

fn build_turn_args(
    prompt: &str,
    options: &TurnOptions,
    backend: &BackendConfig,
) -> Vec<OsString> {
    let mut args = vec![
        OsString::from("-p"),
        OsString::from(prompt),
        OsString::from("--output-format"),
        OsString::from("stream-json"),
        OsString::from("--verbose"),
    ];

    if let Some(session_id) = normalize_optional(options.resume.as_deref()) {
        args.push(OsString::from("--resume"));
        args.push(OsString::from(session_id));
    }

    if let Some(model) = normalize_optional(options.model.as_deref()) {
        args.push(OsString::from("--model"));
        args.push(OsString::from(model));
    }

    for extra in &backend.extra_args {
        args.push(OsString::from(extra));
    }

    args
}

fn normalize_optional(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Collects stderr in the background; resolves to the trailing lines at EOF.
fn spawn_stderr_reader(stderr: ChildStderr) -> JoinHandle<String> {
    tokio::spawn(async move {
        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            tracing::debug!(target: "amux::backend", "stderr: {trimmed}");
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(trimmed.to_string());
        }
        tail.into_iter().collect::<Vec<_>>().join("\n")
    })
}

#[allow(clippy::too_many_lines)]
async fn run_session_io(
    mut child: Child,
    stdout: ChildStdout,
    stderr_task: JoinHandle<String>,
    tx: mpsc::Sender<ProcessEvent>,
    cancel: CancellationToken,
    resume: Option<String>,
    timeout: Option<Duration>,
) {
    let started = ProcessStatus::Started {
        session_id: resume,
    };
    if tx.send(ProcessEvent::Status(started)).await.is_err() {
        let _ = child.kill().await;
        return;
    }

    let mut lines = BufReader::new(stdout).lines();
    let mut produced_output = false;
    // Absolute deadline, so restarts of the select loop do not reset it.
    let deadline = timeout.map(|t| tokio::time::Instant::now() + t);

    loop {
        let line = tokio::select! {
            () = cancel.cancelled() => {
                let _ = child.kill().await;
                return;
            }
            () = expire(deadline) => {
                let _ = child.kill().await;
                let secs = timeout.map_or(0, |t| t.as_secs());
                let message = format!("Backend turn timed out after {secs} seconds");
                tracing::warn!(target: "amux::backend", "{message}");
                let _ = tx
                    .send(ProcessEvent::Status(ProcessStatus::Failed { message }))
                    .await;
                return;
            }
            line = lines.next_line() => line,
        };

        match line {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match SessionEvent::from_json_line(&line) {
                    Ok(event) => {
                        if !produced_output {
                            produced_output = true;
                            if tx
                                .send(ProcessEvent::Status(ProcessStatus::Output))
                                .await
                                .is_err()
                            {
                                let _ = child.kill().await;
                                return;
                            }
                        }
                        if tx.send(ProcessEvent::Message(event)).await.is_err() {
                            let _ = child.kill().await;
                            return;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(
                            target: "amux::backend",
                            "Skipping unparseable backend line: {err:#}"
                        );
                    }
                }
            }
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(target: "amux::backend", "Backend stdout read failed: {err}");
                break;
            }
        }
    }

    let status = match child.wait().await {
        Ok(status) => status,
        Err(err) => {
            let _ = tx
                .send(ProcessEvent::Status(ProcessStatus::Failed {
                    message: format!("Failed to wait for backend: {err}"),
                }))
                .await;
            return;
        }
    };

    if status.success() {
        let _ = tx.send(ProcessEvent::Status(ProcessStatus::Idle)).await;
    } else {
        let code = status.code().unwrap_or(-1);
        let stderr_tail = stderr_task.await.unwrap_or_default();
        let message = if stderr_tail.is_empty() {
            format!("Backend exited with code {code}")
        } else {
            format!("Backend exited with code {code}: {stderr_tail}")
        };
        let _ = tx
            .send(ProcessEvent::Status(ProcessStatus::Failed { message }))
            .await;
    }
}

/// Resolves at `deadline`, or never when no timeout is set.
async fn expire(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
