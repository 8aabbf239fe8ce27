use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::{Result, RunnerError};

// ─── StreamEvent ──────────────────────────────────────────────────────────

/// A single line of subprocess output, forwarded to the sink as it arrives.
///
/// `Stderr` lines are informational only — they never affect how the run
/// resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Stdout(String),
    Stderr(String),
}

// ─── ClaudeRunner ─────────────────────────────────────────────────────────

/// Abort route for the most recent run. Each run owns its own child
/// process; the slot only decides which run an `abort()` reaches.
struct ActiveRun {
    generation: u64,
    abort: oneshot::Sender<()>,
}

/// Runs `claude` CLI invocations, streaming their output.
///
/// The abort route is an owned field (not module state), so two runners
/// never interfere with each other. A new [`run`](Self::run) claims the
/// route without waiting for a prior run to finish — the prior run keeps
/// its process and resolves from that process's own exit status; only
/// [`abort`](Self::abort) retargets. Callers are expected to serialize
/// their turns.
pub struct ClaudeRunner {
    executable: String,
    active: Mutex<Option<ActiveRun>>,
    sink: Mutex<Option<mpsc::UnboundedSender<StreamEvent>>>,
    timeout: Option<Duration>,
    generation: AtomicU64,
}

impl Default for ClaudeRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaudeRunner {
    /// A runner for the `claude` executable resolved from `PATH`.
    pub fn new() -> Self {
        Self::with_executable("claude")
    }

    /// A runner for an arbitrary executable (used by tests to inject mock
    /// CLI scripts).
    pub fn with_executable(executable: impl Into<String>) -> Self {
        ClaudeRunner {
            executable: executable.into(),
            active: Mutex::new(None),
            sink: Mutex::new(None),
            timeout: None,
            generation: AtomicU64::new(0),
        }
    }

    /// Deadline for a whole run. A run that exceeds it is aborted and
    /// resolves with [`RunnerError::Timeout`]. Unset by default: a hung
    /// process then hangs the run.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    /// Register the sink that receives [`StreamEvent`]s during a run.
    ///
    /// Replaces any previously registered sink. Send failures (receiver
    /// dropped) are ignored — streaming is display-only.
    pub fn register_sink(&self, tx: mpsc::UnboundedSender<StreamEvent>) {
        *lock(&self.sink) = Some(tx);
    }

    /// Probe whether the executable is resolvable on `PATH`.
    ///
    /// Degrades every failure mode to `false`; the caller only needs a
    /// yes/no answer for a warning banner.
    pub fn check_availability(&self) -> bool {
        which::which(&self.executable).is_ok()
    }

    /// Run `<exe> -p <input> [--system <prompt>] --output-format stream-json`
    /// to completion.
    ///
    /// Every stdout line is forwarded to the registered sink and
    /// concatenated into the accumulator; stderr lines are forwarded
    /// separately and collected for error reporting. Resolves with the full
    /// accumulated stdout on exit 0, or with [`RunnerError::Exit`] /
    /// [`RunnerError::Signal`] otherwise. If [`abort`](Self::abort) fires
    /// while this is the most recent run, it resolves with
    /// [`RunnerError::Aborted`] once the killed process closes its pipes.
    pub async fn run(&self, input: &str, system_prompt: Option<&str>) -> Result<String> {
        match self.timeout {
            None => self.run_to_completion(input, system_prompt).await,
            Some(deadline) => {
                match tokio::time::timeout(deadline, self.run_to_completion(input, system_prompt))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(?deadline, "claude process timed out, killing it");
                        self.abort();
                        Err(RunnerError::Timeout(deadline))
                    }
                }
            }
        }
    }

    async fn run_to_completion(&self, input: &str, system_prompt: Option<&str>) -> Result<String> {
        let mut cmd = Command::new(&self.executable);
        cmd.arg("-p").arg(input);
        if let Some(sp) = system_prompt {
            cmd.arg("--system").arg(sp);
        }
        cmd.arg("--output-format")
            .arg("stream-json")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| RunnerError::Spawn {
            executable: self.executable.clone(),
            source,
        })?;
        debug!(executable = %self.executable, "spawned claude process");

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("stderr not captured"))?;

        let sink = lock(&self.sink).clone();

        // Claim the abort route. A newer run may reclaim it at any moment;
        // this run then keeps its own child and resolves from it.
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let (abort_tx, mut abort_rx) = oneshot::channel();
        *lock(&self.active) = Some(ActiveRun {
            generation,
            abort: abort_tx,
        });

        // Drain stderr in the background — forwarded to the sink and
        // collected for inclusion in exit errors.
        let stderr_buf = Arc::new(Mutex::new(String::new()));
        {
            let buf = Arc::clone(&stderr_buf);
            let sink = sink.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    {
                        let mut b = lock(&buf);
                        if !b.is_empty() {
                            b.push('\n');
                        }
                        b.push_str(&line);
                    }
                    if let Some(tx) = &sink {
                        let _ = tx.send(StreamEvent::Stderr(line));
                    }
                }
            });
        }

        let mut lines = BufReader::new(stdout).lines();
        let mut acc = String::new();
        let mut armed = true;
        let mut aborted = false;
        let mut read_error = None;
        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if !acc.is_empty() {
                            acc.push('\n');
                        }
                        acc.push_str(&line);
                        if let Some(tx) = &sink {
                            let _ = tx.send(StreamEvent::Stdout(line));
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        read_error = Some(e);
                        break;
                    }
                },
                res = &mut abort_rx, if armed => {
                    armed = false;
                    if res.is_ok() {
                        aborted = true;
                        if let Err(e) = child.start_kill() {
                            warn!("failed to kill claude process: {e}");
                        }
                    }
                    // Sender dropped: a newer run claimed the route; this
                    // one just runs to completion.
                }
            }
        }

        // Release the abort route if it is still this run's.
        {
            let mut slot = lock(&self.active);
            if slot.as_ref().is_some_and(|run| run.generation == generation) {
                *slot = None;
            }
        }

        if let Some(e) = read_error {
            // kill_on_drop reaps the child
            return Err(e.into());
        }
        if aborted {
            let _ = child.wait().await;
            return Err(RunnerError::Aborted);
        }

        let status = child.wait().await?;
        let stderr_text = lock(&stderr_buf).clone();

        if status.success() {
            Ok(acc)
        } else if let Some(code) = status.code() {
            Err(RunnerError::Exit {
                code,
                stderr: stderr_text,
            })
        } else {
            Err(RunnerError::Signal {
                stderr: stderr_text,
            })
        }
    }

    /// Signal the most recent run to kill its process, and clear the abort
    /// route immediately.
    ///
    /// Does not wait for the OS to confirm termination. Idempotent: with no
    /// active run this is a no-op, and it never errors.
    pub fn abort(&self) {
        if let Some(run) = lock(&self.active).take() {
            let _ = run.abort.send(());
        }
    }
}

/// Lock a mutex, recovering the guard if a panicking thread poisoned it.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

// ─── Tests ────────────────────────────────────────────────────────────────
