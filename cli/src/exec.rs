//! Process execution for probes and installers.
//!
//! Everything that spawns a process goes through the [`Executor`] trait so the
//! engine can be driven by a scripted double in tests.  [`SystemExecutor`]
//! polls running children and terminates them when the run is cancelled.
use anyhow::{Context as _, Result, bail};
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Output, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// How often a running child is polled for exit or cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Default time a child gets to exit after `SIGTERM` before it is killed.
const DEFAULT_GRACE: Duration = Duration::from_secs(5);

/// Result of a command execution.
#[derive(Debug, Clone, Default)]
pub struct ExecResult {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Whether the process exited with status 0.
    pub success: bool,
    /// Exit code, `None` when terminated by a signal.
    pub code: Option<i32>,
}

impl From<Output> for ExecResult {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

/// Error returned when a command is interrupted by run cancellation.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("cancelled")]
pub struct Cancelled;

/// Whether `err` (or anything in its chain) is a cancellation.
#[must_use]
pub fn is_cancelled(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<Cancelled>())
}

/// Run-level cancellation token shared by the signal handler, the scheduler
/// and the executor.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    /// Create a token in the non-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Abstraction over process execution.
pub trait Executor: Send + Sync + fmt::Debug {
    /// Run a command, allowing failure (returns the result without bailing).
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or was cancelled.
    fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult>;

    /// Run a command in `dir`, allowing failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or was cancelled.
    fn run_in_unchecked(&self, dir: &Path, program: &str, args: &[&str]) -> Result<ExecResult>;

    /// Whether `program` is available on `PATH`.
    fn which(&self, program: &str) -> bool;

    /// Run a command and return its output. Fails if the command exits non-zero.
    ///
    /// # Errors
    ///
    /// Returns an error on spawn failure, cancellation or non-zero exit.
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        checked(self.run_unchecked(program, args)?, program)
    }

    /// Run a command in `dir`. Fails if the command exits non-zero.
    ///
    /// # Errors
    ///
    /// Returns an error on spawn failure, cancellation or non-zero exit.
    fn run_in(&self, dir: &Path, program: &str, args: &[&str]) -> Result<ExecResult> {
        checked(
            self.run_in_unchecked(dir, program, args)?,
            &format!("{program} in {}", dir.display()),
        )
    }
}

fn checked(result: ExecResult, label: &str) -> Result<ExecResult> {
    if !result.success {
        bail!(
            "{label} failed (exit {}): {}",
            result.code.unwrap_or(-1),
            result.stderr.trim()
        );
    }
    Ok(result)
}

/// Executor that spawns real processes.
#[derive(Debug, Clone)]
pub struct SystemExecutor {
    cancel: Cancellation,
    grace: Duration,
}

impl SystemExecutor {
    /// Create an executor observing `cancel`.
    #[must_use]
    pub const fn new(cancel: Cancellation) -> Self {
        Self {
            cancel,
            grace: DEFAULT_GRACE,
        }
    }

    /// Override the termination grace period.
    #[must_use]
    pub const fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    fn execute(&self, mut cmd: Command, label: &str) -> Result<ExecResult> {
        if self.cancel.is_cancelled() {
            return Err(Cancelled.into());
        }
        let mut child = cmd
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to execute: {label}"))?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = loop {
            if let Some(status) = child
                .try_wait()
                .with_context(|| format!("failed to wait for: {label}"))?
            {
                break status;
            }
            if self.cancel.is_cancelled() {
                self.terminate(&mut child);
                let _ = stdout.join();
                let _ = stderr.join();
                return Err(anyhow::Error::new(Cancelled).context(format!("{label} interrupted")));
            }
            thread::sleep(POLL_INTERVAL);
        };

        Ok(ExecResult {
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
            success: status.success(),
            code: status.code(),
        })
    }

    /// Ask the child to exit, then kill it once the grace period elapses.
    fn terminate(&self, child: &mut Child) {
        #[cfg(unix)]
        {
            let _ = Command::new("kill")
                .args(["-TERM", &child.id().to_string()])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
            let deadline = Instant::now() + self.grace;
            while Instant::now() < deadline {
                if matches!(child.try_wait(), Ok(Some(_))) {
                    return;
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
        #[cfg(not(unix))]
        let _ = (Instant::now(), self.grace);

        let _ = child.kill();
        let _ = child.wait();
    }
}

impl Default for SystemExecutor {
    fn default() -> Self {
        Self::new(Cancellation::new())
    }
}

/// Read a child pipe to completion on a helper thread.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).to_string()
    })
}

impl Executor for SystemExecutor {
    fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        self.execute(cmd, program)
    }

    fn run_in_unchecked(&self, dir: &Path, program: &str, args: &[&str]) -> Result<ExecResult> {
        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(dir);
        self.execute(cmd, &format!("{program} in {}", dir.display()))
    }

    fn which(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}
