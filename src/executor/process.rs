//! Child process execution
//!
//! Spawns a single shell command, captures its output and enforces the
//! per-process timeout.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, warn};

/// How long output readers may lag behind a killed process before they are dropped
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Why a process did not finish cleanly
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    #[error("Timed out after {}s and was killed", .0.as_secs())]
    TimedOut(Duration),

    #[error("Exited with code {0}")]
    ExitCode(i32),

    #[error("Terminated by signal {0}")]
    Signal(i32),

    #[error("Failed to spawn process: {0}")]
    Spawn(String),

    #[error("Failed to wait for process: {0}")]
    Wait(String),
}

impl ExecError {
    /// Exit code reported by the process, if it exited on its own
    pub fn code(&self) -> Option<i32> {
        match self {
            ExecError::ExitCode(code) => Some(*code),
            _ => None,
        }
    }

    /// Whether the process was force-killed for exceeding its timeout
    pub fn killed(&self) -> bool {
        matches!(self, ExecError::TimedOut(_))
    }
}

/// Options applied to every spawned process
#[derive(Clone, Debug, Default)]
pub struct ProcessOptions {
    /// Working directory
    pub cwd: Option<PathBuf>,

    /// Wall-clock limit per process
    pub timeout: Option<Duration>,

    /// Extra environment variables, added to the inherited environment
    pub env: HashMap<String, String>,
}

impl ProcessOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Result of one finished process
#[derive(Clone, Debug)]
pub struct ProcessOutcome {
    pub command: String,
    pub error: Option<ExecError>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl ProcessOutcome {
    fn spawn_failed(command: String, err: std::io::Error) -> Self {
        Self {
            command,
            error: Some(ExecError::Spawn(err.to_string())),
            stdout: String::new(),
            stderr: String::new(),
            duration: Duration::ZERO,
        }
    }
}

/// A spawned process that has not been waited on yet
pub struct RunningProcess {
    command: String,
    child: Child,
    started: Instant,
}

/// Spawn `command` through the platform shell.
///
/// Must be called from within a tokio runtime.
pub fn spawn(command: &str, options: &ProcessOptions) -> Result<RunningProcess, ProcessOutcome> {
    let mut cmd = shell_command(command);
    cmd.envs(&options.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(ref cwd) = options.cwd {
        cmd.current_dir(cwd);
    }

    match cmd.spawn() {
        Ok(child) => Ok(RunningProcess {
            command: command.to_string(),
            child,
            started: Instant::now(),
        }),
        Err(e) => {
            warn!("Failed to spawn '{}': {}", command, e);
            Err(ProcessOutcome::spawn_failed(command.to_string(), e))
        }
    }
}

impl RunningProcess {
    /// Wait for the process to exit and its output to close, killing it
    /// once `timeout` elapses.
    ///
    /// The limit covers output collection too: a process that exits but
    /// leaves a background child holding its pipes is reported as timed out
    /// when the pipes are still open at the deadline.
    pub async fn wait(mut self, timeout: Option<Duration>) -> ProcessOutcome {
        let deadline = timeout.map(|limit| time::Instant::from_std(self.started) + limit);
        let stdout = spawn_reader(self.child.stdout.take());
        let stderr = spawn_reader(self.child.stderr.take());

        let waited = match deadline.zip(timeout) {
            Some((deadline, limit)) => match time::timeout_at(deadline, self.child.wait()).await {
                Ok(status) => Waited::Exited(status),
                Err(_) => {
                    debug!("Killing '{}' after {}s", self.command, limit.as_secs());
                    if let Err(e) = self.child.kill().await {
                        warn!("Failed to kill '{}': {}", self.command, e);
                    }
                    Waited::Killed(limit)
                }
            },
            None => Waited::Exited(self.child.wait().await),
        };

        let output_deadline = match waited {
            Waited::Killed(_) => Some(time::Instant::now() + KILL_GRACE),
            Waited::Exited(_) => deadline,
        };
        let stdout = collect(stdout, output_deadline).await;
        let stderr = collect(stderr, output_deadline).await;
        let output_closed = stdout.is_some() && stderr.is_some();

        let error = match (waited, timeout) {
            (Waited::Killed(limit), _) => Some(ExecError::TimedOut(limit)),
            (Waited::Exited(_), Some(limit)) if !output_closed => {
                debug!(
                    "'{}' exited but its output was still open after {}s",
                    self.command,
                    limit.as_secs()
                );
                Some(ExecError::TimedOut(limit))
            }
            (Waited::Exited(Ok(status)), _) => status_error(status),
            (Waited::Exited(Err(e)), _) => Some(ExecError::Wait(e.to_string())),
        };

        ProcessOutcome {
            command: self.command,
            error,
            stdout: stdout.unwrap_or_default(),
            stderr: stderr.unwrap_or_default(),
            duration: self.started.elapsed(),
        }
    }
}

enum Waited {
    Exited(std::io::Result<ExitStatus>),
    Killed(Duration),
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

fn status_error(status: ExitStatus) -> Option<ExecError> {
    match status.code() {
        Some(0) => None,
        Some(code) => Some(ExecError::ExitCode(code)),
        None => Some(signal_error(status)),
    }
}

#[cfg(unix)]
fn signal_error(status: ExitStatus) -> ExecError {
    use std::os::unix::process::ExitStatusExt;

    match status.signal() {
        Some(signal) => ExecError::Signal(signal),
        None => ExecError::Wait(format!("no exit code in status {status}")),
    }
}

#[cfg(not(unix))]
fn signal_error(status: ExitStatus) -> ExecError {
    ExecError::Wait(format!("no exit code in status {status}"))
}

fn spawn_reader<R>(pipe: Option<R>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_end(&mut buf).await {
                debug!("Output read interrupted: {}", e);
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Join an output reader, abandoning it at `deadline`. Background children
/// may hold the pipe open long after the process itself is gone.
async fn collect(
    mut reader: JoinHandle<String>,
    deadline: Option<time::Instant>,
) -> Option<String> {
    let joined = match deadline {
        Some(deadline) => match time::timeout_at(deadline, &mut reader).await {
            Ok(joined) => joined,
            Err(_) => {
                reader.abort();
                return None;
            }
        },
        None => reader.await,
    };

    Some(joined.unwrap_or_default())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    async fn run(command: &str, options: ProcessOptions) -> ProcessOutcome {
        let timeout = options.timeout;
        match spawn(command, &options) {
            Ok(process) => process.wait(timeout).await,
            Err(outcome) => outcome,
        }
    }

    #[tokio::test]
    async fn test_clean_exit_captures_output() {
        let outcome = run("echo hello; echo oops >&2", ProcessOptions::new()).await;
        assert_eq!(outcome.error, None);
        assert_eq!(outcome.stdout, "hello\n");
        assert_eq!(outcome.stderr, "oops\n");
        assert_eq!(outcome.command, "echo hello; echo oops >&2");
    }

    #[tokio::test]
    async fn test_exit_code_reported() {
        let outcome = run("exit 1", ProcessOptions::new()).await;
        assert_eq!(outcome.error, Some(ExecError::ExitCode(1)));
        assert_eq!(outcome.error.as_ref().and_then(|e| e.code()), Some(1));

        let outcome = run("exit 13", ProcessOptions::new()).await;
        assert_eq!(outcome.error.and_then(|e| e.code()), Some(13));
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let options = ProcessOptions::new().timeout(Duration::from_millis(200));
        let outcome = run("exec sleep 5", options).await;

        let error = outcome.error.expect("timed out process must report an error");
        assert!(error.killed());
        assert_eq!(error.code(), None);
        assert!(outcome.duration < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_timeout_covers_background_children() {
        let options = ProcessOptions::new().timeout(Duration::from_secs(1));
        let outcome = run("sleep 6 & echo started", options).await;

        assert_eq!(outcome.error, Some(ExecError::TimedOut(Duration::from_secs(1))));
        assert!(outcome.duration < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_signal_reported() {
        let outcome = run("kill -9 $$", ProcessOptions::new()).await;
        assert_eq!(outcome.error, Some(ExecError::Signal(9)));
    }

    #[tokio::test]
    async fn test_env_and_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let options = ProcessOptions::new()
            .cwd(dir.path())
            .env("PB_GREETING", "hi");
        let outcome = run("echo $PB_GREETING; pwd", options).await;

        assert_eq!(outcome.error, None);
        let mut lines = outcome.stdout.lines();
        assert_eq!(lines.next(), Some("hi"));
        let pwd = lines.next().unwrap();
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(std::path::Path::new(pwd).canonicalize().unwrap(), expected);
    }

    #[tokio::test]
    async fn test_spawn_failure_in_missing_cwd() {
        let options = ProcessOptions::new().cwd("/definitely/not/a/real/dir");
        let outcome = run("true", options).await;
        assert!(matches!(outcome.error, Some(ExecError::Spawn(_))));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(ExecError::ExitCode(2).to_string(), "Exited with code 2");
        assert_eq!(
            ExecError::TimedOut(Duration::from_secs(600)).to_string(),
            "Timed out after 600s and was killed"
        );
    }
}
