//! Child process spawning and output capture for node execution.
//!
//! A node's script is executed as one child process per the scheduler's
//! protocol (see the executor crate): stdout and stderr are drained to log
//! files on two concurrent read loops, with an optional live tee to the
//! parent's own stdout/stderr for `--verbose`/`--github-actions` modes. An
//! idle timeout — no output on either stream for the configured duration —
//! kills the whole process group, matching a wall-clock timeout from the
//! caller's perspective without needing a separate watchdog.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::warn;

const READ_BUF_SIZE: usize = 4096;
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Everything needed to spawn one node's interpreter invocation.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: BTreeMap<String, String>,
    pub stdin: Option<Vec<u8>>,
}

impl ProcessSpec {
    fn into_command(self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.current_dir(&self.cwd);
        cmd.env_clear();
        cmd.envs(&self.env);
        cmd
    }
}

/// Whether a node's captured streams are also echoed live to the parent's
/// own stdout/stderr, and with what framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsoleEcho {
    /// Write only to the log files; nothing reaches the console.
    #[default]
    Silent,
    /// Tee raw bytes straight through (`--verbose`).
    Plain,
    /// Wrap the tee in `::group::<label>` / `::endgroup::` markers
    /// (`--github-actions`).
    GithubActionsGroup,
}

/// Per-node capture configuration.
pub struct CaptureOptions {
    pub stdout_log: PathBuf,
    pub stderr_log: PathBuf,
    pub idle_timeout: Duration,
    pub echo: ConsoleEcho,
    /// Node id used to label a `::group::` marker; unused otherwise.
    pub node_label: String,
}

/// Outcome of running a node's process to completion (or to a kill).
#[derive(Debug, Clone, Copy)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub timed_out: bool,
}

impl ExecutionResult {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == 0
    }
}

/// Spawn a node's interpreter process in its own process group, streams
/// piped for capture.
pub async fn spawn(spec: ProcessSpec) -> Result<tokio::process::Child> {
    let mut cmd = spec.into_command();
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    cmd.stdin(std::process::Stdio::null());
    cmd.kill_on_drop(true);

    // SAFETY: setsid() is async-signal-safe and runs before exec; isolating
    // the child in its own process group lets a timeout kill the whole tree
    // in one signal instead of chasing grandchildren.
    #[cfg(unix)]
    unsafe {
        cmd.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }

    cmd.spawn().context("failed to spawn node process")
}

/// Drain a spawned child's stdout/stderr to the configured log files, echo
/// live to the console per `echo`, enforce the idle timeout, and wait for
/// exit.
pub async fn wait_and_capture(
    mut child: tokio::process::Child,
    options: &CaptureOptions,
) -> Result<ExecutionResult> {
    let stdout = child.stdout.take().context("child stdout was not piped")?;
    let stderr = child.stderr.take().context("child stderr was not piped")?;

    let mut stdout_file = tokio::fs::File::create(&options.stdout_log)
        .await
        .with_context(|| format!("failed to create {}", options.stdout_log.display()))?;
    let mut stderr_file = tokio::fs::File::create(&options.stderr_log)
        .await
        .with_context(|| format!("failed to create {}", options.stderr_log.display()))?;

    if options.echo == ConsoleEcho::GithubActionsGroup {
        println!("::group::{}", options.node_label);
    }

    let mut stdout_reader = BufReader::new(stdout);
    let mut stderr_reader = BufReader::new(stderr);
    let mut stdout_buf = [0u8; READ_BUF_SIZE];
    let mut stderr_buf = [0u8; READ_BUF_SIZE];
    let mut stdout_done = false;
    let mut stderr_done = false;
    let mut last_activity = Instant::now();
    let mut timed_out = false;

    while !stdout_done || !stderr_done {
        tokio::select! {
            result = stdout_reader.read(&mut stdout_buf), if !stdout_done => {
                match result {
                    Ok(0) => stdout_done = true,
                    Ok(n) => {
                        last_activity = Instant::now();
                        stdout_file.write_all(&stdout_buf[..n]).await.ok();
                        if matches!(options.echo, ConsoleEcho::Plain | ConsoleEcho::GithubActionsGroup) {
                            use std::io::Write;
                            let _ = std::io::stdout().write_all(&stdout_buf[..n]);
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "error reading child stdout");
                        stdout_done = true;
                    }
                }
            }
            result = stderr_reader.read(&mut stderr_buf), if !stderr_done => {
                match result {
                    Ok(0) => stderr_done = true,
                    Ok(n) => {
                        last_activity = Instant::now();
                        stderr_file.write_all(&stderr_buf[..n]).await.ok();
                        if matches!(options.echo, ConsoleEcho::Plain | ConsoleEcho::GithubActionsGroup) {
                            use std::io::Write;
                            let _ = std::io::stderr().write_all(&stderr_buf[..n]);
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "error reading child stderr");
                        stderr_done = true;
                    }
                }
            }
            _ = tokio::time::sleep(IDLE_POLL_INTERVAL) => {
                if last_activity.elapsed() >= options.idle_timeout {
                    timed_out = true;
                    warn!(
                        node = %options.node_label,
                        timeout_secs = options.idle_timeout.as_secs(),
                        "killing node process group after idle timeout"
                    );
                    kill_process_group(&mut child);
                    break;
                }
            }
        }
    }

    stdout_file.flush().await.ok();
    stderr_file.flush().await.ok();

    if options.echo == ConsoleEcho::GithubActionsGroup {
        println!("::endgroup::");
    }

    let exit_code = if timed_out {
        137
    } else {
        let status = child.wait().await.context("failed to wait for node process")?;
        status.code().unwrap_or(1)
    };

    Ok(ExecutionResult { exit_code, timed_out })
}

/// Kill an entire process group with `SIGKILL` (Unix), or best-effort kill
/// the child alone elsewhere.
pub fn kill_process_group(child: &mut tokio::process::Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: kill() is async-signal-safe; a negative pid targets
            // the whole process group created by `setsid` at spawn time.
            unsafe {
                libc::kill(-(pid as i32), libc::SIGKILL);
            }
            return;
        }
    }
    let _ = child.start_kill();
}

#[cfg(test)]
#[path = "capture_tests.rs"]
mod tests;
