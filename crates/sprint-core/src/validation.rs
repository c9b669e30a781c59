use crate::config::ValidationCommand;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub name: String,
    pub command: String,
    pub passed: bool,
    pub output: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub results: Vec<CommandResult>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    pub fn first_failure(&self) -> Option<&CommandResult> {
        self.results.iter().find(|r| !r.passed)
    }
}

/// Local build/lint/type-check step run before a task goes to Review.
pub trait Validator {
    fn validate(&self, issue: u64) -> ValidationReport;
}

// ---------------------------------------------------------------------------
// ShellValidator
// ---------------------------------------------------------------------------

/// Runs the configured commands in order with `sh -c`, stopping at the first
/// failure.
pub struct ShellValidator {
    cwd: PathBuf,
    commands: Vec<ValidationCommand>,
}

impl ShellValidator {
    pub fn new(cwd: impl Into<PathBuf>, commands: Vec<ValidationCommand>) -> Self {
        Self {
            cwd: cwd.into(),
            commands,
        }
    }
}

impl Validator for ShellValidator {
    fn validate(&self, issue: u64) -> ValidationReport {
        let mut results = Vec::new();
        for cmd in &self.commands {
            if cmd.command.trim().is_empty() {
                results.push(CommandResult {
                    name: cmd.name.clone(),
                    command: String::new(),
                    passed: false,
                    output: "validation command is empty".to_string(),
                    duration_ms: 0,
                });
                break;
            }
            let timeout = (cmd.timeout_seconds > 0)
                .then(|| Duration::from_secs(u64::from(cmd.timeout_seconds)));
            let start = Instant::now();
            let (passed, output) = run_shell(
                &cmd.command,
                &self.cwd,
                &[("SPRINT_ISSUE", issue.to_string())],
                timeout,
            );
            tracing::debug!(issue, name = %cmd.name, passed, "validation command finished");
            results.push(CommandResult {
                name: cmd.name.clone(),
                command: cmd.command.clone(),
                passed,
                output,
                duration_ms: start.elapsed().as_millis() as u64,
            });
            if !passed {
                break;
            }
        }
        ValidationReport { results }
    }
}

// ---------------------------------------------------------------------------
// Shell execution
// ---------------------------------------------------------------------------

/// Execute a shell command with an optional timeout. Returns (success, combined output).
///
/// Uses dedicated threads for stdout/stderr reading (avoiding pipe-buffer deadlocks)
/// and a waiter thread with `mpsc::recv_timeout` for timeout support.
///
/// `None` timeout means wait indefinitely.
pub(crate) fn run_shell(
    command: &str,
    cwd: &Path,
    env: &[(&str, String)],
    timeout: Option<Duration>,
) -> (bool, String) {
    let mut child = match Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .envs(env.iter().map(|(k, v)| (*k, v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(c) => c,
        Err(e) => return (false, format!("failed to spawn: {e}")),
    };

    let child_pid = child.id();
    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || -> String {
        let mut buf = String::new();
        if let Some(mut r) = stdout_handle {
            use std::io::Read;
            let _ = r.read_to_string(&mut buf);
        }
        buf
    });
    let stderr_thread = std::thread::spawn(move || -> String {
        let mut buf = String::new();
        if let Some(mut r) = stderr_handle {
            use std::io::Read;
            let _ = r.read_to_string(&mut buf);
        }
        buf
    });

    let wait_result = match timeout {
        None => child.wait(),
        Some(timeout_dur) => {
            let (tx, rx) = std::sync::mpsc::channel();
            std::thread::spawn(move || {
                let _ = tx.send(child.wait());
            });

            match rx.recv_timeout(timeout_dur) {
                Ok(result) => result,
                Err(_) => {
                    // Reader threads see EOF once the killed process exits.
                    kill_process(child_pid);
                    let secs = timeout_dur.as_secs();
                    return (false, format!("timed out after {secs}s"));
                }
            }
        }
    };

    let stdout_buf = stdout_thread.join().unwrap_or_default();
    let stderr_buf = stderr_thread.join().unwrap_or_default();

    let status = match wait_result {
        Ok(s) => s,
        Err(e) => return (false, format!("wait failed: {e}")),
    };

    format_output(status.success(), &stdout_buf, &stderr_buf)
}

/// Combine stdout/stderr and cap to 10KB (keeping the tail).
fn format_output(success: bool, stdout: &str, stderr: &str) -> (bool, String) {
    let output = if stderr.is_empty() {
        stdout.to_string()
    } else if stdout.is_empty() {
        stderr.to_string()
    } else {
        format!("{stdout}\n{stderr}")
    };
    const MAX_OUTPUT: usize = 10 * 1024;
    let trimmed = output.trim();
    let capped = if trimmed.len() > MAX_OUTPUT {
        let mut start = trimmed.len() - MAX_OUTPUT;
        while !trimmed.is_char_boundary(start) {
            start += 1;
        }
        &trimmed[start..]
    } else {
        trimmed
    };
    (success, capped.to_string())
}

/// Terminate a process by PID using SIGKILL. Best-effort; errors are ignored.
fn kill_process(pid: u32) {
    let _ = Command::new("kill")
        .arg("-9")
        .arg(pid.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
