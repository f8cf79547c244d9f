//! Time-bounded subprocess execution.
//!
//! The `Executor` trait is the capability boundary for running untrusted
//! code. `SubprocessExecutor` is the default: it runs scripts with a
//! configurable interpreter and command lines through a shell, with the
//! sandbox root as working directory.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

/// How long to wait for output readers once the process is gone
const READ_GRACE: Duration = Duration::from_millis(500);

/// What to run
#[derive(Debug, Clone)]
pub enum JobKind {
    /// A source file to hand to the interpreter, relative to the workdir
    Script { path: PathBuf },

    /// A command line to hand to the shell
    Command { line: String },
}

/// A single execution request
#[derive(Debug, Clone)]
pub struct Job {
    pub workdir: PathBuf,
    pub kind: JobKind,
    pub timeout: Duration,
}

/// Terminal status of an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Error,
    Timeout,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Timeout => "timeout",
        }
    }
}

/// Captured outcome of one execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,

    /// Id of the persisted source, for code runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<Uuid>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
}

impl ExecutionResult {
    /// An error result that never reached the process
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Error,
            stdout: String::new(),
            stderr: message.into(),
            exit_code: None,
            duration_ms: 0,
            file_id: None,
            file_path: None,
        }
    }

    /// Attach the persisted source file
    pub fn with_file(mut self, id: Uuid, path: PathBuf) -> Self {
        self.file_id = Some(id);
        self.file_path = Some(path);
        self
    }
}

/// Runs jobs and reports their outcome. Implementations never fail; every
/// problem is folded into the returned `ExecutionResult`.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Human-readable executor name
    fn name(&self) -> &str;

    async fn execute(&self, job: &Job) -> ExecutionResult;
}

/// Executor that spawns a fresh subprocess per job
#[derive(Debug, Clone)]
pub struct SubprocessExecutor {
    /// Interpreter for script jobs (default: "python3")
    interpreter: String,

    /// Shell for command jobs (default: "sh")
    shell: String,
}

impl Default for SubprocessExecutor {
    fn default() -> Self {
        Self::new("python3", "sh")
    }
}

impl SubprocessExecutor {
    pub fn new(interpreter: impl Into<String>, shell: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            shell: shell.into(),
        }
    }

    fn command_for(&self, job: &Job) -> (Command, String) {
        match &job.kind {
            JobKind::Script { path } => {
                let mut cmd = Command::new(&self.interpreter);
                cmd.arg(path);
                (cmd, self.interpreter.clone())
            }
            JobKind::Command { line } => {
                let mut cmd = Command::new(&self.shell);
                cmd.arg("-c").arg(line);
                (cmd, self.shell.clone())
            }
        }
    }
}

/// Run the child in its own process group so a timeout can take down
/// everything it started
#[cfg(unix)]
fn isolate(cmd: &mut Command) {
    // SAFETY: runs in the forked child before exec and only calls setpgid
    unsafe {
        cmd.pre_exec(|| {
            if libc::setpgid(0, 0) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(not(unix))]
fn isolate(_cmd: &mut Command) {}

#[cfg(unix)]
fn kill_group(child: &Child) {
    if let Some(pid) = child.id() {
        // SAFETY: plain signal delivery to the group led by our own child
        unsafe {
            libc::kill(-(pid as libc::pid_t), libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_child: &Child) {}

async fn kill_tree(child: &mut Child) {
    kill_group(child);
    let _ = child.kill().await;
}

async fn drain<R>(reader: Option<R>, sink: Arc<Mutex<Vec<u8>>>)
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return;
    };
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let mut buf = sink.lock().unwrap_or_else(|p| p.into_inner());
                buf.extend_from_slice(&chunk[..n]);
            }
        }
    }
}

fn take_text(sink: &Arc<Mutex<Vec<u8>>>) -> String {
    let buf = sink.lock().unwrap_or_else(|p| p.into_inner());
    String::from_utf8_lossy(&buf).into_owned()
}

#[async_trait]
impl Executor for SubprocessExecutor {
    fn name(&self) -> &str {
        "subprocess"
    }

    async fn execute(&self, job: &Job) -> ExecutionResult {
        let (mut cmd, program) = self.command_for(job);
        cmd.current_dir(&job.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        isolate(&mut cmd);

        let started = Instant::now();
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(program = %program, error = %e, "Failed to spawn process");
                return ExecutionResult::failed(format!("Failed to start '{}': {}", program, e));
            }
        };

        let stdout = Arc::new(Mutex::new(Vec::new()));
        let stderr = Arc::new(Mutex::new(Vec::new()));
        let stdout_task = tokio::spawn(drain(child.stdout.take(), stdout.clone()));
        let stderr_task = tokio::spawn(drain(child.stderr.take(), stderr.clone()));

        let waited = timeout(job.timeout, child.wait()).await;

        let (status, exit_code) = match waited {
            Ok(Ok(exit)) => {
                let code = exit.code();
                if exit.success() {
                    (ExecutionStatus::Success, code)
                } else {
                    (ExecutionStatus::Error, code)
                }
            }
            Ok(Err(e)) => {
                warn!(program = %program, error = %e, "Failed to wait for process");
                kill_tree(&mut child).await;
                let mut result = ExecutionResult::failed(format!("Failed to wait for '{}': {}", program, e));
                result.duration_ms = started.elapsed().as_millis() as u64;
                return result;
            }
            Err(_) => {
                warn!(program = %program, timeout_secs = job.timeout.as_secs_f64(), "Process timed out");
                kill_tree(&mut child).await;
                (ExecutionStatus::Timeout, None)
            }
        };

        // Readers finish once every holder of the pipes has exited
        let _ = timeout(READ_GRACE, stdout_task).await;
        let _ = timeout(READ_GRACE, stderr_task).await;

        let stdout = take_text(&stdout);
        let mut stderr = take_text(&stderr);
        let duration_ms = started.elapsed().as_millis() as u64;

        match status {
            ExecutionStatus::Error if stderr.trim().is_empty() => {
                stderr = match exit_code {
                    Some(code) => format!("Process exited with status {}", code),
                    None => "Process terminated by signal".to_string(),
                };
            }
            ExecutionStatus::Timeout if stderr.trim().is_empty() => {
                stderr = format!("Execution timed out after {} seconds", job.timeout.as_secs_f64());
            }
            _ => {}
        }

        debug!(
            program = %program,
            status = status.as_str(),
            duration_ms,
            stdout_len = stdout.len(),
            stderr_len = stderr.len(),
            "Process finished"
        );

        ExecutionResult {
            status,
            stdout,
            stderr,
            exit_code,
            duration_ms,
            file_id: None,
            file_path: None,
        }
    }
}
