//! Isolated workspace for file operations and code execution.
//!
//! A `Sandbox` owns one root directory. File operations go through
//! [`SandboxFs`], code and commands go through an [`Executor`], and every
//! file the sandbox writes on its own behalf is tracked.

pub mod executor;
pub mod fs;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::core::policy::{FilePolicy, PolicyViolation};

pub use executor::{ExecutionResult, ExecutionStatus, Executor, Job, JobKind, SubprocessExecutor};
pub use fs::{SandboxFile, SandboxFs};

/// Default hard bound for a single execution
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Structured failures of sandbox operations
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Path escapes the sandbox root: {path}")]
    PathEscape { path: String },

    #[error("Path not found: {path}")]
    NotFound { path: String },

    #[error("Not a directory: {path}")]
    NotADirectory { path: String },

    #[error("Not a file: {path}")]
    NotAFile { path: String },

    #[error("Invalid pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error(transparent)]
    Policy(#[from] PolicyViolation),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SandboxError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Why a file is tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedKind {
    Script,
    File,
}

/// A file the sandbox wrote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedFile {
    pub id: Uuid,
    pub path: PathBuf,
    pub kind: TrackedKind,
    pub created_at: DateTime<Utc>,
}

/// Workspace rooted at one directory
pub struct Sandbox {
    fs: SandboxFs,
    executor: Arc<dyn Executor>,
    timeout: Duration,
    tracked: Mutex<Vec<TrackedFile>>,
}

impl Sandbox {
    /// Create a sandbox with the default executor, policy and timeout
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            fs: SandboxFs::new(root),
            executor: Arc::new(SubprocessExecutor::default()),
            timeout: DEFAULT_TIMEOUT,
            tracked: Mutex::new(Vec::new()),
        }
    }

    /// Substitute the executor
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    /// Set the per-execution timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the write policy
    pub fn with_policy(mut self, policy: FilePolicy) -> Self {
        self.fs = self.fs.with_policy(policy);
        self
    }

    pub fn fs(&self) -> &SandboxFs {
        &self.fs
    }

    pub fn root(&self) -> &Path {
        self.fs.root()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn track(&self, id: Uuid, path: PathBuf, kind: TrackedKind) {
        let mut tracked = self.tracked.lock().unwrap_or_else(|p| p.into_inner());
        tracked.retain(|t| t.path != path);
        tracked.push(TrackedFile {
            id,
            path,
            kind,
            created_at: Utc::now(),
        });
    }

    /// Files written by this sandbox, oldest first
    pub fn tracked_files(&self) -> Vec<TrackedFile> {
        self.tracked.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Persist `source` under a fresh id and run it with the interpreter
    #[instrument(skip(self, source), fields(source_len = source.len()))]
    pub async fn run_code(&self, source: &str) -> ExecutionResult {
        if let Err(e) = self.fs.ensure_root().await {
            return ExecutionResult::failed(e.to_string());
        }

        let id = Uuid::new_v4();
        let file_name = format!("{}.py", id);
        let path = self.root().join(&file_name);
        if let Err(e) = tokio::fs::write(&path, source).await {
            return ExecutionResult::failed(format!("Failed to write {}: {}", path.display(), e));
        }
        self.track(id, path.clone(), TrackedKind::Script);

        let job = Job {
            workdir: self.root().to_path_buf(),
            kind: JobKind::Script {
                path: PathBuf::from(file_name),
            },
            timeout: self.timeout,
        };
        let result = self.executor.execute(&job).await;
        info!(file_id = %id, status = result.status.as_str(), "Code execution finished");
        result.with_file(id, path)
    }

    /// Run a shell command with the root as working directory
    #[instrument(skip(self))]
    pub async fn run_command(&self, line: &str) -> ExecutionResult {
        if let Err(e) = self.fs.ensure_root().await {
            return ExecutionResult::failed(e.to_string());
        }

        let job = Job {
            workdir: self.root().to_path_buf(),
            kind: JobKind::Command { line: line.to_string() },
            timeout: self.timeout,
        };
        let result = self.executor.execute(&job).await;
        info!(status = result.status.as_str(), "Command execution finished");
        result
    }

    /// Create a file after checking the write policy
    pub async fn create_file(&self, relative: &str, content: &str) -> Result<SandboxFile, SandboxError> {
        let file = self.fs.create_file(relative, content).await?;
        self.track(Uuid::new_v4(), file.absolute_path.clone(), TrackedKind::File);
        Ok(file)
    }

    pub async fn read_file(&self, relative: &str) -> Result<String, SandboxError> {
        self.fs.read_file(relative).await
    }

    /// Delete a file and stop tracking it
    pub async fn delete_file(&self, relative: &str) -> Result<(), SandboxError> {
        let path = self.fs.resolve(relative)?;
        self.fs.delete_file(relative).await?;
        self.tracked
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .retain(|t| t.path != path);
        Ok(())
    }

    pub async fn list(&self, relative: &str) -> Result<Vec<SandboxFile>, SandboxError> {
        self.fs.list(relative).await
    }

    pub async fn list_all_files(&self) -> Result<Vec<SandboxFile>, SandboxError> {
        self.fs.list_all_files().await
    }

    pub async fn create_directory(&self, relative: &str) -> Result<SandboxFile, SandboxError> {
        self.fs.create_directory(relative).await
    }

    pub async fn copy(&self, source: &str, destination: &str) -> Result<SandboxFile, SandboxError> {
        self.fs.copy(source, destination).await
    }

    pub async fn rename(&self, source: &str, destination: &str) -> Result<SandboxFile, SandboxError> {
        self.fs.rename(source, destination).await
    }

    pub async fn find(&self, pattern: &str) -> Result<Vec<SandboxFile>, SandboxError> {
        self.fs.find(pattern).await
    }

    pub async fn stat(&self, relative: &str) -> Result<SandboxFile, SandboxError> {
        self.fs.stat(relative).await
    }

    /// Remove everything under the root and forget tracked files
    pub async fn clean(&self) -> Result<(), SandboxError> {
        self.fs.clean().await?;
        self.tracked.lock().unwrap_or_else(|p| p.into_inner()).clear();
        info!(root = %self.root().display(), "Sandbox cleaned");
        Ok(())
    }
}
