//! File-based persistence for run traces.
//!
//! Each run gets a directory under `$NOVA_HOME/runs/<run_id>/`:
//! - `events.jsonl`: one trace event per line, append-only
//! - `artifacts.json`: links and files registered during the run
//! - `summary.json`: the run summary, written when the run ends

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use uuid::Uuid;

use crate::domain::{Artifact, FileRef, Link, Specialist, ThinkingMode, TraceEvent};

/// Persisted summary of a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub task: String,
    pub specialist: Specialist,
    pub mode: ThinkingMode,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub result: String,
    pub event_count: usize,
}

/// Artifacts registered during a run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunArtifacts {
    #[serde(default)]
    pub links: Vec<Artifact<Link>>,
    #[serde(default)]
    pub files: Vec<Artifact<FileRef>>,
}

/// Trace storage for one run
pub struct TraceStore {
    run_id: Uuid,
    run_dir: PathBuf,
    events_path: PathBuf,
}

impl TraceStore {
    /// Create or open the store for a run under the configured runs directory
    pub async fn open(run_id: Uuid) -> Result<Self> {
        Self::open_in(&Self::base_directory()?, run_id).await
    }

    /// Create or open the store for a run under `base_dir`
    pub async fn open_in(base_dir: &Path, run_id: Uuid) -> Result<Self> {
        let run_dir = base_dir.join(run_id.to_string());
        fs::create_dir_all(&run_dir)
            .await
            .with_context(|| format!("Failed to create run directory: {}", run_dir.display()))?;

        Ok(Self {
            run_id,
            events_path: run_dir.join("events.jsonl"),
            run_dir,
        })
    }

    /// Base directory for all runs (`$NOVA_HOME/runs`)
    pub fn base_directory() -> Result<PathBuf> {
        crate::config::runs_dir()
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn events_path(&self) -> &Path {
        &self.events_path
    }

    /// Append one event to the log
    pub async fn append(&self, event: &TraceEvent) -> Result<()> {
        self.append_all(std::slice::from_ref(event)).await
    }

    /// Append events in order with a single open
    pub async fn append_all(&self, events: &[TraceEvent]) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.events_path)
            .await
            .with_context(|| format!("Failed to open events file: {}", self.events_path.display()))?;

        let mut buf = String::new();
        for event in events {
            buf.push_str(&serde_json::to_string(event).context("Failed to serialize event")?);
            buf.push('\n');
        }
        file.write_all(buf.as_bytes())
            .await
            .context("Failed to write events")?;
        file.flush().await.context("Failed to flush events")?;

        Ok(())
    }

    /// Replay all events in order
    pub async fn replay(&self) -> Result<Vec<TraceEvent>> {
        if !self.events_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.events_path)
            .await
            .with_context(|| format!("Failed to open events file: {}", self.events_path.display()))?;

        let mut lines = BufReader::new(file).lines();
        let mut events = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let event: TraceEvent = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse event: {}", line))?;
            events.push(event);
        }

        Ok(events)
    }

    pub async fn write_artifacts(&self, artifacts: &RunArtifacts) -> Result<()> {
        self.write_json("artifacts.json", artifacts).await
    }

    pub async fn load_artifacts(&self) -> Result<RunArtifacts> {
        Ok(self.read_json("artifacts.json").await?.unwrap_or_default())
    }

    pub async fn write_summary(&self, summary: &RunSummary) -> Result<()> {
        self.write_json("summary.json", summary).await
    }

    /// Summary of the run, if it has finished
    pub async fn load_summary(&self) -> Result<Option<RunSummary>> {
        self.read_json("summary.json").await
    }

    async fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.run_dir.join(name);
        let json = serde_json::to_string_pretty(value)
            .with_context(|| format!("Failed to serialize {}", name))?;
        fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(&self, name: &str) -> Result<Option<T>> {
        let path = self.run_dir.join(name);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(value))
    }

    /// Run ids under the configured runs directory
    pub async fn list_runs() -> Result<Vec<Uuid>> {
        Self::list_runs_in(&Self::base_directory()?).await
    }

    /// Run ids found under `base_dir`
    pub async fn list_runs_in(base_dir: &Path) -> Result<Vec<Uuid>> {
        if !base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        let mut entries = fs::read_dir(base_dir)
            .await
            .with_context(|| format!("Failed to read runs directory: {}", base_dir.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    if let Ok(uuid) = Uuid::parse_str(name) {
                        runs.push(uuid);
                    }
                }
            }
        }

        Ok(runs)
    }
}
