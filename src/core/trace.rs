//! Session-scoped trace recorder.
//!
//! The recorder is a cheap, cloneable handle over shared state so the
//! orchestrator, the specialist flows and the terminal tee can all append to
//! the same session. One recorder serves one session at a time;
//! `start_session` resets every collection.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Artifact, ArtifactKind, FileRef, Link, ThinkingMode, TraceEvent, TraceStep};

const DEEP_PERSPECTIVES: [&str; 4] = [
    "Logical perspective",
    "Creative perspective",
    "Critical perspective",
    "Practical perspective",
];

const SUPER_DEEP_POINTS: [&str; 7] = [
    "Multiple perspectives",
    "Potential implications",
    "Alternative approaches",
    "Edge cases",
    "Confidence assessment",
    "Potential challenges",
    "Success criteria",
];

/// A captured console line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalLine {
    pub content: String,
    pub timestamp: chrono::DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// Serializable view of a session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceSnapshot {
    pub task: String,
    pub mode: ThinkingMode,
    pub events: Vec<TraceEvent>,
    pub links: Vec<Artifact<Link>>,
    pub files: Vec<Artifact<FileRef>>,
    /// The most recent plan
    pub plan: Vec<String>,
    pub terminal_output: Vec<TerminalLine>,
    pub elapsed_ms: u64,
}

struct TraceState {
    task: String,
    mode: ThinkingMode,
    started: Instant,
    events: Vec<TraceEvent>,
    links: Vec<Artifact<Link>>,
    files: Vec<Artifact<FileRef>>,
    plan: Vec<String>,
    terminal_output: Vec<TerminalLine>,
    artifact_count: u64,
}

impl TraceState {
    fn new(mode: ThinkingMode) -> Self {
        Self {
            task: String::new(),
            mode,
            started: Instant::now(),
            events: Vec::new(),
            links: Vec::new(),
            files: Vec::new(),
            plan: Vec::new(),
            terminal_output: Vec::new(),
            artifact_count: 0,
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn push(&mut self, step: TraceStep) -> u64 {
        let id = self.events.len() as u64 + 1;
        let elapsed_ms = self.elapsed_ms();
        self.events.push(TraceEvent {
            id,
            timestamp: Utc::now(),
            elapsed_ms,
            step,
        });
        id
    }

    fn next_artifact<P>(&mut self, kind: ArtifactKind, payload: P) -> Artifact<P> {
        self.artifact_count += 1;
        Artifact {
            id: self.artifact_count,
            kind,
            timestamp: Utc::now(),
            event_id: self.events.last().map(|e| e.id),
            payload,
        }
    }
}

/// Recorder for the reasoning and execution trace of a task
#[derive(Clone)]
pub struct TraceRecorder {
    inner: Arc<Mutex<TraceState>>,
}

impl Default for TraceRecorder {
    fn default() -> Self {
        Self::new(ThinkingMode::Normal)
    }
}

impl TraceRecorder {
    /// Create an idle recorder with the given default mode
    pub fn new(mode: ThinkingMode) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TraceState::new(mode))),
        }
    }

    fn state(&self) -> MutexGuard<'_, TraceState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reset every collection and open a new session for `task`
    pub fn start_session(&self, task: &str, mode: ThinkingMode) {
        {
            let mut state = self.state();
            *state = TraceState::new(mode);
            state.task = task.to_string();
            state.push(TraceStep::Query {
                text: task.to_string(),
            });
        }

        match mode {
            ThinkingMode::Normal => {}
            ThinkingMode::Deep => {
                self.add_thought(
                    "Deep Thinking Mode activated. I'll provide more detailed reasoning and analysis.",
                );
            }
            ThinkingMode::SuperDeep => {
                self.add_thought(
                    "Super Deep Thinking Mode activated. I'll provide extremely detailed reasoning, analysis, and alternative approaches.",
                );
            }
        }
    }

    /// Add a top-level thought, elaborated according to the session mode
    pub fn add_thought(&self, text: impl Into<String>) -> u64 {
        let mut state = self.state();
        let text = elaborate(&text.into(), state.mode);
        state.push(TraceStep::Thought { text, depth: 0 })
    }

    /// Add a nested thought that is never elaborated
    pub fn add_detail(&self, text: impl Into<String>) -> u64 {
        self.state().push(TraceStep::Thought {
            text: text.into(),
            depth: 1,
        })
    }

    /// Record a plan; it also becomes the session's current plan
    pub fn add_plan<I, S>(&self, items: I) -> u64
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items: Vec<String> = items.into_iter().map(Into::into).collect();
        let mut state = self.state();
        state.plan = items.clone();
        state.push(TraceStep::Plan { items })
    }

    /// Record an action with structured metadata about its result
    pub fn add_execution(&self, action: impl Into<String>, result: Value) -> u64 {
        self.state().push(TraceStep::Execution {
            action: action.into(),
            result,
        })
    }

    /// Record captured console output. Blank text is ignored.
    pub fn add_terminal_output(&self, text: &str) -> Option<u64> {
        if text.trim().is_empty() {
            return None;
        }

        let mut state = self.state();
        let elapsed_ms = state.elapsed_ms();
        state.terminal_output.push(TerminalLine {
            content: text.to_string(),
            timestamp: Utc::now(),
            elapsed_ms,
        });
        Some(state.push(TraceStep::TerminalOutput {
            text: text.to_string(),
        }))
    }

    /// Register a link artifact
    pub fn add_link(&self, url: impl Into<String>, title: Option<String>, description: Option<String>) -> u64 {
        let mut state = self.state();
        let artifact = state.next_artifact(ArtifactKind::Link, Link::new(url, title, description));
        let id = artifact.id;
        state.links.push(artifact);
        id
    }

    /// Register a file artifact
    pub fn add_file(&self, path: impl Into<String>, content: Option<String>, description: Option<String>) -> u64 {
        let mut state = self.state();
        let artifact = state.next_artifact(ArtifactKind::File, FileRef::new(path, content, description));
        let id = artifact.id;
        state.files.push(artifact);
        id
    }

    /// Number of events recorded so far
    pub fn len(&self) -> usize {
        self.state().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy out the current session
    pub fn snapshot(&self) -> TraceSnapshot {
        let state = self.state();
        TraceSnapshot {
            task: state.task.clone(),
            mode: state.mode,
            events: state.events.clone(),
            links: state.links.clone(),
            files: state.files.clone(),
            plan: state.plan.clone(),
            terminal_output: state.terminal_output.clone(),
            elapsed_ms: state.elapsed_ms(),
        }
    }
}

/// Append the mode's templated analysis lines to a thought
fn elaborate(text: &str, mode: ThinkingMode) -> String {
    match mode {
        ThinkingMode::Normal => text.to_string(),
        ThinkingMode::Deep => {
            let mut out = format!("{}\n\n", text);
            for p in DEEP_PERSPECTIVES {
                out.push_str(&format!(
                    "**{}**: Considering this from a {} viewpoint...\n",
                    p,
                    p.to_lowercase()
                ));
            }
            out
        }
        ThinkingMode::SuperDeep => {
            let mut out = format!("{}\n\n", text);
            for p in SUPER_DEEP_POINTS {
                out.push_str(&format!("**{}**: Analyzing {} in depth...\n", p, p.to_lowercase()));
            }
            out
        }
    }
}
