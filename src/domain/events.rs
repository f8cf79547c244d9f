//! Trace event types.
//!
//! A trace is an append-only list of events describing what the engine did
//! while handling one task. Ids are session-local and equal to append order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single entry in a task trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Position in the trace, starting at 1
    pub id: u64,

    /// When this event was recorded
    pub timestamp: DateTime<Utc>,

    /// Milliseconds since the trace session started
    pub elapsed_ms: u64,

    /// What happened
    #[serde(flatten)]
    pub step: TraceStep,
}

impl TraceEvent {
    /// Kind of this event
    pub fn kind(&self) -> EventKind {
        self.step.kind()
    }
}

/// Payload of a trace event, tagged by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum TraceStep {
    /// The task text that opened the session
    Query { text: String },

    /// A reasoning note
    Thought {
        text: String,
        /// 0 for top-level thoughts, higher for nested detail
        #[serde(default)]
        depth: u8,
    },

    /// An ordered list of intended steps
    Plan { items: Vec<String> },

    /// An action taken, with structured metadata about its result
    Execution { action: String, result: Value },

    /// A line of console output captured while the task ran
    TerminalOutput { text: String },
}

impl TraceStep {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Query { .. } => EventKind::Query,
            Self::Thought { .. } => EventKind::Thought,
            Self::Plan { .. } => EventKind::Plan,
            Self::Execution { .. } => EventKind::Execution,
            Self::TerminalOutput { .. } => EventKind::TerminalOutput,
        }
    }

    /// One-line rendering for listings
    pub fn summary(&self) -> String {
        match self {
            Self::Query { text } | Self::Thought { text, .. } | Self::TerminalOutput { text } => {
                text.lines().next().unwrap_or_default().to_string()
            }
            Self::Plan { items } => format!("{} step plan", items.len()),
            Self::Execution { action, result } => format!("{} {}", action, result),
        }
    }
}

/// Kinds of trace events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Query,
    Thought,
    Plan,
    Execution,
    TerminalOutput,
}
