//! Task, specialist and delegation types.
//!
//! A `Task` enters the orchestrator once and is never mutated. Everything
//! derived from it (the delegation decision, the record of who handled it)
//! is write-once as well.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single user request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Free-text description of what the user wants
    pub description: String,

    /// Optional extra context supplied alongside the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl Task {
    /// Create a task without additional context
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            context: None,
        }
    }

    /// Attach additional context
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// The closed roster of handlers a task can be routed to.
///
/// `Supervisor` doubles as the fallback when the delegation answer names
/// none of the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Specialist {
    Researcher,
    Coder,
    FileManager,
    Browser,
    Sandbox,
    Supervisor,
}

impl Specialist {
    /// Human-readable name used in prompts and trace thoughts
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Researcher => "Researcher",
            Self::Coder => "Coder",
            Self::FileManager => "File Manager",
            Self::Browser => "Browser",
            Self::Sandbox => "Sandbox",
            Self::Supervisor => "Supervisor",
        }
    }
}

impl fmt::Display for Specialist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Outcome of the delegation step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationDecision {
    /// Chosen handler
    pub specialist: Specialist,

    /// Raw reasoning text the choice was derived from
    pub reasoning: String,
}

/// Verbosity of the templated elaboration added to thoughts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThinkingMode {
    #[default]
    Normal,
    Deep,
    SuperDeep,
}

impl fmt::Display for ThinkingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Normal => "normal",
            Self::Deep => "deep",
            Self::SuperDeep => "super_deep",
        };
        f.write_str(name)
    }
}

impl FromStr for ThinkingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "normal" => Ok(Self::Normal),
            "deep" => Ok(Self::Deep),
            "super_deep" | "superdeep" => Ok(Self::SuperDeep),
            other => Err(format!("unknown thinking mode: {}", other)),
        }
    }
}

/// Record of one handled task, appended to the orchestrator history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task: Task,

    /// Handler that actually produced the result
    pub specialist: Specialist,

    pub result: String,

    pub started_at: DateTime<Utc>,

    pub ended_at: DateTime<Utc>,
}

/// Speaker of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the conversation history returned by a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thinking_mode_parsing() {
        assert_eq!("normal".parse::<ThinkingMode>(), Ok(ThinkingMode::Normal));
        assert_eq!("Deep".parse::<ThinkingMode>(), Ok(ThinkingMode::Deep));
        assert_eq!("super-deep".parse::<ThinkingMode>(), Ok(ThinkingMode::SuperDeep));
        assert!("shallow".parse::<ThinkingMode>().is_err());
    }

    #[test]
    fn test_specialist_serialization() {
        let json = serde_json::to_string(&Specialist::FileManager).unwrap();
        assert_eq!(json, "\"file_manager\"");
        assert_eq!(Specialist::FileManager.to_string(), "File Manager");
    }

    #[test]
    fn test_task_with_context() {
        let task = Task::new("summarize the report").with_context("quarterly numbers");
        assert_eq!(task.context.as_deref(), Some("quarterly numbers"));

        let json = serde_json::to_string(&Task::new("hello")).unwrap();
        assert!(!json.contains("context"));
    }
}
