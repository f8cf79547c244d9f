//! Task delegation.
//!
//! The model is asked which specialist should take a task. Its answer is
//! free text, so the choice is made deterministically from that text with
//! an ordered keyword table.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::adapters::LanguageModel;
use crate::domain::{DelegationDecision, Specialist, Task};

/// Keyword groups checked in order; the first group with a hit wins
pub const ROUTING_TABLE: &[(Specialist, &[&str])] = &[
    (Specialist::Researcher, &["researcher"]),
    (Specialist::Coder, &["coder"]),
    (Specialist::Browser, &["browser", "web", "website", "browse"]),
    (Specialist::FileManager, &["file manager", "file_manager"]),
    (
        Specialist::Sandbox,
        &["sandbox", "execute", "command", "terminal", "shell"],
    ),
];

/// Specialist used when nothing in the table matches
pub const FALLBACK_SPECIALIST: Specialist = Specialist::Supervisor;

/// Reasoning recorded when the model could not be asked
const UNAVAILABLE_REASONING: &str =
    "The delegation model did not respond, so the task will be handled directly.";

/// Pick a specialist from free text by case-insensitive substring search
pub fn classify_specialist(text: &str) -> Specialist {
    let lowered = text.to_lowercase();
    ROUTING_TABLE
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(specialist, _)| *specialist)
        .unwrap_or(FALLBACK_SPECIALIST)
}

/// Prompt asking the model to choose a specialist
pub fn build_prompt(task: &Task) -> String {
    let mut prompt = format!(
        "I need to delegate the following task to a specialist:\n\n{}\n\n",
        task.description
    );
    if let Some(ctx) = &task.context {
        prompt.push_str(&format!("Additional context:\n{}\n\n", ctx));
    }
    prompt.push_str(
        "Which specialist should handle this task? Please provide your response in the following format:\n\n\
         **Reasoning:**\n[Explain why this specialist is the best choice]\n\n\
         **Instructions for [Specialist Name]:**\n[Specific instructions for the specialist]\n\n\
         **Additional Guidance:**\n[Any additional guidance or context]\n\n\
         **Delegation Note:**\n[A brief note about the delegation]\n\n\
         Choose from these specialists: Researcher, Coder, Browser, File Manager, or Sandbox.",
    );
    prompt
}

/// Chooses a specialist for each task
pub struct Delegator {
    llm: Arc<dyn LanguageModel>,
}

impl Delegator {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Ask the model and classify its answer. Never fails: a model error
    /// yields neutral reasoning, which routes to the fallback specialist.
    #[instrument(skip(self, task))]
    pub async fn delegate(&self, task: &Task) -> DelegationDecision {
        let reasoning = match self.llm.respond(&build_prompt(task)).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Delegation request failed");
                UNAVAILABLE_REASONING.to_string()
            }
        };

        let specialist = classify_specialist(&reasoning);
        info!(specialist = %specialist, "Task delegated");
        DelegationDecision { specialist, reasoning }
    }
}
