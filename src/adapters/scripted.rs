//! Rule-based language model.
//!
//! Answers prompts from a list of substring rules, which makes runs
//! reproducible offline and in tests. Every prompt is recorded.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{LanguageModel, LlmError};

struct Rule {
    needle: String,
    /// Served in order; the last one repeats
    responses: Vec<String>,
}

/// Deterministic model driven by substring rules
pub struct ScriptedModel {
    rules: Mutex<Vec<Rule>>,
    default_response: String,
    prompts: Mutex<Vec<String>>,
    failing: bool,
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            default_response: "OK".to_string(),
            prompts: Mutex::new(Vec::new()),
            failing: false,
        }
    }

    /// Answer prompts containing `needle` (case-insensitive) with `response`.
    /// Rules are checked in insertion order.
    pub fn on(self, needle: &str, response: impl Into<String>) -> Self {
        self.on_sequence(needle, vec![response.into()])
    }

    /// Like [`on`](Self::on), but serve `responses` one per matching call
    pub fn on_sequence(self, needle: &str, responses: Vec<String>) -> Self {
        self.rules
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(Rule {
                needle: needle.to_lowercase(),
                responses,
            });
        self
    }

    /// Response for prompts no rule matches
    pub fn with_default(mut self, response: impl Into<String>) -> Self {
        self.default_response = response.into();
        self
    }

    /// Make every call fail
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Every prompt received so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Number of prompts containing `needle` (case-insensitive)
    pub fn count_matching(&self, needle: &str) -> usize {
        let needle = needle.to_lowercase();
        self.prompts()
            .iter()
            .filter(|p| p.to_lowercase().contains(&needle))
            .count()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn respond(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(prompt.to_string());

        if self.failing {
            return Err(LlmError::Request("scripted model is set to fail".to_string()));
        }

        let lowered = prompt.to_lowercase();
        let mut rules = self.rules.lock().unwrap_or_else(|p| p.into_inner());
        for rule in rules.iter_mut() {
            if lowered.contains(&rule.needle) {
                let response = if rule.responses.len() > 1 {
                    rule.responses.remove(0)
                } else {
                    rule.responses.first().cloned().unwrap_or_default()
                };
                return Ok(response);
            }
        }

        Ok(self.default_response.clone())
    }
}
