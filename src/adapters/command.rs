//! Language model backed by a local CLI.
//!
//! The prompt is piped to the program's stdin and stdout is taken as the
//! response, e.g. `ollama run llama3` or `llm -m gpt-4o`.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{LanguageModel, LlmError};

/// Subprocess-based language model
pub struct CommandModel {
    program: String,
    args: Vec<String>,
}

impl CommandModel {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a whitespace-separated command line
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl LanguageModel for CommandModel {
    fn name(&self) -> &str {
        &self.program
    }

    async fn respond(&self, prompt: &str) -> Result<String, LlmError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LlmError::Command(format!("failed to spawn '{}': {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| LlmError::Command(format!("failed to write prompt: {}", e)))?;
            // Drop stdin to signal EOF
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| LlmError::Command(format!("failed to wait for '{}': {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LlmError::Command(format!(
                "'{}' exited with code {}: {}",
                self.program,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(program = %self.program, response_len = text.len(), "Command model responded");

        if text.is_empty() {
            return Err(LlmError::Empty);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_command_line() {
        let model = CommandModel::from_command_line("ollama run llama3").unwrap();
        assert_eq!(model.program(), "ollama");
        assert_eq!(model.args, vec!["run", "llama3"]);
        assert!(CommandModel::from_command_line("   ").is_none());
    }

    #[tokio::test]
    async fn test_cat_echoes_prompt() {
        let model = CommandModel::new("cat", Vec::new());
        let response = model.respond("hello model").await.unwrap();
        assert_eq!(response, "hello model");
    }

    #[tokio::test]
    async fn test_failing_command_is_an_error() {
        let model = CommandModel::new("false", Vec::new());
        assert!(matches!(model.respond("x").await, Err(LlmError::Command(_))));
    }
}
