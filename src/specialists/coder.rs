//! Python coding specialist: write, run and debug code in the sandbox.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::adapters::LanguageModel;
use crate::sandbox::{ExecutionResult, ExecutionStatus, Sandbox};

use super::{extract_code, respond_or_fallback};

/// Code proposed by the model, split from its prose
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeDraft {
    pub code: String,
    pub explanation: String,
}

/// One execution of a draft, with the model's reading of it
#[derive(Debug, Clone)]
pub struct CodeRun {
    pub code: String,
    pub result: ExecutionResult,
    pub analysis: String,
}

impl CodeRun {
    pub fn status(&self) -> ExecutionStatus {
        self.result.status
    }
}

pub struct Coder {
    llm: Arc<dyn LanguageModel>,
    sandbox: Arc<Sandbox>,
}

impl Coder {
    pub fn new(llm: Arc<dyn LanguageModel>, sandbox: Arc<Sandbox>) -> Self {
        Self { llm, sandbox }
    }

    /// Hard bound applied to each execution
    pub fn timeout(&self) -> Duration {
        self.sandbox.timeout()
    }

    #[instrument(skip(self, context))]
    pub async fn write_code(&self, task: &str, context: Option<&str>) -> CodeDraft {
        let mut prompt = format!("I need to write Python code to solve the following task:\n\n{}", task);
        if let Some(ctx) = context {
            prompt.push_str(&format!("\n\nAdditional context:\n{}", ctx));
        }
        prompt.push_str("\n\nPlease write clean, efficient, and well-documented Python code to solve this task. Include comments to explain complex logic and provide a brief explanation of how the code works.");

        let response = respond_or_fallback(self.llm.as_ref(), &prompt).await;
        let (code, explanation) = extract_code(&response);
        debug!(code_len = code.len(), "Code drafted");
        CodeDraft { code, explanation }
    }

    /// Run `code` in the sandbox and ask the model to explain the outcome
    #[instrument(skip(self, code), fields(code_len = code.len()))]
    pub async fn execute_code(&self, code: &str) -> CodeRun {
        let result = self.sandbox.run_code(code).await;

        let prompt = format!(
            "I executed the following Python code:\n\n```python\n{}\n```\n\nExecution result:\n```\nStatus: {}\nOutput: {}\nError: {}\n```\n\nPlease analyze the execution result and explain what happened. If there were errors, suggest how to fix them.",
            code,
            result.status.as_str(),
            result.stdout,
            error_text(&result)
        );
        let analysis = respond_or_fallback(self.llm.as_ref(), &prompt).await;

        CodeRun {
            code: code.to_string(),
            result,
            analysis,
        }
    }

    #[instrument(skip(self, code, error))]
    pub async fn debug_code(&self, code: &str, error: &str) -> CodeDraft {
        let prompt = format!(
            "I need to debug the following Python code that produced an error:\n\n```python\n{}\n```\n\nError message:\n```\n{}\n```\n\nPlease identify the issue, explain what's causing it, and provide a fixed version of the code.",
            code, error
        );
        let response = respond_or_fallback(self.llm.as_ref(), &prompt).await;
        let (code, explanation) = extract_code(&response);
        CodeDraft { code, explanation }
    }
}

/// Error text of a failed run; empty for successes
pub fn error_text(result: &ExecutionResult) -> String {
    match result.status {
        ExecutionStatus::Success => String::new(),
        _ => result.stderr.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ScriptedModel;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_code_splits_response() {
        let temp = TempDir::new().unwrap();
        let model = Arc::new(ScriptedModel::new().on(
            "write python code",
            "Here it is:\n```python\nprint('hi')\n```\nIt prints a greeting.",
        ));
        let coder = Coder::new(model.clone(), Arc::new(Sandbox::new(temp.path())));

        let draft = coder.write_code("Say hi", Some("Be brief")).await;
        assert_eq!(draft.code, "print('hi')");
        assert_eq!(draft.explanation, "Here it is:\nIt prints a greeting.");
        assert!(model.prompts()[0].contains("Additional context:\nBe brief"));
    }

    #[tokio::test]
    async fn test_debug_prompt_carries_error() {
        let temp = TempDir::new().unwrap();
        let model = Arc::new(ScriptedModel::new().with_default("```python\nx = 1\n```"));
        let coder = Coder::new(model.clone(), Arc::new(Sandbox::new(temp.path())));

        let draft = coder.debug_code("x = ", "SyntaxError: invalid syntax").await;
        assert_eq!(draft.code, "x = 1");
        assert!(model.prompts()[0].contains("Error message:\n```\nSyntaxError: invalid syntax\n```"));
    }
}
