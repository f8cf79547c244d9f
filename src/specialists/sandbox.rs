//! Sandbox specialist: file operations and code or command execution
//! inside the sandbox root.

use std::sync::Arc;

use tracing::instrument;

use crate::adapters::LanguageModel;
use crate::sandbox::{ExecutionResult, ExecutionStatus, Sandbox, SandboxFile};

use super::extract::{clean_code_block, extract_fields, first_match, strip_quotes};
use super::{respond_for_extraction, respond_or_fallback};

/// What a sandbox task asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxIntent {
    ListDirectory,
    CreateDirectory,
    CopyFile,
    MoveFile,
    FindFiles,
    FileInfo,
    CreateFile,
    ExecuteCode,
    ExecuteCommand,
}

/// Checked top to bottom; the first entry with a matching phrase wins
pub const SANDBOX_INTENTS: &[(SandboxIntent, &[&str])] = &[
    (
        SandboxIntent::ListDirectory,
        &["list directory", "list files", "show directory", "show files"],
    ),
    (
        SandboxIntent::CreateDirectory,
        &["create directory", "make directory", "make folder", "create folder"],
    ),
    (SandboxIntent::CopyFile, &["copy file", "duplicate file"]),
    (SandboxIntent::MoveFile, &["move file", "rename file"]),
    (
        SandboxIntent::FindFiles,
        &["find files", "search files", "find file", "search file"],
    ),
    (
        SandboxIntent::FileInfo,
        &["file info", "file information", "file details", "file stats"],
    ),
    (
        SandboxIntent::CreateFile,
        &["create file", "write file", "save file", "make file"],
    ),
    (SandboxIntent::ExecuteCode, &["python", "code", "script"]),
    (
        SandboxIntent::ExecuteCommand,
        &["command", "shell", "terminal", "bash", "run"],
    ),
];

impl SandboxIntent {
    /// `None` means the task needs clarification
    pub fn classify(task: &str) -> Option<Self> {
        first_match(task, SANDBOX_INTENTS)
    }
}

/// One execution plus the model's reading of it
#[derive(Debug, Clone)]
pub struct SandboxRun {
    pub result: ExecutionResult,
    pub analysis: String,
}

pub struct SandboxAgent {
    llm: Arc<dyn LanguageModel>,
    sandbox: Arc<Sandbox>,
}

/// Treat empty answers and "not found" style answers as absent
fn non_empty(answer: &str) -> Option<String> {
    let value = strip_quotes(answer.trim());
    let lowered = value.trim_end_matches('.').to_lowercase();
    if value.is_empty() || lowered == "not found" || lowered == "none" || value == "\"\"" {
        None
    } else {
        Some(value.to_string())
    }
}

impl SandboxAgent {
    pub fn new(llm: Arc<dyn LanguageModel>, sandbox: Arc<Sandbox>) -> Self {
        Self { llm, sandbox }
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    pub async fn extract_path(&self, task: &str) -> Option<String> {
        let prompt = format!(
            "I need to extract a file or directory path from the following task:\n\n{}\n\nPlease extract only the path without any additional text. If there is no path, return an empty string.",
            task
        );
        let response = respond_for_extraction(self.llm.as_ref(), &prompt).await?;
        non_empty(&clean_code_block(&response))
    }

    pub async fn extract_source_destination(&self, task: &str) -> (Option<String>, Option<String>) {
        let prompt = format!(
            "I need to extract source and destination paths from the following task:\n\n{}\n\nPlease extract only the paths without any additional text. Return them in the format:\n\nSource: <source_path>\nDestination: <destination_path>\n\nIf either path is missing, use 'Not found' for that path.",
            task
        );
        let Some(response) = respond_for_extraction(self.llm.as_ref(), &prompt).await else {
            return (None, None);
        };
        let mut fields = extract_fields(&response, &["Source", "Destination"]);
        (fields.take("Source"), fields.take("Destination"))
    }

    pub async fn extract_pattern(&self, task: &str) -> Option<String> {
        let prompt = format!(
            "I need to extract a file search pattern from the following task:\n\n{}\n\nPlease extract only the pattern without any additional text. If there is no pattern, return an empty string.",
            task
        );
        let response = respond_for_extraction(self.llm.as_ref(), &prompt).await?;
        non_empty(&clean_code_block(&response))
    }

    /// Filename and content of a file to create
    pub async fn extract_file_info(&self, task: &str) -> (Option<String>, Option<String>) {
        let prompt = format!(
            "I need to extract file information from the following request:\n\n```\n{}\n```\n\nPlease extract the following information:\n1. The filename or file path\n2. The file content\n\nReturn the information in the following format:\n\nFilename: <extracted filename>\nContent: <extracted content>\n\nIf you cannot extract the filename or content, indicate that with \"Not found\".",
            task
        );
        let Some(response) = respond_for_extraction(self.llm.as_ref(), &prompt).await else {
            return (None, None);
        };
        let mut fields = extract_fields(&response, &["Filename", "Content"]);
        (fields.take("Filename"), fields.take("Content"))
    }

    pub async fn extract_code(&self, task: &str) -> Option<String> {
        let prompt = format!(
            "I need to extract Python code from the following task:\n\n{}\n\nPlease extract only the Python code without any additional text. If there are multiple code blocks, combine them into a single coherent script. If there is no code, return an empty string.",
            task
        );
        let response = respond_for_extraction(self.llm.as_ref(), &prompt).await?;
        non_empty(&clean_code_block(&response))
    }

    pub async fn extract_command(&self, task: &str) -> Option<String> {
        let prompt = format!(
            "I need to extract a shell command from the following task:\n\n{}\n\nPlease extract only the shell command without any additional text. If there are multiple commands, combine them into a single command line (using && if needed). If there is no command, return an empty string.",
            task
        );
        let response = respond_for_extraction(self.llm.as_ref(), &prompt).await?;
        non_empty(&clean_code_block(&response))
    }

    #[instrument(skip(self, code), fields(code_len = code.len()))]
    pub async fn execute_python(&self, code: &str) -> SandboxRun {
        let result = self.sandbox.run_code(code).await;
        let prompt = match result.status {
            ExecutionStatus::Success => format!(
                "I executed the following Python code:\n\n```python\n{}\n```\n\nThe code executed successfully with the following output:\n\n```\n{}\n```\n\nPlease analyze the execution and provide a summary of what the code did and what the output means.",
                code, result.stdout
            ),
            _ => format!(
                "I tried to execute the following Python code:\n\n```python\n{}\n```\n\nThe code failed with the following error:\n\n```\n{}\n```\n\nPlease analyze the error and provide a detailed explanation of what went wrong and how to fix it.",
                code, result.stderr
            ),
        };
        let analysis = respond_or_fallback(self.llm.as_ref(), &prompt).await;
        SandboxRun { result, analysis }
    }

    #[instrument(skip(self))]
    pub async fn execute_command(&self, command: &str) -> SandboxRun {
        let result = self.sandbox.run_command(command).await;
        let prompt = match result.status {
            ExecutionStatus::Success => format!(
                "I executed the following shell command:\n\n```\n{}\n```\n\nThe command executed successfully with the following output:\n\n```\n{}\n```\n\nPlease analyze the execution and provide a summary of what the command did and what the output means.",
                command, result.stdout
            ),
            _ => format!(
                "I tried to execute the following shell command:\n\n```\n{}\n```\n\nThe command failed with the following error:\n\n```\n{}\n```\n\nPlease analyze the error and provide a detailed explanation of what went wrong and how to fix it.",
                command, result.stderr
            ),
        };
        let analysis = respond_or_fallback(self.llm.as_ref(), &prompt).await;
        SandboxRun { result, analysis }
    }
}

/// One-line summary of a directory listing
pub fn describe_listing(path: &str, items: &[SandboxFile]) -> String {
    if items.is_empty() {
        return format!("Directory '{}' is empty.", path);
    }
    let dirs = items.iter().filter(|i| i.is_directory).count();
    format!(
        "Directory '{}' contains {} items: {} files and {} directories.",
        path,
        items.len(),
        items.len() - dirs,
        dirs
    )
}

/// One-line summary of an entry's metadata
pub fn describe_entry(path: &str, entry: &SandboxFile) -> String {
    if entry.is_directory {
        format!("'{}' is a directory.", path)
    } else {
        format!("'{}' is a file of size {} bytes.", path, entry.size_bytes)
    }
}
