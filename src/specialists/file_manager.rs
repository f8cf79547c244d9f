//! File management specialist.
//!
//! Works on the sandbox filesystem, so the write policy and root
//! containment apply to everything it touches.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::adapters::LanguageModel;
use crate::sandbox::{Sandbox, SandboxError, SandboxFile};

use super::extract::{extract_fields, fenced_blocks, first_match, strip_quotes};
use super::{respond_for_extraction, respond_or_fallback};

/// What a file task asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileIntent {
    Create,
    Read,
    Organize,
}

const INTENTS: &[(FileIntent, &[&str])] = &[
    (FileIntent::Create, &["create", "write", "save"]),
    (FileIntent::Read, &["read", "open", "view"]),
    (FileIntent::Organize, &["organize", "list", "directory"]),
];

impl FileIntent {
    /// First matching intent in create, read, organize order
    pub fn classify(task: &str) -> Option<Self> {
        first_match(task, INTENTS)
    }
}

/// Parameters for a file creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    pub path: String,
    pub content: String,
    pub file_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FileCreation {
    pub file: SandboxFile,
    pub content: String,
    /// The model's review notes
    pub suggestions: String,
}

#[derive(Debug, Clone)]
pub struct FileReading {
    pub path: String,
    pub content: String,
    pub analysis: String,
}

#[derive(Debug, Clone)]
pub struct DirectoryReview {
    pub directory: String,
    pub entries: Vec<SandboxFile>,
    pub plan: String,
}

pub struct FileManager {
    llm: Arc<dyn LanguageModel>,
    sandbox: Arc<Sandbox>,
}

impl FileManager {
    pub fn new(llm: Arc<dyn LanguageModel>, sandbox: Arc<Sandbox>) -> Self {
        Self { llm, sandbox }
    }

    /// Ask the model for path, content and type of a file to create
    pub async fn extract_create_request(&self, task: &str) -> Option<CreateRequest> {
        let prompt = format!(
            "I need to extract file information from the following task:\n\n{}\n\nPlease extract the following information:\n1. File path (where to save the file)\n2. Content to write to the file\n3. File type (markdown, python, etc.)\n\nProvide the information in this format:\n\nFile path: <path>\nContent:\n<content>\nFile type: <type>",
            task
        );
        let response = respond_for_extraction(self.llm.as_ref(), &prompt).await?;
        let mut fields = extract_fields(&response, &["File path", "Content", "File type"]);

        Some(CreateRequest {
            path: fields.take("File path")?,
            content: fields.take("Content")?,
            file_type: fields.take("File type"),
        })
    }

    pub async fn extract_file_path(&self, task: &str) -> Option<String> {
        let prompt = format!(
            "I need to extract the file path from the following task:\n\n{}\n\nPlease extract the file path (the location of the file to read or operate on). Answer in the format:\n\nFile path: <path>",
            task
        );
        let response = respond_for_extraction(self.llm.as_ref(), &prompt).await?;
        labelled_path(&response, "File path")
    }

    pub async fn extract_directory(&self, task: &str) -> Option<String> {
        let prompt = format!(
            "I need to extract the directory path from the following task:\n\n{}\n\nPlease extract the directory path (the location of the directory to list or organize). Answer in the format:\n\nDirectory path: <path>",
            task
        );
        let response = respond_for_extraction(self.llm.as_ref(), &prompt).await?;
        labelled_path(&response, "Directory path")
    }

    /// Format, review and write a file.
    ///
    /// The write policy is checked against the requested content before any
    /// model call, and again against the final content at write time.
    #[instrument(skip(self, request), fields(path = %request.path))]
    pub async fn create_file(&self, request: &CreateRequest) -> Result<FileCreation, SandboxError> {
        let target = self.sandbox.fs().resolve(&request.path)?;
        self.sandbox
            .fs()
            .policy()
            .validate_write(&target, &request.content)?;

        let formatted = match request.file_type.as_deref() {
            Some(t) => self.format_content(&request.content, t).await,
            None => request.content.clone(),
        };

        let prompt = format!(
            "I need to create a file at '{}' with the following content:\n\n{}\n\nPlease review this content and suggest any improvements or formatting changes to make it more readable and professional.",
            request.path, formatted
        );
        let suggestions = respond_or_fallback(self.llm.as_ref(), &prompt).await;
        let content = longest_block(&suggestions).unwrap_or(formatted);

        let file = self.sandbox.create_file(&request.path, &content).await?;
        debug!(bytes = content.len(), "File written");

        Ok(FileCreation {
            file,
            content,
            suggestions,
        })
    }

    async fn format_content(&self, content: &str, file_type: &str) -> String {
        let prompt = match file_type.to_lowercase().as_str() {
            "markdown" | "md" => format!(
                "I need to format the following content as markdown:\n\n{}\n\nPlease format this content with proper markdown syntax, including headings, lists, code blocks, and other formatting as appropriate.",
                content
            ),
            "python" | "py" => format!(
                "I need to format the following content as Python code:\n\n{}\n\nPlease format this content with proper Python syntax, including docstrings, comments, and PEP 8 style guidelines.",
                content
            ),
            _ => return content.to_string(),
        };

        match respond_for_extraction(self.llm.as_ref(), &prompt).await {
            Some(response) => longest_block(&response).unwrap_or_else(|| content.to_string()),
            None => content.to_string(),
        }
    }

    #[instrument(skip(self))]
    pub async fn read_file(&self, path: &str) -> Result<FileReading, SandboxError> {
        let content = self.sandbox.read_file(path).await?;
        let prompt = format!(
            "I need to analyze the content of the file at '{}':\n\n{}\n\nPlease provide a brief summary of this file, including its purpose, structure, and key components.",
            path, content
        );
        let analysis = respond_or_fallback(self.llm.as_ref(), &prompt).await;

        Ok(FileReading {
            path: path.to_string(),
            content,
            analysis,
        })
    }

    /// List `directory` and ask the model for an organization plan
    #[instrument(skip(self))]
    pub async fn organize(&self, directory: &str) -> Result<DirectoryReview, SandboxError> {
        let entries = self.sandbox.list(directory).await?;

        let listing: String = entries
            .iter()
            .map(|e| format!("{} - {} - {} bytes\n", e.name(), kind_label(e), e.size_bytes))
            .collect();
        let prompt = format!(
            "I need to organize the files in the directory '{}':\n\n{}\n\nPlease suggest a plan for organizing these files, including any directories that should be created, files that should be renamed, or files that should be moved.",
            directory, listing
        );
        let plan = respond_or_fallback(self.llm.as_ref(), &prompt).await;

        Ok(DirectoryReview {
            directory: directory.to_string(),
            entries,
            plan,
        })
    }
}

pub(crate) fn kind_label(file: &SandboxFile) -> &'static str {
    if file.is_directory {
        "Directory"
    } else {
        "File"
    }
}

/// Longest fenced block in a response, if any
fn longest_block(response: &str) -> Option<String> {
    fenced_blocks(response)
        .into_iter()
        .map(|b| b.content)
        .max_by_key(String::len)
}

/// A labelled path, or a bare line that looks like one
fn labelled_path(response: &str, label: &str) -> Option<String> {
    if let Some(path) = extract_fields(response, &[label]).take(label) {
        return Some(path);
    }
    response
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.contains(':') && (l.contains('/') || l.contains('.')))
        .map(|l| strip_quotes(l).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ScriptedModel;
    use crate::sandbox::SandboxError;
    use tempfile::TempDir;

    fn manager(model: Arc<ScriptedModel>, temp: &TempDir) -> FileManager {
        FileManager::new(model, Arc::new(Sandbox::new(temp.path())))
    }

    #[test]
    fn test_classify_intent() {
        assert_eq!(FileIntent::classify("Create a notes file"), Some(FileIntent::Create));
        assert_eq!(FileIntent::classify("Please open config.yaml"), Some(FileIntent::Read));
        assert_eq!(FileIntent::classify("Organize my downloads"), Some(FileIntent::Organize));
        assert_eq!(FileIntent::classify("write and then read"), Some(FileIntent::Create));
        assert_eq!(FileIntent::classify("delete everything"), None);
    }

    #[test]
    fn test_labelled_path_fallback() {
        assert_eq!(labelled_path("File path: a/b.txt", "File path"), Some("a/b.txt".into()));
        assert_eq!(labelled_path("Sure!\n'docs/readme.md'", "File path"), Some("docs/readme.md".into()));
        assert_eq!(labelled_path("No idea", "File path"), None);
    }

    #[tokio::test]
    async fn test_extract_create_request() {
        let temp = TempDir::new().unwrap();
        let model = Arc::new(ScriptedModel::new().on(
            "extract file information",
            "File path: notes.md\nContent:\n# Notes\nremember\nFile type: markdown",
        ));
        let fm = manager(model, &temp);

        let request = fm.extract_create_request("Create notes.md").await.unwrap();
        assert_eq!(request.path, "notes.md");
        assert_eq!(request.content, "# Notes\nremember");
        assert_eq!(request.file_type.as_deref(), Some("markdown"));
    }

    #[tokio::test]
    async fn test_create_file_prefers_reviewed_block() {
        let temp = TempDir::new().unwrap();
        let model = Arc::new(
            ScriptedModel::new().on("review this content", "Better:\n```\nHello, world!\n```"),
        );
        let fm = manager(model, &temp);

        let request = CreateRequest {
            path: "hello.txt".into(),
            content: "hello world".into(),
            file_type: None,
        };
        let created = fm.create_file(&request).await.unwrap();
        assert_eq!(created.content, "Hello, world!");
        assert_eq!(
            std::fs::read_to_string(temp.path().join("hello.txt")).unwrap(),
            "Hello, world!"
        );
    }

    #[tokio::test]
    async fn test_disallowed_extension_is_rejected_before_model_call() {
        let temp = TempDir::new().unwrap();
        let model = Arc::new(ScriptedModel::new());
        let fm = manager(model.clone(), &temp);

        let request = CreateRequest {
            path: "tool.exe".into(),
            content: "MZ".into(),
            file_type: None,
        };
        let result = fm.create_file(&request).await;
        assert!(matches!(result, Err(SandboxError::Policy(_))));
        assert!(model.prompts().is_empty());
        assert!(!temp.path().join("tool.exe").exists());
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let temp = TempDir::new().unwrap();
        let fm = manager(Arc::new(ScriptedModel::new()), &temp);
        assert!(matches!(
            fm.read_file("nope.txt").await,
            Err(SandboxError::NotFound { .. })
        ));
    }
}
