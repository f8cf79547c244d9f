//! File write policy.
//!
//! Every file the engine creates on behalf of a task is checked against:
//! - An extension allow-list
//! - A maximum content size
//! - Denylist patterns (to avoid writing over secrets)

use std::path::Path;

use glob::Pattern;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Policy applied before any file write
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilePolicy {
    /// Lowercase extensions including the leading dot
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,

    /// Maximum content size in bytes (default: 20MB)
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,

    /// Glob patterns to reject
    #[serde(default = "default_denylist")]
    pub denylist_patterns: Vec<String>,
}

fn default_max_file_bytes() -> u64 {
    20 * 1024 * 1024
}

pub(crate) fn default_allowed_extensions() -> Vec<String> {
    [
        // Text and documentation
        ".txt", ".md", ".rst", ".log", ".ini", ".cfg", ".conf",
        // Source code
        ".py", ".js", ".jsx", ".ts", ".tsx", ".html", ".css", ".scss", ".less", ".java", ".c",
        ".cpp", ".h", ".hpp", ".cs", ".go", ".php", ".rb", ".swift",
        // Scripts
        ".sh", ".bash", ".zsh", ".bat", ".ps1",
        // Data
        ".json", ".yaml", ".yml", ".xml", ".csv", ".tsv", ".toml",
        // Web
        ".htm", ".svg",
        // Dotfiles
        ".env", ".gitignore", ".dockerignore", ".editorconfig",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_denylist() -> Vec<String> {
    vec![
        "**/secrets*".to_string(),
        "**/*credential*".to_string(),
        "**/*.pem".to_string(),
        "**/*.key".to_string(),
    ]
}

impl Default for FilePolicy {
    fn default() -> Self {
        Self {
            allowed_extensions: default_allowed_extensions(),
            max_file_bytes: default_max_file_bytes(),
            denylist_patterns: default_denylist(),
        }
    }
}

impl FilePolicy {
    /// Extension of `path` as matched against the allow-list.
    ///
    /// Dotfiles such as `.gitignore` count as their own extension.
    fn extension_of(path: &Path) -> Option<String> {
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            return Some(format!(".{}", ext.to_lowercase()));
        }
        let name = path.file_name()?.to_str()?;
        name.starts_with('.').then(|| name.to_lowercase())
    }

    /// Check if a path has an allowed extension
    pub fn is_allowed_extension(&self, path: &Path) -> bool {
        match Self::extension_of(path) {
            Some(ext) => self.allowed_extensions.iter().any(|a| a.eq_ignore_ascii_case(&ext)),
            None => false,
        }
    }

    /// Check if a path matches any denylist pattern
    pub fn is_denylisted(&self, path: &str) -> bool {
        for pattern_str in &self.denylist_patterns {
            if let Ok(pattern) = Pattern::new(pattern_str) {
                if pattern.matches(path) {
                    return true;
                }
            }
        }
        false
    }

    /// Validate a pending write
    pub fn validate_write(&self, path: &Path, content: &str) -> Result<(), PolicyViolation> {
        let path_str = path.to_string_lossy();

        if !self.is_allowed_extension(path) {
            return Err(PolicyViolation::DisallowedExtension {
                path: path_str.to_string(),
                extension: Self::extension_of(path).unwrap_or_else(|| "(none)".to_string()),
            });
        }

        let size = content.len() as u64;
        if size > self.max_file_bytes {
            return Err(PolicyViolation::TooLarge {
                actual: size,
                limit: self.max_file_bytes,
            });
        }

        if self.is_denylisted(&path_str) {
            return Err(PolicyViolation::DenylistMatch {
                path: path_str.to_string(),
            });
        }

        Ok(())
    }
}

/// Policy violation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("File extension '{extension}' is not allowed for {path}")]
    DisallowedExtension { path: String, extension: String },

    #[error("File content too large: {actual} > {limit} bytes")]
    TooLarge { actual: u64, limit: u64 },

    #[error("Path matches denylist pattern: {path}")]
    DenylistMatch { path: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = FilePolicy::default();
        assert_eq!(policy.max_file_bytes, 20 * 1024 * 1024);
        assert!(policy.allowed_extensions.contains(&".py".to_string()));
        assert!(policy.allowed_extensions.contains(&".editorconfig".to_string()));
    }

    #[test]
    fn test_extension_allow_list() {
        let policy = FilePolicy::default();

        assert!(policy.is_allowed_extension(Path::new("notes.md")));
        assert!(policy.is_allowed_extension(Path::new("src/Main.PY")));
        assert!(policy.is_allowed_extension(Path::new(".gitignore")));
        assert!(policy.is_allowed_extension(Path::new("config/.env")));

        assert!(!policy.is_allowed_extension(Path::new("payload.exe")));
        assert!(!policy.is_allowed_extension(Path::new("Makefile")));
    }

    #[test]
    fn test_denylist_matching() {
        let policy = FilePolicy::default();

        assert!(policy.is_denylisted("config/secrets.json"));
        assert!(policy.is_denylisted("keys/server.key"));
        assert!(policy.is_denylisted("certs/server.pem"));

        assert!(!policy.is_denylisted("config.toml"));
        assert!(!policy.is_denylisted("main.py"));
    }

    #[test]
    fn test_validate_write() {
        let policy = FilePolicy {
            max_file_bytes: 10,
            ..Default::default()
        };

        assert!(policy.validate_write(Path::new("a.txt"), "short").is_ok());

        let result = policy.validate_write(Path::new("a.exe"), "short");
        assert!(matches!(result, Err(PolicyViolation::DisallowedExtension { .. })));

        let result = policy.validate_write(Path::new("a.txt"), &"x".repeat(11));
        assert!(matches!(result, Err(PolicyViolation::TooLarge { actual: 11, limit: 10 })));

        let result = policy.validate_write(Path::new("dir/secrets.json"), "{}");
        assert!(matches!(result, Err(PolicyViolation::DenylistMatch { .. })));
    }
}
