//! Filesystem operations scoped to a sandbox root.
//!
//! Every path argument is relative to the root. Paths are resolved
//! lexically: absolute paths and `..` segments that would climb above the
//! root are rejected before any I/O happens.

use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use super::SandboxError;
use crate::core::policy::FilePolicy;

/// Metadata about an entry under the sandbox root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxFile {
    /// Path relative to the root, `/`-separated
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub size_bytes: u64,
    pub is_directory: bool,
    /// Not every filesystem records creation time
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub accessed_at: Option<DateTime<Utc>>,
}

impl SandboxFile {
    /// Final path component
    pub fn name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }

    fn from_metadata(root: &Path, path: &Path, meta: &std::fs::Metadata) -> Self {
        let relative_path = path
            .strip_prefix(root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        Self {
            relative_path,
            absolute_path: path.to_path_buf(),
            size_bytes: if meta.is_dir() { 0 } else { meta.len() },
            is_directory: meta.is_dir(),
            created_at: meta.created().ok().map(to_utc),
            modified_at: meta.modified().ok().map(to_utc),
            accessed_at: meta.accessed().ok().map(to_utc),
        }
    }
}

fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

/// Filesystem view rooted at one directory
#[derive(Debug, Clone)]
pub struct SandboxFs {
    root: PathBuf,
    policy: FilePolicy,
}

impl SandboxFs {
    /// Create a view over `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            policy: FilePolicy::default(),
        }
    }

    /// Replace the write policy
    pub fn with_policy(mut self, policy: FilePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn policy(&self) -> &FilePolicy {
        &self.policy
    }

    /// Create the root directory if it does not exist yet
    pub async fn ensure_root(&self) -> Result<(), SandboxError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| SandboxError::io(&self.root, e))
    }

    /// Resolve a relative path against the root.
    ///
    /// Surrounding whitespace and quotes are stripped; an empty path or `.`
    /// resolves to the root itself.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, SandboxError> {
        let cleaned = relative.trim().trim_matches(|c| c == '"' || c == '\'' || c == '`');
        let mut parts: Vec<&std::ffi::OsStr> = Vec::new();

        for component in Path::new(cleaned).components() {
            match component {
                Component::CurDir => {}
                Component::Normal(part) => parts.push(part),
                Component::ParentDir => {
                    if parts.pop().is_none() {
                        return Err(SandboxError::PathEscape {
                            path: relative.to_string(),
                        });
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(SandboxError::PathEscape {
                        path: relative.to_string(),
                    });
                }
            }
        }

        let mut resolved = self.root.clone();
        resolved.extend(parts);
        Ok(resolved)
    }

    async fn describe(&self, path: &Path) -> Result<SandboxFile, SandboxError> {
        let meta = fs::metadata(path).await.map_err(|e| SandboxError::io(path, e))?;
        Ok(SandboxFile::from_metadata(&self.root, path, &meta))
    }

    /// List the immediate children of a directory, sorted by name
    pub async fn list(&self, relative: &str) -> Result<Vec<SandboxFile>, SandboxError> {
        self.ensure_root().await?;
        let dir = self.resolve(relative)?;

        if !dir.exists() {
            return Err(SandboxError::NotFound { path: relative.to_string() });
        }
        if !dir.is_dir() {
            return Err(SandboxError::NotADirectory { path: relative.to_string() });
        }

        let mut entries = fs::read_dir(&dir).await.map_err(|e| SandboxError::io(&dir, e))?;
        let mut items = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(|e| SandboxError::io(&dir, e))? {
            items.push(self.describe(&entry.path()).await?);
        }

        items.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(items)
    }

    /// Create a directory and any missing parents.
    ///
    /// Succeeds when the directory already exists; fails when a file is in
    /// the way.
    pub async fn create_directory(&self, relative: &str) -> Result<SandboxFile, SandboxError> {
        self.ensure_root().await?;
        let dir = self.resolve(relative)?;

        if dir.is_file() {
            return Err(SandboxError::NotADirectory { path: relative.to_string() });
        }

        fs::create_dir_all(&dir).await.map_err(|e| SandboxError::io(&dir, e))?;
        debug!(path = %dir.display(), "Created sandbox directory");
        self.describe(&dir).await
    }

    /// Copy a file, creating the destination's parent directories
    pub async fn copy(&self, source: &str, destination: &str) -> Result<SandboxFile, SandboxError> {
        let src = self.resolve(source)?;
        let dst = self.resolve(destination)?;

        if !src.exists() {
            return Err(SandboxError::NotFound { path: source.to_string() });
        }
        if !src.is_file() {
            return Err(SandboxError::NotAFile { path: source.to_string() });
        }

        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).await.map_err(|e| SandboxError::io(parent, e))?;
        }
        fs::copy(&src, &dst).await.map_err(|e| SandboxError::io(&dst, e))?;
        self.describe(&dst).await
    }

    /// Move or rename a file or directory
    pub async fn rename(&self, source: &str, destination: &str) -> Result<SandboxFile, SandboxError> {
        let src = self.resolve(source)?;
        let dst = self.resolve(destination)?;

        if !src.exists() {
            return Err(SandboxError::NotFound { path: source.to_string() });
        }

        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).await.map_err(|e| SandboxError::io(parent, e))?;
        }
        fs::rename(&src, &dst).await.map_err(|e| SandboxError::io(&dst, e))?;
        self.describe(&dst).await
    }

    /// Find entries matching a glob pattern relative to the root
    pub async fn find(&self, pattern: &str) -> Result<Vec<SandboxFile>, SandboxError> {
        self.ensure_root().await?;
        let pattern = pattern.trim().trim_matches(|c| c == '"' || c == '\'' || c == '`');

        if pattern.is_empty() {
            return Err(SandboxError::Pattern {
                pattern: pattern.to_string(),
                message: "empty pattern".to_string(),
            });
        }
        // Only used for the containment check; wildcards are plain names here
        self.resolve(pattern)?;

        self.glob_entries(&self.rooted_pattern(pattern), false)
    }

    /// Every regular file under the root, recursively
    pub async fn list_all_files(&self) -> Result<Vec<SandboxFile>, SandboxError> {
        self.ensure_root().await?;
        self.glob_entries(&self.rooted_pattern("**/*"), true)
    }

    /// `pattern` anchored at the root, with glob characters in the root
    /// itself taken literally
    fn rooted_pattern(&self, pattern: &str) -> String {
        let root = glob::Pattern::escape(&self.root.to_string_lossy());
        Path::new(&root).join(pattern).to_string_lossy().into_owned()
    }

    fn glob_entries(&self, pattern: &str, files_only: bool) -> Result<Vec<SandboxFile>, SandboxError> {
        let paths = glob::glob(pattern).map_err(|e| SandboxError::Pattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;

        let mut items = Vec::new();
        for path in paths.flatten() {
            if !path.starts_with(&self.root) {
                continue;
            }
            let meta = std::fs::metadata(&path).map_err(|e| SandboxError::io(&path, e))?;
            if files_only && !meta.is_file() {
                continue;
            }
            items.push(SandboxFile::from_metadata(&self.root, &path, &meta));
        }
        Ok(items)
    }

    /// Metadata for a single entry
    pub async fn stat(&self, relative: &str) -> Result<SandboxFile, SandboxError> {
        let path = self.resolve(relative)?;
        if !path.exists() {
            return Err(SandboxError::NotFound { path: relative.to_string() });
        }
        self.describe(&path).await
    }

    /// Write a new file after checking the write policy
    pub async fn create_file(&self, relative: &str, content: &str) -> Result<SandboxFile, SandboxError> {
        let path = self.resolve(relative)?;
        if path == self.root {
            return Err(SandboxError::NotAFile { path: relative.to_string() });
        }

        self.policy.validate_write(&path, content)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| SandboxError::io(parent, e))?;
        }
        fs::write(&path, content).await.map_err(|e| SandboxError::io(&path, e))?;
        debug!(path = %path.display(), bytes = content.len(), "Wrote sandbox file");
        self.describe(&path).await
    }

    /// Read a file as UTF-8 text
    pub async fn read_file(&self, relative: &str) -> Result<String, SandboxError> {
        let path = self.resolve(relative)?;
        if !path.exists() {
            return Err(SandboxError::NotFound { path: relative.to_string() });
        }
        if !path.is_file() {
            return Err(SandboxError::NotAFile { path: relative.to_string() });
        }
        fs::read_to_string(&path).await.map_err(|e| SandboxError::io(&path, e))
    }

    /// Delete a single file
    pub async fn delete_file(&self, relative: &str) -> Result<(), SandboxError> {
        let path = self.resolve(relative)?;
        if !path.exists() {
            return Err(SandboxError::NotFound { path: relative.to_string() });
        }
        if !path.is_file() {
            return Err(SandboxError::NotAFile { path: relative.to_string() });
        }
        fs::remove_file(&path).await.map_err(|e| SandboxError::io(&path, e))
    }

    /// Remove everything under the root, leaving an empty root behind
    pub async fn clean(&self) -> Result<(), SandboxError> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root)
                .await
                .map_err(|e| SandboxError::io(&self.root, e))?;
        }
        self.ensure_root().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_fs() -> (SandboxFs, TempDir) {
        let temp = TempDir::new().unwrap();
        let fs = SandboxFs::new(temp.path().join("sandbox"));
        (fs, temp)
    }

    #[test]
    fn test_resolve_stays_under_root() {
        let (fs, _temp) = create_test_fs();
        let root = fs.root().to_path_buf();

        assert_eq!(fs.resolve("").unwrap(), root);
        assert_eq!(fs.resolve(".").unwrap(), root);
        assert_eq!(fs.resolve("a/b.txt").unwrap(), root.join("a").join("b.txt"));
        assert_eq!(fs.resolve("a/../b.txt").unwrap(), root.join("b.txt"));
        assert_eq!(fs.resolve("'quoted.txt'").unwrap(), root.join("quoted.txt"));
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let (fs, _temp) = create_test_fs();

        assert!(matches!(fs.resolve("../outside.txt"), Err(SandboxError::PathEscape { .. })));
        assert!(matches!(fs.resolve("a/../../x"), Err(SandboxError::PathEscape { .. })));
        assert!(matches!(fs.resolve("/etc/passwd"), Err(SandboxError::PathEscape { .. })));
    }

    #[tokio::test]
    async fn test_create_read_delete_file() {
        let (fs, _temp) = create_test_fs();

        let file = fs.create_file("notes/today.md", "# Today").await.unwrap();
        assert_eq!(file.relative_path, "notes/today.md");
        assert_eq!(file.size_bytes, 7);
        assert!(!file.is_directory);

        assert_eq!(fs.read_file("notes/today.md").await.unwrap(), "# Today");

        fs.delete_file("notes/today.md").await.unwrap();
        assert!(matches!(
            fs.read_file("notes/today.md").await,
            Err(SandboxError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_file_enforces_policy_before_writing() {
        let (fs, _temp) = create_test_fs();

        let result = fs.create_file("tool.exe", "MZ").await;
        assert!(matches!(result, Err(SandboxError::Policy(_))));
        assert!(!fs.root().join("tool.exe").exists());
    }

    #[tokio::test]
    async fn test_create_directory_is_idempotent() {
        let (fs, _temp) = create_test_fs();

        let dir = fs.create_directory("data/raw").await.unwrap();
        assert!(dir.is_directory);
        assert!(fs.create_directory("data/raw").await.is_ok());

        fs.create_file("data/file.txt", "x").await.unwrap();
        assert!(matches!(
            fs.create_directory("data/file.txt").await,
            Err(SandboxError::NotADirectory { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_directory() {
        let (fs, _temp) = create_test_fs();
        fs.create_file("b.txt", "bb").await.unwrap();
        fs.create_file("a.txt", "a").await.unwrap();
        fs.create_directory("sub").await.unwrap();

        let items = fs.list("").await.unwrap();
        let names: Vec<&str> = items.iter().map(|i| i.name()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "sub"]);
        assert!(items[2].is_directory);

        assert!(matches!(fs.list("missing").await, Err(SandboxError::NotFound { .. })));
        assert!(matches!(fs.list("a.txt").await, Err(SandboxError::NotADirectory { .. })));
    }

    #[tokio::test]
    async fn test_copy_and_rename() {
        let (fs, _temp) = create_test_fs();
        fs.create_file("src.txt", "hello").await.unwrap();

        let copied = fs.copy("src.txt", "backup/copy.txt").await.unwrap();
        assert_eq!(copied.relative_path, "backup/copy.txt");
        assert_eq!(fs.read_file("src.txt").await.unwrap(), "hello");

        fs.create_directory("folder").await.unwrap();
        assert!(matches!(fs.copy("folder", "x").await, Err(SandboxError::NotAFile { .. })));

        let moved = fs.rename("src.txt", "moved/dst.txt").await.unwrap();
        assert_eq!(moved.relative_path, "moved/dst.txt");
        assert!(matches!(fs.stat("src.txt").await, Err(SandboxError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_find_and_list_all() {
        let (fs, _temp) = create_test_fs();
        fs.create_file("one.py", "1").await.unwrap();
        fs.create_file("pkg/two.py", "2").await.unwrap();
        fs.create_file("readme.md", "r").await.unwrap();

        let top = fs.find("*.py").await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].relative_path, "one.py");

        let all_py = fs.find("**/*.py").await.unwrap();
        assert_eq!(all_py.len(), 2);

        let all = fs.list_all_files().await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|f| !f.is_directory));

        assert!(matches!(fs.find("../*").await, Err(SandboxError::PathEscape { .. })));
    }

    #[tokio::test]
    async fn test_find_under_root_with_glob_characters() {
        let temp = TempDir::new().unwrap();
        let fs = SandboxFs::new(temp.path().join("ws[1]*?"));
        fs.create_file("a.txt", "a").await.unwrap();
        fs.create_file("deep/b.txt", "b").await.unwrap();

        let found = fs.find("*.txt").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].relative_path, "a.txt");

        assert_eq!(fs.list_all_files().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_clean_empties_root() {
        let (fs, _temp) = create_test_fs();
        fs.create_file("a.txt", "a").await.unwrap();
        fs.clean().await.unwrap();

        assert!(fs.root().exists());
        assert!(fs.list("").await.unwrap().is_empty());
    }
}
