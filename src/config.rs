//! Configuration for nova.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (NOVA_HOME, NOVA_SANDBOX, NOVA_LLM_BASE_URL, NOVA_LLM_MODEL)
//! 2. Config file (.nova/config.yaml)
//! 3. Defaults (~/.nova)
//!
//! Config file discovery:
//! - Searches current directory and parents for .nova/config.yaml
//! - `paths.home` is relative to the .nova/ directory, `paths.sandbox` to
//!   the project root (the parent of .nova/)

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::policy::FilePolicy;
use crate::domain::ThinkingMode;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const CONFIG_DIR: &str = ".nova";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub sandbox: SandboxSettings,
    #[serde(default)]
    pub files: FilePolicy,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub trace: TraceSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Engine state directory (relative to .nova/)
    pub home: Option<String>,
    /// Sandbox root (relative to the project root)
    pub sandbox: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    /// OpenAI-compatible chat completions endpoint
    #[default]
    OpenAi,
    /// Prompt piped to a command-line tool
    Command,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub backend: LlmBackend,
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Command line for the `command` backend, e.g. `ollama run llama3`
    pub command: Option<String>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            backend: LlmBackend::OpenAi,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            command: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxSettings {
    pub timeout_seconds: u64,
    pub python: String,
    pub shell: String,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            python: "python3".to_string(),
            shell: "sh".to_string(),
        }
    }
}

impl SandboxSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchBackendKind {
    #[default]
    DuckDuckGo,
    Simulated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub backend: SearchBackendKind,
    pub max_results: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            backend: SearchBackendKind::DuckDuckGo,
            max_results: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceSettings {
    pub mode: ThinkingMode,
    /// Record log output as terminal lines in the trace
    pub capture_terminal: bool,
    /// Write each run's trace under the runs directory
    pub persist: bool,
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            mode: ThinkingMode::Normal,
            capture_terminal: true,
            persist: true,
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// Absolute path to nova home (engine state)
    pub home: PathBuf,
    /// Sandbox root directory
    pub sandbox_dir: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub llm: LlmSettings,
    pub sandbox: SandboxSettings,
    pub files: FilePolicy,
    pub search: SearchSettings,
    pub trace: TraceSettings,
}

impl ResolvedConfig {
    pub fn runs_dir(&self) -> PathBuf {
        self.home.join("runs")
    }
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's location
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Merge defaults, an optional config file and environment lookups
fn resolve(
    default_home: PathBuf,
    file: Option<(PathBuf, ConfigFile)>,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedConfig {
    let (config_file, config) = match file {
        Some((path, config)) => (Some(path), config),
        None => (None, ConfigFile::default()),
    };

    // .nova/ and the project root above it
    let nova_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(Path::new("."));
    let base_dir = nova_dir.parent().unwrap_or(Path::new("."));

    let home = if let Some(env_home) = env("NOVA_HOME") {
        PathBuf::from(env_home)
    } else if let (Some(home_path), Some(_)) = (&config.paths.home, &config_file) {
        resolve_path(nova_dir, home_path)
    } else {
        default_home
    };

    let sandbox_dir = if let Some(env_sandbox) = env("NOVA_SANDBOX") {
        PathBuf::from(env_sandbox)
    } else if let (Some(sandbox_path), Some(_)) = (&config.paths.sandbox, &config_file) {
        resolve_path(base_dir, sandbox_path)
    } else {
        home.join("sandbox")
    };

    let mut llm = config.llm;
    if let Some(base_url) = env("NOVA_LLM_BASE_URL") {
        llm.base_url = base_url;
    }
    if let Some(model) = env("NOVA_LLM_MODEL") {
        llm.model = model;
    }

    ResolvedConfig {
        home,
        sandbox_dir,
        config_file,
        llm,
        sandbox: config.sandbox,
        files: config.files,
        search: config.search,
        trace: config.trace,
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(CONFIG_DIR);

    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    let file = match find_config_file(&cwd) {
        Some(path) => {
            let config = load_config_file(&path)?;
            Some((path, config))
        }
        None => None,
    };

    Ok(resolve(default_home, file, |key| std::env::var(key).ok()))
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Get the runs directory ($NOVA_HOME/runs)
pub fn runs_dir() -> Result<PathBuf> {
    Ok(config()?.runs_dir())
}
