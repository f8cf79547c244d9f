//! Command-line interface for nova.
//!
//! Provides commands for running tasks, listing and inspecting past runs,
//! managing the sandbox, and showing the resolved configuration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use uuid::Uuid;

use crate::adapters::{
    CommandModel, DuckDuckGoSearch, HttpBrowser, LanguageModel, OpenAiModel, SearchBackend, SimulatedSearch,
};
use crate::config::{self, LlmBackend, ResolvedConfig, SearchBackendKind};
use crate::core::{Backends, Orchestrator, RunSummary, TraceStore};
use crate::domain::{Task, ThinkingMode, TraceStep};
use crate::sandbox::{Sandbox, SubprocessExecutor};

/// Page fetches are bounded; model calls are not
const BROWSE_TIMEOUT: Duration = Duration::from_secs(30);

/// nova - Task orchestration engine
#[derive(Parser, Debug)]
#[command(name = "nova")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a task
    Run {
        /// Task description
        task: String,

        /// Additional context for the task
        #[arg(short, long)]
        context: Option<String>,

        /// Thinking mode (defaults to the configured mode)
        #[arg(short, long, value_enum)]
        mode: Option<ModeArg>,

        /// Sandbox directory (overrides configuration)
        #[arg(long)]
        sandbox: Option<PathBuf>,

        /// Print the full output as JSON
        #[arg(long)]
        json: bool,

        /// Do not record log output in the trace
        #[arg(long)]
        no_capture: bool,
    },

    /// List recent runs
    Runs {
        /// Maximum number of runs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show details of a run
    Show {
        /// Run ID (UUID)
        run_id: String,

        /// Print every trace event
        #[arg(short, long)]
        events: bool,
    },

    /// Inspect or reset the sandbox
    Sandbox {
        #[command(subcommand)]
        command: SandboxCommands,
    },

    /// Show resolved configuration (debug)
    Config,
}

#[derive(Subcommand, Debug)]
pub enum SandboxCommands {
    /// List every file in the sandbox
    Ls,

    /// Delete everything in the sandbox
    Clean,
}

/// Thinking mode for CLI (maps to ThinkingMode)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Normal,
    Deep,
    SuperDeep,
}

impl From<ModeArg> for ThinkingMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Normal => ThinkingMode::Normal,
            ModeArg::Deep => ThinkingMode::Deep,
            ModeArg::SuperDeep => ThinkingMode::SuperDeep,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run {
                task,
                context,
                mode,
                sandbox,
                json,
                no_capture,
            } => run_task(task, context, mode, sandbox, json, no_capture).await,
            Commands::Runs { limit } => list_runs(limit).await,
            Commands::Show { run_id, events } => show_run(&run_id, events).await,
            Commands::Sandbox { command } => execute_sandbox(command).await,
            Commands::Config => show_config(),
        }
    }
}

/// Build the language model, search backend and page fetcher from config
pub fn build_backends(cfg: &ResolvedConfig) -> Result<Backends> {
    let llm: Arc<dyn LanguageModel> = match cfg.llm.backend {
        LlmBackend::OpenAi => {
            let mut model = OpenAiModel::new(&cfg.llm.base_url, cfg.llm.model.clone());
            if let Ok(key) = std::env::var(&cfg.llm.api_key_env) {
                model = model.with_api_key(key);
            }
            Arc::new(model)
        }
        LlmBackend::Command => {
            let line = cfg
                .llm
                .command
                .as_deref()
                .context("llm.command must be set for the command backend")?;
            Arc::new(
                CommandModel::from_command_line(line)
                    .with_context(|| format!("Invalid llm.command: '{}'", line))?,
            )
        }
    };

    let search: Arc<dyn SearchBackend> = match cfg.search.backend {
        SearchBackendKind::DuckDuckGo => {
            Arc::new(DuckDuckGoSearch::new().context("Failed to create search client")?)
        }
        SearchBackendKind::Simulated => Arc::new(SimulatedSearch),
    };

    let fetcher = HttpBrowser::new(BROWSE_TIMEOUT).context("Failed to create browser client")?;

    Ok(Backends::new(llm, search, Arc::new(fetcher)).with_max_results(cfg.search.max_results))
}

/// Build the sandbox from config, rooted at `root` when given
pub fn build_sandbox(cfg: &ResolvedConfig, root: Option<PathBuf>) -> Sandbox {
    let root = root.unwrap_or_else(|| cfg.sandbox_dir.clone());
    Sandbox::new(root)
        .with_executor(Arc::new(SubprocessExecutor::new(
            cfg.sandbox.python.clone(),
            cfg.sandbox.shell.clone(),
        )))
        .with_timeout(cfg.sandbox.timeout())
        .with_policy(cfg.files.clone())
}

/// Run one task and print its result
async fn run_task(
    description: String,
    context: Option<String>,
    mode: Option<ModeArg>,
    sandbox_dir: Option<PathBuf>,
    json: bool,
    no_capture: bool,
) -> Result<()> {
    if description.trim().is_empty() {
        anyhow::bail!("Task is empty");
    }

    let cfg = config::config()?;
    let backends = build_backends(cfg)?;

    let sandbox = build_sandbox(cfg, sandbox_dir);
    sandbox
        .fs()
        .ensure_root()
        .await
        .with_context(|| format!("Failed to prepare sandbox: {}", sandbox.root().display()))?;

    let trace_dir = if cfg.trace.persist {
        Some(cfg.runs_dir())
    } else {
        None
    };

    let mut orchestrator = Orchestrator::new(backends, Arc::new(sandbox))
        .with_mode(mode.map(Into::into).unwrap_or(cfg.trace.mode))
        .with_capture(cfg.trace.capture_terminal && !no_capture, true)
        .with_trace_dir(trace_dir);

    let mut task = Task::new(description);
    if let Some(ctx) = context {
        task = task.with_context(ctx);
    }

    let output = orchestrator.run(task).await;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialize output")?
        );
    } else {
        println!("{}", output.result);
        let specialist = output
            .task_records
            .last()
            .map(|r| r.specialist)
            .unwrap_or(output.decision.specialist);
        eprintln!(
            "\n[Run {} handled by {} in {} events]",
            output.run_id,
            specialist,
            output.trace.events.len()
        );
    }

    Ok(())
}

async fn load_summaries() -> Result<Vec<RunSummary>> {
    let mut summaries = Vec::new();
    for run_id in TraceStore::list_runs().await? {
        let store = TraceStore::open(run_id).await?;
        if let Some(summary) = store.load_summary().await? {
            summaries.push(summary);
        }
    }
    summaries.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    Ok(summaries)
}

/// List recent runs
async fn list_runs(limit: usize) -> Result<()> {
    let summaries = load_summaries().await?;

    if summaries.is_empty() {
        println!("No runs found");
        return Ok(());
    }

    println!("{:<38} {:<14} {:<20} {}", "RUN ID", "SPECIALIST", "STARTED", "TASK");
    println!("{}", "-".repeat(100));

    for summary in summaries.iter().take(limit) {
        println!(
            "{:<38} {:<14} {:<20} {}",
            summary.run_id,
            summary.specialist.display_name(),
            summary.started_at.format("%Y-%m-%d %H:%M:%S"),
            crate::specialists::extract::truncate_chars(&summary.task, 40)
        );
    }

    Ok(())
}

/// Show one run's summary, artifacts and optionally its events
async fn show_run(run_id_str: &str, show_events: bool) -> Result<()> {
    let run_id = Uuid::parse_str(run_id_str).with_context(|| format!("Invalid run ID: {}", run_id_str))?;

    let store = TraceStore::open(run_id).await?;
    let summary = store
        .load_summary()
        .await?
        .with_context(|| format!("Run not found: {}", run_id))?;

    println!("Run ID:     {}", summary.run_id);
    println!("Task:       {}", summary.task);
    println!("Specialist: {}", summary.specialist.display_name());
    println!("Mode:       {}", summary.mode);
    println!("Started:    {}", summary.started_at);
    println!(
        "Duration:   {}ms",
        (summary.ended_at - summary.started_at).num_milliseconds()
    );
    println!("Events:     {}", summary.event_count);

    let artifacts = store.load_artifacts().await?;
    if !artifacts.links.is_empty() {
        println!("\nLinks:");
        for link in &artifacts.links {
            println!("  [{}] {} ({})", link.id, link.payload.title, link.payload.url);
        }
    }
    if !artifacts.files.is_empty() {
        println!("\nFiles:");
        for file in &artifacts.files {
            println!("  [{}] {}", file.id, file.payload.path);
        }
    }

    if show_events {
        println!("\nEvents:");
        for event in store.replay().await? {
            let indent = match &event.step {
                TraceStep::Thought { depth, .. } => "  ".repeat(*depth as usize),
                _ => String::new(),
            };
            println!(
                "  {:>4} {:>7}ms {:<16} {}{}",
                event.id,
                event.elapsed_ms,
                format!("{:?}", event.kind()),
                indent,
                event.step.summary()
            );
        }
    }

    println!("\nResult:\n\n{}", summary.result);
    Ok(())
}

/// Execute sandbox subcommands
async fn execute_sandbox(command: SandboxCommands) -> Result<()> {
    let cfg = config::config()?;
    let sandbox = build_sandbox(cfg, None);

    match command {
        SandboxCommands::Ls => {
            sandbox.fs().ensure_root().await?;
            let files = sandbox.list_all_files().await?;
            if files.is_empty() {
                println!("Sandbox is empty: {}", sandbox.root().display());
                return Ok(());
            }
            for file in files {
                println!("{:>10}  {}", file.size_bytes, file.relative_path);
            }
        }
        SandboxCommands::Clean => {
            sandbox.clean().await?;
            eprintln!("Sandbox cleaned: {}", sandbox.root().display());
        }
    }

    Ok(())
}

/// Show the resolved configuration (for debugging)
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("nova configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:    {}", cfg.home.display());
    println!("  Runs:    {}", cfg.runs_dir().display());
    println!("  Sandbox: {}", cfg.sandbox_dir.display());
    println!();
    println!("Language model:");
    println!("  Backend:  {:?}", cfg.llm.backend);
    match cfg.llm.backend {
        LlmBackend::OpenAi => {
            println!("  Base URL: {}", cfg.llm.base_url);
            println!("  Model:    {}", cfg.llm.model);
            println!("  API key:  ${}", cfg.llm.api_key_env);
        }
        LlmBackend::Command => {
            println!("  Command:  {}", cfg.llm.command.as_deref().unwrap_or("(unset)"));
        }
    }
    println!();
    println!("Sandbox:");
    println!("  Timeout:  {}s", cfg.sandbox.timeout_seconds);
    println!("  Python:   {}", cfg.sandbox.python);
    println!("  Shell:    {}", cfg.sandbox.shell);
    println!();
    println!("Files:");
    println!("  Max size:   {} bytes", cfg.files.max_file_bytes);
    println!("  Extensions: {}", cfg.files.allowed_extensions.join(" "));
    println!("  Denylist:   {}", cfg.files.denylist_patterns.join(" "));
    println!();
    println!("Search: {:?} ({} results)", cfg.search.backend, cfg.search.max_results);
    println!(
        "Trace:  mode {}, capture {}, persist {}",
        cfg.trace.mode, cfg.trace.capture_terminal, cfg.trace.persist
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_command() {
        let cli = Cli::try_parse_from([
            "nova",
            "run",
            "Write a script",
            "--mode",
            "super-deep",
            "--json",
            "--no-capture",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                task,
                mode,
                json,
                no_capture,
                ..
            } => {
                assert_eq!(task, "Write a script");
                assert!(matches!(mode, Some(ModeArg::SuperDeep)));
                assert!(json);
                assert!(no_capture);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_sandbox_command() {
        let cli = Cli::try_parse_from(["nova", "sandbox", "clean"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Sandbox {
                command: SandboxCommands::Clean
            }
        ));
    }

    #[test]
    fn test_mode_arg_conversion() {
        assert_eq!(ThinkingMode::from(ModeArg::Deep), ThinkingMode::Deep);
    }
}
