//! Orchestrator Integration Tests
//!
//! End-to-end runs against a scripted model and a scripted executor:
//! delegation, per-specialist flows, retry bounds and trace ids.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;

use nova::adapters::{BackendError, Page, PageFetcher, ScriptedModel, SimulatedSearch};
use nova::core::{Backends, Orchestrator, WorkflowState};
use nova::domain::{Specialist, Task, TraceStep};
use nova::sandbox::{ExecutionResult, ExecutionStatus, Executor, Job, JobKind, Sandbox};
use nova::specialists::MODEL_UNAVAILABLE;

const DELEGATION: &str = "delegate the following task";

/// Serves queued results in order; the last one repeats
struct ScriptedExecutor {
    results: Mutex<Vec<ExecutionResult>>,
    jobs: Mutex<Vec<Job>>,
}

impl ScriptedExecutor {
    fn new(results: Vec<ExecutionResult>) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(results),
            jobs: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn execute(&self, job: &Job) -> ExecutionResult {
        self.jobs.lock().unwrap().push(job.clone());
        let mut results = self.results.lock().unwrap();
        if results.len() > 1 {
            results.remove(0)
        } else {
            results.first().cloned().unwrap_or_else(|| outcome(ExecutionStatus::Success, "", ""))
        }
    }
}

fn outcome(status: ExecutionStatus, stdout: &str, stderr: &str) -> ExecutionResult {
    ExecutionResult {
        status,
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
        exit_code: match status {
            ExecutionStatus::Success => Some(0),
            ExecutionStatus::Error => Some(1),
            ExecutionStatus::Timeout => None,
        },
        duration_ms: 1,
        file_id: None,
        file_path: None,
    }
}

struct NoPages;

#[async_trait]
impl PageFetcher for NoPages {
    fn name(&self) -> &str {
        "none"
    }

    async fn browse(&self, url: &str) -> Result<Page, BackendError> {
        Err(BackendError::Status {
            status: 503,
            url: url.to_string(),
        })
    }
}

fn orchestrator(model: &Arc<ScriptedModel>, executor: &Arc<ScriptedExecutor>, temp: &TempDir) -> Orchestrator {
    let backends = Backends::new(model.clone(), Arc::new(SimulatedSearch), Arc::new(NoPages));
    let sandbox = Sandbox::new(temp.path()).with_executor(executor.clone());
    Orchestrator::new(backends, Arc::new(sandbox))
}

fn coder_model() -> ScriptedModel {
    ScriptedModel::new()
        .on(DELEGATION, "The Coder should write this.")
        .on("i executed the following python code", "Looks fine.")
        .on(
            "debug the following python code",
            "The call was missing a parenthesis.\n```python\nprint('fixed')\n```",
        )
        .on("write python code", "```python\nprint(broken\n```\nPrints a greeting.")
}

#[tokio::test]
async fn test_coder_adopts_debugged_code_on_success() {
    let temp = TempDir::new().unwrap();
    let model = Arc::new(coder_model());
    let executor = ScriptedExecutor::new(vec![
        outcome(ExecutionStatus::Error, "", "SyntaxError: '(' was never closed"),
        outcome(ExecutionStatus::Success, "fixed\n", ""),
    ]);
    let mut orch = orchestrator(&model, &executor, &temp);

    let output = orch.run(Task::new("Write code that greets")).await;

    assert_eq!(output.decision.specialist, Specialist::Coder);
    assert_eq!(executor.calls(), 2);
    assert_eq!(model.count_matching("debug the following python code"), 1);
    assert!(output.result.contains("```python\nprint('fixed')\n```"));
    assert!(output.result.contains("Status: success"));
    assert!(output.result.contains("Debug Notes"));
    assert!(output.trace.files.iter().any(|f| f.payload.path == "solution.py"));

    // Execution metadata carries lengths, never the code itself
    let executions: Vec<_> = output
        .trace
        .events
        .iter()
        .filter_map(|e| match &e.step {
            TraceStep::Execution { action, result } => Some((action.clone(), result.clone())),
            _ => None,
        })
        .collect();
    assert!(executions.contains(&(
        "execute_debugged_code".to_string(),
        json!({ "status": "success", "output_length": 6 })
    )));
}

#[tokio::test]
async fn test_coder_debug_failure_stops_after_second_run() {
    let temp = TempDir::new().unwrap();
    let model = Arc::new(coder_model());
    let executor = ScriptedExecutor::new(vec![
        outcome(ExecutionStatus::Error, "", "SyntaxError: '(' was never closed"),
        outcome(ExecutionStatus::Error, "", "NameError: name 'x' is not defined"),
    ]);
    let mut orch = orchestrator(&model, &executor, &temp);

    let output = orch.run(Task::new("Write code that greets")).await;

    assert_eq!(executor.calls(), 2);
    assert_eq!(model.count_matching("debug the following python code"), 1);
    assert!(output.result.contains("print(broken"));
    assert!(output.result.contains("Status: error"));
    assert!(output.result.contains("NameError"));
    assert!(!output.result.contains("Debug Notes"));
}

#[tokio::test]
async fn test_coder_timeout_is_not_retried() {
    let temp = TempDir::new().unwrap();
    let model = Arc::new(coder_model());
    let executor = ScriptedExecutor::new(vec![outcome(ExecutionStatus::Timeout, "", "Execution timed out")]);
    let mut orch = orchestrator(&model, &executor, &temp);

    let output = orch.run(Task::new("Write code that loops forever")).await;

    assert_eq!(executor.calls(), 1);
    assert_eq!(model.count_matching("debug the following python code"), 0);
    assert!(output.result.contains("Status: timeout"));
}

#[tokio::test]
async fn test_file_manager_rejects_extension_before_writing() {
    let temp = TempDir::new().unwrap();
    let model = Arc::new(
        ScriptedModel::new()
            .on(DELEGATION, "The File Manager handles this.")
            .on("extract file information", "File path: tool.exe\nContent: MZ\nFile type: binary"),
    );
    let executor = ScriptedExecutor::new(vec![]);
    let mut orch = orchestrator(&model, &executor, &temp);

    let output = orch.run(Task::new("Create a file called tool.exe")).await;

    assert_eq!(output.task_records[0].specialist, Specialist::FileManager);
    assert!(output.result.starts_with("Error:"));
    assert!(output.result.contains(".exe"));
    assert!(!temp.path().join("tool.exe").exists());
    assert_eq!(model.count_matching("review this content"), 0);
}

#[tokio::test]
async fn test_file_manager_creates_reviewed_file() {
    let temp = TempDir::new().unwrap();
    let model = Arc::new(
        ScriptedModel::new()
            .on(DELEGATION, "The File Manager handles this.")
            .on("extract file information", "File path: notes/todo.txt\nContent:\nbuy milk\nFile type: text")
            .on("review this content", "Looks good as is."),
    );
    let executor = ScriptedExecutor::new(vec![]);
    let mut orch = orchestrator(&model, &executor, &temp);

    let output = orch.run(Task::new("Save a todo list")).await;

    assert!(output.result.starts_with("# File Created"));
    assert_eq!(
        std::fs::read_to_string(temp.path().join("notes/todo.txt")).unwrap(),
        "buy milk"
    );
    assert!(output.trace.files.iter().any(|f| f.payload.path == "notes/todo.txt"));
}

#[tokio::test]
async fn test_file_manager_falls_back_to_supervisor() {
    let temp = TempDir::new().unwrap();
    let model = Arc::new(
        ScriptedModel::new()
            .on(DELEGATION, "Use the file manager.")
            .with_default("Here is what I know."),
    );
    let executor = ScriptedExecutor::new(vec![]);
    let mut orch = orchestrator(&model, &executor, &temp);

    let output = orch.run(Task::new("Tell me about my files")).await;

    assert_eq!(output.decision.specialist, Specialist::FileManager);
    assert_eq!(output.task_records[0].specialist, Specialist::Supervisor);
    assert_eq!(output.result, "Here is what I know.");
    assert_eq!(orch.state(), WorkflowState::Completed);
}

#[tokio::test]
async fn test_model_failure_routes_to_supervisor() {
    let temp = TempDir::new().unwrap();
    let model = Arc::new(ScriptedModel::new().failing());
    let executor = ScriptedExecutor::new(vec![]);
    let mut orch = orchestrator(&model, &executor, &temp);

    let output = orch.run(Task::new("Run the tests and write code")).await;

    assert_eq!(output.decision.specialist, Specialist::Supervisor);
    assert_eq!(output.result, MODEL_UNAVAILABLE);
    assert_eq!(executor.calls(), 0);
}

#[tokio::test]
async fn test_fresh_orchestrators_start_ids_at_one() {
    for task in ["First task", "Second task"] {
        let temp = TempDir::new().unwrap();
        let model = Arc::new(ScriptedModel::new().with_default("Answered."));
        let executor = ScriptedExecutor::new(vec![]);
        let mut orch = orchestrator(&model, &executor, &temp);

        let output = orch.run(Task::new(task)).await;

        let ids: Vec<u64> = output.trace.events.iter().map(|e| e.id).collect();
        let expected: Vec<u64> = (1..=ids.len() as u64).collect();
        assert_eq!(ids, expected);
        assert!(output
            .trace
            .events
            .windows(2)
            .all(|w| w[0].elapsed_ms <= w[1].elapsed_ms));
    }
}

#[tokio::test]
async fn test_plan_comes_from_reasoning_lines() {
    let temp = TempDir::new().unwrap();
    let model = Arc::new(
        ScriptedModel::new()
            .on(DELEGATION, "**Reasoning:**\n\n  Nothing special needed.  \n")
            .with_default("Done."),
    );
    let executor = ScriptedExecutor::new(vec![]);
    let mut orch = orchestrator(&model, &executor, &temp);

    let output = orch.run(Task::new("Say something")).await;

    let first_plan = output.trace.events.iter().find_map(|e| match &e.step {
        TraceStep::Plan { items } => Some(items.clone()),
        _ => None,
    });
    assert_eq!(
        first_plan,
        Some(vec!["**Reasoning:**".to_string(), "Nothing special needed.".to_string()])
    );
}

#[tokio::test]
async fn test_research_registers_links() {
    let temp = TempDir::new().unwrap();
    let model = Arc::new(
        ScriptedModel::new()
            .on(DELEGATION, "The Researcher should look into this.")
            .on("search results", "Rust is popular."),
    );
    let executor = ScriptedExecutor::new(vec![]);
    let mut orch = orchestrator(&model, &executor, &temp);

    let output = orch.run(Task::new("Why do people like Rust?")).await;
    let expected = SimulatedSearch::results("Why do people like Rust?", 5).len();

    assert_eq!(output.decision.specialist, Specialist::Researcher);
    assert_eq!(output.trace.links.len(), expected);
    assert!(output.trace.events.iter().any(|e| matches!(
        &e.step,
        TraceStep::Execution { action, result }
            if action == "web_search" && result["result_count"] == json!(expected)
    )));
}

#[tokio::test]
async fn test_sandbox_creates_directory() {
    let temp = TempDir::new().unwrap();
    let model = Arc::new(
        ScriptedModel::new()
            .on(DELEGATION, "The Sandbox agent fits.")
            .on("extract a file or directory path", "reports"),
    );
    let executor = ScriptedExecutor::new(vec![]);
    let mut orch = orchestrator(&model, &executor, &temp);

    let output = orch.run(Task::new("Create directory reports")).await;

    assert!(output.result.starts_with("# Directory Created\n\nPath: reports"));
    assert!(temp.path().join("reports").is_dir());
}

#[tokio::test]
async fn test_sandbox_runs_command_through_executor() {
    let temp = TempDir::new().unwrap();
    let model = Arc::new(
        ScriptedModel::new()
            .on(DELEGATION, "The Sandbox agent fits.")
            .on("extract a shell command", "```bash\necho hi\n```")
            .with_default("It printed hi."),
    );
    let executor = ScriptedExecutor::new(vec![outcome(ExecutionStatus::Success, "hi\n", "")]);
    let mut orch = orchestrator(&model, &executor, &temp);

    let output = orch.run(Task::new("Run the command echo hi")).await;

    assert!(output.result.starts_with("# Command Execution Result"));
    assert!(output.result.contains("```bash\necho hi\n```"));
    assert!(output.result.ends_with("## Analysis\n\nIt printed hi."));
    let jobs = executor.jobs();
    assert_eq!(jobs.len(), 1);
    assert!(matches!(&jobs[0].kind, JobKind::Command { line } if line == "echo hi"));
}

#[tokio::test]
async fn test_sandbox_asks_for_clarification() {
    let temp = TempDir::new().unwrap();
    let model = Arc::new(ScriptedModel::new().on(DELEGATION, "The Sandbox agent fits."));
    let executor = ScriptedExecutor::new(vec![]);
    let mut orch = orchestrator(&model, &executor, &temp);

    let output = orch.run(Task::new("Hello there")).await;

    assert!(output.result.starts_with("I'm not sure if you want me to execute Python code"));
    assert_eq!(model.prompts().len(), 1);
    assert_eq!(executor.calls(), 0);
}

#[tokio::test]
async fn test_sandbox_reports_timeout_with_partial_output() {
    let temp = TempDir::new().unwrap();
    let model = Arc::new(
        ScriptedModel::new()
            .on(DELEGATION, "The Sandbox agent fits.")
            .on("extract a shell command", "```bash\necho oops >&2; sleep 5\n```")
            .with_default("It ran too long."),
    );
    let backends = Backends::new(model.clone(), Arc::new(SimulatedSearch), Arc::new(NoPages));
    let sandbox = Sandbox::new(temp.path()).with_timeout(Duration::from_millis(500));
    let mut orch = Orchestrator::new(backends, Arc::new(sandbox));

    let started = Instant::now();
    let output = orch.run(Task::new("Run the command that sleeps")).await;

    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(output.result.contains("Execution timed out after 0.5 seconds."));
    assert!(output.result.contains("Partial error output:\n```\noops\n"));
    assert!(!output.result.contains("Error:\n"));
    assert!(output.trace.events.iter().any(|e| matches!(
        &e.step,
        TraceStep::Thought { text, .. } if text == "Command execution timed out."
    )));
}

#[tokio::test]
async fn test_sandbox_timeout_without_output_is_not_an_error() {
    let temp = TempDir::new().unwrap();
    let model = Arc::new(
        ScriptedModel::new()
            .on(DELEGATION, "The Sandbox agent fits.")
            .on("extract a shell command", "sleep 60")
            .with_default("It ran too long."),
    );
    let executor = ScriptedExecutor::new(vec![outcome(
        ExecutionStatus::Timeout,
        "",
        "Execution timed out after 30 seconds",
    )]);
    let mut orch = orchestrator(&model, &executor, &temp);

    let output = orch.run(Task::new("Run the command sleep 60")).await;

    assert!(output
        .result
        .contains("Execution timed out after 30 seconds.\n\n## Analysis\n\nIt ran too long."));
    assert!(!output.result.contains("Partial"));
    assert_eq!(executor.calls(), 1);
}

#[tokio::test]
async fn test_browser_without_url_asks_for_one() {
    let temp = TempDir::new().unwrap();
    let model = Arc::new(
        ScriptedModel::new()
            .on(DELEGATION, "The Browser agent fits.")
            .on("extract a url", "Not found"),
    );
    let executor = ScriptedExecutor::new(vec![]);
    let mut orch = orchestrator(&model, &executor, &temp);

    let output = orch.run(Task::new("Visit my favourite page")).await;

    assert_eq!(output.decision.specialist, Specialist::Browser);
    assert!(output.result.starts_with("I couldn't determine which URL to visit"));
    assert!(output.trace.links.is_empty());
    assert_eq!(model.count_matching("analyze the content of the webpage"), 0);
}

#[tokio::test]
async fn test_browser_fetch_error_becomes_error_text() {
    let temp = TempDir::new().unwrap();
    let model = Arc::new(
        ScriptedModel::new()
            .on(DELEGATION, "The Browser agent fits.")
            .on("extract a url", "URL: example.com/docs"),
    );
    let executor = ScriptedExecutor::new(vec![]);
    let mut orch = orchestrator(&model, &executor, &temp);

    let output = orch.run(Task::new("Visit example.com/docs")).await;

    assert_eq!(output.result, "Error: HTTP 503 from https://example.com/docs");
    assert!(output.trace.links.is_empty());
    assert!(output.trace.events.iter().any(|e| matches!(
        &e.step,
        TraceStep::Execution { action, result }
            if action == "browse" && result["status"] == json!("error")
    )));
    assert_eq!(orch.state(), WorkflowState::Completed);
}
