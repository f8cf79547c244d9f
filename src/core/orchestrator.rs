//! Main orchestrator for task execution.
//!
//! Drives the workflow state machine: open a trace session, delegate the
//! task, dispatch it to the chosen specialist flow, record the outcome and
//! optionally persist the trace.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use tracing::instrument::WithSubscriber;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{LanguageModel, PageFetcher, SearchBackend};
use crate::domain::{DelegationDecision, Message, Specialist, Task, TaskRecord, ThinkingMode};
use crate::sandbox::Sandbox;
use crate::specialists::{Browser, Coder, FileManager, Researcher, SandboxAgent, Supervisor};

use super::capture::capture_subscriber;
use super::delegator::Delegator;
use super::flows;
use super::trace::{TraceRecorder, TraceSnapshot};
use super::trace_store::{RunArtifacts, RunSummary, TraceStore};

const DEFAULT_MAX_RESULTS: usize = 5;

/// Where the workflow currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "specialist")]
pub enum WorkflowState {
    Idle,
    Delegating,
    Executing(Specialist),
    Completed,
}

/// External services shared by the specialists
#[derive(Clone)]
pub struct Backends {
    pub llm: Arc<dyn LanguageModel>,
    pub search: Arc<dyn SearchBackend>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub max_results: usize,
}

impl Backends {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        search: Arc<dyn SearchBackend>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        Self {
            llm,
            search,
            fetcher,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }
}

struct Team {
    researcher: Researcher,
    coder: Coder,
    file_manager: FileManager,
    browser: Browser,
    sandbox: SandboxAgent,
    supervisor: Supervisor,
}

impl Team {
    fn new(backends: &Backends, sandbox: Arc<Sandbox>) -> Self {
        let llm = &backends.llm;
        Self {
            researcher: Researcher::new(llm.clone(), backends.search.clone(), backends.max_results),
            coder: Coder::new(llm.clone(), sandbox.clone()),
            file_manager: FileManager::new(llm.clone(), sandbox.clone()),
            browser: Browser::new(
                llm.clone(),
                backends.fetcher.clone(),
                backends.search.clone(),
                backends.max_results,
            ),
            sandbox: SandboxAgent::new(llm.clone(), sandbox),
            supervisor: Supervisor::new(llm.clone()),
        }
    }
}

/// Everything one `run` produced
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowOutput {
    pub run_id: Uuid,
    /// Conversation history across every run on this orchestrator
    pub history: Vec<Message>,
    pub task_records: Vec<TaskRecord>,
    pub result: String,
    pub decision: DelegationDecision,
    pub trace: TraceSnapshot,
}

/// Main task orchestrator
pub struct Orchestrator {
    delegator: Delegator,
    team: Team,
    trace: TraceRecorder,
    mode: ThinkingMode,
    state: WorkflowState,
    history: Vec<Message>,
    records: Vec<TaskRecord>,
    capture: bool,
    echo: bool,
    trace_dir: Option<PathBuf>,
}

impl Orchestrator {
    /// Create an orchestrator owning its own trace recorder
    pub fn new(backends: Backends, sandbox: Arc<Sandbox>) -> Self {
        let mode = ThinkingMode::default();
        Self {
            delegator: Delegator::new(backends.llm.clone()),
            team: Team::new(&backends, sandbox),
            trace: TraceRecorder::new(mode),
            mode,
            state: WorkflowState::Idle,
            history: Vec::new(),
            records: Vec::new(),
            capture: false,
            echo: false,
            trace_dir: None,
        }
    }

    pub fn with_mode(mut self, mode: ThinkingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Record log lines emitted during a run as terminal output.
    /// With `echo`, captured lines are also written to stderr.
    pub fn with_capture(mut self, enabled: bool, echo: bool) -> Self {
        self.capture = enabled;
        self.echo = echo;
        self
    }

    /// Persist each run's trace under this directory
    pub fn with_trace_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.trace_dir = dir;
        self
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn records(&self) -> &[TaskRecord] {
        &self.records
    }

    pub fn trace(&self) -> &TraceRecorder {
        &self.trace
    }

    /// Handle one task end to end. Specialist failures end up in the result
    /// text; this never fails.
    #[instrument(skip(self, task), fields(mode = %self.mode))]
    pub async fn run(&mut self, task: Task) -> WorkflowOutput {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, "Starting task");

        self.trace.start_session(&task.description, self.mode);
        self.history.push(Message::user(task.description.clone()));

        let (decision, specialist, result) = if self.capture {
            let subscriber = capture_subscriber(&self.trace, self.echo);
            self.execute(&task).with_subscriber(subscriber).await
        } else {
            self.execute(&task).await
        };

        self.records.push(TaskRecord {
            task: task.clone(),
            specialist,
            result: result.clone(),
            started_at,
            ended_at: Utc::now(),
        });
        self.history.push(Message::assistant(result.clone()));
        self.state = WorkflowState::Completed;

        let trace = self.trace.snapshot();
        info!(%run_id, specialist = %specialist, events = trace.events.len(), "Task completed");

        if let Some(dir) = &self.trace_dir {
            let summary = RunSummary {
                run_id,
                task: task.description.clone(),
                specialist,
                mode: self.mode,
                started_at,
                ended_at: Utc::now(),
                result: result.clone(),
                event_count: trace.events.len(),
            };
            if let Err(e) = persist(dir, &summary, &trace).await {
                warn!(%run_id, error = %e, "Failed to persist trace");
            }
        }

        WorkflowOutput {
            run_id,
            history: self.history.clone(),
            task_records: self.records.clone(),
            result,
            decision,
            trace,
        }
    }

    /// Delegate and dispatch. Returns the decision, the specialist that
    /// actually produced the result, and the result.
    async fn execute(&mut self, task: &Task) -> (DelegationDecision, Specialist, String) {
        self.state = WorkflowState::Delegating;
        self.trace
            .add_thought("Analyzing the user's request to determine the best specialist for this task.");

        let decision = self.delegator.delegate(task).await;
        self.trace.add_thought(format!(
            "I've decided to delegate this task to the {} specialist.",
            decision.specialist.display_name()
        ));
        let plan = plan_from_reasoning(&decision.reasoning);
        if !plan.is_empty() {
            self.trace.add_plan(plan);
        }

        self.state = WorkflowState::Executing(decision.specialist);
        let (specialist, result) = self.dispatch(decision.specialist, task).await;
        self.state = WorkflowState::Executing(specialist);

        self.trace.add_thought("Task completed. Here's the final result.");
        (decision, specialist, result)
    }

    async fn dispatch(&self, specialist: Specialist, task: &Task) -> (Specialist, String) {
        let trace = &self.trace;
        let team = &self.team;
        let text = task.description.as_str();

        match specialist {
            Specialist::Researcher => (specialist, flows::research::run(&team.researcher, trace, text).await),
            Specialist::Coder => (specialist, flows::coder::run(&team.coder, trace, task).await),
            Specialist::Browser => (specialist, flows::browser::run(&team.browser, trace, text).await),
            Specialist::Sandbox => (specialist, flows::sandbox::run(&team.sandbox, trace, text).await),
            Specialist::FileManager => match flows::files::run(&team.file_manager, trace, text).await {
                Some(result) => (specialist, result),
                None => {
                    trace.add_thought(
                        "This doesn't match a file operation I can perform. I'll handle it directly instead.",
                    );
                    (
                        Specialist::Supervisor,
                        flows::supervisor::run(&team.supervisor, trace, text).await,
                    )
                }
            },
            Specialist::Supervisor => (specialist, flows::supervisor::run(&team.supervisor, trace, text).await),
        }
    }
}

/// Each non-empty trimmed line of the delegation reasoning is a plan item
pub fn plan_from_reasoning(reasoning: &str) -> Vec<String> {
    reasoning
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

async fn persist(dir: &Path, summary: &RunSummary, trace: &TraceSnapshot) -> Result<()> {
    let store = TraceStore::open_in(dir, summary.run_id).await?;
    store.append_all(&trace.events).await?;
    store
        .write_artifacts(&RunArtifacts {
            links: trace.links.clone(),
            files: trace.files.clone(),
        })
        .await?;
    store.write_summary(summary).await?;
    info!(run_dir = %store.run_dir().display(), "Trace persisted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{BackendError, Page, ScriptedModel, SimulatedSearch};
    use crate::domain::TraceStep;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct NoPages;

    #[async_trait]
    impl PageFetcher for NoPages {
        fn name(&self) -> &str {
            "none"
        }

        async fn browse(&self, url: &str) -> Result<Page, BackendError> {
            Err(BackendError::Status {
                status: 404,
                url: url.to_string(),
            })
        }
    }

    fn orchestrator(model: ScriptedModel, temp: &TempDir) -> Orchestrator {
        let backends = Backends::new(Arc::new(model), Arc::new(SimulatedSearch), Arc::new(NoPages));
        Orchestrator::new(backends, Arc::new(Sandbox::new(temp.path())))
    }

    #[test]
    fn test_plan_from_reasoning() {
        let plan = plan_from_reasoning("  Use the researcher.\n\n  Then summarize.  \n");
        assert_eq!(plan, vec!["Use the researcher.", "Then summarize."]);
        assert!(plan_from_reasoning("\n  \n").is_empty());
    }

    #[tokio::test]
    async fn test_supervisor_run_records_history() {
        let temp = TempDir::new().unwrap();
        let model = ScriptedModel::new()
            .on("which specialist", "Just answer directly.")
            .with_default("Hello there");
        let mut orch = orchestrator(model, &temp);
        assert_eq!(orch.state(), WorkflowState::Idle);

        let output = orch.run(Task::new("Say hello")).await;

        assert_eq!(orch.state(), WorkflowState::Completed);
        assert_eq!(output.decision.specialist, Specialist::Supervisor);
        assert_eq!(output.result, "Hello there");
        assert_eq!(output.history.len(), 2);
        assert_eq!(output.task_records.len(), 1);
        assert_eq!(output.task_records[0].specialist, Specialist::Supervisor);

        let last = output.trace.events.last().unwrap();
        assert!(matches!(
            &last.step,
            TraceStep::Thought { text, .. } if text.starts_with("Task completed.")
        ));
    }

    #[tokio::test]
    async fn test_history_accumulates_across_runs() {
        let temp = TempDir::new().unwrap();
        let model = ScriptedModel::new().with_default("ok");
        let mut orch = orchestrator(model, &temp);

        orch.run(Task::new("first")).await;
        let output = orch.run(Task::new("second")).await;

        assert_eq!(output.history.len(), 4);
        assert_eq!(orch.records().len(), 2);
        assert_eq!(output.trace.events[0].id, 1);
    }

    #[tokio::test]
    async fn test_persists_trace_when_configured() {
        let temp = TempDir::new().unwrap();
        let runs = temp.path().join("runs");
        let model = ScriptedModel::new().with_default("ok");
        let mut orch = orchestrator(model, &temp).with_trace_dir(Some(runs.clone()));

        let output = orch.run(Task::new("persist me")).await;

        let store = TraceStore::open_in(&runs, output.run_id).await.unwrap();
        let events = store.replay().await.unwrap();
        assert_eq!(events.len(), output.trace.events.len());
        let summary = store.load_summary().await.unwrap().unwrap();
        assert_eq!(summary.task, "persist me");
        assert_eq!(summary.result, "ok");
    }
}
