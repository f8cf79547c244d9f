//! Trace Integration Tests
//!
//! Tests for id ordering under concurrent appends, the serialized shape of
//! snapshots and terminal capture during a run.

use std::sync::Arc;

use tempfile::TempDir;

use nova::adapters::{BackendError, Page, PageFetcher, ScriptedModel, SimulatedSearch};
use nova::core::{Backends, Orchestrator, TraceRecorder};
use nova::domain::{EventKind, Task, ThinkingMode};
use nova::sandbox::Sandbox;

struct NoPages;

#[async_trait::async_trait]
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

#[tokio::test]
async fn test_concurrent_appends_keep_dense_ids() {
    let trace = TraceRecorder::default();
    trace.start_session("concurrent", ThinkingMode::Normal);

    let mut handles = Vec::new();
    for worker in 0..8 {
        let trace = trace.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..25 {
                trace.add_detail(format!("worker {} step {}", worker, i));
                tokio::task::yield_now().await;
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let snapshot = trace.snapshot();
    assert_eq!(snapshot.events.len(), 1 + 8 * 25);
    for (i, event) in snapshot.events.iter().enumerate() {
        assert_eq!(event.id, i as u64 + 1);
    }
}

#[test]
fn test_snapshot_json_shape() {
    let trace = TraceRecorder::default();
    trace.start_session("summarize the news", ThinkingMode::Normal);
    trace.add_plan(["search", "summarize"]);

    let json = serde_json::to_value(trace.snapshot()).unwrap();

    assert_eq!(json["task"], "summarize the news");
    assert_eq!(json["mode"], "normal");
    assert_eq!(json["events"][0]["id"], 1);
    assert_eq!(json["events"][0]["kind"], "query");
    assert_eq!(json["events"][0]["payload"]["text"], "summarize the news");
    assert_eq!(json["events"][1]["kind"], "plan");
    assert_eq!(json["plan"][1], "summarize");
}

#[tokio::test]
async fn test_run_captures_terminal_output() {
    let temp = TempDir::new().unwrap();
    let model = ScriptedModel::new().with_default("Here is a direct answer.");
    let backends = Backends::new(Arc::new(model), Arc::new(SimulatedSearch), Arc::new(NoPages));
    let sandbox = Arc::new(Sandbox::new(temp.path()));
    let mut orch = Orchestrator::new(backends, sandbox).with_capture(true, false);

    let output = orch.run(Task::new("say hello")).await;

    assert!(output
        .trace
        .terminal_output
        .iter()
        .any(|line| line.content.contains("Task delegated")));
    assert!(output
        .trace
        .events
        .iter()
        .any(|e| e.kind() == EventKind::TerminalOutput));
}

#[tokio::test]
async fn test_run_without_capture_records_no_terminal_output() {
    let temp = TempDir::new().unwrap();
    let model = ScriptedModel::new().with_default("Here is a direct answer.");
    let backends = Backends::new(Arc::new(model), Arc::new(SimulatedSearch), Arc::new(NoPages));
    let mut orch = Orchestrator::new(backends, Arc::new(Sandbox::new(temp.path())));

    let output = orch.run(Task::new("say hello")).await;

    assert!(output.trace.terminal_output.is_empty());
}
