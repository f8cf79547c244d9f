//! Core orchestration logic.
//!
//! This module contains:
//! - Delegator: Routes a task to one specialist
//! - Orchestrator: Workflow state machine driving each task
//! - Flows: Bounded per-specialist workflows
//! - Trace: Session recorder for thoughts, plans and artifacts
//! - TraceStore: Per-run persistence of traces
//! - Policy: File write limits
//! - Capture: Tee of log output into the trace

pub mod capture;
pub mod delegator;
pub mod flows;
pub mod orchestrator;
pub mod policy;
pub mod trace;
pub mod trace_store;

// Re-export commonly used types
pub use capture::{capture_subscriber, log_filter, TerminalTee};
pub use delegator::{classify_specialist, Delegator, FALLBACK_SPECIALIST, ROUTING_TABLE};
pub use orchestrator::{plan_from_reasoning, Backends, Orchestrator, WorkflowOutput, WorkflowState};
pub use policy::{FilePolicy, PolicyViolation};
pub use trace::{TerminalLine, TraceRecorder, TraceSnapshot};
pub use trace_store::{RunArtifacts, RunSummary, TraceStore};
