//! nova - Task orchestration engine
//!
//! Routes a natural-language task to one of a fixed set of specialists,
//! runs it through a bounded workflow, and records a trace of what was
//! thought and done along the way.
//!
//! # Architecture
//!
//! - The delegator asks a language model which specialist fits the task and
//!   maps the free-text answer onto a closed set by keyword priority
//! - The orchestrator drives the workflow state machine and the chosen
//!   specialist flow
//! - Specialists write and run code, manage files, browse and search the
//!   web, or answer directly
//! - Files and code stay inside a sandbox directory; executions are
//!   time-bounded subprocesses
//! - Every run produces a trace of thoughts, plans, executions, links and
//!   files, optionally persisted per run
//!
//! # Modules
//!
//! - `adapters`: Language model, search and page fetch backends
//! - `core`: Orchestration logic (Delegator, Orchestrator, Trace, TraceStore)
//! - `domain`: Data structures (Task, TraceEvent, Artifact)
//! - `sandbox`: Scoped filesystem and executor
//! - `specialists`: Per-specialist capabilities
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run a task
//! nova run "Write a Python function that reverses a string"
//!
//! # List recent runs
//! nova runs
//!
//! # Inspect a run's trace
//! nova show <run-id> --events
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod sandbox;
pub mod specialists;

// Re-export main types at crate root for convenience
pub use core::{Backends, Orchestrator, TraceRecorder, WorkflowOutput, WorkflowState};
pub use domain::{DelegationDecision, Specialist, Task, TaskRecord, ThinkingMode, TraceEvent, TraceStep};
pub use sandbox::{ExecutionResult, ExecutionStatus, Sandbox};
