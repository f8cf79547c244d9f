//! Domain types for the nova orchestrator.
//!
//! This module contains the core data structures:
//! - Task: The incoming request and everything derived from it
//! - Events: Trace entries recorded while a task runs
//! - Artifact: Links and files referenced by a trace

pub mod artifact;
pub mod events;
pub mod task;

// Re-export commonly used types
pub use artifact::{Artifact, ArtifactKind, FileRef, Link};
pub use events::{EventKind, TraceEvent, TraceStep};
pub use task::{DelegationDecision, Message, Role, Specialist, Task, TaskRecord, ThinkingMode};
