//! Specialist capabilities.
//!
//! Each specialist wraps the language model (and, where needed, the
//! sandbox or web backends) behind a few narrow operations. They return
//! structured outcomes; turning those into trace events and result text is
//! the orchestrator's job.

pub mod browser;
pub mod coder;
pub mod extract;
pub mod file_manager;
pub mod researcher;
pub mod sandbox;
pub mod supervisor;

use tracing::warn;

use crate::adapters::LanguageModel;

pub use browser::{BrowseOutcome, Browser, BrowserIntent, ExtractionOutcome, SearchBrowseOutcome};
pub use coder::{CodeDraft, CodeRun, Coder};
pub use extract::{clean_code_block, extract_code, extract_fields, Fields};
pub use file_manager::{DirectoryReview, FileCreation, FileIntent, FileManager, FileReading};
pub use researcher::Researcher;
pub use sandbox::{SandboxAgent, SandboxIntent, SandboxRun};
pub use supervisor::Supervisor;

/// Result text used when the language model cannot be reached
pub const MODEL_UNAVAILABLE: &str =
    "I'm sorry, but I couldn't get a response from the language model. Please try again later.";

/// Ask the model, substituting [`MODEL_UNAVAILABLE`] on failure
pub(crate) async fn respond_or_fallback(llm: &dyn LanguageModel, prompt: &str) -> String {
    match llm.respond(prompt).await {
        Ok(text) => text,
        Err(e) => {
            warn!(model = llm.name(), error = %e, "Language model call failed");
            MODEL_UNAVAILABLE.to_string()
        }
    }
}

/// Ask the model for an extraction; failures yield `None`
pub(crate) async fn respond_for_extraction(llm: &dyn LanguageModel, prompt: &str) -> Option<String> {
    match llm.respond(prompt).await {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(model = llm.name(), error = %e, "Extraction call failed");
            None
        }
    }
}
