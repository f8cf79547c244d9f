//! Adapter interfaces for external systems.
//!
//! The engine talks to three kinds of collaborators, each behind a narrow
//! trait: a language model, a web search backend and a page fetcher.
//! Concrete implementations live in the submodules.

pub mod browser;
pub mod command;
pub mod openai;
pub mod scripted;
pub mod search;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use browser::HttpBrowser;
pub use command::CommandModel;
pub use openai::OpenAiModel;
pub use scripted::ScriptedModel;
pub use search::{DuckDuckGoSearch, SimulatedSearch};

/// Language model failures
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Language model request failed: {0}")]
    Request(String),

    #[error("Language model command failed: {0}")]
    Command(String),

    #[error("Language model returned no content")]
    Empty,
}

/// Search and browse failures
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Invalid scraping pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// A text-in, text-out model
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Human-readable model name
    fn name(&self) -> &str;

    /// Send a prompt and return the full response text
    async fn respond(&self, prompt: &str) -> Result<String, LlmError>;
}

/// One search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    /// Snippet or page excerpt
    pub content: String,
}

#[async_trait]
pub trait SearchBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, BackendError>;
}

/// A hyperlink found on a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    pub text: String,
    pub url: String,
}

/// A fetched page, reduced to readable text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// HTTP status code
    pub status: u16,
    /// Final URL after redirects
    pub url: String,
    pub title: String,
    pub content: String,
    pub links: Vec<PageLink>,
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    fn name(&self) -> &str;

    async fn browse(&self, url: &str) -> Result<Page, BackendError>;
}
