//! Web research: search, then have the model synthesize the hits.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::adapters::{LanguageModel, SearchBackend, SearchResult};

use super::respond_or_fallback;

pub struct Researcher {
    llm: Arc<dyn LanguageModel>,
    search: Arc<dyn SearchBackend>,
    max_results: usize,
}

impl Researcher {
    pub fn new(llm: Arc<dyn LanguageModel>, search: Arc<dyn SearchBackend>, max_results: usize) -> Self {
        Self {
            llm,
            search,
            max_results,
        }
    }

    /// Search for `query`; backend failures yield no results
    pub async fn search(&self, query: &str) -> Vec<SearchResult> {
        match self.search.search(query, self.max_results).await {
            Ok(results) => {
                debug!(backend = self.search.name(), count = results.len(), "Search finished");
                results
            }
            Err(e) => {
                warn!(backend = self.search.name(), error = %e, "Search failed");
                Vec::new()
            }
        }
    }

    /// Ask the model to summarize `results` for `query`
    pub async fn analyze(&self, query: &str, results: &[SearchResult]) -> String {
        let prompt = format!(
            "I need to research the following topic:\n\n{}\n\nHere are the search results:\n\n{}\n\nPlease analyze these results and provide a comprehensive summary of the information. Include key facts, different perspectives, and any important details.",
            query,
            format_results(results)
        );
        respond_or_fallback(self.llm.as_ref(), &prompt).await
    }
}

/// Render hits as numbered blocks for a prompt
pub fn format_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No search results were found.".to_string();
    }
    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "Result {}:\nTitle: {}\nURL: {}\nContent: {}\n\n",
                i + 1,
                r.title,
                r.url,
                r.content
            )
        })
        .collect()
}
