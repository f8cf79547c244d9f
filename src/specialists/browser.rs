//! Web browsing specialist.

use std::sync::Arc;

use tracing::{instrument, warn};

use crate::adapters::{BackendError, LanguageModel, Page, PageFetcher, SearchBackend, SearchResult};

use super::extract::{extract_fields, first_match, truncate_chars};
use super::{respond_for_extraction, respond_or_fallback};

/// Page text sent to the model is capped at this many characters
const PAGE_TEXT_LIMIT: usize = 8000;

/// What a browsing task asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserIntent {
    /// Both "search" and "browse" are mentioned; the query is extracted
    SearchAndBrowse,
    Browse,
    Extract,
    /// Nothing matched; the task text itself is the query
    Search,
}

const INTENTS: &[(BrowserIntent, &[&str])] = &[
    (BrowserIntent::Browse, &["browse", "visit", "go to", "open"]),
    (
        BrowserIntent::Extract,
        &["extract", "get information", "find information"],
    ),
];

impl BrowserIntent {
    /// "search" together with "browse" wins; otherwise browse, then
    /// extract, then a plain search.
    pub fn classify(task: &str) -> Self {
        let lowered = task.to_lowercase();
        if lowered.contains("search") && lowered.contains("browse") {
            return Self::SearchAndBrowse;
        }
        first_match(task, INTENTS).unwrap_or(Self::Search)
    }
}

/// Prefix `https://` when the scheme is missing
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

#[derive(Debug, Clone)]
pub struct BrowseOutcome {
    pub url: String,
    pub title: String,
    pub analysis: String,
}

#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub url: String,
    pub title: String,
    pub extraction: String,
}

#[derive(Debug, Clone)]
pub struct SearchBrowseOutcome {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub browsed_url: String,
    pub title: String,
    pub analysis: String,
}

pub struct Browser {
    llm: Arc<dyn LanguageModel>,
    fetcher: Arc<dyn PageFetcher>,
    search: Arc<dyn SearchBackend>,
    max_results: usize,
}

impl Browser {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        fetcher: Arc<dyn PageFetcher>,
        search: Arc<dyn SearchBackend>,
        max_results: usize,
    ) -> Self {
        Self {
            llm,
            fetcher,
            search,
            max_results,
        }
    }

    pub async fn extract_query(&self, task: &str) -> Option<String> {
        let prompt = format!(
            "I need to extract a search query from the following task:\n\n{}\n\nPlease provide just the search query without any additional text.",
            task
        );
        let query = respond_for_extraction(self.llm.as_ref(), &prompt).await?;
        let query = query.trim().trim_matches('"').trim();
        (!query.is_empty()).then(|| query.to_string())
    }

    pub async fn extract_url(&self, task: &str) -> Option<String> {
        let prompt = format!(
            "I need to extract a URL from the following task:\n\n{}\n\nPlease provide just the URL without any additional text. Answer in the format:\n\nURL: <url>",
            task
        );
        let response = respond_for_extraction(self.llm.as_ref(), &prompt).await?;
        extract_fields(&response, &["URL"])
            .take("URL")
            .or_else(|| {
                response
                    .split_whitespace()
                    .find(|w| w.contains('.') && !w.ends_with('.'))
                    .map(str::to_string)
            })
            .map(|u| normalize_url(&u))
    }

    /// Ask for the URL and the requested information in one go
    pub async fn extract_url_and_request(&self, task: &str) -> (Option<String>, Option<String>) {
        let prompt = format!(
            "I need to extract a URL and an information request from the following task:\n\n{}\n\nPlease provide them in the format:\n\nURL: <url>\nInformation request: <what to extract>\n\nIf either is missing, use 'Not found'.",
            task
        );
        let Some(response) = respond_for_extraction(self.llm.as_ref(), &prompt).await else {
            return (None, None);
        };
        let mut fields = extract_fields(&response, &["URL", "Information request"]);
        (
            fields.take("URL").map(|u| normalize_url(&u)),
            fields.take("Information request"),
        )
    }

    async fn fetch(&self, url: &str) -> Result<Page, BackendError> {
        self.fetcher.browse(&normalize_url(url)).await
    }

    /// Fetch a page and summarize it
    #[instrument(skip(self))]
    pub async fn browse(&self, url: &str) -> Result<BrowseOutcome, BackendError> {
        let page = self.fetch(url).await?;
        let prompt = format!(
            "I need to analyze the content of the webpage at {}.\n\nHere is the text content of the page:\n\n{}\n\nPlease provide a comprehensive summary of the webpage, including:\n1. The main topic or purpose of the page\n2. Key information presented\n3. Any important details, facts, or figures\n4. The overall structure and organization of the content",
            page.url,
            truncate_chars(&page.content, PAGE_TEXT_LIMIT)
        );
        let analysis = respond_or_fallback(self.llm.as_ref(), &prompt).await;

        Ok(BrowseOutcome {
            url: page.url,
            title: page.title,
            analysis,
        })
    }

    /// Fetch a page and pull out what `request` asks for
    #[instrument(skip(self))]
    pub async fn extract_information(&self, url: &str, request: &str) -> Result<ExtractionOutcome, BackendError> {
        let page = self.fetch(url).await?;
        let prompt = format!(
            "I need to extract specific information from the webpage at {}.\n\nHere is the text content of the page:\n\n{}\n\nI need to extract the following information:\n{}\n\nPlease provide the requested information in a clear and structured format. If the information is not available on the page, please indicate that.",
            page.url,
            truncate_chars(&page.content, PAGE_TEXT_LIMIT),
            request
        );
        let extraction = respond_or_fallback(self.llm.as_ref(), &prompt).await;

        Ok(ExtractionOutcome {
            url: page.url,
            title: page.title,
            extraction,
        })
    }

    /// Search, then browse the top hit.
    ///
    /// Returns `Ok(None)` when the search finds nothing.
    #[instrument(skip(self))]
    pub async fn search_and_browse(&self, query: &str) -> Result<Option<SearchBrowseOutcome>, BackendError> {
        let results = match self.search.search(query, self.max_results).await {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, "Search failed");
                Vec::new()
            }
        };
        let Some(top) = results.first().cloned() else {
            return Ok(None);
        };

        let browsed = self.browse(&top.url).await?;
        let analysis = format!(
            "Search query: {}\n\nTop result: {} ({})\n\n{}",
            query, top.title, top.url, browsed.analysis
        );

        Ok(Some(SearchBrowseOutcome {
            query: query.to_string(),
            results,
            browsed_url: browsed.url,
            title: if browsed.title.is_empty() { top.title } else { browsed.title },
            analysis,
        }))
    }
}
