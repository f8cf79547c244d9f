//! Browsing flow.

use serde_json::json;

use crate::core::trace::TraceRecorder;
use crate::specialists::{Browser, BrowserIntent};

pub async fn run(browser: &Browser, trace: &TraceRecorder, task: &str) -> String {
    trace.add_thought("I'll use the Browser agent to navigate the web and extract information.");

    match BrowserIntent::classify(task) {
        BrowserIntent::SearchAndBrowse => {
            trace.add_thought("This appears to be a search and browse task. I'll extract the search query first.");
            trace.add_plan([
                "Extract the search query from the task",
                "Perform a web search to find relevant pages",
                "Browse the top search result",
                "Analyze the content of the page",
                "Provide a comprehensive summary",
            ]);
            trace.add_detail("Extracting search query...");
            let query = browser
                .extract_query(task)
                .await
                .unwrap_or_else(|| task.to_string());
            trace.add_execution("extract_query", json!({ "query": query }));
            search_and_browse(browser, trace, &query).await
        }
        BrowserIntent::Search => {
            trace.add_thought("I'll search the web for this task and browse the top result.");
            trace.add_plan([
                "Perform a web search using the task",
                "Browse the top search result",
                "Analyze the content of the page",
                "Provide a comprehensive summary",
            ]);
            search_and_browse(browser, trace, task).await
        }
        BrowserIntent::Browse => browse(browser, trace, task).await,
        BrowserIntent::Extract => extract(browser, trace, task).await,
    }
}

async fn search_and_browse(browser: &Browser, trace: &TraceRecorder, query: &str) -> String {
    trace.add_detail(format!("Searching for: '{}' and browsing the top result...", query));

    match browser.search_and_browse(query).await {
        Ok(Some(outcome)) => {
            trace.add_link(
                outcome.browsed_url.clone(),
                Some(outcome.title.clone()),
                Some("Top search result that was browsed".to_string()),
            );
            trace.add_execution(
                "search_and_browse",
                json!({ "query": query, "url": outcome.browsed_url, "title": outcome.title }),
            );
            trace.add_thought("Analyzing the content and preparing a summary...");

            format!(
                "# Search and Browse Results\n\nQuery: {}\n\nURL: {}\n\n## Analysis\n\n{}",
                query, outcome.browsed_url, outcome.analysis
            )
        }
        Ok(None) => {
            trace.add_execution(
                "search_and_browse",
                json!({ "query": query, "status": "error", "error": "No search results found" }),
            );
            trace.add_thought("The search returned no results.");
            format!("No search results found for query: {}", query)
        }
        Err(e) => {
            trace.add_execution(
                "search_and_browse",
                json!({ "query": query, "status": "error", "error": e.to_string() }),
            );
            trace.add_thought(format!("Error browsing the top result: {}", e));
            format!("Error: {}", e)
        }
    }
}

async fn browse(browser: &Browser, trace: &TraceRecorder, task: &str) -> String {
    trace.add_thought("This appears to be a direct browsing task. I'll extract the URL.");
    trace.add_plan([
        "Extract the URL from the task",
        "Browse the webpage",
        "Analyze the content of the page",
        "Provide a comprehensive summary",
    ]);
    trace.add_detail("Extracting URL...");

    let url = browser.extract_url(task).await;
    trace.add_execution("extract_url", json!({ "url": url }));

    let Some(url) = url else {
        trace.add_thought("I couldn't find a URL in the request.");
        return "I couldn't determine which URL to visit from your request. Please provide the address of the page.".to_string();
    };

    trace.add_detail(format!("Browsing {}...", url));
    match browser.browse(&url).await {
        Ok(outcome) => {
            trace.add_link(outcome.url.clone(), Some(outcome.title.clone()), Some("Browsed webpage".to_string()));
            trace.add_execution(
                "browse",
                json!({ "url": outcome.url, "title": outcome.title, "status": "success" }),
            );
            trace.add_thought("Analyzing the content and preparing a summary...");

            format!(
                "# Browsing Results\n\nURL: {}\nTitle: {}\n\n## Analysis\n\n{}",
                outcome.url, outcome.title, outcome.analysis
            )
        }
        Err(e) => {
            trace.add_execution("browse", json!({ "url": url, "status": "error", "error": e.to_string() }));
            trace.add_thought(format!("Error browsing {}: {}", url, e));
            format!("Error: {}", e)
        }
    }
}

async fn extract(browser: &Browser, trace: &TraceRecorder, task: &str) -> String {
    trace.add_thought(
        "This appears to be an information extraction task. I'll extract the URL and the information request.",
    );
    trace.add_plan([
        "Extract the URL and information request from the task",
        "Browse the webpage",
        "Extract the requested information",
        "Provide the extracted information in a structured format",
    ]);
    trace.add_detail("Extracting URL and information request...");

    let (url, request) = browser.extract_url_and_request(task).await;
    trace.add_execution("extract_url_and_request", json!({ "url": url, "information_request": request }));

    let Some(url) = url else {
        trace.add_thought("I couldn't find a URL in the request.");
        return "I couldn't determine which URL to extract information from. Please provide the address of the page.".to_string();
    };
    let request = request.unwrap_or_else(|| task.to_string());

    trace.add_detail(format!("Extracting information from {}...", url));
    match browser.extract_information(&url, &request).await {
        Ok(outcome) => {
            trace.add_link(
                outcome.url.clone(),
                Some(outcome.title.clone()),
                Some("Webpage information was extracted from".to_string()),
            );
            trace.add_execution(
                "extract_information",
                json!({ "url": outcome.url, "title": outcome.title, "status": "success" }),
            );
            trace.add_thought("Information extracted. Preparing the results...");

            format!(
                "# Information Extraction\n\nURL: {}\nTitle: {}\n\n## Extracted Information\n\n{}",
                outcome.url, outcome.title, outcome.extraction
            )
        }
        Err(e) => {
            trace.add_execution(
                "extract_information",
                json!({ "url": url, "status": "error", "error": e.to_string() }),
            );
            trace.add_thought(format!("Error extracting information from {}: {}", url, e));
            format!("Error: {}", e)
        }
    }
}
