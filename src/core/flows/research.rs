//! Research flow: search, register links, summarize.

use serde_json::json;

use crate::core::trace::TraceRecorder;
use crate::specialists::Researcher;

use super::preview;

const PLAN: [&str; 4] = [
    "Analyze the search query to identify key terms",
    "Perform a web search to gather relevant information",
    "Analyze and synthesize the search results",
    "Provide a comprehensive summary of the findings",
];

pub async fn run(researcher: &Researcher, trace: &TraceRecorder, query: &str) -> String {
    trace.add_thought("I'll use the Researcher agent to search for information on this topic.");
    trace.add_plan(PLAN);
    trace.add_detail("Executing the research plan...");
    trace.add_detail("Performing web search...");

    let results = researcher.search(query).await;
    for result in &results {
        trace.add_link(
            result.url.clone(),
            Some(result.title.clone()),
            Some(preview(&result.content, 100)),
        );
    }
    trace.add_execution(
        "web_search",
        json!({ "query": query, "result_count": results.len() }),
    );

    if results.is_empty() {
        trace.add_thought("The search returned no results. I'll summarize what I can without sources.");
    } else {
        trace.add_thought("Analyzing search results and preparing a comprehensive summary...");
    }

    researcher.analyze(query, &results).await
}
