//! Direct-answer flow, also used as the fallback.

use serde_json::json;

use crate::core::trace::TraceRecorder;
use crate::specialists::Supervisor;

const PLAN: [&str; 3] = [
    "Analyze the user's request",
    "Determine the appropriate response",
    "Provide a comprehensive answer",
];

pub async fn run(supervisor: &Supervisor, trace: &TraceRecorder, task: &str) -> String {
    trace.add_thought(
        "This task requires general knowledge or coordination. I'll use the Supervisor agent to handle it directly.",
    );
    trace.add_plan(PLAN);
    trace.add_detail("Generating response...");

    let response = supervisor.respond(task).await;
    trace.add_execution("generate_response", json!({ "response_length": response.len() }));
    trace.add_thought("Response generated successfully.");
    response
}
