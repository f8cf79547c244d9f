//! Coding flow: write, execute, and at most one debug round.

use serde_json::json;

use crate::core::trace::TraceRecorder;
use crate::domain::Task;
use crate::sandbox::ExecutionStatus;
use crate::specialists::coder::error_text;
use crate::specialists::{CodeRun, Coder};

const PLAN: [&str; 5] = [
    "Analyze the coding task requirements",
    "Write Python code to solve the problem",
    "Execute the code to test it",
    "Debug any errors if necessary",
    "Provide the final solution with explanation",
];

const SOLUTION_FILE: &str = "solution.py";

pub async fn run(coder: &Coder, trace: &TraceRecorder, task: &Task) -> String {
    trace.add_thought("I'll use the Coder agent to write and execute code for this task.");
    trace.add_plan(PLAN);
    trace.add_detail("Writing code to solve the task...");

    let draft = coder.write_code(&task.description, task.context.as_deref()).await;
    trace.add_execution("write_code", json!({ "code_length": draft.code.len() }));

    if draft.code.is_empty() {
        trace.add_thought("I wasn't able to write code for this task.");
        return render(&draft.code, &draft.explanation, None);
    }

    trace.add_thought(format!(
        "Code written successfully. Here's the solution:\n\n```python\n{}\n```\n\nNow I'll execute the code to test it.",
        draft.code
    ));
    trace.add_file(SOLUTION_FILE, Some(draft.code.clone()), Some("Python code solution".to_string()));

    trace.add_detail("Executing the code...");
    let first = coder.execute_code(&draft.code).await;
    trace.add_execution(
        "execute_code",
        json!({ "status": first.status().as_str(), "output_length": first.result.stdout.len() }),
    );

    let mut code = draft.code;
    let mut explanation = draft.explanation;

    let run = match first.status() {
        ExecutionStatus::Success => {
            trace.add_thought("Code executed successfully!");
            if !first.result.stdout.is_empty() {
                trace.add_detail(format!("Output:\n\n```\n{}\n```", first.result.stdout));
            }
            first
        }
        ExecutionStatus::Timeout => {
            trace.add_thought(format!(
                "Execution timed out after {} seconds. Long-running code is not retried.",
                coder.timeout().as_secs()
            ));
            first
        }
        ExecutionStatus::Error => {
            let error = error_text(&first.result);
            trace.add_thought(format!(
                "Execution failed with error:\n\n```\n{}\n```\n\nI'll debug the code and fix the issues.",
                error
            ));

            let fixed = coder.debug_code(&code, &error).await;
            trace.add_execution("debug_code", json!({ "debugged_code_length": fixed.code.len() }));

            if fixed.code.is_empty() {
                trace.add_thought("Debugging did not produce any new code.");
                first
            } else {
                trace.add_thought(format!(
                    "Code debugged. Here's the fixed solution:\n\n```python\n{}\n```\n\nExecuting the debugged code...",
                    fixed.code
                ));
                trace.add_file(
                    SOLUTION_FILE,
                    Some(fixed.code.clone()),
                    Some("Debugged Python code solution".to_string()),
                );

                let second = coder.execute_code(&fixed.code).await;
                trace.add_execution(
                    "execute_debugged_code",
                    json!({ "status": second.status().as_str(), "output_length": second.result.stdout.len() }),
                );

                if second.status() == ExecutionStatus::Success {
                    trace.add_thought("Debugged code executed successfully!");
                    code = fixed.code;
                    explanation = format!("{}\n\nDebug Notes: {}", explanation, fixed.explanation);
                } else {
                    trace.add_thought(format!(
                        "Debugged code still has issues:\n\n```\n{}\n```",
                        error_text(&second.result)
                    ));
                }
                second
            }
        }
    };

    render(&code, &explanation, Some(&run))
}

fn render(code: &str, explanation: &str, run: Option<&CodeRun>) -> String {
    let mut out = format!(
        "# Code Solution\n\n```python\n{}\n```\n\n## Explanation\n\n{}",
        code, explanation
    );

    if let Some(run) = run {
        out.push_str("\n\n## Execution Result\n\n");
        out.push_str(&format!("Status: {}\n\n", run.status().as_str()));
        if !run.result.stdout.is_empty() {
            out.push_str(&format!("Output:\n```\n{}\n```\n\n", run.result.stdout));
        }
        let error = error_text(&run.result);
        if !error.is_empty() {
            out.push_str(&format!("Error:\n```\n{}\n```\n\n", error));
        }
        out.push_str(&format!("Analysis: {}", run.analysis));
    }

    out
}
