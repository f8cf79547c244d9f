//! Sandbox flow: file operations and code or command execution.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::core::trace::TraceRecorder;
use crate::sandbox::{ExecutionStatus, SandboxFile};
use crate::specialists::file_manager::kind_label;
use crate::specialists::sandbox::{describe_entry, describe_listing};
use crate::specialists::{SandboxAgent, SandboxIntent, SandboxRun};

use super::preview;

const CONTENT_PREVIEW: usize = 500;

pub async fn run(agent: &SandboxAgent, trace: &TraceRecorder, task: &str) -> String {
    trace.add_thought("I'll use the Sandbox agent to execute code or commands in a safe environment.");

    match SandboxIntent::classify(task) {
        Some(SandboxIntent::ListDirectory) => list_directory(agent, trace, task).await,
        Some(SandboxIntent::CreateDirectory) => create_directory(agent, trace, task).await,
        Some(SandboxIntent::CopyFile) => transfer(agent, trace, task, Transfer::Copy).await,
        Some(SandboxIntent::MoveFile) => transfer(agent, trace, task, Transfer::Move).await,
        Some(SandboxIntent::FindFiles) => find_files(agent, trace, task).await,
        Some(SandboxIntent::FileInfo) => file_info(agent, trace, task).await,
        Some(SandboxIntent::CreateFile) => create_file(agent, trace, task).await,
        Some(SandboxIntent::ExecuteCode) => execute_code(agent, trace, task).await,
        Some(SandboxIntent::ExecuteCommand) => execute_command(agent, trace, task).await,
        None => {
            trace.add_thought(
                "I'm not sure what type of sandbox task is being requested. I'll ask the user for clarification.",
            );
            "I'm not sure if you want me to execute Python code or a shell command. Please specify which type of execution you need and provide the code or command.".to_string()
        }
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "."
    } else {
        path
    }
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format("%a %b %e %H:%M:%S %Y").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn entry_line(entry: &SandboxFile) -> String {
    if entry.is_directory {
        format!("- {}: Directory\n", entry.name())
    } else {
        format!("- {}: File, {} bytes\n", entry.name(), entry.size_bytes)
    }
}

async fn list_directory(agent: &SandboxAgent, trace: &TraceRecorder, task: &str) -> String {
    trace.add_thought("This appears to be a directory listing task. I'll extract the directory path.");
    trace.add_plan([
        "Extract the directory path from the task",
        "List the directory contents",
        "Analyze the directory structure",
        "Provide a comprehensive summary",
    ]);
    trace.add_detail("Extracting directory path...");

    let directory = agent.extract_path(task).await.unwrap_or_default();
    trace.add_execution("extract_path", json!({ "path": directory }));
    trace.add_detail(format!("Listing contents of directory '{}'...", directory));

    let path = display_path(&directory);
    match agent.sandbox().list(&directory).await {
        Ok(items) => {
            trace.add_execution(
                "list_directory",
                json!({ "path": directory, "status": "success", "item_count": items.len() }),
            );
            trace.add_thought(format!("Successfully listed directory '{}'.", directory));

            let mut out = format!("# Directory Contents\n\nPath: {}\n\n## Items\n\n", path);
            if items.is_empty() {
                out.push_str("Directory is empty.\n");
            } else {
                for item in &items {
                    out.push_str(&entry_line(item));
                }
            }
            out.push_str(&format!("\n## Analysis\n\n{}", describe_listing(path, &items)));
            out
        }
        Err(e) => {
            trace.add_execution(
                "list_directory",
                json!({ "path": directory, "status": "error", "item_count": 0 }),
            );
            trace.add_thought(format!("Error listing directory: {}", e));
            format!("# Error Listing Directory\n\nPath: {}\n\n## Error\n\n{}", path, e)
        }
    }
}

async fn create_directory(agent: &SandboxAgent, trace: &TraceRecorder, task: &str) -> String {
    trace.add_thought("This appears to be a directory creation task. I'll extract the directory path.");
    trace.add_plan([
        "Extract the directory path from the task",
        "Create the directory in the sandbox",
        "Verify the directory was created successfully",
        "Provide a confirmation",
    ]);
    trace.add_detail("Extracting directory path...");

    let directory = agent.extract_path(task).await;
    trace.add_execution("extract_path", json!({ "path": directory }));

    let Some(directory) = directory else {
        trace.add_thought("I couldn't extract a directory path from the request.");
        return "I couldn't extract a directory path from your request. Please provide a specific path for the directory you want to create.".to_string();
    };

    trace.add_detail(format!("Creating directory '{}'...", directory));
    match agent.sandbox().create_directory(&directory).await {
        Ok(_) => {
            trace.add_execution("create_directory", json!({ "path": directory, "status": "success" }));
            trace.add_thought(format!("Successfully created directory '{}'.", directory));
            format!(
                "# Directory Created\n\nPath: {}\n\n## Status\n\nDirectory '{}' created successfully.",
                directory, directory
            )
        }
        Err(e) => {
            trace.add_execution("create_directory", json!({ "path": directory, "status": "error" }));
            trace.add_thought(format!("Error creating directory: {}", e));
            format!("# Error Creating Directory\n\nPath: {}\n\n## Error\n\n{}", directory, e)
        }
    }
}

#[derive(Clone, Copy)]
enum Transfer {
    Copy,
    Move,
}

impl Transfer {
    fn verb(self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Move => "move",
        }
    }

    fn action(self) -> &'static str {
        match self {
            Self::Copy => "copy_file",
            Self::Move => "move_file",
        }
    }
}

async fn transfer(agent: &SandboxAgent, trace: &TraceRecorder, task: &str, kind: Transfer) -> String {
    let verb = kind.verb();
    trace.add_thought(format!(
        "This appears to be a file {} task. I'll extract the source and destination paths.",
        verb
    ));
    trace.add_plan([
        "Extract the source and destination paths from the task".to_string(),
        format!("{} the file in the sandbox", capitalize(verb)),
        "Verify the operation completed successfully".to_string(),
        "Provide a confirmation".to_string(),
    ]);
    trace.add_detail("Extracting source and destination paths...");

    let (source, destination) = agent.extract_source_destination(task).await;
    trace.add_execution(
        "extract_source_destination",
        json!({ "source": source, "destination": destination }),
    );

    let (Some(source), Some(destination)) = (source, destination) else {
        trace.add_thought("I couldn't extract both source and destination paths from the request.");
        return format!(
            "I couldn't extract both source and destination paths from your request. Please provide specific paths for the file you want to {} and where you want to {} it to.",
            verb, verb
        );
    };

    trace.add_detail(format!("Running {} from '{}' to '{}'...", verb, source, destination));
    let outcome = match kind {
        Transfer::Copy => agent.sandbox().copy(&source, &destination).await,
        Transfer::Move => agent.sandbox().rename(&source, &destination).await,
    };

    let (title, error_title, done) = match kind {
        Transfer::Copy => ("File Copied", "Error Copying File", "copied"),
        Transfer::Move => ("File Moved", "Error Moving File", "moved"),
    };

    match outcome {
        Ok(_) => {
            trace.add_execution(
                kind.action(),
                json!({ "source": source, "destination": destination, "status": "success" }),
            );
            trace.add_thought(format!("Successfully {} '{}' to '{}'.", done, source, destination));
            format!(
                "# {}\n\nSource: {}\nDestination: {}\n\n## Status\n\nFile {} successfully.",
                title, source, destination, done
            )
        }
        Err(e) => {
            trace.add_execution(
                kind.action(),
                json!({ "source": source, "destination": destination, "status": "error" }),
            );
            trace.add_thought(format!("Error during file {}: {}", verb, e));
            format!(
                "# {}\n\nSource: {}\nDestination: {}\n\n## Error\n\n{}",
                error_title, source, destination, e
            )
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

async fn find_files(agent: &SandboxAgent, trace: &TraceRecorder, task: &str) -> String {
    trace.add_thought("This appears to be a file search task. I'll extract the search pattern.");
    trace.add_plan([
        "Extract the search pattern from the task",
        "Search for matching files in the sandbox",
        "Analyze the search results",
        "Provide a comprehensive summary",
    ]);
    trace.add_detail("Extracting search pattern...");

    let pattern = agent.extract_pattern(task).await;
    trace.add_execution("extract_pattern", json!({ "pattern": pattern }));

    let Some(pattern) = pattern else {
        trace.add_thought("I couldn't extract a search pattern from the request.");
        return "I couldn't extract a search pattern from your request. Please provide a specific pattern for the files you want to find.".to_string();
    };

    trace.add_detail(format!("Searching for files matching '{}'...", pattern));
    match agent.sandbox().find(&pattern).await {
        Ok(matches) => {
            trace.add_execution(
                "find_files",
                json!({ "pattern": pattern, "status": "success", "match_count": matches.len() }),
            );
            trace.add_thought(format!("Found {} files matching '{}'.", matches.len(), pattern));

            let mut out = format!("# Search Results\n\nPattern: {}\n\n## Matches ({})\n\n", pattern, matches.len());
            if matches.is_empty() {
                out.push_str("No files found matching the pattern.");
            } else {
                for m in &matches {
                    if m.is_directory {
                        out.push_str(&format!("- {}: Directory\n", m.relative_path));
                    } else {
                        out.push_str(&format!("- {}: File, {} bytes\n", m.relative_path, m.size_bytes));
                    }
                }
            }
            out
        }
        Err(e) => {
            trace.add_execution(
                "find_files",
                json!({ "pattern": pattern, "status": "error", "match_count": 0 }),
            );
            trace.add_thought(format!("Error finding files: {}", e));
            format!("# Error Finding Files\n\nPattern: {}\n\n## Error\n\n{}", pattern, e)
        }
    }
}

async fn file_info(agent: &SandboxAgent, trace: &TraceRecorder, task: &str) -> String {
    trace.add_thought("This appears to be a file info task. I'll extract the file path.");
    trace.add_plan([
        "Extract the file path from the task",
        "Get information about the file",
        "Analyze the file information",
        "Provide a comprehensive summary",
    ]);
    trace.add_detail("Extracting file path...");

    let path = agent.extract_path(task).await;
    trace.add_execution("extract_path", json!({ "path": path }));

    let Some(path) = path else {
        trace.add_thought("I couldn't extract a file path from the request.");
        return "I couldn't extract a file path from your request. Please provide a specific path for the file you want information about.".to_string();
    };

    trace.add_detail(format!("Getting information about '{}'...", path));
    match agent.sandbox().stat(&path).await {
        Ok(entry) => {
            trace.add_execution("get_file_info", json!({ "path": path, "status": "success" }));
            trace.add_thought(format!("Successfully retrieved information about '{}'.", path));

            let mut out = format!("# File Information\n\nPath: {}\n\n## Details\n\n", path);
            if entry.is_directory {
                out.push_str("Type: Directory\n");
            } else {
                out.push_str(&format!("Type: {}\nSize: {} bytes\n", kind_label(&entry), entry.size_bytes));
            }
            out.push_str(&format!("Created: {}\n", format_time(entry.created_at)));
            out.push_str(&format!("Modified: {}\n", format_time(entry.modified_at)));
            out.push_str(&format!("Accessed: {}\n", format_time(entry.accessed_at)));
            out.push_str(&format!("\n## Analysis\n\n{}", describe_entry(&path, &entry)));
            out
        }
        Err(e) => {
            trace.add_execution("get_file_info", json!({ "path": path, "status": "error" }));
            trace.add_thought(format!("Error getting file information: {}", e));
            format!("# Error Getting File Information\n\nPath: {}\n\n## Error\n\n{}", path, e)
        }
    }
}

async fn create_file(agent: &SandboxAgent, trace: &TraceRecorder, task: &str) -> String {
    trace.add_thought("This appears to be a file creation task. I'll extract the file information.");
    trace.add_plan([
        "Extract the filename and content from the task",
        "Create the file in the sandbox environment",
        "Verify the file was created successfully",
        "Provide a confirmation and summary",
    ]);
    trace.add_detail("Extracting file information...");

    let (filename, content) = agent.extract_file_info(task).await;
    trace.add_execution(
        "extract_file_info",
        json!({
            "filename": filename,
            "content_length": content.as_ref().map_or(0, String::len),
        }),
    );

    let (Some(filename), Some(content)) = (filename, content) else {
        trace.add_thought("I couldn't extract the filename or content from the request.");
        return "I couldn't extract the necessary information to create a file. Please provide both a filename and content in your request.".to_string();
    };

    trace.add_detail(format!("Creating file '{}'...", filename));
    match agent.sandbox().create_file(&filename, &content).await {
        Ok(file) => {
            trace.add_execution("create_file", json!({ "filename": filename, "status": "success" }));
            trace.add_file(
                file.relative_path.clone(),
                Some(preview(&content, CONTENT_PREVIEW)),
                Some("File created in sandbox".to_string()),
            );
            trace.add_thought(format!("File '{}' created successfully.", filename));
            format!(
                "# File Created\n\nFile: {}\n\n## Content\n\n```\n{}\n```\n\n## Status\n\nFile was successfully created in the sandbox environment.",
                filename,
                preview(&content, CONTENT_PREVIEW)
            )
        }
        Err(e) => {
            trace.add_execution("create_file", json!({ "filename": filename, "status": "error" }));
            trace.add_thought(format!("Error creating file: {}", e));
            format!(
                "# File Creation Failed\n\nFile: {}\n\n## Error\n\n{}\n\nPlease check the filename and try again.",
                filename, e
            )
        }
    }
}

/// Output section shared by code and command results
fn render_output(run: &SandboxRun, limit: Duration) -> String {
    let result = &run.result;
    let mut out = String::new();
    match result.status {
        ExecutionStatus::Success => {
            if result.stdout.is_empty() {
                out.push_str("No output produced.\n\n");
            } else {
                out.push_str(&format!("```\n{}\n```\n\n", result.stdout));
            }
        }
        ExecutionStatus::Timeout => {
            out.push_str(&format!(
                "Execution timed out after {} seconds.\n\n",
                limit.as_secs_f64()
            ));
            if !result.stdout.is_empty() {
                out.push_str(&format!("Partial output:\n```\n{}\n```\n\n", result.stdout));
            }
            let stderr = result.stderr.trim();
            if !stderr.is_empty() && !stderr.starts_with("Execution timed out") {
                out.push_str(&format!("Partial error output:\n```\n{}\n```\n\n", result.stderr));
            }
        }
        ExecutionStatus::Error => {
            if !result.stdout.is_empty() {
                out.push_str(&format!("```\n{}\n```\n\n", result.stdout));
            }
            out.push_str(&format!("Error:\n```\n{}\n```\n\n", result.stderr));
        }
    }
    out.push_str(&format!("## Analysis\n\n{}", run.analysis));
    out
}

async fn execute_code(agent: &SandboxAgent, trace: &TraceRecorder, task: &str) -> String {
    trace.add_thought("This appears to be a code execution task. I'll extract the Python code to execute.");
    trace.add_plan([
        "Extract the Python code from the task",
        "Prepare the code for execution",
        "Execute the code in a sandbox environment",
        "Analyze the execution results",
        "Provide a comprehensive summary",
    ]);
    trace.add_detail("Extracting Python code...");

    let code = agent.extract_code(task).await;
    trace.add_execution(
        "extract_code",
        json!({ "code_length": code.as_ref().map_or(0, String::len) }),
    );

    let Some(code) = code else {
        trace.add_thought("I couldn't extract any Python code from the request.");
        return "I couldn't extract any Python code from your request. Please provide the code you want to execute.".to_string();
    };

    trace.add_thought(format!("Executing the following Python code:\n\n```python\n{}\n```", code));
    trace.add_file(
        "sandbox_code.py",
        Some(code.clone()),
        Some("Python code to execute in sandbox".to_string()),
    );

    let run = agent.execute_python(&code).await;
    trace.add_execution(
        "execute_python",
        json!({
            "status": run.result.status.as_str(),
            "stdout_length": run.result.stdout.len(),
            "stderr_length": run.result.stderr.len(),
        }),
    );
    note_outcome(trace, &run, "Code");

    format!(
        "# Code Execution Result\n\n## Code\n\n```python\n{}\n```\n\n## Output\n\n{}",
        code,
        render_output(&run, agent.sandbox().timeout())
    )
}

async fn execute_command(agent: &SandboxAgent, trace: &TraceRecorder, task: &str) -> String {
    trace.add_thought("This appears to be a command execution task. I'll extract the shell command to execute.");
    trace.add_plan([
        "Extract the shell command from the task",
        "Prepare the command for execution",
        "Execute the command in a sandbox environment",
        "Analyze the execution results",
        "Provide a comprehensive summary",
    ]);
    trace.add_detail("Extracting shell command...");

    let command = agent.extract_command(task).await;
    trace.add_execution("extract_command", json!({ "command": command }));

    let Some(command) = command else {
        trace.add_thought("I couldn't extract any shell command from the request.");
        return "I couldn't extract any shell command from your request. Please provide the command you want to execute.".to_string();
    };

    trace.add_thought(format!("Executing the following shell command:\n\n```bash\n{}\n```", command));

    let run = agent.execute_command(&command).await;
    trace.add_execution(
        "execute_command",
        json!({
            "status": run.result.status.as_str(),
            "stdout_length": run.result.stdout.len(),
            "stderr_length": run.result.stderr.len(),
        }),
    );
    note_outcome(trace, &run, "Command");

    format!(
        "# Command Execution Result\n\n## Command\n\n```bash\n{}\n```\n\n## Output\n\n{}",
        command,
        render_output(&run, agent.sandbox().timeout())
    )
}

fn note_outcome(trace: &TraceRecorder, run: &SandboxRun, what: &str) {
    match run.result.status {
        ExecutionStatus::Success => trace.add_thought(format!("{} executed successfully.", what)),
        ExecutionStatus::Timeout => trace.add_thought(format!("{} execution timed out.", what)),
        ExecutionStatus::Error => trace.add_thought(format!("{} execution failed.", what)),
    };
}
