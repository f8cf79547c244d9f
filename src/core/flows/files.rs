//! File management flow.

use serde_json::json;

use crate::core::trace::TraceRecorder;
use crate::specialists::file_manager::kind_label;
use crate::specialists::{FileIntent, FileManager};

use super::preview;

const CONTENT_PREVIEW: usize = 500;

/// Run the file flow. `None` means the task matched no file operation and
/// should be handled by the fallback specialist.
pub async fn run(manager: &FileManager, trace: &TraceRecorder, task: &str) -> Option<String> {
    trace.add_thought("I'll use the File Manager agent to handle file operations.");

    let result = match FileIntent::classify(task)? {
        FileIntent::Create => create(manager, trace, task).await,
        FileIntent::Read => read(manager, trace, task).await,
        FileIntent::Organize => organize(manager, trace, task).await,
    };
    Some(result)
}

async fn create(manager: &FileManager, trace: &TraceRecorder, task: &str) -> String {
    trace.add_thought("This appears to be a file creation task. I'll extract the file path and content.");
    trace.add_plan([
        "Extract the file path and content from the task",
        "Determine the file type",
        "Format the content appropriately",
        "Create the file",
        "Verify the file was created successfully",
    ]);
    trace.add_detail("Extracting file path and content...");

    let request = manager.extract_create_request(task).await;
    trace.add_execution(
        "extract_file_info",
        json!({
            "file_path": request.as_ref().map(|r| r.path.as_str()),
            "file_type": request.as_ref().and_then(|r| r.file_type.as_deref()),
            "content_length": request.as_ref().map_or(0, |r| r.content.len()),
        }),
    );

    let Some(request) = request else {
        trace.add_thought("I couldn't determine the file path or content from the request.");
        return "I couldn't determine the file path or content from your request. Please provide more specific information.".to_string();
    };

    trace.add_detail(format!(
        "Creating file at {} with {} characters of content...",
        request.path,
        request.content.len()
    ));

    match manager.create_file(&request).await {
        Ok(created) => {
            trace.add_execution(
                "create_file",
                json!({ "file_path": created.file.relative_path, "status": "success" }),
            );
            trace.add_file(
                created.file.relative_path.clone(),
                Some(preview(&created.content, CONTENT_PREVIEW)),
                Some(format!("File created with {} characters of content", created.content.len())),
            );
            trace.add_thought(format!("File created successfully at {}.", created.file.relative_path));

            format!(
                "# File Created\n\nFile: {}\n\n## Content\n\n```\n{}\n```\n\n## Notes\n\n{}",
                created.file.relative_path,
                preview(&created.content, CONTENT_PREVIEW),
                created.suggestions
            )
        }
        Err(e) => {
            trace.add_execution(
                "create_file",
                json!({ "file_path": request.path, "status": "error", "error": e.to_string() }),
            );
            trace.add_thought(format!("Error creating file: {}", e));
            format!("Error: {}", e)
        }
    }
}

async fn read(manager: &FileManager, trace: &TraceRecorder, task: &str) -> String {
    trace.add_thought("This appears to be a file reading task. I'll extract the file path.");
    trace.add_plan([
        "Extract the file path from the task",
        "Read the file content",
        "Analyze the content",
        "Provide a summary of the file",
    ]);
    trace.add_detail("Extracting file path...");

    let path = manager.extract_file_path(task).await;
    trace.add_execution("extract_file_path", json!({ "file_path": path }));

    let Some(path) = path else {
        trace.add_thought("I couldn't determine the file path from the request.");
        return "I couldn't determine the file path from your request. Please provide more specific information.".to_string();
    };

    trace.add_detail(format!("Reading file {}...", path));
    match manager.read_file(&path).await {
        Ok(reading) => {
            trace.add_execution(
                "read_file",
                json!({ "file_path": path, "status": "success", "content_length": reading.content.len() }),
            );
            trace.add_file(
                path.clone(),
                Some(preview(&reading.content, CONTENT_PREVIEW)),
                Some(format!("File read with {} characters of content", reading.content.len())),
            );
            trace.add_thought("File read successfully. Analyzing the content...");

            format!(
                "# File Contents\n\nFile: {}\n\n```\n{}\n```\n\n## Analysis\n\n{}",
                reading.path,
                preview(&reading.content, CONTENT_PREVIEW),
                reading.analysis
            )
        }
        Err(e) => {
            trace.add_execution(
                "read_file",
                json!({ "file_path": path, "status": "error", "error": e.to_string() }),
            );
            trace.add_thought(format!("Error reading file: {}", e));
            format!("Error: {}", e)
        }
    }
}

async fn organize(manager: &FileManager, trace: &TraceRecorder, task: &str) -> String {
    trace.add_thought(
        "This appears to be a directory listing or organization task. I'll extract the directory path.",
    );
    trace.add_plan([
        "Extract the directory path from the task",
        "List the files in the directory",
        "Analyze the directory structure",
        "Suggest an organization plan",
    ]);
    trace.add_detail("Extracting directory path...");

    let directory = manager
        .extract_directory(task)
        .await
        .unwrap_or_else(|| ".".to_string());
    trace.add_execution("extract_directory_path", json!({ "directory": directory }));
    trace.add_detail(format!("Listing files in directory {}...", directory));

    match manager.organize(&directory).await {
        Ok(review) => {
            trace.add_execution(
                "list_directory",
                json!({ "directory": directory, "status": "success", "file_count": review.entries.len() }),
            );
            trace.add_thought(format!(
                "Found {} files in directory {}. Creating organization plan...",
                review.entries.len(),
                directory
            ));

            for entry in review.entries.iter().filter(|e| !e.is_directory) {
                trace.add_file(
                    entry.relative_path.clone(),
                    None,
                    Some(format!("File in directory {}, size: {} bytes", directory, entry.size_bytes)),
                );
            }

            let listing: String = review
                .entries
                .iter()
                .map(|e| format!("- {} ({}, {} bytes)\n", e.name(), kind_label(e), e.size_bytes))
                .collect();

            format!(
                "# Directory Contents\n\nDirectory: {}\n\n## Files\n\n{}\n## Organization Plan\n\n{}",
                review.directory, listing, review.plan
            )
        }
        Err(e) => {
            trace.add_execution(
                "list_directory",
                json!({ "directory": directory, "status": "error", "file_count": 0 }),
            );
            trace.add_thought(format!("Error listing directory: {}", e));
            format!("Error: {}", e)
        }
    }
}
