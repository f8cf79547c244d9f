//! Sandbox Integration Tests
//!
//! Tests for code and command execution, timeouts, path containment and
//! the write policy at the sandbox boundary.

use std::time::{Duration, Instant};

use nova::core::{FilePolicy, PolicyViolation};
use nova::sandbox::{ExecutionStatus, Sandbox, SandboxError};
use tempfile::TempDir;

fn python_available() -> bool {
    std::process::Command::new("python3")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[tokio::test]
async fn test_run_code_prints() {
    if !python_available() {
        eprintln!("python3 not installed, skipping");
        return;
    }
    let temp = TempDir::new().unwrap();
    let sandbox = Sandbox::new(temp.path());

    let result = sandbox.run_code("print(2+2)").await;

    assert_eq!(result.status, ExecutionStatus::Success);
    assert_eq!(result.stdout, "4\n");
    assert_eq!(result.stderr, "");
    assert_eq!(result.exit_code, Some(0));

    // Source is persisted under the root and tracked
    let path = result.file_path.unwrap();
    assert!(path.starts_with(temp.path()));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "print(2+2)");
    assert_eq!(sandbox.tracked_files().len(), 1);
}

#[tokio::test]
async fn test_run_code_error_is_fast() {
    if !python_available() {
        eprintln!("python3 not installed, skipping");
        return;
    }
    let temp = TempDir::new().unwrap();
    let sandbox = Sandbox::new(temp.path());

    let started = Instant::now();
    let result = sandbox.run_code("raise ValueError('x')").await;

    assert_eq!(result.status, ExecutionStatus::Error);
    assert!(result.stderr.contains("ValueError"));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_command_runs_in_root() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("marker.txt"), "here").unwrap();
    let sandbox = Sandbox::new(temp.path());

    let result = sandbox.run_command("cat marker.txt").await;

    assert_eq!(result.status, ExecutionStatus::Success);
    assert_eq!(result.stdout, "here");
}

#[tokio::test]
async fn test_command_timeout_short_bound() {
    let temp = TempDir::new().unwrap();
    let sandbox = Sandbox::new(temp.path()).with_timeout(Duration::from_millis(500));

    let started = Instant::now();
    let result = sandbox.run_command("sleep 5").await;

    assert_eq!(result.status, ExecutionStatus::Timeout);
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[cfg(unix)]
#[tokio::test]
async fn test_command_timeout_kills_background_children() {
    let temp = TempDir::new().unwrap();
    let sandbox = Sandbox::new(temp.path()).with_timeout(Duration::from_millis(500));

    let started = Instant::now();
    let result = sandbox
        .run_command("(sleep 2; echo leaked > leaked.txt) & echo started; wait")
        .await;

    assert_eq!(result.status, ExecutionStatus::Timeout);
    assert_eq!(result.stdout, "started\n");
    assert!(started.elapsed() < Duration::from_millis(1500));

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!temp.path().join("leaked.txt").exists());
}

#[tokio::test]
#[ignore = "takes the full 30 second default timeout"]
async fn test_command_timeout_default_bound() {
    let temp = TempDir::new().unwrap();
    let sandbox = Sandbox::new(temp.path());

    let result = sandbox.run_command("sleep 31").await;

    assert_eq!(result.status, ExecutionStatus::Timeout);
}

#[tokio::test]
async fn test_paths_cannot_escape_root() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("box");
    let sandbox = Sandbox::new(&root);

    let err = sandbox.create_file("../outside.txt", "nope").await.unwrap_err();
    assert!(matches!(err, SandboxError::PathEscape { .. }));
    assert!(!temp.path().join("outside.txt").exists());

    let err = sandbox.read_file("/etc/passwd").await.unwrap_err();
    assert!(matches!(err, SandboxError::PathEscape { .. }));

    let err = sandbox.copy("a.txt", "../../b.txt").await.unwrap_err();
    assert!(matches!(err, SandboxError::PathEscape { .. }));
}

#[tokio::test]
async fn test_policy_rejects_before_write() {
    let temp = TempDir::new().unwrap();
    let policy = FilePolicy {
        max_file_bytes: 8,
        ..FilePolicy::default()
    };
    let sandbox = Sandbox::new(temp.path()).with_policy(policy);

    let err = sandbox.create_file("tool.exe", "MZ").await.unwrap_err();
    assert!(matches!(
        err,
        SandboxError::Policy(PolicyViolation::DisallowedExtension { .. })
    ));
    assert!(!temp.path().join("tool.exe").exists());

    let err = sandbox.create_file("notes.txt", "far too long").await.unwrap_err();
    assert!(matches!(err, SandboxError::Policy(PolicyViolation::TooLarge { .. })));
    assert!(!temp.path().join("notes.txt").exists());

    let err = sandbox.create_file("keys/server.pem", "x").await.unwrap_err();
    assert!(matches!(err, SandboxError::Policy(_)));
}

#[tokio::test]
async fn test_file_operations_round_trip() {
    let temp = TempDir::new().unwrap();
    let sandbox = Sandbox::new(temp.path());

    sandbox.create_directory("docs").await.unwrap();
    sandbox.create_file("docs/a.md", "# A").await.unwrap();
    sandbox.copy("docs/a.md", "docs/b.md").await.unwrap();
    sandbox.rename("docs/b.md", "c.md").await.unwrap();

    let names: Vec<String> = sandbox
        .list("docs")
        .await
        .unwrap()
        .iter()
        .map(|f| f.name().to_string())
        .collect();
    assert_eq!(names, vec!["a.md"]);

    let found = sandbox.find("**/*.md").await.unwrap();
    assert_eq!(found.len(), 2);

    let info = sandbox.stat("c.md").await.unwrap();
    assert!(!info.is_directory);
    assert_eq!(info.size_bytes, 3);

    // Only files the sandbox created itself are tracked
    assert_eq!(sandbox.tracked_files().len(), 1);
    sandbox.delete_file("docs/a.md").await.unwrap();
    assert!(sandbox.tracked_files().is_empty());
    assert!(matches!(
        sandbox.delete_file("docs").await,
        Err(SandboxError::NotAFile { .. })
    ));

    sandbox.clean().await.unwrap();
    assert!(sandbox.list_all_files().await.unwrap().is_empty());
}
