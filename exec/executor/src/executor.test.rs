use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use distbuild_config::ToolchainDialect;
use distbuild_invocation::ToolCommandline;
use distbuild_invocation::ToolId;
use distbuild_invocation::parser_for;
use pretty_assertions::assert_eq;

use super::*;
use crate::task::LocalTask;

fn sh_task(script: &str) -> LocalTask {
    let invocation = ToolCommandline::new(
        ToolId::new("sh", "/bin/sh"),
        ToolchainDialect::Gcc,
        vec!["-c".to_string(), script.to_string()],
    );
    LocalTask::new(invocation)
}

fn update_file_task(executable: &str, args: &[&str]) -> LocalTask {
    let mut invocation = ToolCommandline::new(
        ToolId::new("tool", executable),
        ToolchainDialect::UpdateFile,
        args.iter().map(|s| s.to_string()).collect(),
    );
    parser_for(ToolchainDialect::UpdateFile).derive(&mut invocation);
    LocalTask::new(invocation)
}

#[tokio::test]
async fn test_exec_simple_command() {
    let tmp = tempfile::tempdir().unwrap();
    let executor = LocalExecutor::new(2, tmp.path().to_path_buf());

    let result = executor.exec(sh_task("echo hello")).await;
    assert!(result.success);
    assert_eq!(result.std_out.trim(), "hello");
    assert!(result.execution_time > std::time::Duration::ZERO);
}

#[tokio::test]
async fn test_failing_command_is_not_success() {
    let tmp = tempfile::tempdir().unwrap();
    let executor = LocalExecutor::new(2, tmp.path().to_path_buf());

    let result = executor.exec(sh_task("echo broken >&2; exit 3")).await;
    assert!(!result.success);
    assert!(result.std_out.contains("broken"));
}

#[tokio::test]
async fn test_stderr_capture_can_be_disabled() {
    let tmp = tempfile::tempdir().unwrap();
    let executor = LocalExecutor::new(2, tmp.path().to_path_buf());

    let mut task = sh_task("echo out; echo noise >&2");
    task.capture_stderr = false;
    let result = executor.exec(task).await;
    assert!(result.success);
    assert_eq!(result.std_out.trim(), "out");
}

#[tokio::test]
async fn test_spawn_failure_is_synthetic_result() {
    let tmp = tempfile::tempdir().unwrap();
    let executor = LocalExecutor::new(2, tmp.path().to_path_buf());

    let task = LocalTask::new(ToolCommandline::new(
        ToolId::new("missing", "/nonexistent/tool-xyz"),
        ToolchainDialect::Gcc,
        vec![],
    ));
    let result = executor.exec(task).await;
    assert!(!result.success);
    assert!(result.std_out.contains("failed to execute"));
}

#[tokio::test]
async fn test_write_input_stages_and_reads_back() {
    let tmp = tempfile::tempdir().unwrap();
    let scratch = tmp.path().join("scratch");
    let executor = LocalExecutor::new(2, scratch.clone());

    // A tool that rewrites its single file argument end-to-end exercises
    // the staging path without needing a real compiler: sh appends a line
    // to the staged file, and the executor reads the file back.
    let mut task = update_file_task("/bin/sh", &["-c", "echo produced >> \"$0\"", "data.txt"]);
    task.write_input = true;
    task.read_output = true;
    task.input_data = b"original\n".to_vec();

    let result = executor.exec(task).await;
    assert!(result.success, "stdout: {}", result.std_out);
    assert_eq!(
        String::from_utf8_lossy(&result.output_data),
        "original\nproduced\n"
    );

    // Scratch prefix is clean after the callback.
    let leftovers: Vec<_> = std::fs::read_dir(&scratch)
        .map(|dir| dir.filter_map(|e| e.ok()).collect())
        .unwrap_or_default();
    assert!(leftovers.is_empty(), "scratch not cleaned: {leftovers:?}");
}

#[tokio::test]
async fn test_missing_filenames_fail_without_spawning() {
    let tmp = tempfile::tempdir().unwrap();
    let executor = LocalExecutor::new(2, tmp.path().to_path_buf());

    let mut task = sh_task("echo never runs");
    task.write_input = true; // no derivable input/output on this invocation
    let result = executor.exec(task).await;
    assert!(!result.success);
    assert!(result.std_out.contains("failed to extract filenames"));
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let tmp = tempfile::tempdir().unwrap();
    let executor = LocalExecutor::new(2, tmp.path().to_path_buf());

    let mut handles = Vec::new();
    for _ in 0..6 {
        let executor = executor.clone();
        handles.push(tokio::spawn(
            async move { executor.exec(sh_task("sleep 0.2")).await },
        ));
    }

    // Sample the pool while the sleeps run; the bound must hold at every
    // observation.
    let mut peak = 0;
    for _ in 0..40 {
        peak = peak.max(executor.running_tasks());
        assert!(executor.running_tasks() <= 2);
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    for handle in handles {
        assert!(handle.await.unwrap().success);
    }
    assert!(peak >= 1);
    assert_eq!(executor.running_tasks(), 0);
    assert_eq!(executor.queued_tasks(), 0);
}

#[tokio::test]
async fn test_callback_fires_exactly_once() {
    let tmp = tempfile::tempdir().unwrap();
    let executor = LocalExecutor::new(1, tmp.path().to_path_buf());

    let fired = Arc::new(AtomicUsize::new(0));
    let fired_cb = Arc::clone(&fired);
    let (tx, rx) = tokio::sync::oneshot::channel();
    executor.add_task(
        sh_task("true"),
        Box::new(move |result| {
            fired_cb.fetch_add(1, Ordering::SeqCst);
            assert!(result.success);
            let _ = tx.send(());
        }),
    );
    rx.await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_env_command_wraps_invocation() {
    let tmp = tempfile::tempdir().unwrap();
    let executor = LocalExecutor::new(1, tmp.path().to_path_buf());

    let mut task = sh_task("echo $PREPARED");
    task.env_command = Some("export PREPARED=yes".to_string());
    let result = executor.exec(task).await;
    assert!(result.success);
    assert_eq!(result.std_out.trim(), "yes");
}
